//! Integration tests for Spareline.
//!
//! These run against a live server and database:
//!
//! ```bash
//! spareline migrate && spareline seed
//! spareline staff create -e ops@example.com -f Ops -l Team -r super_admin --password '...'
//! cargo run -p spareline-server &
//! SPARELINE_TEST_STAFF_EMAIL=ops@example.com SPARELINE_TEST_STAFF_PASSWORD='...' \
//!     cargo test -p spareline-integration-tests -- --ignored
//! ```
//!
//! Tests that need to move the clock forward also connect to the database
//! directly (`SPARELINE_TEST_DATABASE_URL`, falling back to `DATABASE_URL`).
//!
//! Every test is `#[ignore]`d so a plain `cargo test` stays offline.

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

/// Base URL of the server under test (`SPARELINE_TEST_URL`).
#[must_use]
pub fn base_url() -> String {
    std::env::var("SPARELINE_TEST_URL").unwrap_or_else(|_| "http://127.0.0.1:4000".to_owned())
}

/// A client with its own cookie jar, i.e. its own session.
pub struct TestClient {
    client: Client,
    base: String,
}

impl TestClient {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let client = Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            base: base_url(),
        }
    }

    /// Absolute URL for a path such as `/api/products`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// # Errors
    ///
    /// Returns the transport error if the request cannot be sent.
    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.client.get(self.url(path)).send().await
    }

    /// # Errors
    ///
    /// Returns the transport error if the request cannot be sent.
    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Result<Response> {
        self.client.post(self.url(path)).json(body).send().await
    }

    /// # Errors
    ///
    /// Returns the transport error if the request cannot be sent.
    pub async fn put(&self, path: &str, body: &Value) -> reqwest::Result<Response> {
        self.client.put(self.url(path)).json(body).send().await
    }

    /// Register a fresh customer and keep the session.
    ///
    /// # Panics
    ///
    /// Panics if registration does not succeed.
    #[allow(clippy::expect_used)]
    pub async fn register_customer(&self) -> String {
        let email = unique_email("customer");
        let resp = self
            .post(
                "/api/auth/register",
                &json!({
                    "email": email,
                    "password": "correct horse battery",
                    "first_name": "Test",
                    "last_name": "Customer",
                }),
            )
            .await
            .expect("Failed to register");
        assert_eq!(resp.status(), StatusCode::CREATED, "register failed");
        email
    }

    /// Log in with the staff account from `SPARELINE_TEST_STAFF_EMAIL` and
    /// `SPARELINE_TEST_STAFF_PASSWORD`. The account must not have 2FA enabled.
    ///
    /// # Panics
    ///
    /// Panics if the variables are missing or the login fails.
    #[allow(clippy::expect_used)]
    pub async fn login_staff(&self) {
        let email = std::env::var("SPARELINE_TEST_STAFF_EMAIL")
            .expect("SPARELINE_TEST_STAFF_EMAIL not set");
        let password = std::env::var("SPARELINE_TEST_STAFF_PASSWORD")
            .expect("SPARELINE_TEST_STAFF_PASSWORD not set");
        let resp = self
            .post("/api/auth/login", &json!({"email": email, "password": password}))
            .await
            .expect("Failed to log in");
        assert_eq!(resp.status(), StatusCode::OK, "staff login failed");
        let body: Value = resp.json().await.expect("Invalid login response");
        assert_eq!(body["status"], "authenticated");
    }
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// An email address no earlier run has used.
#[must_use]
pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

/// Id of the first active product in the catalog.
///
/// # Panics
///
/// Panics if the catalog is empty; run `spareline seed` first.
#[allow(clippy::expect_used)]
pub async fn first_product_id(client: &TestClient) -> i64 {
    let page: Value = client
        .get("/api/products?per_page=1")
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Invalid product page");
    page["items"][0]["id"]
        .as_i64()
        .expect("Catalog is empty; run `spareline seed`")
}

/// A shipping address accepted by checkout.
#[must_use]
pub fn sample_address() -> Value {
    json!({
        "recipient": "Test Customer",
        "line1": "Rua das Flores 12",
        "city": "Lisboa",
        "postal_code": "1200-195",
        "country": "PT",
    })
}

/// Pool on the database the server under test uses.
///
/// # Panics
///
/// Panics if no database URL is set or the connection fails.
#[allow(clippy::expect_used)]
pub async fn database_pool() -> PgPool {
    let url = std::env::var("SPARELINE_TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .expect("SPARELINE_TEST_DATABASE_URL or DATABASE_URL not set");
    PgPool::connect(&url)
        .await
        .expect("Failed to connect to test database")
}

/// Move a quote's validity window into the past.
///
/// # Panics
///
/// Panics if the update fails or no quote has that reference.
#[allow(clippy::expect_used)]
pub async fn backdate_quote_validity(pool: &PgPool, reference: &str) {
    let updated = sqlx::query(
        "UPDATE shop.quotes SET valid_until = NOW() - INTERVAL '1 day' WHERE reference = $1",
    )
    .bind(reference)
    .execute(pool)
    .await
    .expect("Failed to backdate quote")
    .rows_affected();
    assert_eq!(updated, 1, "no quote {reference}");
}

/// Submit a one-line RFQ as `customer` and have `staff` price it at
/// 20.00 per unit. Returns the quote's `(id, reference)`.
///
/// # Panics
///
/// Panics if any step does not succeed.
#[allow(clippy::expect_used)]
pub async fn priced_quote(customer: &TestClient, staff: &TestClient) -> (i64, String) {
    let product_id = first_product_id(customer).await;
    let resp = customer
        .post(
            "/api/quotes",
            &json!({"items": [{"product_id": product_id, "quantity": 1}]}),
        )
        .await
        .expect("Failed to submit quote");
    assert_eq!(resp.status(), StatusCode::CREATED, "quote submission failed");
    let quote: Value = resp.json().await.expect("Invalid quote");
    let quote_id = quote["id"].as_i64().expect("quote id");
    let reference = quote["reference"].as_str().expect("quote reference").to_owned();
    let item_id = quote["items"][0]["id"].as_i64().expect("item id");

    let resp = staff
        .post(&format!("/api/admin/quotes/{quote_id}/review"), &json!({}))
        .await
        .expect("Failed to start review");
    assert_eq!(resp.status(), StatusCode::OK, "review failed");

    let resp = staff
        .post(
            &format!("/api/admin/quotes/{quote_id}/prices"),
            &json!({
                "items": [{"item_id": item_id, "unit_price": "20.00"}],
                "discount_percent": "0",
            }),
        )
        .await
        .expect("Failed to price quote");
    assert_eq!(resp.status(), StatusCode::OK, "pricing failed");

    (quote_id, reference)
}
