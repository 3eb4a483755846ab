//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Liveness
//! GET  /health/ready                         - Readiness (database ping)
//!
//! # Auth (rate limited)
//! POST /api/auth/register                    - Create a customer account
//! POST /api/auth/login                       - Password login
//! POST /api/auth/2fa/verify                  - Second factor for a pending login
//! POST /api/auth/logout                      - End the session
//! GET  /api/auth/me                          - Current user
//!
//! # Account (requires auth)
//! PATCH /api/account/profile                 - Name and phone
//! POST /api/account/password                 - Change password
//! POST /api/account/2fa/{setup,enable,disable}
//! PUT  /api/account/garage                   - Replace saved vehicles
//! PUT  /api/account/addresses                - Replace address book
//! GET  /api/account/favorites                - Favorite products
//! POST /api/account/favorites/{product_id}   - Toggle a favorite
//! GET  /api/account/quotes                   - Own quotes
//! GET  /api/account/orders                   - Own orders
//!
//! # Catalog
//! GET  /api/products                         - Search and filter
//! GET  /api/products/{slug}                  - Product detail
//! GET  /api/products/{slug}/reviews          - Approved reviews
//! POST /api/products/{slug}/reviews          - Submit a review (auth)
//! GET  /api/{brands,categories,conditions}   - Taxonomy
//!
//! # Quotes and orders
//! POST /api/quotes                           - Submit an RFQ (rate limited)
//! GET  /api/quotes/{reference}?token         - View a quote
//! POST /api/quotes/{reference}/accept?token  - Accept into an order
//! GET  /api/orders/{order_number}            - View an order
//!
//! # Chat
//! POST /api/chat/conversations               - Start a conversation
//! GET  /api/chat/conversations/{id}/messages - History
//! POST /api/chat/conversations/{id}/messages - Send a message
//! GET  /api/chat/conversations/{id}/ws       - Live room (WebSocket)
//!
//! # Settings
//! GET  /api/settings                         - Public settings
//!
//! # Back office (staff, per-area permission)
//! /api/admin/...                             - See `admin`
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod catalog;
pub mod chat;
pub mod health;
pub mod orders;
pub mod quotes;
pub mod settings;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter, quote_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/2fa/verify", post(auth::verify_two_factor))
        .layer(auth_rate_limiter())
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", patch(account::update_profile))
        .route("/password", post(account::change_password))
        .route("/2fa/setup", post(account::two_factor_setup))
        .route("/2fa/enable", post(account::two_factor_enable))
        .route("/2fa/disable", post(account::two_factor_disable))
        .route("/garage", put(account::replace_garage))
        .route("/addresses", put(account::replace_addresses))
        .route("/favorites", get(account::favorites))
        .route("/favorites/{product_id}", post(account::toggle_favorite))
        .route("/quotes", get(account::quotes))
        .route("/orders", get(account::orders))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{slug}", get(catalog::show_product))
        .route(
            "/products/{slug}/reviews",
            get(catalog::list_reviews).post(catalog::create_review),
        )
        .route("/brands", get(catalog::brands))
        .route("/categories", get(catalog::categories))
        .route("/conditions", get(catalog::conditions))
}

/// Create the quote and order routes router.
pub fn quote_routes() -> Router<AppState> {
    Router::new()
        .route("/quotes", post(quotes::submit))
        .route("/quotes/{reference}/accept", post(quotes::accept))
        .layer(quote_rate_limiter())
        .route("/quotes/{reference}", get(quotes::show))
        .route("/orders/{order_number}", get(orders::show))
}

/// Create the chat routes router.
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(chat::start))
        .route(
            "/conversations/{id}/messages",
            get(chat::messages).post(chat::post_message),
        )
        .route("/conversations/{id}/ws", get(chat::socket))
}

/// Everything under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
        .merge(catalog_routes())
        .merge(quote_routes())
        .nest("/chat", chat_routes())
        .route("/settings", get(settings::public))
        .nest("/admin", admin::router())
        .layer(api_rate_limiter())
}

/// Create all routes for the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::ServerConfig;
    use crate::middleware::session_layer;

    /// Router over a pool that never connects; only paths that fail before
    /// touching the database are exercised.
    fn app() -> Router {
        let config = ServerConfig::for_tests();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://spareline@127.0.0.1:1/unreachable")
            .unwrap();
        let layer = session_layer(MemoryStore::default(), &config);
        let state = AppState::new(config, pool).unwrap();
        routes().layer(layer).with_state(state)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "198.51.100.20")
            .body(Body::empty())
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "198.51.100.21")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn error_message(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        json["error"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_me_requires_session() {
        let response = app().oneshot(get_request("/api/auth/me")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error_message(response).await, "authentication required");
    }

    #[tokio::test]
    async fn test_admin_routes_require_session() {
        for uri in [
            "/api/admin/stats",
            "/api/admin/products",
            "/api/admin/quotes",
            "/api/admin/users",
            "/api/admin/settings",
            "/api/admin/chat/conversations",
        ] {
            let response = app().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_review_requires_session() {
        let body = serde_json::json!({"rating": 5, "comment": "Great"});
        let response = app()
            .oneshot(json_request("POST", "/api/products/oil-filter/reviews", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_empty_quote_is_rejected() {
        let body = serde_json::json!({
            "contact_name": "Ana",
            "contact_email": "ana@example.com",
            "items": [],
        });
        let response = app()
            .oneshot(json_request("POST", "/api/quotes", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_message(response).await, "a quote needs at least one item");
    }

    #[tokio::test]
    async fn test_inverted_price_range_is_rejected() {
        let response = app()
            .oneshot(get_request("/api/products?min_price=50&max_price=10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_short_password_is_rejected() {
        let body = serde_json::json!({
            "email": "new@example.com",
            "password": "short",
            "first_name": "New",
            "last_name": "Customer",
        });
        let response = app()
            .oneshot(json_request("POST", "/api/auth/register", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_without_token_or_session_is_not_found() {
        let response = app()
            .oneshot(get_request("/api/chat/conversations/1/messages"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let response = app().oneshot(get_request("/api/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
