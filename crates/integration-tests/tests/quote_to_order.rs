//! Quote lifecycle tests: a customer RFQ priced by staff, accepted into an
//! order, and fulfilled.
//!
//! Require a running server, a seeded database and a staff account without
//! two-factor (see `SPARELINE_TEST_STAFF_*`).
//! Run with: cargo test -p spareline-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::{Value, json};

use spareline_core::OrderStatus;
use spareline_integration_tests::{
    TestClient, backdate_quote_validity, database_pool, first_product_id, priced_quote,
    sample_address,
};

#[tokio::test]
#[ignore = "Requires running server, database and staff credentials"]
async fn test_quote_priced_accepted_and_shipped() {
    let customer = TestClient::new();
    customer.register_customer().await;
    let staff = TestClient::new();
    staff.login_staff().await;

    let product_id = first_product_id(&customer).await;
    let resp = customer
        .post(
            "/api/quotes",
            &json!({"items": [{"product_id": product_id, "quantity": 3}]}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let quote: Value = resp.json().await.unwrap();
    let quote_id = quote["id"].as_i64().unwrap();
    let reference = quote["reference"].as_str().unwrap().to_owned();
    let item_id = quote["items"][0]["id"].as_i64().unwrap();

    // Accepting before pricing is a state conflict.
    let resp = customer
        .post(
            &format!("/api/quotes/{reference}/accept"),
            &json!({"shipping_address": sample_address(), "payment_method": "bank_transfer"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = staff
        .post(&format!("/api/admin/quotes/{quote_id}/review"), &json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = staff
        .post(
            &format!("/api/admin/quotes/{quote_id}/prices"),
            &json!({
                "items": [{"item_id": item_id, "unit_price": "20.00"}],
                "discount_percent": "10",
                "admin_notes": "Repeat customer",
            }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let priced: Value = resp.json().await.unwrap();
    assert_eq!(priced["status"], "price_ready");
    assert_eq!(priced["total_amount"], "54.00");

    let customer_view: Value = customer
        .get(&format!("/api/quotes/{reference}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(customer_view.get("admin_notes").is_none());

    let resp = customer
        .post(
            &format!("/api/quotes/{reference}/accept"),
            &json!({"shipping_address": sample_address(), "payment_method": "bank_transfer"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.unwrap();
    assert_eq!(order["status"], OrderStatus::Pending.as_str());
    assert_eq!(order["total_amount"], "54.00");
    let order_id = order["id"].as_i64().unwrap();
    let order_number = order["order_number"].as_str().unwrap().to_owned();

    // A converted quote cannot be accepted a second time.
    let resp = customer
        .post(
            &format!("/api/quotes/{reference}/accept"),
            &json!({"shipping_address": sample_address(), "payment_method": "bank_transfer"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let resp = customer.get("/api/account/orders").await.unwrap();
    let orders: Value = resp.json().await.unwrap();
    let from_quote = orders
        .as_array()
        .unwrap()
        .iter()
        .filter(|o| o["quote_id"].as_i64() == Some(quote_id))
        .count();
    assert_eq!(from_quote, 1);

    let resp = customer.get(&format!("/api/orders/{order_number}")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Shipping needs a tracking number.
    let status_url = format!("/api/admin/orders/{order_id}/status");
    let resp = staff
        .post(&status_url, &json!({"status": "shipped"}))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = staff
        .post(
            &status_url,
            &json!({"status": "shipped", "tracking_number": "CTT-PT-123456"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let shipped: Value = resp.json().await.unwrap();
    assert!(shipped["shipped_at"].is_string());

    // Orders never move backwards.
    let resp = staff
        .post(&status_url, &json!({"status": "paid"}))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running server, database and staff credentials"]
async fn test_accepting_out_of_date_quote_expires_it() {
    let customer = TestClient::new();
    customer.register_customer().await;
    let staff = TestClient::new();
    staff.login_staff().await;

    let (_, reference) = priced_quote(&customer, &staff).await;
    let pool = database_pool().await;
    backdate_quote_validity(&pool, &reference).await;

    let resp = customer
        .post(
            &format!("/api/quotes/{reference}/accept"),
            &json!({"shipping_address": sample_address(), "payment_method": "cash_on_delivery"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let quote: Value = customer
        .get(&format!("/api/quotes/{reference}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quote["status"], "expired");

    // Expired is terminal.
    let resp = customer
        .post(
            &format!("/api/quotes/{reference}/accept"),
            &json!({"shipping_address": sample_address(), "payment_method": "cash_on_delivery"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
