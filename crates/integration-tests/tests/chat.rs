//! Live chat over HTTP: a guest conversation answered by an agent.
//!
//! Require a running server, database and staff credentials.
//! Run with: cargo test -p spareline-integration-tests -- --ignored

use reqwest::StatusCode;
use serde_json::{Value, json};

use spareline_integration_tests::TestClient;

#[tokio::test]
#[ignore = "Requires running server, database and staff credentials"]
async fn test_guest_conversation_with_agent_reply() {
    let guest = TestClient::new();
    let resp = guest
        .post(
            "/api/chat/conversations",
            &json!({"name": "Rui", "message": "Do you have a clutch kit for a 2010 Clio?"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let started: Value = resp.json().await.unwrap();
    let id = started["id"].as_i64().unwrap();
    let token = started["visitor_token"].as_str().unwrap().to_owned();
    assert_eq!(started["messages"][0]["sender"], "visitor");

    // Without the token the conversation does not exist for the caller.
    let resp = guest
        .get(&format!("/api/chat/conversations/{id}/messages"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let staff = TestClient::new();
    staff.login_staff().await;
    let resp = staff
        .post(
            &format!("/api/admin/chat/conversations/{id}/messages"),
            &json!({"body": "Yes, Valeo and LuK both in stock."}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let history: Value = guest
        .get(&format!("/api/chat/conversations/{id}/messages?token={token}"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let senders: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["sender"].as_str())
        .collect();
    assert_eq!(senders, ["visitor", "agent"]);

    let resp = staff
        .post(
            &format!("/api/admin/chat/conversations/{id}/status"),
            &json!({"status": "closed"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Closed conversations take no new messages.
    let resp = guest
        .post(
            &format!("/api/chat/conversations/{id}/messages?token={token}"),
            &json!({"body": "Thanks!"}),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}
