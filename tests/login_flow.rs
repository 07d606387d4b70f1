//! End-to-end login flow: callback listener, callback policy, code exchange.

mod support;

use std::time::Duration;
use vehicle_console::auth::callback_server::{
    bind_callback_listener, wait_for_callback, CallbackPayload,
};
use vehicle_console::auth::flow::complete_login;
use vehicle_console::domain::session::{self, MemorySessionStore, SessionStore, KEY_ACCESS_TOKEN};
use vehicle_console::shared::time::now_unix_millis;

fn callback(code: &str, state: &str) -> CallbackPayload {
    CallbackPayload {
        code: Some(code.to_string()),
        state: Some(state.to_string()),
        error: None,
        error_description: None,
    }
}

#[tokio::test]
async fn redirect_callback_exchange_yields_an_authenticated_session() {
    let token_body = serde_json::json!({
        "access_token": "at-e2e",
        "refresh_token": "rt-e2e",
        "id_token": "id-e2e",
        "expires_in": 300
    })
    .to_string();
    let (keycloak_base, token_server) =
        support::spawn_one_shot_http("HTTP/1.1 200 OK", token_body).await;
    let settings = support::settings(&keycloak_base, support::dead_endpoint());

    let store = MemorySessionStore::new();
    session::put_auth_state(&store, "abc123").expect("stored state");

    let client = reqwest::Client::new();
    let expiry = complete_login(
        &client,
        &settings,
        &store,
        &callback("xyz", "abc123"),
        "https://app/callback",
    )
    .await
    .expect("login should complete");

    token_server.await.expect("token endpoint was called");
    let now = now_unix_millis();
    assert!(expiry > now);
    assert!(session::is_authenticated(&store, now).expect("query"));
    assert_eq!(store.get(KEY_ACCESS_TOKEN).unwrap().as_deref(), Some("at-e2e"));
}

#[tokio::test]
async fn rejected_exchange_leaves_the_session_unauthenticated() {
    let error_body = serde_json::json!({
        "error": "invalid_grant",
        "error_description": "Code not valid"
    })
    .to_string();
    let (keycloak_base, token_server) =
        support::spawn_one_shot_http("HTTP/1.1 400 Bad Request", error_body).await;
    let settings = support::settings(&keycloak_base, support::dead_endpoint());

    let store = MemorySessionStore::new();
    session::put_auth_state(&store, "abc123").expect("stored state");

    let client = reqwest::Client::new();
    let err = complete_login(
        &client,
        &settings,
        &store,
        &callback("consumed-code", "abc123"),
        "https://app/callback",
    )
    .await
    .expect_err("exchange should fail");

    token_server.await.expect("token endpoint was called");
    assert_eq!(err.code(), "AUTH_EXCHANGE_FAILED");
    assert!(err.message().contains("invalid_grant"));
    assert!(!session::is_authenticated(&store, now_unix_millis()).unwrap());
}

#[tokio::test]
async fn listener_hands_back_the_redirect_query() {
    let listener = bind_callback_listener(0).await.expect("bind");
    let port = listener.port();
    let wait = tokio::spawn(wait_for_callback(listener, Duration::from_secs(5)));
    tokio::task::yield_now().await;

    let response = reqwest::get(format!(
        "http://127.0.0.1:{port}/callback?code=xyz&state=abc123"
    ))
    .await
    .expect("redirect reaches the listener");
    assert!(response.status().is_success());
    let page = response.text().await.expect("body");
    assert!(page.contains("Login successful"));

    let payload = wait.await.expect("join").expect("payload");
    assert_eq!(payload.code.as_deref(), Some("xyz"));
    assert_eq!(payload.state.as_deref(), Some("abc123"));
}

#[tokio::test]
async fn listener_reports_provider_errors_with_an_error_page() {
    let listener = bind_callback_listener(0).await.expect("bind");
    let port = listener.port();
    let wait = tokio::spawn(wait_for_callback(listener, Duration::from_secs(5)));
    tokio::task::yield_now().await;

    let response = reqwest::get(format!(
        "http://127.0.0.1:{port}/callback?error=access_denied&state=abc123"
    ))
    .await
    .expect("redirect reaches the listener");
    assert_eq!(response.status().as_u16(), 400);

    let payload = wait.await.expect("join").expect("payload");
    assert_eq!(payload.error.as_deref(), Some("access_denied"));
    assert!(payload.code.is_none());
}
