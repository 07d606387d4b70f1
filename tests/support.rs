//! Shared helpers for integration tests: settings builders and loopback HTTP fakes.

#![allow(dead_code)]

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use vehicle_console::infra::settings::Settings;

/// Settings pointing the provider and the API at the given base URLs.
pub fn settings(keycloak_base: &str, api_base: &str) -> Settings {
    Settings {
        keycloak_url: keycloak_base.trim_end_matches('/').to_string(),
        realm: "vehicles".to_string(),
        client_id: "c1".to_string(),
        api_url: api_base.trim_end_matches('/').to_string(),
        callback_port: 0,
        callback_timeout: Duration::from_secs(5),
    }
}

/// A base URL where nothing listens; requests sent there fail to connect.
pub fn dead_endpoint() -> &'static str {
    "http://127.0.0.1:9"
}

/// Serve exactly one HTTP request with a fixed response, then stop.
/// Returns the base URL and the server task (await it to assert it was hit).
pub async fn spawn_one_shot_http(
    status_line: &'static str,
    body: String,
) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let port = listener.local_addr().expect("local addr").port();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buffer = vec![0u8; 8192];
        let _ = socket.read(&mut buffer).await;
        let response = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;
    });

    (format!("http://127.0.0.1:{port}"), handle)
}
