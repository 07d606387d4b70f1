//! Usage: Downstream vehicle API client (bearer-authenticated GET).

use crate::domain::session::{self, SessionStore};
use crate::infra::settings::Settings;
use crate::shared::error::{AppResult, CODE_NO_TOKEN, CODE_UNAUTHORIZED};
use crate::shared::security::mask_token;
use serde_json::Value;

const ERROR_BODY_SNIPPET_LEN: usize = 500;

/// Fetch the vehicle list. Fails fast with `AUTH_NO_TOKEN` when the session
/// holds no access token - no request is issued in that case. A 401 maps to
/// `AUTH_UNAUTHORIZED`; other non-success statuses carry status and body text.
pub async fn fetch_vehicles(
    client: &reqwest::Client,
    settings: &Settings,
    store: &dyn SessionStore,
) -> AppResult<Value> {
    let Some(access_token) = session::access_token(store)? else {
        return Err(format!(
            "{CODE_NO_TOKEN}: No access token found. Please log in first."
        )
        .into());
    };

    tracing::debug!(
        token = %mask_token(&access_token),
        endpoint = %settings.vehicle_endpoint(),
        "fetching vehicles"
    );

    let response = client
        .get(settings.vehicle_endpoint())
        .bearer_auth(access_token.trim())
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| format!("API_HTTP_ERROR: vehicle request failed: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(ERROR_BODY_SNIPPET_LEN).collect();
        let code = if status == reqwest::StatusCode::UNAUTHORIZED {
            CODE_UNAUTHORIZED
        } else {
            "API_HTTP_ERROR"
        };
        return Err(format!(
            "{code}: vehicle request failed: status={} body={snippet}",
            status.as_u16()
        )
        .into());
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| format!("API_HTTP_ERROR: vehicle response json invalid: {e}").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::MemorySessionStore;
    use std::time::Duration;

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let store = MemorySessionStore::new();
        let settings = Settings {
            keycloak_url: "http://127.0.0.1:9".to_string(),
            realm: "vehicles".to_string(),
            client_id: "c1".to_string(),
            // Nothing listens here; reaching the network would fail differently.
            api_url: "http://127.0.0.1:9".to_string(),
            callback_port: 0,
            callback_timeout: Duration::from_secs(1),
        };
        let client = reqwest::Client::new();

        let err = fetch_vehicles(&client, &settings, &store)
            .await
            .expect_err("should fail");
        assert_eq!(err.code(), CODE_NO_TOKEN);
        assert!(err.message().contains("No access token found"));
        assert!(err.requires_login());
    }
}
