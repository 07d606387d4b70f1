//! Usage: Authorization initiation - CSRF state, authorize/logout URLs, browser dispatch.

use crate::infra::settings::{Settings, SCOPES};
use crate::shared::error::AppResult;
use rand::RngCore;
use std::process::Command;

/// 16 random bytes from the OS RNG, hex-encoded. Bound to the callback via the store.
pub fn generate_state() -> String {
    use rand::rngs::OsRng;
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn build_authorize_url(
    settings: &Settings,
    redirect_uri: &str,
    state: &str,
) -> AppResult<String> {
    let mut url = reqwest::Url::parse(&settings.authorize_endpoint())
        .map_err(|e| format!("SYSTEM_ERROR: invalid authorize endpoint: {e}"))?;
    {
        let scope = SCOPES.join(" ");
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", &settings.client_id);
        query.append_pair("redirect_uri", redirect_uri);
        query.append_pair("response_type", "code");
        query.append_pair("scope", &scope);
        query.append_pair("state", state);
    }
    Ok(url.to_string())
}

/// Provider logout redirect; `id_token_hint` is included when the session still has one.
pub fn build_logout_url(settings: &Settings, id_token_hint: Option<&str>) -> AppResult<String> {
    let mut url = reqwest::Url::parse(&settings.logout_endpoint())
        .map_err(|e| format!("SYSTEM_ERROR: invalid logout endpoint: {e}"))?;
    {
        let mut query = url.query_pairs_mut();
        if let Some(hint) = id_token_hint.map(str::trim).filter(|v| !v.is_empty()) {
            query.append_pair("id_token_hint", hint);
        }
        query.append_pair(
            "post_logout_redirect_uri",
            &settings.post_logout_redirect_uri(),
        );
    }
    Ok(url.to_string())
}

pub fn open_browser(url: &str) -> AppResult<()> {
    #[cfg(target_os = "windows")]
    {
        Command::new("rundll32.exe")
            .arg("url.dll,FileProtocolHandler")
            .arg(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[cfg(target_os = "macos")]
    {
        Command::new("open")
            .arg(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[cfg(all(unix, not(target_os = "macos")))]
    {
        Command::new("xdg-open")
            .arg(url)
            .spawn()
            .map_err(|e| format!("SYSTEM_ERROR: failed to open browser: {e}"))?;
        return Ok(());
    }

    #[allow(unreachable_code)]
    Err("SYSTEM_ERROR: browser open is unsupported on this platform"
        .to_string()
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            keycloak_url: "https://id.example.com".to_string(),
            realm: "vehicles".to_string(),
            client_id: "c1".to_string(),
            api_url: "http://localhost:9090".to_string(),
            callback_port: 9876,
            callback_timeout: Duration::from_secs(300),
        }
    }

    #[test]
    fn state_is_sixteen_bytes_of_hex() {
        let state = generate_state();
        assert_eq!(state.len(), 32);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(state, generate_state());
    }

    #[test]
    fn authorize_url_carries_the_code_flow_params() {
        let url =
            build_authorize_url(&settings(), "https://app/callback", "abc123").expect("url");
        assert!(url.starts_with(
            "https://id.example.com/realms/vehicles/protocol/openid-connect/auth?"
        ));
        assert!(url.contains("client_id=c1"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid+profile+email"));
        assert!(url.contains("state=abc123"));
    }

    #[test]
    fn logout_url_omits_missing_id_token_hint() {
        let with_hint = build_logout_url(&settings(), Some("idtok")).expect("url");
        assert!(with_hint.contains("id_token_hint=idtok"));
        assert!(with_hint.contains("post_logout_redirect_uri=http%3A%2F%2Flocalhost%3A9876"));

        let without = build_logout_url(&settings(), None).expect("url");
        assert!(!without.contains("id_token_hint"));
    }
}
