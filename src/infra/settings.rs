//! Usage: Environment-sourced client configuration (identity provider, downstream API, callback).

use crate::shared::error::AppResult;
use std::env;
use std::time::Duration;

const ENV_KEYCLOAK_URL: &str = "VEHICLE_CONSOLE_KEYCLOAK_URL";
const ENV_KEYCLOAK_REALM: &str = "VEHICLE_CONSOLE_KEYCLOAK_REALM";
const ENV_KEYCLOAK_CLIENT_ID: &str = "VEHICLE_CONSOLE_KEYCLOAK_CLIENT_ID";
const ENV_API_URL: &str = "VEHICLE_CONSOLE_API_URL";
const ENV_CALLBACK_PORT: &str = "VEHICLE_CONSOLE_CALLBACK_PORT";
const ENV_CALLBACK_TIMEOUT_SECS: &str = "VEHICLE_CONSOLE_CALLBACK_TIMEOUT_SECS";

const DEFAULT_API_URL: &str = "http://localhost:9090";
const DEFAULT_CALLBACK_PORT: u16 = 9876;
const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

/// Scopes requested on the authorization redirect.
pub const SCOPES: &[&str] = &["openid", "profile", "email"];

#[derive(Debug, Clone)]
pub struct Settings {
    pub keycloak_url: String,
    pub realm: String,
    pub client_id: String,
    pub api_url: String,
    pub callback_port: u16,
    pub callback_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> AppResult<Self> {
        Self::from_env_get(|key| env::var(key).ok())
    }

    fn from_env_get(mut get: impl FnMut(&str) -> Option<String>) -> AppResult<Self> {
        let keycloak_url = required(&mut get, ENV_KEYCLOAK_URL)?;
        let realm = required(&mut get, ENV_KEYCLOAK_REALM)?;
        let client_id = required(&mut get, ENV_KEYCLOAK_CLIENT_ID)?;

        let api_url = get(ENV_API_URL)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let callback_port = get(ENV_CALLBACK_PORT)
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<u16>().map_err(|_| {
                    format!("CONFIG_ERROR: {ENV_CALLBACK_PORT} must be a port number, got {v:?}")
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_CALLBACK_PORT);

        let callback_timeout = parse_timeout(&mut get)?;

        Ok(Self {
            keycloak_url: keycloak_url.trim_end_matches('/').to_string(),
            realm,
            client_id,
            api_url: api_url.trim_end_matches('/').to_string(),
            callback_port,
            callback_timeout,
        })
    }

    fn realm_endpoint(&self, leaf: &str) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/{leaf}",
            self.keycloak_url, self.realm
        )
    }

    pub fn authorize_endpoint(&self) -> String {
        self.realm_endpoint("auth")
    }

    pub fn token_endpoint(&self) -> String {
        self.realm_endpoint("token")
    }

    pub fn logout_endpoint(&self) -> String {
        self.realm_endpoint("logout")
    }

    pub fn vehicle_endpoint(&self) -> String {
        format!("{}/api/v1/vehicle", self.api_url)
    }

    /// Redirect URI registered with the provider; the port is the bound callback port.
    pub fn redirect_uri(&self, port: u16) -> String {
        format!("http://localhost:{port}/callback")
    }

    /// Origin the provider sends the browser back to after logout.
    pub fn post_logout_redirect_uri(&self) -> String {
        format!("http://localhost:{}", self.callback_port)
    }
}

fn required(get: &mut impl FnMut(&str) -> Option<String>, key: &str) -> AppResult<String> {
    get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("CONFIG_ERROR: {key} is required").into())
}

fn parse_timeout(get: &mut impl FnMut(&str) -> Option<String>) -> AppResult<Duration> {
    match get(ENV_CALLBACK_TIMEOUT_SECS)
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        None => Ok(Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS)),
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                format!("CONFIG_ERROR: {ENV_CALLBACK_TIMEOUT_SECS} must be a positive integer")
                    .into()
            }),
    }
}
