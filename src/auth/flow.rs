//! Usage: Callback policy and code exchange - turns a provider redirect into a stored session.

use crate::auth::callback_server::CallbackPayload;
use crate::auth::token_exchange::{exchange_authorization_code, CodeExchangeRequest};
use crate::domain::session::{self, SessionStore};
use crate::infra::settings::Settings;
use crate::shared::error::AppResult;
use crate::shared::time::now_unix_millis;

/// Apply the callback policy, in order:
/// provider `error` first, then missing `code`/`state`, then the single-use
/// state check (which consumes the stored nonce either way), and only then
/// the code exchange. On success the token set is persisted and the computed
/// expiry (epoch millis) returned.
pub async fn complete_login(
    client: &reqwest::Client,
    settings: &Settings,
    store: &dyn SessionStore,
    payload: &CallbackPayload,
    redirect_uri: &str,
) -> AppResult<i64> {
    if let Some(err_code) = payload.error.as_deref() {
        let description = payload
            .error_description
            .as_deref()
            .unwrap_or("login failed");
        return Err(format!(
            "AUTH_PROVIDER_ERROR: provider returned error={err_code}: {description}"
        )
        .into());
    }

    let (Some(code), Some(state)) = (payload.code.as_deref(), payload.state.as_deref()) else {
        return Err("AUTH_INVALID_CALLBACK: callback missing code or state"
            .to_string()
            .into());
    };

    session::verify_auth_state(store, state)?;

    let tokens = exchange_authorization_code(
        client,
        &CodeExchangeRequest {
            token_url: settings.token_endpoint(),
            client_id: settings.client_id.clone(),
            code: code.to_string(),
            redirect_uri: redirect_uri.to_string(),
        },
    )
    .await?;

    let expiry = session::store_tokens(store, &tokens, now_unix_millis())?;
    tracing::info!(expires_at_millis = expiry, "login completed; session stored");
    Ok(expiry)
}
