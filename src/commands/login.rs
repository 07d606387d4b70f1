//! Usage: `login` - browser sign-in via the authorization-code flow.

use crate::auth::{authorize, callback_server, flow};
use crate::commands::http_client;
use crate::domain::session::{self, SessionStore};
use crate::infra::settings::Settings;
use crate::shared::error::AppResult;
use crate::shared::time::now_unix_millis;
use std::sync::Arc;
use tokio::task;

pub async fn run(settings: &Settings, store: Arc<dyn SessionStore>) -> AppResult<()> {
    let client = http_client()?;

    let state = authorize::generate_state();
    session::put_auth_state(store.as_ref(), &state)?;

    let listener = callback_server::bind_callback_listener(settings.callback_port).await?;
    let redirect_uri = settings.redirect_uri(listener.port());
    let auth_url = authorize::build_authorize_url(settings, &redirect_uri, &state)?;

    let timeout = settings.callback_timeout;
    let callback_task =
        task::spawn(async move { callback_server::wait_for_callback(listener, timeout).await });
    // Yield once so the listener is accepting before the browser redirects.
    task::yield_now().await;

    match authorize::open_browser(&auth_url) {
        Ok(()) => println!("Opened the browser for sign-in; waiting for the redirect..."),
        Err(err) => {
            tracing::warn!("could not open a browser: {err}");
            println!("Open this URL to sign in:\n{auth_url}");
        }
    }

    let payload = callback_task
        .await
        .map_err(|e| format!("SYSTEM_ERROR: callback task failed: {e}"))??;

    let expiry = flow::complete_login(&client, settings, store.as_ref(), &payload, &redirect_uri)
        .await?;

    let remaining_secs = expiry.saturating_sub(now_unix_millis()) / 1000;
    println!("Login successful. Session valid for about {remaining_secs}s.");
    Ok(())
}
