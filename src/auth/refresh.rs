//! Usage: Refresh-window math and the cancellable session refresh schedule.

use crate::auth::token_exchange::{refresh_tokens, RefreshRequest};
use crate::domain::session::{self, SessionStore};
use crate::infra::settings::Settings;
use crate::shared::error::AppResult;
use crate::shared::time::now_unix_millis;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Refresh fires this long before the stored expiry.
pub const REFRESH_LEAD_MILLIS: i64 = 60_000;

/// Delay until the next refresh should run: zero when already inside the
/// lead window (or past expiry), otherwise expiry minus lead.
pub fn refresh_delay_millis(expiry_millis: i64, now_millis: i64) -> i64 {
    expiry_millis
        .saturating_sub(REFRESH_LEAD_MILLIS)
        .saturating_sub(now_millis)
        .max(0)
}

/// Run one refresh_token grant against the session and persist the result.
/// Returns the new absolute expiry (epoch millis).
pub async fn refresh_once(
    client: &reqwest::Client,
    settings: &Settings,
    store: &dyn SessionStore,
) -> AppResult<i64> {
    let refresh_token = session::refresh_token(store)?
        .ok_or_else(|| "AUTH_REFRESH_FAILED: session has no refresh token".to_string())?;

    let tokens = refresh_tokens(
        client,
        &RefreshRequest {
            token_url: settings.token_endpoint(),
            client_id: settings.client_id.clone(),
            refresh_token,
        },
    )
    .await?;

    let expiry = session::store_tokens(store, &tokens, now_unix_millis())?;
    tracing::info!(expires_at_millis = expiry, "session tokens refreshed");
    Ok(expiry)
}

/// Handle to the running refresh schedule. Dropping it aborts the task, so a
/// schedule can never outlive the session that armed it.
pub struct RefreshTask {
    handle: JoinHandle<AppResult<()>>,
}

impl RefreshTask {
    /// Arm the schedule against the current session: sleep until 60 s before
    /// the stored expiry (or not at all if already inside the window), refresh,
    /// re-arm on success, stop on the first failure.
    pub fn spawn(
        client: reqwest::Client,
        settings: Settings,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            run_schedule(&client, &settings, store.as_ref()).await
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Detached cancel handle, usable while `join` owns the task.
    pub fn abort_handle(&self) -> tokio::task::AbortHandle {
        self.handle.abort_handle()
    }

    /// Wait for the schedule to end. Cancellation is a clean exit; a refresh
    /// failure is returned to the caller.
    pub async fn join(mut self) -> AppResult<()> {
        let handle = &mut self.handle;
        match handle.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Ok(()),
            Err(_) => Err("SYSTEM_ERROR: refresh schedule task failed"
                .to_string()
                .into()),
        }
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_schedule(
    client: &reqwest::Client,
    settings: &Settings,
    store: &dyn SessionStore,
) -> AppResult<()> {
    loop {
        let expiry = session::token_expiry_millis(store)?
            .ok_or_else(|| "AUTH_REFRESH_FAILED: session has no stored expiry".to_string())?;

        let delay = refresh_delay_millis(expiry, now_unix_millis());
        tracing::debug!(delay_millis = delay, "refresh schedule armed");
        tokio::time::sleep(Duration::from_millis(delay as u64)).await;

        match refresh_once(client, settings, store).await {
            Ok(_) => continue,
            Err(err) => {
                tracing::error!("refresh failed; session is no longer maintained: {err}");
                return Err(err);
            }
        }
    }
}
