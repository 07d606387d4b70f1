//! Usage: `refresh` - one-shot token refresh, or the session-lifetime schedule with --follow.

use crate::auth::refresh::{refresh_once, RefreshTask};
use crate::commands::http_client;
use crate::domain::session::SessionStore;
use crate::infra::settings::Settings;
use crate::shared::error::AppResult;
use crate::shared::time::now_unix_millis;
use std::sync::Arc;

pub async fn run(settings: &Settings, store: Arc<dyn SessionStore>, follow: bool) -> AppResult<()> {
    let client = http_client()?;

    if !follow {
        let expiry = refresh_once(&client, settings, store.as_ref()).await?;
        let remaining_secs = expiry.saturating_sub(now_unix_millis()) / 1000;
        println!("Tokens refreshed. Session valid for about {remaining_secs}s.");
        return Ok(());
    }

    println!("Maintaining the session; press Ctrl-C to stop.");
    let task = RefreshTask::spawn(client, settings.clone(), store);
    let abort = task.abort_handle();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            abort.abort();
            println!("Refresh schedule cancelled.");
            Ok(())
        }
        result = task.join() => {
            // The schedule only returns on a failed refresh; surface it.
            result
        }
    }
}
