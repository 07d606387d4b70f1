//! Usage: Subcommand orchestration - the session glue between auth, store, and API.

pub mod login;
pub mod logout;
pub mod refresh;
pub mod status;
pub mod vehicles;

use crate::shared::error::AppResult;
use std::time::Duration;

pub(crate) fn http_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(format!("vehicle-console/{}", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| format!("SYSTEM_ERROR: http client init failed: {e}").into())
}
