//! Usage: `vehicles` - call the downstream API with the stored bearer token.

use crate::api::vehicles::fetch_vehicles;
use crate::commands::http_client;
use crate::domain::session::SessionStore;
use crate::infra::settings::Settings;
use crate::shared::error::AppResult;
use std::sync::Arc;

pub async fn run(settings: &Settings, store: Arc<dyn SessionStore>) -> AppResult<()> {
    let client = http_client()?;

    match fetch_vehicles(&client, settings, store.as_ref()).await {
        Ok(body) => {
            let rendered =
                serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
            println!("{rendered}");
            Ok(())
        }
        Err(err) if err.requires_login() => {
            eprintln!("Session is not authorized. Run `vehicle-console login` and retry.");
            Err(err)
        }
        Err(err) => Err(err),
    }
}
