//! Usage: `logout` - clear the local session and end the provider session.

use crate::auth::authorize;
use crate::domain::session::{self, SessionStore};
use crate::infra::settings::Settings;
use crate::shared::blocking;
use crate::shared::error::AppResult;
use std::sync::Arc;

pub async fn run(settings: &Settings, store: Arc<dyn SessionStore>) -> AppResult<()> {
    let logout_url = blocking::run("logout_clear_session", {
        let settings = settings.clone();
        move || -> AppResult<String> {
            // Grab the id token for the hint before wiping the entries.
            let id_token = session::id_token(store.as_ref())?;
            session::clear_session(store.as_ref())?;
            authorize::build_logout_url(&settings, id_token.as_deref())
        }
    })
    .await?;

    println!("Local session cleared.");
    match authorize::open_browser(&logout_url) {
        Ok(()) => println!("Opened the browser to end the provider session."),
        Err(err) => {
            tracing::warn!("could not open a browser: {err}");
            println!("End the provider session here:\n{logout_url}");
        }
    }
    Ok(())
}
