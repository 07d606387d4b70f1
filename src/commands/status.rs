//! Usage: `status` - session query plus identity claims display.

use crate::auth::claims;
use crate::domain::session::{self, SessionStore};
use crate::shared::blocking;
use crate::shared::error::AppResult;
use crate::shared::time::now_unix_millis;
use std::sync::Arc;

pub async fn run(store: Arc<dyn SessionStore>) -> AppResult<()> {
    let (authenticated, expiry, id_token) = blocking::run("status_read_session", {
        move || -> AppResult<(bool, Option<i64>, Option<String>)> {
            let now = now_unix_millis();
            Ok((
                session::is_authenticated(store.as_ref(), now)?,
                session::token_expiry_millis(store.as_ref())?,
                session::id_token(store.as_ref())?,
            ))
        }
    })
    .await?;

    if authenticated {
        let remaining_secs = expiry
            .map(|e| e.saturating_sub(now_unix_millis()) / 1000)
            .unwrap_or(0);
        println!("Authenticated; token expires in about {remaining_secs}s.");
    } else {
        println!("Not authenticated. Run `vehicle-console login`.");
    }

    // Claims are decoded without verification and shown for display only.
    if let Some(id_token) = id_token {
        if let Some(claims) = claims::decode_claims(&id_token) {
            if let Some(username) = claims::claim_str(&claims, "preferred_username") {
                println!("User:  {username}");
            }
            if let Some(name) = claims::claim_str(&claims, "name") {
                println!("Name:  {name}");
            }
            if let Some(email) = claims::claim_str(&claims, "email") {
                println!("Email: {email}");
            }
        }
    }
    Ok(())
}
