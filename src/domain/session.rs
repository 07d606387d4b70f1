//! Usage: Session persistence and token lifecycle helpers over an injected key-value store.

use crate::infra::db::Db;
use crate::shared::error::AppResult;
use crate::shared::mutex_ext::MutexExt;
use crate::shared::security::constant_time_eq;
use crate::shared::time::now_unix_millis;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::sync::Mutex;

pub const KEY_ACCESS_TOKEN: &str = "access_token";
pub const KEY_REFRESH_TOKEN: &str = "refresh_token";
pub const KEY_ID_TOKEN: &str = "id_token";
/// Absolute expiry, epoch millis, stored as a decimal string.
pub const KEY_TOKEN_EXPIRY: &str = "token_expiry";
/// Transient CSRF nonce; deleted on first verification regardless of outcome.
pub const KEY_AUTH_STATE: &str = "auth_state";

/// Fallback lifetime when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 300;

/// Token set as returned by the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// String-keyed session storage.
///
/// Injected into every caller so tests can substitute `MemorySessionStore`
/// for the sqlite-backed production store.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<String>>;
    fn put(&self, key: &str, value: &str) -> AppResult<()>;
    /// Write several entries atomically (the token set is persisted together).
    fn put_many(&self, entries: &[(&str, &str)]) -> AppResult<()>;
    fn delete(&self, key: &str) -> AppResult<()>;
    /// Read and delete in one step; used for the single-use CSRF nonce.
    fn take(&self, key: &str) -> AppResult<Option<String>>;
}

/// Persist a token set and return the computed absolute expiry (epoch millis).
///
/// Expiry is derived at store time: `now + (expires_in or 300) * 1000`.
pub fn store_tokens(
    store: &dyn SessionStore,
    tokens: &TokenSet,
    now_millis: i64,
) -> AppResult<i64> {
    let expires_in = tokens.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let expiry = now_millis.saturating_add(expires_in.saturating_mul(1000));
    let expiry_text = expiry.to_string();

    let mut entries: Vec<(&str, &str)> = vec![
        (KEY_ACCESS_TOKEN, tokens.access_token.as_str()),
        (KEY_TOKEN_EXPIRY, expiry_text.as_str()),
    ];
    if let Some(refresh) = tokens.refresh_token.as_deref() {
        entries.push((KEY_REFRESH_TOKEN, refresh));
    }
    if let Some(id) = tokens.id_token.as_deref() {
        entries.push((KEY_ID_TOKEN, id));
    }
    store.put_many(&entries)?;

    if tokens.refresh_token.is_none() {
        store.delete(KEY_REFRESH_TOKEN)?;
    }
    if tokens.id_token.is_none() {
        store.delete(KEY_ID_TOKEN)?;
    }
    Ok(expiry)
}

/// Remove every session entry, the pending CSRF nonce included.
pub fn clear_session(store: &dyn SessionStore) -> AppResult<()> {
    for key in [
        KEY_ACCESS_TOKEN,
        KEY_REFRESH_TOKEN,
        KEY_ID_TOKEN,
        KEY_TOKEN_EXPIRY,
        KEY_AUTH_STATE,
    ] {
        store.delete(key)?;
    }
    Ok(())
}

pub fn access_token(store: &dyn SessionStore) -> AppResult<Option<String>> {
    store.get(KEY_ACCESS_TOKEN)
}

pub fn refresh_token(store: &dyn SessionStore) -> AppResult<Option<String>> {
    store.get(KEY_REFRESH_TOKEN)
}

pub fn id_token(store: &dyn SessionStore) -> AppResult<Option<String>> {
    store.get(KEY_ID_TOKEN)
}

/// Stored absolute expiry, if present and parseable.
pub fn token_expiry_millis(store: &dyn SessionStore) -> AppResult<Option<i64>> {
    let Some(raw) = store.get(KEY_TOKEN_EXPIRY)? else {
        return Ok(None);
    };
    match raw.trim().parse::<i64>() {
        Ok(value) => Ok(Some(value)),
        Err(_) => {
            tracing::warn!("stored token_expiry is not a number; treating as absent");
            Ok(None)
        }
    }
}

/// Authenticated iff both the access token and the expiry exist and the
/// expiry is strictly in the future. No token validation beyond that.
pub fn is_authenticated(store: &dyn SessionStore, now_millis: i64) -> AppResult<bool> {
    if access_token(store)?.is_none() {
        return Ok(false);
    }
    match token_expiry_millis(store)? {
        Some(expiry) => Ok(expiry > now_millis),
        None => Ok(false),
    }
}

pub fn put_auth_state(store: &dyn SessionStore, state: &str) -> AppResult<()> {
    store.put(KEY_AUTH_STATE, state)
}

/// Single-use CSRF check: the stored nonce is consumed whether or not the
/// comparison succeeds, so a second attempt with any value fails.
pub fn verify_auth_state(store: &dyn SessionStore, received: &str) -> AppResult<()> {
    let stored = store.take(KEY_AUTH_STATE)?;
    let Some(stored) = stored else {
        return Err("SEC_STATE_MISMATCH: no pending login state".into());
    };
    if !constant_time_eq(stored.as_bytes(), received.as_bytes()) {
        return Err("SEC_STATE_MISMATCH: callback state does not match".into());
    }
    Ok(())
}

#[derive(Clone)]
pub struct SqliteSessionStore {
    db: Db,
}

impl SqliteSessionStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.db.open_connection()?;
        let value = conn
            .query_row(
                "SELECT value FROM session_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> AppResult<()> {
        let conn = self.db.open_connection()?;
        conn.execute(
            r#"
INSERT INTO session_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#,
            params![key, value, now_unix_millis()],
        )?;
        Ok(())
    }

    fn put_many(&self, entries: &[(&str, &str)]) -> AppResult<()> {
        let mut conn = self.db.open_connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
INSERT INTO session_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#,
            )?;
            let now = now_unix_millis();
            for (key, value) in entries {
                stmt.execute(params![key, value, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn delete(&self, key: &str) -> AppResult<()> {
        let conn = self.db.open_connection()?;
        conn.execute("DELETE FROM session_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn take(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.db.open_connection()?;
        let tx = conn.transaction()?;
        let value: Option<String> = tx
            .query_row(
                "SELECT value FROM session_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        tx.execute("DELETE FROM session_entries WHERE key = ?1", params![key])?;
        tx.commit()?;
        Ok(value)
    }
}

/// In-memory store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock_or_recover().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> AppResult<()> {
        self.entries
            .lock_or_recover()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn put_many(&self, entries: &[(&str, &str)]) -> AppResult<()> {
        let mut map = self.entries.lock_or_recover();
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.lock_or_recover().remove(key);
        Ok(())
    }

    fn take(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock_or_recover().remove(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_set(expires_in: Option<i64>) -> TokenSet {
        TokenSet {
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            id_token: Some("id-1".to_string()),
            expires_in,
        }
    }

    #[test]
    fn store_tokens_computes_expiry_from_expires_in() {
        let store = MemorySessionStore::new();
        let expiry = store_tokens(&store, &token_set(Some(120)), 1_000_000).expect("store");
        assert_eq!(expiry, 1_000_000 + 120_000);
        assert_eq!(
            store.get(KEY_TOKEN_EXPIRY).unwrap().as_deref(),
            Some("1120000")
        );
    }

    #[test]
    fn store_tokens_defaults_expires_in_to_five_minutes() {
        let store = MemorySessionStore::new();
        let expiry = store_tokens(&store, &token_set(None), 0).expect("store");
        assert_eq!(expiry, DEFAULT_EXPIRES_IN_SECS * 1000);
    }

    #[test]
    fn store_tokens_drops_stale_optional_entries() {
        let store = MemorySessionStore::new();
        store_tokens(&store, &token_set(Some(60)), 0).expect("first");

        let rotated = TokenSet {
            access_token: "access-2".to_string(),
            refresh_token: None,
            id_token: None,
            expires_in: Some(60),
        };
        store_tokens(&store, &rotated, 0).expect("second");
        assert_eq!(store.get(KEY_REFRESH_TOKEN).unwrap(), None);
        assert_eq!(store.get(KEY_ID_TOKEN).unwrap(), None);
        assert_eq!(store.get(KEY_ACCESS_TOKEN).unwrap().as_deref(), Some("access-2"));
    }

    #[test]
    fn is_authenticated_boundary_is_strict() {
        let store = MemorySessionStore::new();
        let expiry = store_tokens(&store, &token_set(Some(300)), 1_000).expect("store");

        assert!(is_authenticated(&store, expiry - 1).unwrap());
        assert!(!is_authenticated(&store, expiry).unwrap());
        assert!(!is_authenticated(&store, expiry + 1).unwrap());
    }

    #[test]
    fn is_authenticated_requires_both_entries() {
        let store = MemorySessionStore::new();
        assert!(!is_authenticated(&store, 0).unwrap());

        store.put(KEY_ACCESS_TOKEN, "lonely").unwrap();
        assert!(!is_authenticated(&store, 0).unwrap());

        store.put(KEY_TOKEN_EXPIRY, "not-a-number").unwrap();
        assert!(!is_authenticated(&store, 0).unwrap());
    }

    #[test]
    fn auth_state_is_single_use() {
        let store = MemorySessionStore::new();
        put_auth_state(&store, "abc123").unwrap();

        assert!(verify_auth_state(&store, "abc123").is_ok());
        let second = verify_auth_state(&store, "abc123").expect_err("consumed");
        assert_eq!(second.code(), "SEC_STATE_MISMATCH");
    }

    #[test]
    fn auth_state_mismatch_still_consumes_the_nonce() {
        let store = MemorySessionStore::new();
        put_auth_state(&store, "abc123").unwrap();

        let first = verify_auth_state(&store, "evil").expect_err("mismatch");
        assert_eq!(first.code(), "SEC_STATE_MISMATCH");
        assert_eq!(store.get(KEY_AUTH_STATE).unwrap(), None);
    }
}
