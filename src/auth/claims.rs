//! Usage: Unverified id-token claims decode for display.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;

/// Decode the JWT payload segment of an id token without verifying the
/// signature. Display-only: nothing downstream trusts these claims.
///
/// Returns `None` (with a diagnostic) on any malformed input.
pub fn decode_claims(id_token: &str) -> Option<Value> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = match URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!("id token payload is not valid base64: {err}");
            return None;
        }
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => {
            tracing::warn!("id token payload is not a JSON object");
            None
        }
        Err(err) => {
            tracing::warn!("id token payload is not valid JSON: {err}");
            None
        }
    }
}

/// Convenience accessor for a string claim.
pub fn claim_str<'a>(claims: &'a Value, name: &str) -> Option<&'a str> {
    claims.get(name).and_then(Value::as_str)
}
