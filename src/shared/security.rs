//! Usage: Security-sensitive helpers (token masking and constant-time equality).

use subtle::ConstantTimeEq;

const MASK_KEEP_PREFIX: usize = 6;
const MASK_KEEP_SUFFIX: usize = 4;

/// Redact a credential for log output, keeping just enough to correlate entries.
pub fn mask_token(token: &str) -> String {
    let value = token.trim();
    if value.is_empty() {
        return String::new();
    }
    if value.len() <= MASK_KEEP_PREFIX + MASK_KEEP_SUFFIX {
        return "*".repeat(value.len().min(8));
    }
    format!(
        "{}...{}",
        &value[..MASK_KEEP_PREFIX],
        &value[value.len() - MASK_KEEP_SUFFIX..]
    )
}

pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
