//! Usage: Token endpoint client (authorization_code + refresh_token grants).

use crate::domain::session::TokenSet;
use crate::shared::error::AppResult;
use crate::shared::security::mask_token;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct CodeExchangeRequest {
    pub token_url: String,
    pub client_id: String,
    pub code: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub token_url: String,
    pub client_id: String,
    pub refresh_token: String,
}

pub async fn exchange_authorization_code(
    client: &reqwest::Client,
    req: &CodeExchangeRequest,
) -> AppResult<TokenSet> {
    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("grant_type", "authorization_code".to_string());
    form.insert("client_id", req.client_id.trim().to_string());
    form.insert("redirect_uri", req.redirect_uri.trim().to_string());
    form.insert("code", req.code.trim().to_string());

    let response = client
        .post(req.token_url.trim())
        .form(&form)
        .send()
        .await
        .map_err(|e| format!("AUTH_EXCHANGE_FAILED: token request failed: {e}"))?;

    parse_token_response(response, "AUTH_EXCHANGE_FAILED").await
}

pub async fn refresh_tokens(
    client: &reqwest::Client,
    req: &RefreshRequest,
) -> AppResult<TokenSet> {
    let mut form: HashMap<&str, String> = HashMap::new();
    form.insert("grant_type", "refresh_token".to_string());
    form.insert("client_id", req.client_id.trim().to_string());
    form.insert("refresh_token", req.refresh_token.trim().to_string());

    let response = client
        .post(req.token_url.trim())
        .form(&form)
        .send()
        .await
        .map_err(|e| format!("AUTH_REFRESH_FAILED: refresh request failed: {e}"))?;

    parse_token_response(response, "AUTH_REFRESH_FAILED").await
}

async fn parse_token_response(
    response: reqwest::Response,
    failure_code: &'static str,
) -> AppResult<TokenSet> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| format!("{failure_code}: token response read failed: {e}"))?;

    if !status.is_success() {
        let (error_code, error_message) = parse_oauth_error_details(&body);
        let mut msg = format!(
            "{failure_code}: token endpoint returned status={}",
            status.as_u16()
        );
        if let Some(code) = error_code {
            msg.push_str(" error=");
            msg.push_str(code.as_str());
        }
        if let Some(detail) = error_message {
            msg.push_str(" description=");
            msg.push_str(detail.chars().take(240).collect::<String>().as_str());
        }
        msg.push_str(" body=");
        msg.push_str(sanitize_error_body_snippet(&body).as_str());
        return Err(msg.into());
    }

    let value: Value = serde_json::from_str(&body)
        .map_err(|e| format!("{failure_code}: token response json invalid: {e}"))?;

    let access_token = value
        .get("access_token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("{failure_code}: token response missing access_token"))?
        .to_string();

    let refresh_token = value
        .get("refresh_token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let id_token = value
        .get("id_token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let expires_in = value
        .get("expires_in")
        .and_then(parse_i64_lossy)
        .filter(|v| *v > 0);

    Ok(TokenSet {
        access_token,
        refresh_token,
        id_token,
        expires_in,
    })
}

fn parse_i64_lossy(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lc = key.trim().to_ascii_lowercase();
    key_lc.contains("token") || key_lc.contains("secret") || key_lc == "authorization"
}

fn redact_sensitive_json_fields(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if is_sensitive_key(key) {
                    if let Some(raw) = nested.as_str() {
                        *nested = Value::String(mask_token(raw));
                        continue;
                    }
                }
                redact_sensitive_json_fields(nested);
            }
        }
        Value::Array(items) => {
            for nested in items {
                redact_sensitive_json_fields(nested);
            }
        }
        _ => {}
    }
}

fn sanitize_error_body_snippet(body: &str) -> String {
    if let Ok(mut value) = serde_json::from_str::<Value>(body) {
        redact_sensitive_json_fields(&mut value);
        if let Ok(encoded) = serde_json::to_string(&value) {
            return encoded.chars().take(500).collect();
        }
    }
    body.chars().take(500).collect()
}

/// Standard OAuth error bodies carry `error` and `error_description`.
fn parse_oauth_error_details(body: &str) -> (Option<String>, Option<String>) {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return (None, None),
    };

    let code = value
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    let message = value
        .get("error_description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    (code, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::security::mask_token;

    #[test]
    fn parse_i64_lossy_supports_number_and_string() {
        assert_eq!(parse_i64_lossy(&Value::from(300)), Some(300));
        assert_eq!(parse_i64_lossy(&Value::from("1800")), Some(1800));
        assert_eq!(parse_i64_lossy(&Value::from("x")), None);
    }

    #[test]
    fn parse_oauth_error_details_reads_standard_fields() {
        let payload = r#"{
          "error": "invalid_grant",
          "error_description": "Code not valid"
        }"#;

        let (code, message) = parse_oauth_error_details(payload);
        assert_eq!(code.as_deref(), Some("invalid_grant"));
        assert_eq!(message.as_deref(), Some("Code not valid"));
    }

    #[test]
    fn parse_oauth_error_details_tolerates_non_json() {
        let (code, message) = parse_oauth_error_details("<html>502</html>");
        assert_eq!(code, None);
        assert_eq!(message, None);
    }

    #[test]
    fn sanitize_error_body_snippet_masks_token_fields() {
        let raw = r#"{
          "error": "invalid_grant",
          "refresh_token": "abcd1234xyz9876",
          "nested": {"id_token": "idtokenvalue123456"}
        }"#;
        let snippet = sanitize_error_body_snippet(raw);
        assert!(snippet.contains(mask_token("abcd1234xyz9876").as_str()));
        assert!(!snippet.contains("abcd1234xyz9876"));
        assert!(!snippet.contains("idtokenvalue123456"));
    }
}
