//! Usage: One-shot localhost callback listener for the authorization redirect.

use crate::shared::error::AppResult;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const CALLBACK_PATH: &str = "/callback";
const SUCCESS_HTML: &str =
    "<html><body><h1>Login successful</h1><p>You may close this window.</p></body></html>";
const ERROR_HTML: &str = "<html><body><h1>Login failed</h1><p>You may close this window and retry.</p></body></html>";

/// Query parameters the provider sends back. All optional here; the login flow
/// applies the callback policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallbackPayload {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug)]
pub struct BoundCallbackListener {
    port: u16,
    listener_v4: Option<TcpListener>,
    listener_v6: Option<TcpListener>,
}

impl BoundCallbackListener {
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Bind the preferred port; fall back to a dynamic one so login still works
/// when the preferred port is taken (the redirect URI carries the bound port).
pub async fn bind_callback_listener(preferred_port: u16) -> AppResult<BoundCallbackListener> {
    match try_bind_on_port(preferred_port).await {
        Ok(bound) => Ok(bound),
        Err(preferred_err) if preferred_port == 0 => {
            Err(format!("SYSTEM_ERROR: callback bind failed: {preferred_err}").into())
        }
        Err(preferred_err) => match try_bind_on_port(0).await {
            Ok(bound) => {
                tracing::warn!(
                    preferred_port,
                    bound_port = bound.port,
                    "preferred callback port unavailable ({preferred_err}); using dynamic port"
                );
                Ok(bound)
            }
            Err(fallback_err) => Err(format!(
                "SYSTEM_ERROR: callback bind failed: {preferred_err}; fallback_dynamic_port: {fallback_err}"
            )
            .into()),
        },
    }
}

async fn try_bind_on_port(port: u16) -> Result<BoundCallbackListener, String> {
    if port == 0 {
        return try_bind_dynamic_port().await;
    }

    let mut bind_errors: Vec<String> = Vec::new();
    let listener_v4 = match TcpListener::bind(("127.0.0.1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            bind_errors.push(format!("127.0.0.1:{port} ({err})"));
            None
        }
    };
    let listener_v6 = match TcpListener::bind(("::1", port)).await {
        Ok(listener) => Some(listener),
        Err(err) => {
            bind_errors.push(format!("::1:{port} ({err})"));
            None
        }
    };
    if listener_v4.is_none() && listener_v6.is_none() {
        return Err(bind_errors.join("; "));
    }

    Ok(BoundCallbackListener {
        port,
        listener_v4,
        listener_v6,
    })
}

async fn try_bind_dynamic_port() -> Result<BoundCallbackListener, String> {
    let listener_v4 = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| format!("127.0.0.1:0 ({e})"))?;
    let port = listener_v4
        .local_addr()
        .map_err(|e| format!("127.0.0.1:0 (local_addr failed: {e})"))?
        .port();
    // v6 on the same port is best-effort; `localhost` may resolve to either family.
    let listener_v6 = TcpListener::bind(("::1", port)).await.ok();

    Ok(BoundCallbackListener {
        port,
        listener_v4: Some(listener_v4),
        listener_v6,
    })
}

/// Wait for the provider redirect, answer the browser, and hand the raw
/// payload to the caller. Policy decisions (state check, error handling)
/// happen in the login flow, not here.
pub async fn wait_for_callback(
    mut listener: BoundCallbackListener,
    timeout: Duration,
) -> AppResult<CallbackPayload> {
    let accept_future = async {
        match (listener.listener_v4.as_mut(), listener.listener_v6.as_mut()) {
            (Some(v4), Some(v6)) => {
                tokio::select! {
                    result = v4.accept() => result,
                    result = v6.accept() => result,
                }
            }
            (Some(v4), None) => v4.accept().await,
            (None, Some(v6)) => v6.accept().await,
            (None, None) => unreachable!("listeners checked at bind time"),
        }
    };

    let (mut socket, _) = tokio::time::timeout(timeout, accept_future)
        .await
        .map_err(|_| "SYSTEM_ERROR: timed out waiting for the login redirect".to_string())?
        .map_err(|e| format!("SYSTEM_ERROR: callback accept failed: {e}"))?;

    let mut buffer = vec![0u8; 8192];
    let size = socket
        .read(&mut buffer)
        .await
        .map_err(|e| format!("SYSTEM_ERROR: callback read failed: {e}"))?;
    if size == 0 {
        return Err("SYSTEM_ERROR: callback request is empty".to_string().into());
    }

    let request = String::from_utf8_lossy(&buffer[..size]);
    let target = extract_request_target(request.as_ref())?;
    let payload = parse_callback_target(target)?;

    let is_error = payload.error.is_some();
    let body = if is_error { ERROR_HTML } else { SUCCESS_HTML };
    let status = if is_error {
        "HTTP/1.1 400 Bad Request"
    } else {
        "HTTP/1.1 200 OK"
    };
    let response = format!(
        "{status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;

    Ok(payload)
}

fn extract_request_target(request: &str) -> AppResult<&str> {
    let first = request
        .lines()
        .next()
        .ok_or_else(|| "SYSTEM_ERROR: malformed callback request".to_string())?;
    let mut parts = first.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if method != "GET" || target.is_empty() {
        return Err("SYSTEM_ERROR: callback must be a GET".to_string().into());
    }
    Ok(target)
}

pub(crate) fn parse_callback_target(target: &str) -> AppResult<CallbackPayload> {
    let url = reqwest::Url::parse(&format!("http://localhost{target}"))
        .map_err(|e| format!("SYSTEM_ERROR: invalid callback target: {e}"))?;

    if url.path() != CALLBACK_PATH {
        return Err("SYSTEM_ERROR: unexpected callback path".to_string().into());
    }

    let mut payload = CallbackPayload::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => payload.code = Some(value.to_string()),
            "state" => payload.state = Some(value.to_string()),
            "error" => payload.error = Some(value.to_string()),
            "error_description" => payload.error_description = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_callback_target_extracts_code_and_state() {
        let payload = parse_callback_target("/callback?code=xyz&state=abc123").expect("payload");
        assert_eq!(payload.code.as_deref(), Some("xyz"));
        assert_eq!(payload.state.as_deref(), Some("abc123"));
        assert!(payload.error.is_none());
    }

    #[test]
    fn parse_callback_target_accepts_provider_error() {
        let payload =
            parse_callback_target("/callback?error=access_denied&error_description=denied")
                .expect("payload");
        assert_eq!(payload.error.as_deref(), Some("access_denied"));
        assert_eq!(payload.error_description.as_deref(), Some("denied"));
        assert!(payload.code.is_none());
    }

    #[test]
    fn parse_callback_target_keeps_missing_params_as_none() {
        // Policy (missing code/state -> invalid callback) belongs to the login
        // flow; the listener just reports what arrived.
        let payload = parse_callback_target("/callback").expect("payload");
        assert_eq!(payload, CallbackPayload::default());
    }

    #[test]
    fn parse_callback_target_rejects_other_paths() {
        let err = parse_callback_target("/favicon.ico").expect_err("should fail");
        assert!(err.to_string().contains("unexpected callback path"));
    }

    #[tokio::test]
    async fn bind_falls_back_to_dynamic_port() {
        let first = bind_callback_listener(0).await.expect("dynamic bind");
        let taken = first.port();
        let second = bind_callback_listener(taken).await.expect("fallback bind");
        assert_ne!(second.port(), taken);
    }
}
