//! JSON-over-HTTP delivery shared by the webhook channels

use serde::Serialize;

use crate::io::{HttpClient, HttpResponse};
use crate::CertCheckerError;

/// Longest response body kept in an error
const MAX_ERROR_BODY: usize = 512;

/// Encode `payload`, POST it to `url` and require a 2xx status.
///
/// Each failure class maps to its own error variant so the dispatcher can say
/// which channel failed and why.
pub(crate) async fn post_json<T: Serialize + ?Sized>(
    http: &dyn HttpClient,
    channel: &str,
    url: &str,
    payload: &T,
) -> crate::Result<HttpResponse> {
    let body = serde_json::to_string(payload).map_err(|e| CertCheckerError::Encode {
        channel: channel.to_string(),
        message: e.to_string(),
    })?;

    let response = http
        .post_json(url, body)
        .await
        .map_err(|e| CertCheckerError::Transport {
            channel: channel.to_string(),
            message: e.to_string(),
        })?;

    if !response.is_success() {
        return Err(CertCheckerError::Status {
            channel: channel.to_string(),
            status: response.status,
            body: truncate(&response.body, MAX_ERROR_BODY),
        });
    }

    Ok(response)
}

/// Robot webhooks answer 200 with `{"errcode": 0, "errmsg": "ok"}`; anything else is a rejection
pub(crate) fn check_errcode(channel: &str, response: &HttpResponse) -> crate::Result<()> {
    let Ok(body) = serde_json::from_str::<serde_json::Value>(&response.body) else {
        tracing::debug!(
            "{} acknowledgment is not JSON, accepting status {}",
            channel,
            response.status
        );
        return Ok(());
    };

    match body.get("errcode").and_then(|v| v.as_i64()) {
        Some(0) | None => Ok(()),
        Some(code) => Err(CertCheckerError::Rejected {
            channel: channel.to_string(),
            code,
            message: body
                .get("errmsg")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
        }),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}
