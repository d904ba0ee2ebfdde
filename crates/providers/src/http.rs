//! HTTP plumbing shared by the hosted providers.

use std::time::Duration;
use toolrelay_core::error::ProviderError;
use tracing::warn;

/// Build the reqwest client used by a provider.
///
/// The overall deadline for a model call is enforced by the agent loop, so
/// only connection setup is bounded here.
pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Map a transport failure from `send()` or body decoding.
pub(crate) fn send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Turn a non-success response into the matching `ProviderError`.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }

    let retry_after_secs = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(5);
    let body = response.text().await.unwrap_or_default();
    warn!(provider, status, body = %body, "Provider API error");

    Err(classify(provider, status, body, retry_after_secs))
}

fn classify(provider: &str, status: u16, body: String, retry_after_secs: u64) -> ProviderError {
    let lowered = body.to_lowercase();
    match status {
        401 | 403 => ProviderError::AuthenticationFailed(format!("Invalid {provider} API key")),
        // Gemini reports a bad key as 400 INVALID_ARGUMENT
        400 if lowered.contains("api key") || lowered.contains("api_key_invalid") => {
            ProviderError::AuthenticationFailed(format!("Invalid {provider} API key"))
        }
        429 => ProviderError::RateLimited { retry_after_secs },
        _ if lowered.contains("quota") => ProviderError::RateLimited { retry_after_secs },
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_statuses() {
        assert!(matches!(
            classify("anthropic", 401, String::new(), 5),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify("gemini", 400, r#"{"error":{"message":"API key not valid."}}"#.into(), 5),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify("gemini", 429, String::new(), 12),
            ProviderError::RateLimited { retry_after_secs: 12 }
        ));
        assert!(matches!(
            classify("gemini", 403, "Quota exceeded".into(), 5),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            classify("gemini", 400, "You exceeded your current quota".into(), 5),
            ProviderError::RateLimited { .. }
        ));
        match classify("anthropic", 500, "overloaded".into(), 5) {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "overloaded");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
