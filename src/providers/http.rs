//! Shared HTTP plumbing for the vendor clients.
//!
//! Every vendor call goes through [`get_json`], which maps the HTTP status
//! onto [`WaypostError`] the same way for all vendors and records request
//! metrics:
//!
//! | Status | Error |
//! |--------|-------|
//! | 403    | `Forbidden(message)` |
//! | 429    | `RateLimited { retry_after }` |
//! | other non-2xx | `Api { status, message }` |
//! | 2xx, empty body | `EmptyResponse` |
//! | 2xx, bad JSON | `Json` |

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

use crate::convert::extract_error_message;
use crate::{Result, WaypostError, telemetry};

/// User-Agent sent to every vendor. Nominatim's usage policy requires one.
pub const USER_AGENT: &str = concat!("waypost/", env!("CARGO_PKG_VERSION"));

/// Default transport timeout for vendor calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the reqwest client shared by one vendor client.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| WaypostError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Parse a configured base URL.
pub fn parse_base_url(base: &str) -> Result<Url> {
    Url::parse(base).map_err(|e| WaypostError::Configuration(format!("invalid base URL {base}: {e}")))
}

/// Append path segments to `base`, percent-encoding each one.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| WaypostError::Configuration(format!("base URL cannot have a path: {base}")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Send `request`, check the status and decode the JSON body.
pub async fn get_json<T: DeserializeOwned>(
    request: RequestBuilder,
    provider: &'static str,
    operation: &'static str,
) -> Result<T> {
    let start = Instant::now();
    let result = send_and_decode(request).await;

    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "provider" => provider,
        "operation" => operation,
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "provider" => provider,
        "operation" => operation,
    )
    .record(start.elapsed().as_secs_f64());

    result
}

async fn send_and_decode<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = check_status(request.send().await?).await?;
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(WaypostError::EmptyResponse);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Turn a non-2xx response into the matching error, reading its body for a
/// readable message.
pub async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body);

    Err(error_for_status(status.as_u16(), message, retry_after))
}

/// Classify a non-2xx status.
pub fn error_for_status(status: u16, message: String, retry_after: Option<Duration>) -> WaypostError {
    match status {
        403 => {
            let message = if message.is_empty() {
                "Forbidden".to_string()
            } else {
                message
            };
            WaypostError::Forbidden(message)
        }
        429 => WaypostError::RateLimited { retry_after },
        _ => WaypostError::Api {
            status,
            message: if message.is_empty() {
                format!("HTTP {status}")
            } else {
                message
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            error_for_status(403, String::new(), None),
            WaypostError::Forbidden(m) if m == "Forbidden"
        ));
        let limited = error_for_status(429, "slow".into(), Some(Duration::from_secs(3)));
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));
        assert!(matches!(
            error_for_status(500, String::new(), None),
            WaypostError::Api { status: 500, message } if message == "HTTP 500"
        ));
    }

    #[test]
    fn endpoint_encodes_segments() {
        let base = parse_base_url("https://api.example.com/").unwrap();
        let url = endpoint(&base, &["search", "2", "geocode", "SM Aura/Taguig.json"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/search/2/geocode/SM%20Aura%2FTaguig.json"
        );
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let base = parse_base_url("http://localhost:8080/proxy").unwrap();
        let url = endpoint(&base, &["api", "traffic", "nearby"]).unwrap();
        assert_eq!(url.path(), "/proxy/api/traffic/nearby");
    }
}
