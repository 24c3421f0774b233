//! Waypost error types

use std::time::Duration;

use crate::usage::UsageBlock;

/// Waypost error types
#[derive(Debug, thiserror::Error)]
pub enum WaypostError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("access forbidden: {0}")]
    Forbidden(String),

    /// Blocked locally by the usage tracker; no request was sent.
    #[error("request budget exhausted: {0}")]
    QuotaExceeded(UsageBlock),

    #[error("request cancelled")]
    Cancelled,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("data error: {0}")]
    DataError(String),

    #[error("empty response from provider")]
    EmptyResponse,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("operation not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl WaypostError {
    /// Stable, machine-readable error code.
    ///
    /// Quota blocks and HTTP 429 share `rate-limit`; callers that need to
    /// tell them apart match on the variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Timeout => "timeout",
            Self::Api { .. } => "http-error",
            Self::RateLimited { .. } | Self::QuotaExceeded(_) => "rate-limit",
            Self::Forbidden(_) => "forbidden",
            Self::Cancelled => "cancelled",
            Self::Json(_) | Self::DataError(_) | Self::EmptyResponse => "invalid-response",
            Self::InvalidInput(_) => "invalid-input",
            Self::NoProvider => "no-provider",
            Self::NotImplemented(_) => "not-implemented",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Whether a retry of the same request might succeed.
    ///
    /// 403/429 are deliberately not transient: they are recorded in the
    /// failure cache and answered by a fallback provider instead.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout | Self::EmptyResponse => true,
            Self::Api { status, .. } => *status == 408 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// HTTP 403 or 429 from a provider.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Forbidden(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status behind this error, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::Forbidden(_) => Some(403),
            _ => None,
        }
    }

    /// Provider `Retry-After` hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for WaypostError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WaypostError::Timeout
        } else if err.is_decode() {
            WaypostError::DataError(err.to_string())
        } else {
            WaypostError::Http(err.to_string())
        }
    }
}

/// Result type alias for Waypost operations
pub type Result<T> = std::result::Result<T, WaypostError>;
