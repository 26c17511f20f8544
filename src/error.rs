//! Unified error types for the odds snapshot service.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the odds snapshot service.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Upstream provider error.
    #[error("odds api error: {0}")]
    Api(#[from] OddsApiError),

    /// Snapshot pipeline error.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the cached fetch client.
#[derive(Error, Debug)]
pub enum OddsApiError {
    /// No provider credential is configured.
    #[error("missing Odds API key: set THE_ODDS_API_KEY or pass it explicitly")]
    MissingCredential,

    /// The provider answered with a non-success status.
    #[error("Odds API GET {path} failed ({status}): {body}")]
    UpstreamHttp {
        /// Request path (without query string).
        path: String,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("malformed payload from {path}: {reason}")]
    MalformedPayload {
        /// Request path (without query string).
        path: String,
        /// Decoder message.
        reason: String,
    },

    /// Request could not be sent or the body could not be read.
    ///
    /// Built through `From`, which strips the request URL.
    #[error("http request failed: {0}")]
    Transport(reqwest::Error),

    /// The base URL and path could not be combined.
    #[error("invalid request url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for OddsApiError {
    /// The request URL carries the credential, so it never reaches the message.
    fn from(err: reqwest::Error) -> Self {
        OddsApiError::Transport(err.without_url())
    }
}

impl OddsApiError {
    /// HTTP status carried by an upstream failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            OddsApiError::UpstreamHttp { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors that abort a snapshot or catalog run.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// Zero sports left after the active filter and scoping.
    #[error("no active sports available to snapshot")]
    NoActiveSports,

    /// The full catalog crawl was requested without acknowledging its quota cost.
    #[error(
        "the market catalog crawl is disabled by default; pass dangerous=true to acknowledge the API quota cost"
    )]
    CrawlNotAcknowledged,

    /// An upstream call failed.
    #[error(transparent)]
    Api(#[from] OddsApiError),

    /// Writing the log artifact failed.
    #[error("failed to write snapshot log {path}: {source}")]
    Sink {
        /// Target file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Pretty-printing a payload failed.
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SnapshotError {
    /// Whether the failure was caused by a missing provider credential.
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, SnapshotError::Api(OddsApiError::MissingCredential))
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_message_carries_status_and_body() {
        let err = OddsApiError::UpstreamHttp {
            path: "/sports".to_string(),
            status: 401,
            body: "unauthorized".to_string(),
        };

        assert_eq!(err.to_string(), "Odds API GET /sports failed (401): unauthorized");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn missing_credential_is_detected_through_snapshot_error() {
        let err = SnapshotError::from(OddsApiError::MissingCredential);
        assert!(err.is_missing_credential());
        assert!(!SnapshotError::NoActiveSports.is_missing_credential());
    }
}
