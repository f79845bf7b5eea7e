// ABOUTME: Reporting error types with SNAFU pattern.
// ABOUTME: Separates retryable transport failures from permanent rejections.

use snafu::Snafu;
use std::time::Duration;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReportError {
    #[snafu(display("failed to connect to control plane at {address}: {source}"))]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[snafu(display("control plane at {address} did not answer within {after:?}"))]
    Timeout { address: String, after: Duration },

    #[snafu(display("control plane HTTP exchange failed: {source}"))]
    Http { source: hyper::Error },

    #[snafu(display("failed to build control plane request: {source}"))]
    Request { source: hyper::http::Error },

    #[snafu(display("control plane returned {status}: {body}"))]
    Status { status: u16, body: String },

    #[snafu(display("failed to encode status update: {source}"))]
    Encode { source: serde_json::Error },

    #[snafu(display("invalid control plane response: {source}"))]
    Decode { source: serde_json::Error },

    #[snafu(display("control plane unavailable: {message}"))]
    Unavailable { message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportErrorKind {
    /// Could not reach the control plane.
    Connection,
    /// The control plane failed or asked us to back off.
    ServerError,
    /// The control plane refused the request as malformed or unauthorized.
    Rejected,
    /// Request or response body could not be (de)serialized.
    Protocol,
}

impl ReportError {
    pub fn kind(&self) -> ReportErrorKind {
        match self {
            ReportError::Connect { .. }
            | ReportError::Http { .. }
            | ReportError::Timeout { .. } => ReportErrorKind::Connection,
            ReportError::Unavailable { .. } => ReportErrorKind::ServerError,
            ReportError::Status { status, .. } if *status >= 500 || *status == 429 => {
                ReportErrorKind::ServerError
            }
            ReportError::Status { .. } => ReportErrorKind::Rejected,
            ReportError::Request { .. }
            | ReportError::Encode { .. }
            | ReportError::Decode { .. } => ReportErrorKind::Protocol,
        }
    }

    /// Whether sending the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ReportErrorKind::Connection | ReportErrorKind::ServerError
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_retry_client_errors_do_not() {
        let unavailable = ReportError::Status {
            status: 503,
            body: String::new(),
        };
        assert!(unavailable.is_retryable());

        let throttled = ReportError::Status {
            status: 429,
            body: String::new(),
        };
        assert!(throttled.is_retryable());

        let unauthorized = ReportError::Status {
            status: 401,
            body: "bad key".to_string(),
        };
        assert_eq!(unauthorized.kind(), ReportErrorKind::Rejected);
        assert!(!unauthorized.is_retryable());
    }
}
