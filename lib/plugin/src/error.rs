//! Plugin client error types.

use std::fmt;

/// Errors talking to the plugin service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// The HTTP client could not be built.
    ClientSetup {
        /// Error details.
        details: String,
    },
    /// The request did not complete within the configured timeout.
    Timeout {
        /// The URL that timed out.
        url: String,
    },
    /// The request could not be sent or the connection dropped.
    Transport {
        /// Error details.
        details: String,
    },
    /// The service answered with a non-success status.
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// The service reported `success: false`.
    Rejected {
        /// The service's error message.
        message: String,
    },
    /// The response body was not the expected JSON.
    InvalidResponse {
        /// Error details.
        details: String,
    },
}

impl PluginError {
    pub(crate) fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                url: e.url().map(ToString::to_string).unwrap_or_default(),
            }
        } else if e.is_decode() {
            Self::InvalidResponse {
                details: e.to_string(),
            }
        } else {
            Self::Transport {
                details: e.to_string(),
            }
        }
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientSetup { details } => write!(f, "failed to build plugin client: {details}"),
            Self::Timeout { url } => write!(f, "request to {url} timed out"),
            Self::Transport { details } => write!(f, "plugin request failed: {details}"),
            Self::Status { status, body } if body.is_empty() => {
                write!(f, "plugin service returned status {status}")
            }
            Self::Status { status, body } => {
                write!(f, "plugin service returned status {status}: {body}")
            }
            Self::Rejected { message } => write!(f, "plugin reported failure: {message}"),
            Self::InvalidResponse { details } => write!(f, "invalid plugin response: {details}"),
        }
    }
}

impl std::error::Error for PluginError {}
