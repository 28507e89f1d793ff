//! Error types for the gateway and the synchronized stores.

use thiserror::Error;

/// Errors returned by a remote collection gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No valid session. Expected for anonymous users.
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend refused the request on a business rule.
    #[error("Rejected: {0}")]
    ValidationRejected(String),

    /// The addressed document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport failure (connection refused, DNS, timeout, ...).
    #[error("Network error: {0}")]
    Network(String),

    /// 5xx-class response.
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl GatewayError {
    /// Whether this failure is the normal "not logged in" signal.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Whether this failure is expected during background polling.
    ///
    /// Polling runs regardless of session state, so auth and transport
    /// failures are routine there. Anything else points at a bug.
    #[must_use]
    pub const fn is_expected_in_background(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::Network(_) | Self::Server { .. }
        )
    }

    /// Message suitable for showing to the user, or `None` when the failure
    /// must stay silent.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Unauthorized => None,
            Self::ValidationRejected(message) => Some(message.clone()),
            Self::NotFound(_) => Some("This item no longer exists".to_string()),
            Self::Network(_) => Some("Unable to reach the server".to_string()),
            Self::Server { .. } | Self::Parse(_) => {
                Some("The server could not complete the request".to_string())
            }
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Errors returned by store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The gateway call failed. The cached snapshot was left untouched.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The store was torn down before or while the operation ran.
    #[error("Store is no longer active")]
    Inactive,
}

impl SyncError {
    /// The underlying gateway error, if any.
    #[must_use]
    pub const fn gateway(&self) -> Option<&GatewayError> {
        match self {
            Self::Gateway(err) => Some(err),
            Self::Inactive => None,
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, SyncError>;
