/// Error taxonomy shared by the auth flow, the validator and the refresh cascade
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("no valid credential available; login required")]
    AuthRequired,

    #[error("login window closed before access was granted")]
    AuthCancelled,

    #[error("network failure: {reason}")]
    TransientNetworkFailure { reason: String },

    #[error("remote API rejected the request: {reason}")]
    RemoteRejected { reason: String },

    #[error("unexpected response from remote API: {0}")]
    UnexpectedResponse(String),

    #[error("no group selected")]
    NoGroupSelected,

    #[error("credential store error: {0}")]
    CredentialStore(String),

    #[error("browser surface error: {0}")]
    Browser(String),
}

impl ClientError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::TransientNetworkFailure {
            reason: reason.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::RemoteRejected {
            reason: reason.into(),
        }
    }

    /// A bounded wait on `operation` ran out
    pub fn timeout(operation: &str, after: Duration) -> Self {
        Self::transient(format!("{} timed out after {:?}", operation, after))
    }

    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetworkFailure { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::UnexpectedResponse(err.to_string());
        }
        match err.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                Self::rejected(status.to_string())
            }
            Some(status) if status.is_client_error() => {
                Self::UnexpectedResponse(status.to_string())
            }
            _ => Self::transient(err.to_string()),
        }
    }
}

impl From<keyring::Error> for ClientError {
    fn from(err: keyring::Error) -> Self {
        Self::CredentialStore(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable() {
        let err = ClientError::timeout("list_groups", Duration::from_secs(30));
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "network failure: list_groups timed out after 30s"
        );
    }

    #[test]
    fn test_rejection_not_retryable() {
        assert!(!ClientError::rejected("401 Unauthorized").is_retryable());
        assert!(!ClientError::AuthCancelled.is_retryable());
        assert!(!ClientError::UnexpectedResponse("404".into()).is_retryable());
    }
}
