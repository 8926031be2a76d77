//! Error types for the HTTP client

use std::fmt;

use thiserror::Error;

/// Why the backend's answer was taken as the end of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// 401 on a request that carried a token.
    Unauthenticated,
    /// 403 on a request that carried a token, when the policy treats it as fatal.
    Forbidden,
    /// The error body reports that the account no longer exists.
    UserGone,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RejectionReason::Unauthenticated => "unauthenticated",
            RejectionReason::Forbidden => "forbidden",
            RejectionReason::UserGone => "user no longer exists",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session rejected by backend ({reason}, status {status})")]
    SessionRejected { status: u16, reason: RejectionReason },

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid base url: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::SessionRejected { status, .. } | ApiError::Status { status, .. } => {
                Some(*status)
            }
            ApiError::Transport(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn is_session_rejected(&self) -> bool {
        matches!(self, ApiError::SessionRejected { .. })
    }

    /// Network failures and 5xx answers. These never end a session.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Message suitable for an inline alert.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => message.clone(),
            ApiError::InvalidRequest(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
