use thiserror::Error;

use pantry_api::ApiError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("authentication response is missing {0}")]
    IncompleteResponse(&'static str),

    #[error("no active session")]
    NoSession,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Message suitable for an inline alert.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Api(error) => error.user_message(),
            other => other.to_string(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
