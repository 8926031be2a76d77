//! Authentication flows on top of [`SessionState`].

use std::sync::Arc;

use async_trait::async_trait;
use pantry_api::{
    ApiClient, ApiResult, AuthResponse, LoginRequest, RegisterRequest, Role, UpdateProfileRequest,
    User,
};
use tracing::{info, warn};

use crate::error::{SessionError, SessionResult, StorageError};
use crate::state::{Session, SessionState};
use crate::token::is_expired;

/// The backend calls the session flows depend on.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse>;
    async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthResponse>;
    async fn refresh_user(&self) -> ApiResult<User>;
    async fn logout(&self) -> ApiResult<()>;
    async fn update_profile(&self, request: &UpdateProfileRequest) -> ApiResult<User>;
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        ApiClient::login(self, request).await
    }

    async fn register(&self, request: &RegisterRequest) -> ApiResult<AuthResponse> {
        ApiClient::register(self, request).await
    }

    async fn refresh_user(&self) -> ApiResult<User> {
        ApiClient::refresh_user(self).await
    }

    async fn logout(&self) -> ApiResult<()> {
        ApiClient::logout(self).await
    }

    async fn update_profile(&self, request: &UpdateProfileRequest) -> ApiResult<User> {
        ApiClient::update_profile(self, request).await
    }
}

/// Result of checking a restored session with the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// No session to check.
    Skipped,
    /// The backend answered with a fresh user record.
    Confirmed(User),
    /// The backend could not be asked; the local session is kept.
    KeptLocal,
    /// The backend refused the token and the session has been cleared.
    Rejected,
}

#[derive(Clone)]
pub struct SessionManager {
    state: Arc<SessionState>,
    backend: Arc<dyn AuthBackend>,
}

impl SessionManager {
    pub fn new(state: Arc<SessionState>, backend: Arc<dyn AuthBackend>) -> Self {
        Self { state, backend }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    pub fn snapshot(&self) -> Session {
        self.state.snapshot()
    }

    pub async fn login(&self, email: &str, password: &str) -> SessionResult<User> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        self.state.begin_request();
        let outcome = self.backend.login(&request).await;
        self.complete_authentication(outcome)
    }

    pub async fn register(&self, request: &RegisterRequest) -> SessionResult<User> {
        self.state.begin_request();
        let outcome = self.backend.register(request).await;
        self.complete_authentication(outcome)
    }

    fn complete_authentication(&self, outcome: ApiResult<AuthResponse>) -> SessionResult<User> {
        let result = outcome
            .map_err(SessionError::from)
            .and_then(|response| match (response.token, response.user) {
                (Some(token), Some(user)) if !is_expired(Some(&token)) => Ok((token, user)),
                (Some(_), Some(_)) => Err(SessionError::IncompleteResponse("an unexpired token")),
                (None, _) => Err(SessionError::IncompleteResponse("a token")),
                (_, None) => Err(SessionError::IncompleteResponse("a user")),
            })
            .and_then(|(token, user)| {
                self.state.establish(token, user.clone())?;
                Ok(user)
            });

        if let Err(error) = &result {
            warn!(%error, "authentication failed");
            self.state.fail(error.user_message());
        }
        result
    }

    /// Restore the persisted session. Safe to call repeatedly.
    pub fn initialize(&self) -> bool {
        self.state.restore()
    }

    /// Ask the backend whether the restored session is still good.
    pub async fn validate_against_server(&self) -> Validation {
        if !self.state.snapshot().is_authenticated {
            return Validation::Skipped;
        }

        match self.backend.refresh_user().await {
            Ok(user) => match self.state.replace_user(user.clone()) {
                Ok(()) => {
                    info!(user_id = user.id, "session confirmed by backend");
                    Validation::Confirmed(user)
                }
                Err(error) => {
                    warn!(%error, "failed to persist refreshed user");
                    Validation::KeptLocal
                }
            },
            Err(error) if error.is_session_rejected() => Validation::Rejected,
            Err(error) => {
                warn!(%error, "session validation failed, keeping local session");
                Validation::KeptLocal
            }
        }
    }

    /// Tell the backend (best effort) and clear the local session.
    pub async fn logout(&self) {
        if self.state.snapshot().token.is_some() {
            if let Err(error) = self.backend.logout().await {
                warn!(%error, "backend logout failed");
            }
        }
        self.state.clear();
        info!("logged out");
    }

    pub fn update_role(&self, role: Role) -> Result<(), StorageError> {
        self.state.update_role(role)
    }

    pub fn update_kitchen(&self, kitchen_id: Option<i64>) -> Result<(), StorageError> {
        self.state.update_kitchen(kitchen_id)
    }

    /// Save profile changes. On failure the previous user is kept and the
    /// error is recorded on the session.
    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> SessionResult<User> {
        if !self.state.snapshot().is_authenticated {
            return Err(SessionError::NoSession);
        }

        self.state.begin_request();
        match self.backend.update_profile(request).await {
            Ok(user) => match self.state.replace_user(user.clone()) {
                Ok(()) => {
                    self.state.finish_request();
                    Ok(user)
                }
                Err(error) => {
                    warn!(%error, "failed to persist updated profile");
                    let error = SessionError::from(error);
                    self.state.fail(error.user_message());
                    Err(error)
                }
            },
            Err(error) => {
                self.state.fail(error.user_message());
                Err(error.into())
            }
        }
    }
}
