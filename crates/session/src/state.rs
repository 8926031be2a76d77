//! The session state container.
//!
//! `SessionState` owns the in-memory [`Session`] and is the only component that
//! writes the persisted token and user. Every mutation publishes a fresh
//! snapshot on a watch channel. The lock is never held across an `.await`.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pantry_api::{RejectionReason, Role, SessionHandle, User};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::navigation::{Navigator, Route};
use crate::storage::Storage;
use crate::token::{is_expired, TokenStore};

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl Session {
    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().and_then(|user| user.role)
    }

    pub fn kitchen_id(&self) -> Option<i64> {
        self.user.as_ref().and_then(|user| user.kitchen_id)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|user| user.id)
    }
}

pub struct SessionState {
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
    current: RwLock<Session>,
    updates: watch::Sender<Session>,
}

impl SessionState {
    pub fn new(storage: Arc<dyn Storage>, navigator: Arc<dyn Navigator>) -> Self {
        let (updates, _) = watch::channel(Session::default());
        Self {
            tokens: TokenStore::new(storage),
            navigator,
            current: RwLock::new(Session::default()),
            updates,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Current session. A token that has expired since it was accepted ends
    /// the session here, so a snapshot never reports it as authenticated.
    pub fn snapshot(&self) -> Session {
        let stale = {
            let session = self.read();
            session.is_authenticated && is_expired(session.token.as_deref())
        };
        if stale {
            self.expire();
        }
        self.read().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.updates.subscribe()
    }

    /// Restore a persisted session.
    ///
    /// The session becomes authenticated only when the stored token is
    /// readable and unexpired and the stored user parses. Anything else
    /// removes both keys. Calling this again yields the same result.
    pub fn restore(&self) -> bool {
        let token = self.tokens.get();
        let user = self.tokens.user();

        let mut session = self.write();
        match (token, user) {
            (Some(token), Some(user)) if !is_expired(Some(&token)) => {
                info!(user_id = user.id, "restored persisted session");
                *session = Session {
                    user: Some(user),
                    token: Some(token),
                    is_authenticated: true,
                    loading: false,
                    error: None,
                };
                self.publish(&session);
                true
            }
            (token, user) => {
                if token.is_some() || user.is_some() {
                    info!("discarding stale persisted session");
                }
                self.forget(&mut session);
                false
            }
        }
    }

    pub fn begin_request(&self) {
        let mut session = self.write();
        session.loading = true;
        session.error = None;
        self.publish(&session);
    }

    /// Record a successful login or registration.
    pub fn establish(&self, token: String, user: User) -> Result<(), StorageError> {
        let mut session = self.write();
        self.tokens.set_user(&user)?;
        if let Err(error) = self.tokens.set(&token) {
            if let Err(cleanup) = self.tokens.remove_user() {
                warn!(error = %cleanup, "failed to remove user after token write failed");
            }
            return Err(error);
        }

        info!(user_id = user.id, role = ?user.role, "session established");
        *session = Session {
            user: Some(user),
            token: Some(token),
            is_authenticated: true,
            loading: false,
            error: None,
        };
        self.publish(&session);
        Ok(())
    }

    /// End a request with an error message. Authentication is left as is.
    pub fn fail(&self, message: impl Into<String>) {
        let mut session = self.write();
        session.loading = false;
        session.error = Some(message.into());
        self.publish(&session);
    }

    pub fn finish_request(&self) {
        let mut session = self.write();
        session.loading = false;
        self.publish(&session);
    }

    pub fn clear_error(&self) {
        let mut session = self.write();
        session.error = None;
        self.publish(&session);
    }

    /// Replace the user record, e.g. after a profile refresh.
    pub fn replace_user(&self, user: User) -> Result<(), StorageError> {
        let mut session = self.write();
        if session.token.is_none() {
            return Ok(());
        }
        self.tokens.set_user(&user)?;
        session.user = Some(user);
        session.loading = false;
        self.publish(&session);
        Ok(())
    }

    pub fn update_role(&self, role: Role) -> Result<(), StorageError> {
        self.modify_user(|user| user.role = Some(role))
    }

    pub fn update_kitchen(&self, kitchen_id: Option<i64>) -> Result<(), StorageError> {
        self.modify_user(|user| user.kitchen_id = kitchen_id)
    }

    /// Drop kitchen membership but keep the login.
    pub fn revoke_kitchen_access(&self) -> Result<(), StorageError> {
        self.modify_user(|user| {
            user.role = Some(Role::Unassigned);
            user.kitchen_id = None;
        })
    }

    fn modify_user<F>(&self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut User),
    {
        let mut session = self.write();
        let Some(user) = session.user.as_mut() else {
            return Ok(());
        };
        change(user);
        let updated = user.clone();
        self.tokens.set_user(&updated)?;
        self.publish(&session);
        Ok(())
    }

    /// Log out locally: remove token and user and reset the snapshot.
    pub fn clear(&self) {
        let mut session = self.write();
        self.forget(&mut session);
    }

    /// Clear the session for `token` if it is still the active one and send
    /// the user to the login page. Returns whether anything was cleared.
    pub fn reject(&self, token: &str, reason: RejectionReason) -> bool {
        {
            let mut session = self.write();
            if session.token.as_deref() != Some(token) {
                return false;
            }
            warn!(%reason, "backend rejected the session");
            self.forget(&mut session);
        }
        self.navigator.navigate(Route::Login);
        true
    }

    fn expire(&self) {
        let mut session = self.write();
        if session.is_authenticated && is_expired(session.token.as_deref()) {
            info!(user_id = session.user_id(), "token expired, ending session");
            self.forget(&mut session);
        }
    }

    /// Drop everything in persisted storage and return to the login page.
    pub fn wipe(&self) {
        {
            let mut session = self.write();
            if let Err(error) = self.tokens.storage().clear() {
                warn!(%error, "failed to clear persisted storage");
            }
            *session = Session::default();
            self.publish(&session);
        }
        info!("local state wiped");
        self.navigator.navigate(Route::Login);
    }

    pub fn navigate(&self, route: Route) {
        self.navigator.navigate(route);
    }

    fn forget(&self, session: &mut Session) {
        if let Err(error) = self.tokens.remove() {
            warn!(%error, "failed to remove persisted token");
        }
        if let Err(error) = self.tokens.remove_user() {
            warn!(%error, "failed to remove persisted user");
        }
        *session = Session::default();
        self.publish(session);
    }

    fn publish(&self, session: &Session) {
        self.updates.send_replace(session.clone());
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionHandle for SessionState {
    fn bearer_token(&self) -> Option<String> {
        self.read().token.clone()
    }

    fn reject_token(&self, token: &str, reason: RejectionReason) -> bool {
        self.reject(token, reason)
    }
}
