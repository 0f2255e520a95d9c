//! Auth context and session lifecycle
//!
//! [`AuthContext`] publishes the current [`AuthState`] through a watch
//! channel so pollers and chat launchers always read the latest identity.
//! [`SessionManager`] drives it: restoring a stored session, signing in and
//! signing out.

use std::sync::Arc;
use std::time::Duration;

use prolink_shared::{Role, UserSummary};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;

/// Sign-in endpoint
pub const LOGIN_PATH: &str = "auth/login";
/// Current-user endpoint
pub const ME_PATH: &str = "auth/me";
/// Sign-out endpoint
pub const LOGOUT_PATH: &str = "auth/logout";

/// Snapshot of who the user is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<UserSummary>,
    pub is_authenticated: bool,
    /// Identity not resolved yet; consumers must not act on it
    pub loading: bool,
}

impl AuthState {
    pub fn loading() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            loading: true,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            loading: false,
        }
    }

    pub fn signed_in(user: UserSummary) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
            loading: false,
        }
    }

    /// Role of the signed-in user
    pub fn role(&self) -> Option<&Role> {
        if !self.is_authenticated {
            return None;
        }
        self.user.as_ref().map(|u| &u.role)
    }

    /// Role whose chat inbox should be polled, if any
    pub fn inbox_role(&self) -> Option<&Role> {
        self.role().filter(|role| role.has_chat_inbox())
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::loading()
    }
}

/// Shared, observable auth state
#[derive(Clone)]
pub struct AuthContext {
    tx: Arc<watch::Sender<AuthState>>,
}

impl AuthContext {
    /// Create a context in the loading state
    pub fn new() -> Self {
        Self::with_state(AuthState::loading())
    }

    pub fn with_state(state: AuthState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the current state, notifying subscribers if it changed
    pub fn set(&self, state: AuthState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    pub fn current(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    /// Wait until identity is resolved, giving up after `timeout`
    pub async fn wait_until_resolved(&self, timeout: Duration) -> ClientResult<AuthState> {
        let mut rx = self.subscribe();
        let resolved = tokio::time::timeout(timeout, rx.wait_for(|state| !state.loading))
            .await
            .map_err(|_| ClientError::Timeout("auth state"))?;

        match resolved {
            Ok(state) => Ok(state.clone()),
            // The sender lives in `self`, so the channel cannot close here
            Err(_) => Ok(self.current()),
        }
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: UserSummary,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    user: UserSummary,
}

/// Drives the session lifecycle and keeps the [`AuthContext`] current
#[derive(Clone)]
pub struct SessionManager {
    api: ApiClient,
    auth: AuthContext,
}

impl SessionManager {
    pub fn new(api: ApiClient, auth: AuthContext) -> Self {
        Self { api, auth }
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Resolve identity from a stored token, if one is still valid
    ///
    /// Any failure resolves to signed out; a transient failure leaves the
    /// token in place so the next restore can try again.
    pub async fn restore(&self) -> AuthState {
        let state = match self.api.tokens().valid_token() {
            Ok(Some(_)) => match self.api.get_json::<MeResponse>(ME_PATH, &[]).await {
                Ok(me) => AuthState::signed_in(me.user),
                Err(e) => {
                    if !e.is_transient() {
                        if let Err(clear_err) = self.api.tokens().clear() {
                            tracing::warn!(error = %clear_err, "Failed to clear rejected token");
                        }
                    }
                    tracing::info!(error = %e, "Stored session could not be restored");
                    AuthState::signed_out()
                }
            },
            Ok(None) => AuthState::signed_out(),
            Err(e) => {
                tracing::warn!(error = %e, "Token store unavailable");
                AuthState::signed_out()
            }
        };

        self.auth.set(state.clone());
        state
    }

    /// Sign in with email and password
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<UserSummary> {
        let response: LoginResponse = self
            .api
            .post_json(LOGIN_PATH, &LoginRequest { email, password })
            .await?;

        self.api.tokens().set(&response.token)?;

        tracing::info!(
            user_id = %response.user.id,
            role = %response.user.role,
            "Signed in"
        );

        self.auth.set(AuthState::signed_in(response.user.clone()));
        Ok(response.user)
    }

    /// Sign out locally and tell the server, best effort
    pub async fn logout(&self) -> ClientResult<()> {
        if let Err(e) = self.api.post_empty(LOGOUT_PATH).await {
            tracing::debug!(error = %e, "Server-side logout failed");
        }
        self.api.tokens().clear()?;
        self.auth.set(AuthState::signed_out());
        tracing::info!("Signed out");
        Ok(())
    }
}
