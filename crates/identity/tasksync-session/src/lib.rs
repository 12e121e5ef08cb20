//! Session management for the tasksync client.
//!
//! [`SessionManager`] owns the in-memory "current user" state as a live state
//! machine for the process lifetime:
//!
//! ```text
//! Unknown ──(no token)──────────────────────────▶ Unauthenticated
//!    │
//!    ├──(token + cached user)─────────────────────▶ Authenticated
//!    │
//!    └──(token, no cached user)──▶ Resolving ──ok──▶ Authenticated
//!                                      └──err──▶ Unauthenticated (cleared)
//! ```
//!
//! Login and signup run against the remote identity service; logout clears
//! local state even when remote sign-out fails. The route guard redirects
//! unauthenticated visitors away from protected views and authenticated
//! visitors away from the auth surfaces.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tasksync_core::{Navigator, Route, User};
use tasksync_credentials::CredentialStore;
use tasksync_transport::{ApiClient, ApiError};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    /// Normalized human-readable message from the identity service.
    #[error("{0}")]
    Auth(String),

    /// The service reported success but the payload carried no token.
    #[error("No access token received from server")]
    MissingToken,
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Startup, no determination yet.
    Unknown,
    /// Token present, user not yet confirmed.
    Resolving,
    Authenticated,
    Unauthenticated,
}

const LOGIN_FALLBACK: &str = "Invalid email or password";
const SIGNUP_FALLBACK: &str = "Failed to create account. Please try again.";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Debug, Serialize)]
struct SignupRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

pub struct SessionManager {
    api: Arc<ApiClient>,
    credentials: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    state: RwLock<SessionState>,
    user: RwLock<Option<User>>,
}

impl SessionManager {
    pub fn new(
        api: Arc<ApiClient>,
        credentials: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            api,
            credentials,
            navigator,
            state: RwLock::new(SessionState::Unknown),
            user: RwLock::new(None),
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn current_user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    /// True iff the session is authenticated and the token is still present
    /// in storage. The second check defends against the store being cleared
    /// externally (e.g. by the transport's 401 handling).
    pub async fn is_authenticated(&self) -> bool {
        *self.state.read().await == SessionState::Authenticated
            && self.credentials.token().is_some()
    }

    /// Resolve the stored credential into a session at startup.
    ///
    /// A cached profile authenticates optimistically without a network round
    /// trip; a bare token is resolved via `GET /users/me`, and a failed
    /// resolution clears the credential. Ends by enforcing the route guard.
    pub async fn initialize(&self) {
        match self.credentials.token() {
            None => {
                debug!("no stored token");
                self.set_session(SessionState::Unauthenticated, None).await;
            }
            Some(_) => {
                if let Some(cached) = self.credentials.user() {
                    debug!(user = %cached.email, "restored session from cached profile");
                    self.set_session(SessionState::Authenticated, Some(cached))
                        .await;
                } else {
                    self.set_session(SessionState::Resolving, None).await;
                    match self.api.get_json::<User>("/users/me").await {
                        Ok(profile) => {
                            info!(user = %profile.email, "resolved session from token");
                            self.credentials.set_user(&profile);
                            self.set_session(SessionState::Authenticated, Some(profile))
                                .await;
                        }
                        Err(err) => {
                            warn!(%err, "profile fetch failed, discarding token");
                            self.credentials.clear();
                            self.set_session(SessionState::Unauthenticated, None).await;
                        }
                    }
                }
            }
        }
        self.enforce_guard().await;
    }

    /// Redirect based on the current state/view pair. Re-evaluate whenever
    /// either changes.
    pub async fn enforce_guard(&self) {
        let state = *self.state.read().await;
        let route = self.navigator.current();
        match state {
            SessionState::Authenticated if route.is_auth_surface() => {
                self.navigator.navigate(Route::Dashboard);
            }
            SessionState::Unauthenticated if route.is_protected() => {
                self.navigator.navigate(Route::Login);
            }
            _ => {}
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> SessionResult<User> {
        let response: LoginResponse = self
            .api
            .post_json("/auth/sign-in/email", &LoginRequest { email, password })
            .await
            .map_err(|err| {
                warn!(%err, "login failed");
                SessionError::Auth(normalize_error(&err, LOGIN_FALLBACK))
            })?;

        let token = response.access_token.ok_or(SessionError::MissingToken)?;
        self.credentials.set_token(&token);

        // The service may omit the profile; fall back to a minimal user
        // derived from the submitted email.
        let user = response.user.unwrap_or_else(|| User {
            id: "me".to_string(),
            email: email.to_string(),
            name: None,
        });
        self.credentials.set_user(&user);

        info!(user = %user.email, "logged in");
        self.set_session(SessionState::Authenticated, Some(user.clone()))
            .await;
        self.navigator.navigate(Route::Dashboard);
        Ok(user)
    }

    /// Create the account, then establish a session with the same
    /// credentials. Failure at either stage leaves the session
    /// unauthenticated.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> SessionResult<User> {
        self.api
            .post_json::<_, serde_json::Value>(
                "/auth/sign-up/email",
                &SignupRequest {
                    email,
                    password,
                    name,
                },
            )
            .await
            .map_err(|err| {
                warn!(%err, "signup failed");
                SessionError::Auth(normalize_error(&err, SIGNUP_FALLBACK))
            })?;

        self.login(email, password).await
    }

    /// Best-effort remote sign-out, then unconditionally clear local state
    /// and route to login.
    pub async fn logout(&self) {
        if let Err(err) = self
            .api
            .post_json::<_, serde_json::Value>("/auth/sign-out", &serde_json::json!({}))
            .await
        {
            debug!(%err, "remote sign-out failed, clearing locally anyway");
        }
        self.credentials.clear();
        self.set_session(SessionState::Unauthenticated, None).await;
        info!("logged out");
        self.navigator.navigate(Route::Login);
    }

    async fn set_session(&self, state: SessionState, user: Option<User>) {
        *self.state.write().await = state;
        *self.user.write().await = user;
    }
}

/// Extract a human-readable message from an identity-service error body,
/// probing `message`, `detail`, `error.message`, and `error.detail` in that
/// order.
fn normalize_error(err: &ApiError, fallback: &str) -> String {
    if let ApiError::Status { body, .. } = err {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
            for probe in [
                &value["message"],
                &value["detail"],
                &value["error"]["message"],
                &value["error"]["detail"],
            ] {
                if let Some(message) = probe.as_str() {
                    return message.to_string();
                }
            }
        }
    }
    fallback.to_string()
}
