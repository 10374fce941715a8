//! Session state machine and authentication.
//!
//! A session is either [`SessionState::Anonymous`] or
//! [`SessionState::Authenticated`]. [`SessionManager`] drives the two
//! transitions through an [`AuthProvider`] and never touches the provider
//! for a transition that is not allowed from the current state.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AppError, Result};

// ============================================================================
// SessionState
// ============================================================================

/// Who is signed in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Nobody is signed in.
    #[default]
    Anonymous,
    /// A user is signed in.
    Authenticated {
        /// Opaque user id.
        uid: String,
    },
}

impl SessionState {
    /// Returns `true` if a user is signed in.
    ///
    /// # Examples
    ///
    /// ```
    /// use workbench_app::SessionState;
    ///
    /// assert!(!SessionState::Anonymous.is_authenticated());
    /// assert!(SessionState::Authenticated { uid: "u1".into() }.is_authenticated());
    /// ```
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Returns the signed-in user id.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { uid } => Some(uid),
        }
    }

    /// Label of the login control for this state.
    #[must_use]
    pub const fn login_label(&self) -> &'static str {
        match self {
            Self::Anonymous => "Login",
            Self::Authenticated { .. } => "Logout",
        }
    }

    /// Name of the state, without the user id.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Authenticated { .. } => "authenticated",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// AuthProvider
// ============================================================================

/// Identity backend.
#[async_trait]
pub trait AuthProvider: Send + Sync + fmt::Debug {
    /// Signs in with a pre-issued token and returns the user id.
    async fn sign_in_with_token(&self, token: &str) -> Result<String>;

    /// Signs in without credentials and returns a fresh user id.
    async fn sign_in_anonymously(&self) -> Result<String>;

    /// Ends the session of `uid`.
    async fn sign_out(&self, uid: &str) -> Result<()>;
}

/// Provider that trusts tokens and mints anonymous ids locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalAuthProvider;

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn sign_in_with_token(&self, token: &str) -> Result<String> {
        let uid = token.trim();
        if uid.is_empty() {
            return Err(AppError::auth("empty sign-in token"));
        }
        Ok(uid.to_string())
    }

    async fn sign_in_anonymously(&self) -> Result<String> {
        Ok(uuid::Uuid::new_v4().to_string())
    }

    async fn sign_out(&self, _uid: &str) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// SessionManager
// ============================================================================

/// Performs sign-in and sign-out against an [`AuthProvider`].
#[derive(Debug, Clone)]
pub struct SessionManager {
    provider: Arc<dyn AuthProvider>,
    initial_token: Option<String>,
}

impl SessionManager {
    /// Creates a manager. A non-blank `initial_token` is used for every sign-in.
    pub fn new(provider: Arc<dyn AuthProvider>, initial_token: Option<String>) -> Self {
        Self {
            provider,
            initial_token: initial_token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Signs in from `current` and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidSessionTransition` when already signed in,
    /// or the provider's error.
    pub async fn sign_in(&self, current: &SessionState) -> Result<SessionState> {
        if current.is_authenticated() {
            return Err(AppError::invalid_transition(current, "authenticated"));
        }

        let uid = match &self.initial_token {
            Some(token) => {
                debug!("Signing in with configured token");
                self.provider.sign_in_with_token(token).await?
            }
            None => {
                debug!("Signing in anonymously");
                self.provider.sign_in_anonymously().await?
            }
        };

        info!(uid = %uid, "Signed in");
        Ok(SessionState::Authenticated { uid })
    }

    /// Signs out from `current` and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidSessionTransition` when nobody is signed in,
    /// or the provider's error.
    pub async fn sign_out(&self, current: &SessionState) -> Result<SessionState> {
        let Some(uid) = current.uid() else {
            return Err(AppError::invalid_transition(current, "anonymous"));
        };

        self.provider.sign_out(uid).await?;
        info!(uid = %uid, "Signed out");
        Ok(SessionState::Anonymous)
    }
}
