//! Authentication seam: who is the current user.
//!
//! The protocol that establishes a session lives outside this crate. The
//! action layer only asks an `Authenticator` for the current user before
//! every operation.

use crate::model::User;
use async_trait::async_trait;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("User not authenticated")]
    Unauthenticated,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The signed-in user, or `AuthError::Unauthenticated`.
    async fn current_user(&self) -> Result<User, AuthError>;

    async fn is_authenticated(&self) -> bool {
        self.current_user().await.is_ok()
    }
}

/// Authenticator holding the user of the current session.
#[derive(Default)]
pub struct SessionAuthenticator {
    user: RwLock<Option<User>>,
}

impl SessionAuthenticator {
    /// A session with nobody signed in.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    pub fn sign_in(&self, user: User) {
        tracing::info!("Signed in as {}", user.id);
        *self.user.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
    }

    pub fn sign_out(&self) {
        if let Some(user) = self.user.write().unwrap_or_else(|e| e.into_inner()).take() {
            tracing::info!("Signed out {}", user.id);
        }
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    async fn current_user(&self) -> Result<User, AuthError> {
        self.user
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(AuthError::Unauthenticated)
    }
}
