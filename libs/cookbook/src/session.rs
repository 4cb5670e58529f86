//! Auth session holder
//!
//! Keeps the current session, exposes the signed-in user to the editors and
//! broadcasts every change (sign in, refresh, sign out) over a watch channel.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CookbookError, CookbookResult};

/// The signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
}

/// Tokens issued by the auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user: CurrentUser,
}

/// Sign-up, sign-in and token lifecycle calls
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> CookbookResult<CurrentUser>;

    async fn sign_in(&self, email: &str, password: &str) -> CookbookResult<Session>;

    async fn refresh(&self, refresh_token: &str) -> CookbookResult<Session>;

    async fn sign_out(&self, refresh_token: &str) -> CookbookResult<()>;
}

pub struct SessionHolder<A: AuthBackend + ?Sized> {
    auth: Arc<A>,
    sender: watch::Sender<Option<Session>>,
}

impl<A: AuthBackend + ?Sized> SessionHolder<A> {
    pub fn new(auth: Arc<A>) -> Self {
        let (sender, _) = watch::channel(None);
        Self { auth, sender }
    }

    /// Subscribe to session changes
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> Option<Session> {
        self.sender.borrow().clone()
    }

    pub fn user(&self) -> Option<CurrentUser> {
        self.sender.borrow().as_ref().map(|s| s.user.clone())
    }

    /// Gate for screens that need a signed-in user
    pub fn require_user(&self) -> CookbookResult<CurrentUser> {
        self.user().ok_or(CookbookError::NotSignedIn)
    }

    /// Gate for sign-in and registration screens
    pub fn require_guest(&self) -> CookbookResult<()> {
        match self.user() {
            Some(_) => Err(CookbookError::AlreadySignedIn),
            None => Ok(()),
        }
    }

    /// Register an account; the user still has to sign in
    pub async fn sign_up(&self, email: &str, password: &str) -> CookbookResult<CurrentUser> {
        self.require_guest()?;
        let user = self.auth.sign_up(email.trim(), password).await?;
        info!("Registered account {}", user.email);
        Ok(user)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> CookbookResult<CurrentUser> {
        let session = self.auth.sign_in(email.trim(), password).await?;
        let user = session.user.clone();
        self.sender.send_replace(Some(session));

        info!("Signed in as {}", user.email);
        Ok(user)
    }

    /// Exchange the refresh token for a new session
    ///
    /// A rejected refresh token ends the session.
    pub async fn refresh(&self) -> CookbookResult<()> {
        let current = self.current().ok_or(CookbookError::NotSignedIn)?;

        match self.auth.refresh(&current.refresh_token).await {
            Ok(session) => {
                self.sender.send_replace(Some(session));
                Ok(())
            }
            Err(CookbookError::Unauthorized) => {
                warn!("Refresh token rejected, signing out");
                self.sender.send_replace(None);
                Err(CookbookError::Unauthorized)
            }
            Err(e) => Err(e),
        }
    }

    /// Sign out; the local session is dropped even if the server call fails
    pub async fn sign_out(&self) -> CookbookResult<()> {
        let Some(current) = self.sender.send_replace(None) else {
            return Ok(());
        };

        if let Err(e) = self.auth.sign_out(&current.refresh_token).await {
            warn!("Sign out request failed: {}", e);
            return Err(e);
        }

        info!("Signed out {}", current.user.email);
        Ok(())
    }
}
