//! Session service: the authorization gate in front of librarian-only operations

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{Credentials, Librarian, SignUp, Token},
    repository::{AuthApi, SessionEvent, SessionStore},
    services::notifications::Notifications,
};

/// Result of the stale-session sweep done at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupCheck {
    NoSession,
    Valid,
    /// Persisted state was expired or unreadable and has been cleared
    StaleCleared,
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<SessionStore>,
    api: Arc<dyn AuthApi>,
    notifications: Arc<Notifications>,
}

impl SessionService {
    pub fn new(store: Arc<SessionStore>, api: Arc<dyn AuthApi>, notifications: Arc<Notifications>) -> Self {
        Self { store, api, notifications }
    }

    pub fn token(&self) -> Option<Token> {
        self.store.token()
    }

    /// Whether a protected view may be shown right now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.token().is_some_and(|token| token.is_valid_at(now))
    }

    /// Gate for librarian-only operations, checked before any request is sent
    pub fn require_session(&self) -> AppResult<Token> {
        match self.token() {
            Some(token) if token.is_valid_at(Utc::now()) => Ok(token),
            Some(_) => Err(AppError::Authentication("Session expired, please sign in again".to_string())),
            None => Err(AppError::Authentication("Please sign in first".to_string())),
        }
    }

    /// Other views subscribe here to re-check validity when the session changes
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.store.subscribe()
    }

    pub async fn startup(&self) -> AppResult<StartupCheck> {
        self.startup_at(Utc::now()).await
    }

    /// Clear persisted state that is no longer valid, without waiting for a 401
    pub async fn startup_at(&self, now: DateTime<Utc>) -> AppResult<StartupCheck> {
        if !self.store.has_state() {
            return Ok(StartupCheck::NoSession);
        }
        if self.is_valid_at(now) {
            return Ok(StartupCheck::Valid);
        }
        tracing::info!("Stale session found at startup, signing out");
        self.logout().await?;
        Ok(StartupCheck::StaleCleared)
    }

    pub async fn sign_in(&self, credentials: Credentials) -> AppResult<()> {
        if let Err(e) = credentials.validate() {
            let err = AppError::from(e);
            self.notifications.error(err.user_message());
            return Err(err);
        }

        match self.api.sign_in(&credentials).await {
            Ok(response) => {
                self.store.set_token(Token::new(response.access_token))?;
                tracing::info!("Librarian {} signed in", credentials.username);
                self.notifications.success("Librarian signed in successfully");
                Ok(())
            }
            Err(e) => {
                self.notifications.error("Error in user sign in process!");
                Err(e)
            }
        }
    }

    pub async fn sign_up(&self, form: SignUp) -> AppResult<()> {
        let credentials = match form.into_credentials() {
            Ok(credentials) => credentials,
            Err(e) => {
                self.notifications.error(e.user_message());
                return Err(e);
            }
        };

        match self.api.sign_up(&credentials).await {
            Ok(response) => {
                self.store.set_token(Token::new(response.access_token))?;
                tracing::info!("Librarian {} signed up", credentials.username);
                self.notifications.success("Librarian signed up successfully");
                Ok(())
            }
            Err(e) => {
                self.notifications.error(e.user_message());
                Err(e)
            }
        }
    }

    /// Best-effort backend sign-out, then unconditional local cleanup
    pub async fn logout(&self) -> AppResult<()> {
        match self.api.sign_out().await {
            Ok(response) => self.notifications.success(response.message),
            Err(e) => tracing::warn!("Backend sign-out failed, clearing local session anyway: {}", e),
        }
        self.store.clear()?;
        tracing::info!("Session cleared");
        Ok(())
    }

    pub async fn current_librarian(&self) -> AppResult<Librarian> {
        self.require_session()?;
        self.api.me().await
    }
}
