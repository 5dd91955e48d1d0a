//! Biblio Desk
//!
//! Front-desk client for a library backend: librarian sessions, catalog search,
//! and the issue and return workflows, all spoken over the backend's REST API.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repository::{ApiClient, FileTokenStorage, SessionStore};
use services::Services;

/// Application state shared by every command
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<SessionStore>,
    pub services: Arc<Services>,
}

impl AppState {
    /// Session file and backend client as configured
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let store = Arc::new(SessionStore::new(FileTokenStorage::new(config.session.path.clone())));
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, store: Arc<SessionStore>) -> AppResult<Self> {
        let client = ApiClient::new(&config.api, store.clone())?;
        tracing::debug!("Backend at {}", client.base_url());
        Ok(Self {
            config: Arc::new(config),
            services: Arc::new(Services::new(client, store.clone())),
            store,
        })
    }
}
