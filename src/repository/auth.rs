//! Librarian authentication endpoints

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::{ApiClient, Auth};
use crate::{
    error::AppResult,
    models::{Credentials, Librarian, MessageResponse, TokenResponse},
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a bearer token
    async fn sign_in(&self, credentials: &Credentials) -> AppResult<TokenResponse>;

    /// Register a new librarian and sign them in
    async fn sign_up(&self, credentials: &Credentials) -> AppResult<TokenResponse>;

    async fn sign_out(&self) -> AppResult<MessageResponse>;

    /// Profile of the signed-in librarian
    async fn me(&self) -> AppResult<Librarian>;

    async fn librarians(&self) -> AppResult<Vec<Librarian>>;
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn sign_in(&self, credentials: &Credentials) -> AppResult<TokenResponse> {
        self.post_form(&["token"], credentials, Auth::Anonymous).await
    }

    async fn sign_up(&self, credentials: &Credentials) -> AppResult<TokenResponse> {
        self.post_form(&["librarians", "sign_up"], credentials, Auth::Anonymous).await
    }

    async fn sign_out(&self) -> AppResult<MessageResponse> {
        self.post_empty(&["librarians", "sign_out"], Auth::Anonymous).await
    }

    async fn me(&self) -> AppResult<Librarian> {
        self.get(&["users", "me"], Auth::Bearer).await
    }

    async fn librarians(&self) -> AppResult<Vec<Librarian>> {
        // sic: the backend spells it this way
        self.get(&["librariains", "get_all"], Auth::Bearer).await
    }
}
