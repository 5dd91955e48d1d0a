//! Repository layer: the library backend's REST API and the local session store
//!
//! Every backend operation is reached through one of the traits below, all
//! implemented by [`ApiClient`]. Services only ever see the traits, which is what
//! lets their tests assert which calls are (and are not) made.

pub mod auth;
pub mod books;
pub mod issues;
pub mod session_store;
pub mod users;

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::ApiConfig,
    error::{AppError, AppResult},
};

pub use auth::AuthApi;
pub use books::CatalogApi;
pub use issues::IssuesApi;
pub use session_store::{FileTokenStorage, MemoryTokenStorage, SessionEvent, SessionStore, TokenStorage};
pub use users::UsersApi;

/// Whether a call carries the librarian's bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Anonymous,
    Bearer,
}

/// HTTP client for the library backend
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, session: Arc<SessionStore>) -> AppResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| AppError::Internal(format!("Invalid API base URL {}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Internal(format!("API base URL {} cannot hold paths", base_url)));
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("biblio-desk/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            session,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL. Each segment is percent-encoded on its own, so user
    /// text containing `/` or `?` stays inside its segment. An empty last segment
    /// produces the trailing slash some endpoints expect.
    pub(crate) fn url(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal("API base URL cannot hold paths".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str], auth: Auth) -> AppResult<RequestBuilder> {
        let url = self.url(segments)?;
        tracing::debug!("{} {} ({:?})", method, url.path(), auth);

        let mut request = self.http.request(method, url);
        if auth == Auth::Bearer {
            match self.session.token() {
                Some(token) => request = request.bearer_auth(token.as_str()),
                None => tracing::debug!("No session token to attach"),
            }
        }
        Ok(request)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(serde_json::from_slice(&body)?);
        }
        Err(error_from_response(status, &body))
    }

    /// Send and ignore whatever body a successful response carries
    async fn send_discard(&self, request: RequestBuilder) -> AppResult<()> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await?;
        Err(error_from_response(status, &body))
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, segments: &[&str], auth: Auth) -> AppResult<T> {
        let request = self.request(Method::GET, segments, auth)?;
        self.send(request).await
    }

    pub(crate) async fn post_json<B, T>(&self, segments: &[&str], body: &B, auth: Auth) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, segments, auth)?.json(body);
        self.send(request).await
    }

    pub(crate) async fn post_form<B, T>(&self, segments: &[&str], form: &B, auth: Auth) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, segments, auth)?.form(form);
        self.send(request).await
    }

    pub(crate) async fn post_empty<T: DeserializeOwned>(&self, segments: &[&str], auth: Auth) -> AppResult<T> {
        let request = self.request(Method::POST, segments, auth)?;
        self.send(request).await
    }

    pub(crate) async fn put_json<B>(&self, segments: &[&str], body: &B, auth: Auth) -> AppResult<()>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::PUT, segments, auth)?.json(body);
        self.send_discard(request).await
    }

    pub(crate) async fn put_empty<T: DeserializeOwned>(&self, segments: &[&str], auth: Auth) -> AppResult<T> {
        let request = self.request(Method::PUT, segments, auth)?;
        self.send(request).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(&self, segments: &[&str], auth: Auth) -> AppResult<T> {
        let request = self.request(Method::DELETE, segments, auth)?;
        self.send(request).await
    }
}

/// `key=value` path segment, the backend's way of passing single parameters
pub(crate) fn keyed(key: &str, value: impl std::fmt::Display) -> String {
    format!("{}={}", key, value)
}

/// Map an error response to [`AppError`], keeping the backend's `detail` text
fn error_from_response(status: StatusCode, body: &[u8]) -> AppError {
    let detail = extract_detail(body);
    if status == StatusCode::UNAUTHORIZED {
        return AppError::Authentication(detail.unwrap_or_else(|| "Not authenticated".to_string()));
    }
    AppError::Backend {
        status: status.as_u16(),
        detail,
    }
}

/// `detail` is either a message string or a list of validation entries with `msg`
fn extract_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        other => Some(other.to_string()),
    }
}
