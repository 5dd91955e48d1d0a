//! Patron lookup, registration and administration

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{Librarian, NewUser, User, UserId},
    repository::{AuthApi, UsersApi},
    services::{notifications::Notifications, session::SessionService},
};

#[derive(Clone)]
pub struct UsersService {
    api: Arc<dyn UsersApi>,
    auth: Arc<dyn AuthApi>,
    session: SessionService,
    notifications: Arc<Notifications>,
}

impl UsersService {
    pub fn new(
        api: Arc<dyn UsersApi>,
        auth: Arc<dyn AuthApi>,
        session: SessionService,
        notifications: Arc<Notifications>,
    ) -> Self {
        Self {
            api,
            auth,
            session,
            notifications,
        }
    }

    /// Resolve a username to an existing user. `Ok(None)` means "no such user".
    pub async fn resolve(&self, username: &str) -> AppResult<Option<UserId>> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".to_string()));
        }
        let raw = self
            .notifications
            .on_error(self.api.lookup(username).await, "Error in checking user!")?;
        let user_id = UserId::from_lookup(raw);
        tracing::debug!("Username {:?} resolved to {:?}", username, user_id);
        Ok(user_id)
    }

    /// Register a patron. Only a signed-in librarian can do this; anyone else is
    /// asked to wait for one.
    pub async fn register(&self, user: NewUser) -> AppResult<User> {
        if !self.session.is_valid() {
            self.notifications
                .info("Please wait for librarian to let you registered");
            return Err(AppError::Authentication("Registration needs a librarian session".to_string()));
        }
        self.notifications
            .on_error(user.validate().map_err(AppError::from), "")?;

        let created = self
            .notifications
            .on_error(self.api.create_user(&user).await, "Error in creating new user!")?;
        tracing::info!("User {} registered with id {}", created.username, created.id);
        self.notifications.success("New user created successfully");
        Ok(created)
    }

    pub async fn list(&self) -> AppResult<Vec<User>> {
        self.notifications.on_error(self.session.require_session(), "")?;
        self.notifications
            .on_error(self.api.users().await, "Error in getting all users!")
    }

    pub async fn get(&self, id: i32) -> AppResult<User> {
        self.notifications.on_error(self.session.require_session(), "")?;
        self.notifications
            .on_error(self.api.user(id).await, "Error in getting user details!")
    }

    /// Update a user, then re-read the user list
    pub async fn update(&self, id: i32, user: NewUser) -> AppResult<Vec<User>> {
        self.notifications.on_error(self.session.require_session(), "")?;
        self.notifications
            .on_error(user.validate().map_err(AppError::from), "")?;
        self.notifications
            .on_error(self.api.update_user(id, &user).await, "Error in updating user!")?;
        tracing::info!("User {} updated", id);
        self.notifications.success("User updated successfully");
        self.list().await
    }

    pub async fn delete(&self, id: i32) -> AppResult<Vec<User>> {
        self.notifications.on_error(self.session.require_session(), "")?;
        let response = self
            .notifications
            .on_error(self.api.delete_user(id).await, "Error in deleting user!")?;
        tracing::info!("User {} deleted", id);
        self.notifications.success(response.message);
        self.list().await
    }

    pub async fn librarians(&self) -> AppResult<Vec<Librarian>> {
        self.notifications.on_error(self.session.require_session(), "")?;
        self.notifications
            .on_error(self.auth.librarians().await, "Error in getting librarians!")
    }
}
