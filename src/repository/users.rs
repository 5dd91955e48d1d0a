//! Patron endpoints

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::{keyed, ApiClient, Auth};
use crate::{
    error::AppResult,
    models::{MessageResponse, NewUser, User},
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait UsersApi: Send + Sync {
    /// Existence check by username. Answers the user id, or `0` when unknown.
    async fn lookup(&self, username: &str) -> AppResult<i32>;

    async fn create_user(&self, user: &NewUser) -> AppResult<User>;

    async fn users(&self) -> AppResult<Vec<User>>;

    async fn user(&self, id: i32) -> AppResult<User>;

    async fn update_user(&self, id: i32, user: &NewUser) -> AppResult<()>;

    async fn delete_user(&self, id: i32) -> AppResult<MessageResponse>;
}

#[async_trait]
impl UsersApi for ApiClient {
    async fn lookup(&self, username: &str) -> AppResult<i32> {
        let segment = keyed("check_user_in_db", username);
        self.get(&["users", &segment], Auth::Anonymous).await
    }

    async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        self.post_json(&["users", ""], user, Auth::Bearer).await
    }

    async fn users(&self) -> AppResult<Vec<User>> {
        self.get(&["users", "get_users"], Auth::Bearer).await
    }

    async fn user(&self, id: i32) -> AppResult<User> {
        let segment = keyed("get_user_by_id", id);
        self.get(&["users", &segment], Auth::Bearer).await
    }

    async fn update_user(&self, id: i32, user: &NewUser) -> AppResult<()> {
        let segment = keyed("update_user", id);
        self.put_json(&["users", &segment], user, Auth::Bearer).await
    }

    async fn delete_user(&self, id: i32) -> AppResult<MessageResponse> {
        let segment = keyed("delete_user_by_id", id);
        self.delete(&["users", &segment], Auth::Bearer).await
    }
}
