//! Book issue endpoints

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::{keyed, ApiClient, Auth};
use crate::{
    error::AppResult,
    models::{BookIssueDetails, BookIssueRecord, BookIssueRequest, MessageResponse, UserId},
};

/// Creating, approving and returning issues are anonymous calls on the backend;
/// only removing a returned record needs a librarian token.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IssuesApi: Send + Sync {
    async fn create_issue(&self, request: &BookIssueRequest) -> AppResult<BookIssueRecord>;

    async fn all_issues(&self) -> AppResult<Vec<BookIssueDetails>>;

    async fn user_issues(&self, user_id: UserId) -> AppResult<Vec<BookIssueDetails>>;

    /// Turn a pending request into an issued book
    async fn approve_issue(&self, issue_id: i32) -> AppResult<BookIssueRecord>;

    async fn return_issue(&self, issue_id: i32) -> AppResult<MessageResponse>;

    async fn remove_returned(&self, issue_id: i32) -> AppResult<MessageResponse>;
}

#[async_trait]
impl IssuesApi for ApiClient {
    async fn create_issue(&self, request: &BookIssueRequest) -> AppResult<BookIssueRecord> {
        self.post_json(&["bookIssues", ""], request, Auth::Anonymous).await
    }

    async fn all_issues(&self) -> AppResult<Vec<BookIssueDetails>> {
        self.get(&["bookIssues", "get_all"], Auth::Anonymous).await
    }

    async fn user_issues(&self, user_id: UserId) -> AppResult<Vec<BookIssueDetails>> {
        let segment = keyed("get_bookIssues_by_user", user_id);
        self.get(&[&segment], Auth::Anonymous).await
    }

    async fn approve_issue(&self, issue_id: i32) -> AppResult<BookIssueRecord> {
        let segment = keyed("update_bookIssue", issue_id);
        self.put_empty(&[&segment], Auth::Anonymous).await
    }

    async fn return_issue(&self, issue_id: i32) -> AppResult<MessageResponse> {
        let segment = keyed("return_bookIssue", issue_id);
        self.put_empty(&["bookIssues", &segment], Auth::Anonymous).await
    }

    async fn remove_returned(&self, issue_id: i32) -> AppResult<MessageResponse> {
        let segment = keyed("delete_returned_book", issue_id);
        self.delete(&["bookIssues", &segment], Auth::Bearer).await
    }
}
