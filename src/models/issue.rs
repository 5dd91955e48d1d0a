//! Book issue (checkout) records

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::user::UserId;

/// Lifecycle tag on an issue record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    /// Requested without a librarian on duty, awaiting approval
    Pending,
    /// Checked out
    Issued,
    /// Back on the shelf, awaiting removal by a librarian
    Returned,
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IssueStatus::Pending => "pending",
            IssueStatus::Issued => "issued",
            IssueStatus::Returned => "returned",
        };
        write!(f, "{}", label)
    }
}

/// Issue record as created by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookIssueRecord {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    #[serde(default)]
    pub issued_by: Option<i32>,
    #[serde(default)]
    pub issue_time: Option<NaiveDateTime>,
    pub issue_status: IssueStatus,
}

/// Issue record with book and user names, as returned by list endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookIssueDetails {
    pub id: i32,
    pub bookname: String,
    pub username: String,
    #[serde(default)]
    pub issued_by: Option<i32>,
    #[serde(default)]
    pub issue_time: Option<NaiveDateTime>,
    pub issue_status: IssueStatus,
}

/// Create issue request. Only constructible with a resolved [`UserId`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookIssueRequest {
    pub book_id: i32,
    pub user_id: UserId,
}

/// `{ "message": ... }` acknowledgement body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}
