//! Return workflow: find a patron's issued books and take them back

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{BookIssueDetails, IssueStatus, UserId},
    repository::IssuesApi,
    services::{notifications::Notifications, users::UsersService},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    Loaded(Vec<BookIssueDetails>),
    /// No such patron on the backend
    RegistrationRequired { username: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// Book taken back; the patron's list as re-read afterwards
    Returned(Vec<BookIssueDetails>),
    /// Record was not in `issued` state; nothing sent
    Ignored(IssueStatus),
}

#[derive(Debug, Clone)]
struct Patron {
    username: String,
    user_id: UserId,
}

pub struct ReturnWorkflow {
    users: UsersService,
    issues: Arc<dyn IssuesApi>,
    notifications: Arc<Notifications>,
    patron: Option<Patron>,
    records: Vec<BookIssueDetails>,
}

impl ReturnWorkflow {
    pub fn new(users: UsersService, issues: Arc<dyn IssuesApi>, notifications: Arc<Notifications>) -> Self {
        Self {
            users,
            issues,
            notifications,
            patron: None,
            records: Vec::new(),
        }
    }

    pub fn patron(&self) -> Option<&str> {
        self.patron.as_ref().map(|p| p.username.as_str())
    }

    /// Everything loaded for the patron, returned records included
    pub fn records(&self) -> &[BookIssueDetails] {
        &self.records
    }

    /// Records still out (pending or issued)
    pub fn outstanding(&self) -> Vec<&BookIssueDetails> {
        self.records
            .iter()
            .filter(|r| r.issue_status != IssueStatus::Returned)
            .collect()
    }

    pub async fn open(&mut self, username: &str) -> AppResult<OpenOutcome> {
        self.patron = None;
        self.records.clear();

        let username = username.trim().to_string();
        let Some(user_id) = self.users.resolve(&username).await? else {
            self.notifications.info(format!("User {} is not registered", username));
            return Ok(OpenOutcome::RegistrationRequired { username });
        };

        self.patron = Some(Patron { username, user_id });
        self.reload().await?;
        Ok(OpenOutcome::Loaded(self.records.clone()))
    }

    /// Take back one issued book, then re-read the patron's list
    pub async fn return_book(&mut self, issue_id: i32) -> AppResult<ReturnOutcome> {
        let record = self
            .records
            .iter()
            .find(|r| r.id == issue_id)
            .ok_or_else(|| AppError::NotFound(format!("Issue record {} is not on the patron's list", issue_id)))?;

        if record.issue_status != IssueStatus::Issued {
            tracing::debug!("Issue {} is {}, nothing to return", issue_id, record.issue_status);
            return Ok(ReturnOutcome::Ignored(record.issue_status));
        }

        let response = self
            .notifications
            .on_error(self.issues.return_issue(issue_id).await, "Error in returning book!")?;
        tracing::info!("Issue {} ({}) returned", issue_id, record.bookname);
        self.notifications.success(response.message);

        // the list is stale once the backend has taken the book back
        if let Err(e) = self.reload().await {
            self.patron = None;
            self.records.clear();
            return Err(e);
        }
        Ok(ReturnOutcome::Returned(self.records.clone()))
    }

    async fn reload(&mut self) -> AppResult<()> {
        let user_id = match &self.patron {
            Some(patron) => patron.user_id,
            None => return Err(AppError::Validation("No patron selected".to_string())),
        };
        let records = self.notifications.on_error(
            self.issues.user_issues(user_id).await,
            "Error in getting user's issued books!",
        )?;
        self.records = records;
        Ok(())
    }
}
