//! Issue ledger: every issue record, for librarians to approve and clean up

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{BookIssueDetails, IssueStatus},
    repository::IssuesApi,
    services::{notifications::Notifications, session::SessionService},
};

/// Result of a ledger action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// Action sent; the ledger as re-read afterwards
    Updated(Vec<BookIssueDetails>),
    /// Record was not in the state the action applies to; nothing sent
    Ignored(IssueStatus),
}

pub struct IssueLedger {
    issues: Arc<dyn IssuesApi>,
    session: SessionService,
    notifications: Arc<Notifications>,
    records: Mutex<Vec<BookIssueDetails>>,
}

impl IssueLedger {
    pub fn new(issues: Arc<dyn IssuesApi>, session: SessionService, notifications: Arc<Notifications>) -> Self {
        Self {
            issues,
            session,
            notifications,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn records(&self) -> Vec<BookIssueDetails> {
        self.records.lock().clone()
    }

    pub fn with_status(&self, status: IssueStatus) -> Vec<BookIssueDetails> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.issue_status == status)
            .cloned()
            .collect()
    }

    /// Load every issue record. On failure the previous list stays.
    pub async fn refresh(&self) -> AppResult<Vec<BookIssueDetails>> {
        let records = self
            .notifications
            .on_error(self.issues.all_issues().await, "Error in getting issued books!")?;
        tracing::debug!("Ledger holds {} issue records", records.len());
        *self.records.lock() = records.clone();
        Ok(records)
    }

    /// Turn a pending request into an issued book
    pub async fn approve(&self, issue_id: i32) -> AppResult<LedgerOutcome> {
        let status = self.status_of(issue_id)?;
        if status != IssueStatus::Pending {
            tracing::debug!("Issue {} is {}, not pending", issue_id, status);
            return Ok(LedgerOutcome::Ignored(status));
        }

        let record = self
            .notifications
            .on_error(self.issues.approve_issue(issue_id).await, "Error in approving book issue!")?;
        tracing::info!("Issue {} approved, now {}", record.id, record.issue_status);
        self.notifications.success("Book issue approved");
        Ok(LedgerOutcome::Updated(self.refresh().await?))
    }

    /// Delete a returned record. Librarian only.
    pub async fn remove_returned(&self, issue_id: i32) -> AppResult<LedgerOutcome> {
        self.notifications.on_error(self.session.require_session(), "")?;
        let status = self.status_of(issue_id)?;
        if status != IssueStatus::Returned {
            tracing::debug!("Issue {} is {}, not returned", issue_id, status);
            return Ok(LedgerOutcome::Ignored(status));
        }

        let response = self.notifications.on_error(
            self.issues.remove_returned(issue_id).await,
            "Error in removing returned book!",
        )?;
        tracing::info!("Returned issue {} removed", issue_id);
        self.notifications.success(response.message);
        Ok(LedgerOutcome::Updated(self.refresh().await?))
    }

    fn status_of(&self, issue_id: i32) -> AppResult<IssueStatus> {
        self.records
            .lock()
            .iter()
            .find(|r| r.id == issue_id)
            .map(|r| r.issue_status)
            .ok_or_else(|| AppError::NotFound(format!("Issue record {} not found", issue_id)))
    }
}
