//! Issue workflow: search → select → identify → issue
//!
//! The workflow is a state machine; the panel a front end shows is derived from
//! the state alone (see [`IssueState::panel`]), so there is no separate
//! open/closed flag to keep in sync.

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookIssueRecord, BookIssueRequest, NewUser, SearchCriteria, UserId},
    repository::IssuesApi,
    services::{
        catalog::{CatalogSearch, CatalogService, SearchOutcome},
        notifications::Notifications,
        users::UsersService,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueState {
    Idle,
    Searching { criteria: SearchCriteria },
    Selected { book: Book },
    AwaitingUserIdentity { book: Book, username: String },
    /// Username is unknown; the patron must be registered before issuing
    RegistrationRequired { book: Book, username: String },
    Issuing { book: Book, user_id: UserId },
    Done { record: BookIssueRecord },
    Failed { reason: String },
}

/// What a front end should display for a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuePanel {
    SearchForm,
    BookDetails,
    RegistrationForm,
    Progress,
}

impl IssueState {
    pub fn panel(&self) -> IssuePanel {
        match self {
            IssueState::Idle | IssueState::Searching { .. } | IssueState::Done { .. } | IssueState::Failed { .. } => {
                IssuePanel::SearchForm
            }
            IssueState::Selected { .. } | IssueState::AwaitingUserIdentity { .. } => IssuePanel::BookDetails,
            IssueState::RegistrationRequired { .. } => IssuePanel::RegistrationForm,
            IssueState::Issuing { .. } => IssuePanel::Progress,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            IssueState::Idle => "idle",
            IssueState::Searching { .. } => "searching",
            IssueState::Selected { .. } => "selected",
            IssueState::AwaitingUserIdentity { .. } => "awaiting user identity",
            IssueState::RegistrationRequired { .. } => "registration required",
            IssueState::Issuing { .. } => "issuing",
            IssueState::Done { .. } => "done",
            IssueState::Failed { .. } => "failed",
        }
    }
}

pub struct IssueWorkflow {
    search: CatalogSearch,
    users: UsersService,
    issues: Arc<dyn IssuesApi>,
    notifications: Arc<Notifications>,
    state: IssueState,
    /// Criteria of the last search, restored when a selection is cancelled
    criteria: SearchCriteria,
}

impl IssueWorkflow {
    pub fn new(
        catalog: &CatalogService,
        users: UsersService,
        issues: Arc<dyn IssuesApi>,
        notifications: Arc<Notifications>,
    ) -> Self {
        Self {
            search: catalog.search_form(),
            users,
            issues,
            notifications,
            state: IssueState::Idle,
            criteria: SearchCriteria::default(),
        }
    }

    pub fn state(&self) -> &IssueState {
        &self.state
    }

    pub fn panel(&self) -> IssuePanel {
        self.state.panel()
    }

    /// Books the patron can pick from (copies left)
    pub fn offered_books(&self) -> Vec<Book> {
        self.search.issuable()
    }

    /// Re-run the search for changed criteria. Any open selection is dropped.
    pub async fn search(&mut self, criteria: SearchCriteria) -> AppResult<Vec<Book>> {
        if criteria.is_empty() {
            self.search.clear();
            self.criteria = SearchCriteria::default();
            self.transition(IssueState::Idle);
            return Ok(Vec::new());
        }

        self.criteria = criteria.clone();
        self.transition(IssueState::Searching {
            criteria: criteria.clone(),
        });
        match self.search.search(&criteria).await {
            SearchOutcome::Applied(_) | SearchOutcome::NoQuery => Ok(self.offered_books()),
            // a newer search owns the state now
            SearchOutcome::Superseded => Ok(self.offered_books()),
            SearchOutcome::Failed(e) => {
                self.transition(IssueState::Failed {
                    reason: e.user_message(),
                });
                Err(e)
            }
        }
    }

    /// Pick a book from the offered list
    pub fn select(&mut self, book_id: i32) -> AppResult<()> {
        if !matches!(self.state, IssueState::Searching { .. }) {
            return Err(self.out_of_order("select a book"));
        }
        let book = self
            .offered_books()
            .into_iter()
            .find(|b| b.id == book_id)
            .ok_or_else(|| AppError::Validation(format!("Book {} is not available to issue", book_id)))?;
        self.transition(IssueState::Selected { book });
        Ok(())
    }

    /// Name the patron the selected book is for
    pub fn identify(&mut self, username: &str) -> AppResult<()> {
        let username = username.trim();
        let book = match &self.state {
            IssueState::Selected { book } | IssueState::AwaitingUserIdentity { book, .. } => book.clone(),
            _ => return Err(self.out_of_order("identify the patron")),
        };
        if username.is_empty() {
            let err = AppError::Validation("Username is required".to_string());
            self.notifications.error(err.user_message());
            return Err(err);
        }
        self.transition(IssueState::AwaitingUserIdentity {
            book,
            username: username.to_string(),
        });
        Ok(())
    }

    /// Resolve the patron and create the issue record
    pub async fn issue(&mut self) -> AppResult<&IssueState> {
        let (book, username) = match &self.state {
            IssueState::AwaitingUserIdentity { book, username } => (book.clone(), username.clone()),
            _ => return Err(self.out_of_order("issue")),
        };

        let user_id = match self.users.resolve(&username).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                tracing::info!("User {:?} not found, registration required", username);
                self.transition(IssueState::RegistrationRequired { book, username });
                return Ok(&self.state);
            }
            Err(e) => {
                self.transition(IssueState::Failed {
                    reason: e.user_message(),
                });
                return Err(e);
            }
        };

        self.submit(book, user_id).await
    }

    /// Register the unknown patron, then continue issuing for them
    pub async fn register(&mut self, user: NewUser) -> AppResult<&IssueState> {
        let book = match &self.state {
            IssueState::RegistrationRequired { book, .. } => book.clone(),
            _ => return Err(self.out_of_order("register a patron")),
        };

        let created = self.users.register(user).await?;
        self.transition(IssueState::AwaitingUserIdentity {
            book,
            username: created.username,
        });
        self.issue().await
    }

    /// Close the book panel and return to the result list
    pub fn cancel(&mut self) {
        match &self.state {
            IssueState::Selected { .. }
            | IssueState::AwaitingUserIdentity { .. }
            | IssueState::RegistrationRequired { .. } => self.transition(IssueState::Searching {
                criteria: self.criteria.clone(),
            }),
            _ => {}
        }
    }

    /// Clear the form and results
    pub fn reset(&mut self) {
        self.search.clear();
        self.criteria = SearchCriteria::default();
        self.transition(IssueState::Idle);
    }

    async fn submit(&mut self, book: Book, user_id: UserId) -> AppResult<&IssueState> {
        let request = BookIssueRequest {
            book_id: book.id,
            user_id,
        };
        self.transition(IssueState::Issuing { book, user_id });

        match self.issues.create_issue(&request).await {
            Ok(record) => {
                tracing::info!(
                    "Book {} issued to user {} (record {}, {})",
                    record.book_id,
                    record.user_id,
                    record.id,
                    record.issue_status
                );
                self.notifications.success("Book issued proceeded successfully");
                self.transition(IssueState::Done { record });
                Ok(&self.state)
            }
            Err(e) => {
                let reason = e.user_message();
                self.notifications.error(reason.clone());
                self.transition(IssueState::Failed { reason });
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: IssueState) {
        tracing::debug!("Issue workflow: {} -> {}", self.state.name(), next.name());
        self.state = next;
    }

    fn out_of_order(&self, action: &str) -> AppError {
        AppError::Validation(format!("Cannot {} while {}", action, self.state.name()))
    }
}
