//! Business logic services

pub mod catalog;
pub mod issue;
pub mod ledger;
pub mod notifications;
pub mod returns;
pub mod session;
pub mod users;

use std::sync::Arc;

use crate::repository::{ApiClient, AuthApi, CatalogApi, IssuesApi, SessionStore, UsersApi};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub session: session::SessionService,
    pub catalog: catalog::CatalogService,
    pub users: users::UsersService,
    pub ledger: Arc<ledger::IssueLedger>,
    pub notifications: Arc<notifications::Notifications>,
    issues: Arc<dyn IssuesApi>,
}

impl Services {
    /// Wire every service onto the same backend client and session store
    pub fn new(client: ApiClient, store: Arc<SessionStore>) -> Self {
        let client = Arc::new(client);
        Self::with_apis(client.clone(), client.clone(), client.clone(), client, store)
    }

    /// Wire services over arbitrary API implementations
    pub fn with_apis(
        auth: Arc<dyn AuthApi>,
        catalog: Arc<dyn CatalogApi>,
        users: Arc<dyn UsersApi>,
        issues: Arc<dyn IssuesApi>,
        store: Arc<SessionStore>,
    ) -> Self {
        let notifications = Arc::new(notifications::Notifications::new());
        let session = session::SessionService::new(store, auth.clone(), notifications.clone());
        Self {
            catalog: catalog::CatalogService::new(catalog, session.clone(), notifications.clone()),
            users: users::UsersService::new(users, auth, session.clone(), notifications.clone()),
            ledger: Arc::new(ledger::IssueLedger::new(
                issues.clone(),
                session.clone(),
                notifications.clone(),
            )),
            session,
            notifications,
            issues,
        }
    }

    /// A new issue workflow with its own search form
    pub fn issue_workflow(&self) -> issue::IssueWorkflow {
        issue::IssueWorkflow::new(
            &self.catalog,
            self.users.clone(),
            self.issues.clone(),
            self.notifications.clone(),
        )
    }

    pub fn return_workflow(&self) -> returns::ReturnWorkflow {
        returns::ReturnWorkflow::new(self.users.clone(), self.issues.clone(), self.notifications.clone())
    }
}
