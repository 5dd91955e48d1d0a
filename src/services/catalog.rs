//! Catalog service: search dispatch, browsing and librarian book management

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{book, Book, BookRequest, Category, CategoryRequest, SearchCriteria},
    repository::CatalogApi,
    services::{notifications::Notifications, session::SessionService},
};

/// What happened to one search request
#[derive(Debug)]
pub enum SearchOutcome {
    /// Response landed and is now the current result set
    Applied(Vec<Book>),
    /// No endpoint matches the criteria; nothing was sent and results are empty
    NoQuery,
    /// A newer search was started before this one answered; response dropped
    Superseded,
    /// Request failed; previous results are kept
    Failed(AppError),
}

/// Sequence tag of a dispatched search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket(u64);

/// Result set of one search form. Only the latest dispatched query may update it.
pub struct CatalogSearch {
    api: Arc<dyn CatalogApi>,
    notifications: Arc<Notifications>,
    latest: AtomicU64,
    results: Mutex<Vec<Book>>,
}

impl CatalogSearch {
    pub fn new(api: Arc<dyn CatalogApi>, notifications: Arc<Notifications>) -> Self {
        Self {
            api,
            notifications,
            latest: AtomicU64::new(0),
            results: Mutex::new(Vec::new()),
        }
    }

    /// Start a new query generation, superseding every earlier one
    pub fn begin(&self) -> SearchTicket {
        SearchTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Dispatch the endpoint matching `criteria` and apply its answer if still current
    pub async fn search(&self, criteria: &SearchCriteria) -> SearchOutcome {
        let ticket = self.begin();
        let Some(variant) = criteria.variant() else {
            tracing::debug!("No search endpoint for {:?}, skipping request", criteria);
            self.results.lock().clear();
            return SearchOutcome::NoQuery;
        };

        tracing::debug!("Search #{} {}", ticket.0, variant.label());
        let response = self.api.search(&variant).await;
        self.complete(ticket, response)
    }

    /// Apply a response for `ticket`, unless a newer search has started since
    pub fn complete(&self, ticket: SearchTicket, response: AppResult<Vec<Book>>) -> SearchOutcome {
        let mut results = self.results.lock();
        if !self.is_current(ticket) {
            tracing::debug!("Dropping response of superseded search #{}", ticket.0);
            return SearchOutcome::Superseded;
        }
        match response {
            Ok(books) => {
                *results = books.clone();
                SearchOutcome::Applied(books)
            }
            Err(e) => {
                tracing::warn!("Search #{} failed: {}", ticket.0, e);
                self.notifications.error("Error in getting searched books!");
                SearchOutcome::Failed(e)
            }
        }
    }

    /// Run a search and hand back the full result set, or why it failed
    pub async fn fetch(&self, criteria: &SearchCriteria) -> AppResult<Vec<Book>> {
        match self.search(criteria).await {
            SearchOutcome::Failed(e) => Err(e),
            _ => Ok(self.results()),
        }
    }

    /// Everything found, including books with no copies left
    pub fn results(&self) -> Vec<Book> {
        self.results.lock().clone()
    }

    /// Books that may be offered for issuing
    pub fn issuable(&self) -> Vec<Book> {
        book::issuable(&self.results.lock())
    }

    /// Reset the form: drop results and anything still in flight
    pub fn clear(&self) {
        self.begin();
        self.results.lock().clear();
    }
}

#[derive(Clone)]
pub struct CatalogService {
    api: Arc<dyn CatalogApi>,
    session: SessionService,
    notifications: Arc<Notifications>,
}

impl CatalogService {
    pub fn new(api: Arc<dyn CatalogApi>, session: SessionService, notifications: Arc<Notifications>) -> Self {
        Self {
            api,
            session,
            notifications,
        }
    }

    /// A fresh search form bound to this catalog
    pub fn search_form(&self) -> CatalogSearch {
        CatalogSearch::new(self.api.clone(), self.notifications.clone())
    }

    /// Free-text search over title, author and publisher
    pub async fn find(&self, text: &str) -> AppResult<Vec<Book>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        self.notifications
            .on_error(self.api.find(text).await, "Error in getting searched books!")
    }

    pub async fn by_category(&self, category_id: i32, text: Option<&str>) -> AppResult<Vec<Book>> {
        let text = text.map(str::trim).filter(|t| !t.is_empty()).map(str::to_string);
        self.notifications.on_error(
            self.api.by_category(category_id, text).await,
            "Error in getting books by category!",
        )
    }

    pub async fn all_books(&self) -> AppResult<Vec<Book>> {
        self.notifications
            .on_error(self.api.all_books().await, "Error in getting all books!")
    }

    pub async fn book(&self, id: i32) -> AppResult<Book> {
        self.notifications
            .on_error(self.api.book(id).await, "Error in getting book details!")
    }

    /// Add a book (or more copies of an existing title), then re-read the catalog
    pub async fn create_book(&self, book: BookRequest) -> AppResult<Vec<Book>> {
        self.guard_write(&book)?;
        self.notifications
            .on_error(self.api.create_book(&book).await, "Error in adding new book!")?;
        tracing::info!("Book {:?} added ({} copies)", book.title, book.copies);
        self.notifications.success("Book added successfully");
        self.all_books().await
    }

    pub async fn update_book(&self, id: i32, book: BookRequest) -> AppResult<Vec<Book>> {
        self.guard_write(&book)?;
        self.notifications
            .on_error(self.api.update_book(id, &book).await, "Error in updating book!")?;
        tracing::info!("Book {} updated", id);
        self.notifications.success("Book updated successfully");
        self.all_books().await
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<Vec<Book>> {
        self.notifications.on_error(self.session.require_session(), "")?;
        let response = self
            .notifications
            .on_error(self.api.delete_book(id).await, "Error in deleting book!")?;
        tracing::info!("Book {} deleted", id);
        self.notifications.success(response.message);
        self.all_books().await
    }

    pub async fn categories(&self) -> AppResult<Vec<Category>> {
        self.notifications
            .on_error(self.api.categories().await, "Error in getting categories!")
    }

    pub async fn create_category(&self, category: CategoryRequest) -> AppResult<Vec<Category>> {
        self.guard_write(&category)?;
        let created = self
            .notifications
            .on_error(self.api.create_category(&category).await, "Error in adding category!")?;
        tracing::info!("Category {} created with id {}", created.name, created.id);
        self.notifications.success("Category added successfully");
        self.categories().await
    }

    pub async fn update_category(&self, id: i32, category: CategoryRequest) -> AppResult<Vec<Category>> {
        self.guard_write(&category)?;
        self.notifications
            .on_error(self.api.update_category(id, &category).await, "Error in updating category!")?;
        self.notifications.success("Category updated successfully");
        self.categories().await
    }

    pub async fn delete_category(&self, id: i32) -> AppResult<Vec<Category>> {
        self.notifications.on_error(self.session.require_session(), "")?;
        let response = self
            .notifications
            .on_error(self.api.delete_category(id).await, "Error in deleting category!")?;
        self.notifications.success(response.message);
        self.categories().await
    }

    /// Session and form checks that must pass before a write is sent
    fn guard_write(&self, form: &impl Validate) -> AppResult<()> {
        self.notifications.on_error(self.session.require_session(), "")?;
        self.notifications
            .on_error(form.validate().map_err(AppError::from), "")
    }
}
