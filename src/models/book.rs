//! Book model and catalog search criteria

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Book as shown in catalog listings (author/publisher/category are display names)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub category: String,
    #[serde(default)]
    pub copies: u32,
}

impl Book {
    /// A book can only be offered for issuing while at least one copy is on the shelf
    pub fn is_issuable(&self) -> bool {
        self.copies > 0
    }
}

/// Keep only books that can be issued. General browsing keeps the full list.
pub fn issuable(books: &[Book]) -> Vec<Book> {
    books.iter().filter(|b| b.is_issuable()).cloned().collect()
}

/// Create/update book request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BookRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "Publisher is required"))]
    pub publisher: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub copies: u32,
}

/// Sparse search form: any subset of title, author and publisher
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
}

/// The backend search endpoint selected for a set of criteria
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchVariant {
    Title(String),
    Author(String),
    Publisher(String),
    TitleAuthor { title: String, author: String },
    TitlePublisher { title: String, publisher: String },
    TitleAuthorPublisher { title: String, author: String, publisher: String },
}

impl SearchVariant {
    pub fn label(&self) -> &'static str {
        match self {
            SearchVariant::Title(_) => "by title",
            SearchVariant::Author(_) => "by author",
            SearchVariant::Publisher(_) => "by publisher",
            SearchVariant::TitleAuthor { .. } => "by title and author",
            SearchVariant::TitlePublisher { .. } => "by title and publisher",
            SearchVariant::TitleAuthorPublisher { .. } => "by title, author, publisher",
        }
    }
}

fn present(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl SearchCriteria {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        present(&self.title).is_none() && present(&self.author).is_none() && present(&self.publisher).is_none()
    }

    /// Pick the one endpoint matching the non-empty fields.
    ///
    /// Author+publisher without a title has no backend endpoint and yields `None`,
    /// exactly like an empty form.
    pub fn variant(&self) -> Option<SearchVariant> {
        match (present(&self.title), present(&self.author), present(&self.publisher)) {
            (Some(title), None, None) => Some(SearchVariant::Title(title)),
            (None, Some(author), None) => Some(SearchVariant::Author(author)),
            (None, None, Some(publisher)) => Some(SearchVariant::Publisher(publisher)),
            (Some(title), Some(author), None) => Some(SearchVariant::TitleAuthor { title, author }),
            (Some(title), None, Some(publisher)) => Some(SearchVariant::TitlePublisher { title, publisher }),
            (Some(title), Some(author), Some(publisher)) => {
                Some(SearchVariant::TitleAuthorPublisher { title, author, publisher })
            }
            (None, Some(_), Some(_)) | (None, None, None) => None,
        }
    }
}
