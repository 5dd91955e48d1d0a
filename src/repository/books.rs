//! Catalog endpoints: books, categories and the search family

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::{keyed, ApiClient, Auth};
use crate::{
    error::AppResult,
    models::{Book, BookRequest, Category, CategoryRequest, MessageResponse, SearchVariant},
};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Run one of the field-combination searches
    async fn search(&self, variant: &SearchVariant) -> AppResult<Vec<Book>>;

    /// Free-text search over title, author and publisher
    async fn find(&self, text: &str) -> AppResult<Vec<Book>>;

    async fn by_category(&self, category_id: i32, text: Option<String>) -> AppResult<Vec<Book>>;

    async fn all_books(&self) -> AppResult<Vec<Book>>;

    async fn book(&self, id: i32) -> AppResult<Book>;

    async fn create_book(&self, book: &BookRequest) -> AppResult<()>;

    async fn update_book(&self, id: i32, book: &BookRequest) -> AppResult<()>;

    async fn delete_book(&self, id: i32) -> AppResult<MessageResponse>;

    async fn categories(&self) -> AppResult<Vec<Category>>;

    async fn create_category(&self, category: &CategoryRequest) -> AppResult<Category>;

    async fn update_category(&self, id: i32, category: &CategoryRequest) -> AppResult<()>;

    async fn delete_category(&self, id: i32) -> AppResult<MessageResponse>;
}

/// Path segments (after `bookSearch`) of the endpoint serving a variant
pub fn search_path(variant: &SearchVariant) -> Vec<String> {
    match variant {
        SearchVariant::Title(title) => vec![keyed("get_book_by_title", title)],
        SearchVariant::Author(author) => vec![keyed("get_book_by_author", author)],
        SearchVariant::Publisher(publisher) => vec![keyed("get_book_by_publisher", publisher)],
        SearchVariant::TitleAuthor { title, author } => {
            vec!["get_book_by_title_and_author".to_string(), title.clone(), author.clone()]
        }
        SearchVariant::TitlePublisher { title, publisher } => {
            vec!["get_book_by_title_and_publisher".to_string(), title.clone(), publisher.clone()]
        }
        SearchVariant::TitleAuthorPublisher { title, author, publisher } => vec![
            "get_book_by_title_author_publisher".to_string(),
            title.clone(),
            author.clone(),
            publisher.clone(),
        ],
    }
}

#[async_trait]
impl CatalogApi for ApiClient {
    async fn search(&self, variant: &SearchVariant) -> AppResult<Vec<Book>> {
        let path = search_path(variant);
        let mut segments = vec!["bookSearch"];
        segments.extend(path.iter().map(String::as_str));
        self.get(&segments, Auth::Anonymous).await
    }

    async fn find(&self, text: &str) -> AppResult<Vec<Book>> {
        let query = keyed("search", text);
        self.get(&["bookSearch", "get_searched_Books", &query], Auth::Anonymous).await
    }

    async fn by_category(&self, category_id: i32, text: Option<String>) -> AppResult<Vec<Book>> {
        let category = keyed("get_books_by_category", category_id);
        match text {
            Some(text) => {
                let query = keyed("search", text);
                self.get(&["bookSearch", &category, &query], Auth::Anonymous).await
            }
            None => self.get(&["bookSearch", &category], Auth::Anonymous).await,
        }
    }

    async fn all_books(&self) -> AppResult<Vec<Book>> {
        self.get(&["books", "get_details"], Auth::Anonymous).await
    }

    async fn book(&self, id: i32) -> AppResult<Book> {
        let segment = keyed("get_book_by_id", id);
        self.get(&["books", &segment], Auth::Anonymous).await
    }

    async fn create_book(&self, book: &BookRequest) -> AppResult<()> {
        // The backend answers with its raw row (ids instead of names); callers re-read instead.
        let _: serde_json::Value = self.post_json(&["books", ""], book, Auth::Bearer).await?;
        Ok(())
    }

    async fn update_book(&self, id: i32, book: &BookRequest) -> AppResult<()> {
        let segment = keyed("update_book_by_id", id);
        self.put_json(&["books", &segment], book, Auth::Bearer).await
    }

    async fn delete_book(&self, id: i32) -> AppResult<MessageResponse> {
        let segment = keyed("delete_book_by_id", id);
        self.delete(&["books", &segment], Auth::Bearer).await
    }

    async fn categories(&self) -> AppResult<Vec<Category>> {
        self.get(&["categories", "get_all"], Auth::Anonymous).await
    }

    async fn create_category(&self, category: &CategoryRequest) -> AppResult<Category> {
        self.post_json(&["categories", ""], category, Auth::Bearer).await
    }

    async fn update_category(&self, id: i32, category: &CategoryRequest) -> AppResult<()> {
        let segment = keyed("update_category", id);
        self.put_json(&["categories", &segment], category, Auth::Bearer).await
    }

    async fn delete_category(&self, id: i32) -> AppResult<MessageResponse> {
        let segment = keyed("delete_category", id);
        self.delete(&["categories", &segment], Auth::Bearer).await
    }
}
