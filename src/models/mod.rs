//! Data models for Biblio Desk

pub mod book;
pub mod category;
pub mod issue;
pub mod session;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookRequest, SearchCriteria, SearchVariant};
pub use category::{Category, CategoryRequest};
pub use issue::{BookIssueDetails, BookIssueRecord, BookIssueRequest, IssueStatus, MessageResponse};
pub use session::{Credentials, SignUp, Token, TokenClaims, TokenResponse};
pub use user::{Librarian, NewUser, User, UserId};
