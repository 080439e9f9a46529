//! Data models for the library API

pub mod author;
pub mod book;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use author::{Author, AuthorShort};
pub use book::{Book, BookShort};
pub use loan::{Loan, LoanDetails};
pub use user::{User, UserShort};
