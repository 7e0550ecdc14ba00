//! Result type aliases for the forum crates.

use crate::ForumError;

/// A specialized `Result` type for forum operations.
pub type ForumResult<T> = Result<T, ForumError>;
