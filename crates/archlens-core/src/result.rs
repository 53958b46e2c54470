//! Convenience result type alias for Archlens.

use crate::error::AppError;

/// A specialized `Result` type for Archlens operations.
pub type AppResult<T> = Result<T, AppError>;
