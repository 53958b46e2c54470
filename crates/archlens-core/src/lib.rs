//! # archlens-core
//!
//! Core crate for the Archlens analysis pipeline. Contains configuration
//! schemas, typed identifiers, the queue and progress message contracts,
//! the traits implemented by broker and persistence crates, and the unified
//! error system.
//!
//! This crate has **no** internal dependencies on other Archlens crates.

pub mod config;
pub mod error;
pub mod messages;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
