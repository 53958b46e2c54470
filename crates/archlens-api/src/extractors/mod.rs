//! Custom request extractors.

pub mod auth;

pub use auth::AdminUser;
