//! # archlens-database
//!
//! PostgreSQL connection management and the repositories through which the
//! pipeline core reaches tables owned by the CRUD layer.

pub mod connection;
pub mod repositories;

pub use connection::DatabasePool;
