//! # archlens-broker
//!
//! Broker backends behind the [`QueueBackend`] and [`PubSubBackend`] traits.
//! Supports two modes:
//!
//! - **redis**: lists + sorted sets for the leased work queue, native
//!   PUBLISH/SUBSCRIBE for the progress channel
//! - **memory**: in-process queue and broadcast channels for single-node
//!   runs and tests
//!
//! The backend is selected at runtime based on configuration.
//!
//! [`QueueBackend`]: archlens_core::traits::QueueBackend
//! [`PubSubBackend`]: archlens_core::traits::PubSubBackend

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::BrokerManager;
