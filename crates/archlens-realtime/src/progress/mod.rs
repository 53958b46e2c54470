//! The progress channel: one fixed pub/sub channel carrying
//! [`ProgressMessage`](archlens_core::messages::ProgressMessage) JSON from
//! workers to every API node.

pub mod publisher;
pub mod subscriber;

pub use publisher::ProgressPublisher;
pub use subscriber::ProgressSubscriber;
