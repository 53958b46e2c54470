//! Repository implementations of the core persistence traits.

pub mod diagram;
pub mod job;
pub mod quota;

pub use diagram::DiagramRepository;
pub use job::JobRepository;
pub use quota::QuotaRepository;
