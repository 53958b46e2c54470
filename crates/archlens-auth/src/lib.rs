//! # archlens-auth
//!
//! Bearer token handling for the Archlens pipeline core. Tokens are issued
//! by the account subsystem; this crate verifies them (HS256, shared
//! secret) and exposes the caller's user ID and role.
//!
//! ## Modules
//!
//! - `jwt`: claims, token validation, and token issuing

pub mod jwt;

pub use jwt::{Claims, JwtDecoder, JwtEncoder, Role};
