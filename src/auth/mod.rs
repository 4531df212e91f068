//! Authentication module
//!
//! Tokens are issued by an external identity provider; this service only
//! verifies them and resolves the caller's identity and role.

mod jwt;

pub use jwt::{Claims, Identity, JwtError, JwtVerifier, UserRole};
