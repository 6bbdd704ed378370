//! Bearer token authentication
//!
//! The server only verifies tokens (HS256, shared secret); issuing them belongs to
//! the identity service in front of it.

pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::JwtVerifier;
pub use middleware::{auth_middleware, AuthState};
pub use models::{CallerContext, JwtClaims};
