//! dicomflow API library
//!
//! HTTP handlers, authentication, the order aggregation service and application setup.

mod api_doc;
pub mod constants;
mod handlers;
pub mod services;
pub mod setup;

// Public modules
pub mod auth;
pub mod error;
pub mod state;

// Re-exports
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
