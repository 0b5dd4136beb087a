//! HTTP API over the prescription service.
//!
//! `api_router()` returns a composable `Router` with every route nested
//! under `/api/`; it can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use types::ApiContext;
