//! HTTP interface
//!
//! - `middleware`: middleware chain (recovery, request ID, access log, JSON default)
//! - `handlers`: report handler
//! - `router`: API router and OpenAPI document

pub mod handlers;
pub mod middleware;
pub mod router;

pub use router::{create_api_router, ApiDoc, RouterOptions};
