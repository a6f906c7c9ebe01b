//! # Metal Operations Server
//!
//! Renders operational reports over HTTP. `GET /report/{name}` reads report
//! data for a zone, cluster or host from the metal backend and renders it
//! through the template `name`.
//!
//! ## Architecture
//!
//! - **domain**: report scope and the report data exchanged with the backend
//! - **application**: backend ports and the template engine
//! - **infrastructure**: REST client for the metal backend
//! - **interfaces**: HTTP router, handlers and middleware chain
//! - **server**: runtime wiring and graceful shutdown
//! - **support**: errors and shutdown signalling

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod support;

pub use config::{default_config_path, AppConfig};

pub use interfaces::http::{create_api_router, RouterOptions};

pub use server::{init_tracing, ServerHandle};
