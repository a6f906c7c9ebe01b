//! Application layer
//!
//! - `ports`: the metal backend seen from the report handler
//! - `templates`: lazily initialised report template engine

pub mod ports;
pub mod templates;

pub use ports::{AuthContext, MetalClient, MetalDialer};
pub use templates::{EngineOptions, ReportEngine, TemplateSource};
