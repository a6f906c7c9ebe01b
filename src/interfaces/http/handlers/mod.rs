//! Request handlers

pub mod report;

pub use report::{get_report, Reporter, SharedReporter};
