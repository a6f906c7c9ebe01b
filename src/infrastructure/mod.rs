//! Infrastructure layer - external concerns

pub mod client;
pub mod metal;

pub use client::Client;
pub use metal::{RestMetalClient, RestMetalDialer};
