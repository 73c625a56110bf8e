//! Command line interface module
//!
//! Parses arguments into a [`crate::config::GatewayConfig`] for the server binary.

pub mod args;

pub use args::Args;
