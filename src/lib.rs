//! Index Gateway Library
//!
//! Accepts container image manifests over HTTP, canonicalizes them from the
//! supported wire formats, and triggers an indexing engine at most once per
//! observed engine state.

pub mod cli;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod transport;

pub use config::GatewayConfig;
pub use digest::Digest;
pub use engine::Indexer;
pub use error::{GatewayError, Result};
pub use manifest::{Layer, Manifest, ManifestFormat};
