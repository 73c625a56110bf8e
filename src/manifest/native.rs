//! Native manifest format: the canonical model, serialized as JSON.

use super::Manifest;
use crate::error::Result;

pub const MEDIA_TYPE: &str = "application/vnd.projectquay.clair.mainfest.v1+json";

/// Decode a native manifest. Completeness is checked separately.
pub fn canonicalize(body: &[u8]) -> Result<Manifest> {
    Ok(serde_json::from_slice(body)?)
}
