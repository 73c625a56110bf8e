//! Canonical manifest model
//!
//! Every accepted wire format is translated into a [`Manifest`]: the image's
//! content address plus its ordered layers. Layer order is significant and is
//! never changed after translation.

pub mod format;
pub mod native;
pub mod oci;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::digest::{self, Digest};
use crate::error::{GatewayError, Result};

pub use format::ManifestFormat;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "digest::deserialize_optional")]
    pub hash: Option<Digest>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub hash: Digest,
    #[serde(default)]
    pub uri: String,
    /// Headers to send when retrieving the layer.
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
}

impl Manifest {
    /// Check the manifest is complete enough to be indexed.
    ///
    /// Applied after every canonicalizer; returns the content address on success.
    pub fn validate(&self) -> Result<&Digest> {
        let hash = self
            .hash
            .as_ref()
            .ok_or_else(|| GatewayError::IncompleteManifest("missing manifest hash".to_string()))?;
        if self.layers.is_empty() {
            return Err(GatewayError::IncompleteManifest(format!(
                "manifest {} has no layers",
                hash
            )));
        }
        if let Some((index, layer)) = self
            .layers
            .iter()
            .enumerate()
            .find(|(_, l)| l.uri.trim().is_empty())
        {
            return Err(GatewayError::IncompleteManifest(format!(
                "layer {} ({}) has no uri",
                index, layer.hash
            )));
        }
        Ok(hash)
    }
}
