//! OCI image manifest translation
//!
//! Translates an `application/vnd.oci.image.manifest.v1+json` document into the
//! canonical [`Manifest`]. Translation is all-or-nothing: the first layer that
//! cannot be used aborts the whole manifest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Layer, Manifest};
use crate::digest::Digest;
use crate::error::{GatewayError, Result};

pub const MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";

pub const LAYER_TAR: &str = "application/vnd.oci.image.layer.v1.tar";
pub const LAYER_TAR_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
pub const LAYER_TAR_ZSTD: &str = "application/vnd.oci.image.layer.v1.tar+zstd";

/// Layer media types we accept. Decompression is left to the indexer.
pub const LAYER_TYPES: &[&str] = &[LAYER_TAR, LAYER_TAR_GZIP, LAYER_TAR_ZSTD];

/// Annotation prefix marking a layer annotation as a retrieval header.
pub const HEADER_ANNOTATION_PREFIX: &str = "header:";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Decode and translate an OCI image manifest body.
pub fn canonicalize(body: &[u8]) -> Result<Manifest> {
    let image: ImageManifest = serde_json::from_slice(body)?;
    translate(&image)
}

/// Translate a decoded OCI image manifest into the canonical model.
pub fn translate(image: &ImageManifest) -> Result<Manifest> {
    let hash = Digest::parse(&image.config.digest)?;

    let layers = image
        .layers
        .iter()
        .enumerate()
        .map(|(index, desc)| translate_layer(index, desc))
        .collect::<Result<Vec<_>>>()?;

    Ok(Manifest {
        hash: Some(hash),
        layers,
    })
}

fn translate_layer(index: usize, desc: &Descriptor) -> Result<Layer> {
    // URLs are optional for OCI, but the indexer cannot fetch the layer without one.
    let uri = desc
        .urls
        .first()
        .ok_or_else(|| GatewayError::MissingLocation {
            index,
            digest: desc.digest.clone(),
        })?
        .clone();

    if !LAYER_TYPES.contains(&desc.media_type.as_str()) {
        return Err(GatewayError::UnsupportedLayerType {
            index,
            digest: desc.digest.clone(),
            media_type: desc.media_type.clone(),
        });
    }

    let hash = Digest::parse(&desc.digest).map_err(|e| e.in_layer(index))?;

    Ok(Layer {
        hash,
        uri,
        headers: retrieval_headers(&desc.annotations),
    })
}

/// Select `header:`-prefixed annotations as single-valued headers.
pub fn retrieval_headers(annotations: &BTreeMap<String, String>) -> BTreeMap<String, Vec<String>> {
    annotations
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(HEADER_ANNOTATION_PREFIX)
                .map(|name| (name.to_string(), vec![value.clone()]))
        })
        .collect()
}
