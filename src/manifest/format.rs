//! Content-type dispatch
//!
//! Maps a request's declared content type onto the canonicalizer for that wire
//! format. An empty content type or plain `application/json` is treated as the
//! native format.

use std::fmt;

use super::{Manifest, native, oci};
use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Native,
    OciImage,
}

impl ManifestFormat {
    /// Select a format from a `Content-Type` value. Parameters are ignored.
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let essence = match content_type.split_once(';') {
            Some((essence, _params)) => essence,
            None => content_type,
        }
        .trim();

        match essence {
            oci::MEDIA_TYPE => Ok(ManifestFormat::OciImage),
            native::MEDIA_TYPE | "application/json" | "" => Ok(ManifestFormat::Native),
            other => Err(GatewayError::UnsupportedMediaType(other.to_string())),
        }
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            ManifestFormat::Native => native::MEDIA_TYPE,
            ManifestFormat::OciImage => oci::MEDIA_TYPE,
        }
    }

    /// Translate a body in this format into the canonical model.
    pub fn canonicalize(&self, body: &[u8]) -> Result<Manifest> {
        match self {
            ManifestFormat::Native => native::canonicalize(body),
            ManifestFormat::OciImage => oci::canonicalize(body),
        }
    }
}

impl fmt::Display for ManifestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestFormat::Native => write!(f, "native"),
            ManifestFormat::OciImage => write!(f, "oci"),
        }
    }
}
