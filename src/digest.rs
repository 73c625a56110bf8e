//! Content-address digests
//!
//! A [`Digest`] is an algorithm-qualified hash such as `sha256:e3b0...`. Parsing
//! checks that the algorithm is one we recognize and that the encoded part is
//! hexadecimal of exactly the length that algorithm produces.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Digest as _;

use crate::error::{GatewayError, Result};

/// Standard SHA256 digest for empty files/layers
pub const EMPTY_LAYER_DIGEST: &str =
    "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Algorithm {
    Sha256,
    Sha512,
}

impl Algorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Size of the raw checksum in bytes.
    pub fn size(&self) -> usize {
        match self {
            Algorithm::Sha256 => 32,
            Algorithm::Sha512 => 64,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "sha256" => Some(Algorithm::Sha256),
            "sha512" => Some(Algorithm::Sha512),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    algorithm: Algorithm,
    checksum: Vec<u8>,
}

impl Digest {
    /// Parse a digest in `algorithm:hex` form.
    ///
    /// The hex part must be lowercase. OCI and most registries also accept
    /// uppercase hex; this parser rejects it so that formatting a parsed
    /// digest always gives back the input string.
    pub fn parse(s: &str) -> Result<Self> {
        let (name, encoded) = s
            .split_once(':')
            .ok_or_else(|| GatewayError::malformed_digest(s, "missing algorithm separator"))?;

        let algorithm = Algorithm::from_name(name).ok_or_else(|| {
            GatewayError::malformed_digest(s, format!("unknown algorithm {:?}", name))
        })?;

        // Uppercase hex would decode but would not survive a round trip.
        if encoded.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(GatewayError::malformed_digest(s, "encoding must be lowercase hex"));
        }

        let checksum = hex::decode(encoded)
            .map_err(|e| GatewayError::malformed_digest(s, format!("unable to decode: {}", e)))?;

        if checksum.len() != algorithm.size() {
            return Err(GatewayError::malformed_digest(
                s,
                format!(
                    "bad checksum length: expected {} bytes, got {}",
                    algorithm.size(),
                    checksum.len()
                ),
            ));
        }

        Ok(Digest {
            algorithm,
            checksum,
        })
    }

    /// Compute the digest of `data` with the given algorithm.
    pub fn of(algorithm: Algorithm, data: &[u8]) -> Self {
        let checksum = match algorithm {
            Algorithm::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Algorithm::Sha512 => sha2::Sha512::digest(data).to_vec(),
        };
        Digest {
            algorithm,
            checksum,
        }
    }

    pub fn sha256(data: &[u8]) -> Self {
        Self::of(Algorithm::Sha256, data)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn checksum(&self) -> &[u8] {
        &self.checksum
    }

    /// Hex encoding of the checksum, without the algorithm prefix.
    pub fn encoded(&self) -> String {
        hex::encode(&self.checksum)
    }

    /// Format digest for display (truncated for readability)
    pub fn short(&self) -> String {
        let full = self.to_string();
        if full.len() > 19 {
            format!("{}...", &full[..19])
        } else {
            full
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.encoded())
    }
}

impl FromStr for Digest {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        Digest::parse(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Deserialize an optional digest, treating a missing or empty string as absent.
pub fn deserialize_optional<'de, D>(deserializer: D) -> std::result::Result<Option<Digest>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => Digest::parse(s).map(Some).map_err(serde::de::Error::custom),
    }
}
