//! Opaque identifiers.
//!
//! Uploads and jobs carry random ids (`f_`/`j_` followed by 32 lowercase
//! hex). Cache keys and file hashes are 64-hex SHA-256 digests. All parsing
//! is strict: anything that does not match the exact shape is rejected
//! before it can reach a store.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::ModelError;

/// Hex-encode a SHA-256 digest of `input`.
pub fn sha256_hex(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

fn is_lowercase_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn new_hex32() -> String {
    Uuid::new_v4().simple().to_string()
}

macro_rules! prefixed_id {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a fresh random id.
            pub fn generate() -> Self {
                Self(format!("{}{}", $prefix, new_hex32()))
            }

            /// Parse and validate an id string.
            pub fn parse(s: &str) -> Result<Self, ModelError> {
                match s.strip_prefix($prefix) {
                    Some(rest) if is_lowercase_hex(rest, 32) => Ok(Self(s.to_string())),
                    _ => Err(ModelError::InvalidId(s.to_string())),
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

prefixed_id!(FileId, "f_", "Opaque handle for an uploaded file (`f_` + 32 lowercase hex).");
prefixed_id!(JobId, "j_", "Opaque handle for a processing job (`j_` + 32 lowercase hex).");

macro_rules! hex64_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse and validate a 64-hex string.
            pub fn parse(s: &str) -> Result<Self, ModelError> {
                if is_lowercase_hex(s, 64) {
                    Ok(Self(s.to_string()))
                } else {
                    Err(ModelError::InvalidId(s.to_string()))
                }
            }

            /// Build from raw bytes by hashing them.
            pub fn digest_of(input: &[u8]) -> Self {
                Self(sha256_hex(input))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

hex64_id!(CacheKey, "Cache key: 64-hex digest of source identity and profile version.");
hex64_id!(FileHash, "SHA-256 of an uploaded file's bytes, 64 lowercase hex.");
