//! Deterministic ids for names no account database knows about
//!
//! id = fold(digest(salt || name || salt)), where fold reads the digest as
//! big-endian 64-bit lanes, xors them together and keeps the low 32 bits.
//! For md5 that is exactly `high_half ^ low_half`. Collisions are possible
//! and are not detected.

use std::fmt;
use std::str::FromStr;

use byteorder::{BigEndian, ByteOrder};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{GuidError, Result};

/// Digest used to derive ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Sha256,
}

impl HashAlgorithm {
    fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Md5 => Md5::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = GuidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(HashAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            _ => Err(GuidError::HashAlgorithmUnavailable(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Md5 => f.write_str("md5"),
            HashAlgorithm::Sha256 => f.write_str("sha256"),
        }
    }
}

/// Xor-fold a digest into 32 bits
#[inline]
fn fold(digest: &[u8]) -> i32 {
    let x = digest.chunks_exact(8).fold(0u64, |acc, lane| acc ^ BigEndian::read_u64(lane));
    x as i32
}

/// Derive the id for `name` under `salt`
pub fn generate(algorithm: HashAlgorithm, salt: &str, name: &str) -> i32 {
    let mut buf = Vec::with_capacity(salt.len() * 2 + name.len());
    buf.extend_from_slice(salt.as_bytes());
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(salt.as_bytes());
    fold(&algorithm.digest(&buf))
}

/// Salt-bound generator owned by a resolver
#[derive(Debug, Clone)]
pub struct IdGenerator {
    salt: String,
    algorithm: HashAlgorithm,
}

impl IdGenerator {
    pub fn new(salt: impl Into<String>, algorithm: HashAlgorithm) -> Self {
        Self { salt: salt.into(), algorithm }
    }

    /// Build from a digest name, e.g. "md5"
    pub fn with_algorithm_name(salt: impl Into<String>, algorithm: &str) -> Result<Self> {
        Ok(Self::new(salt, algorithm.parse()?))
    }

    #[inline]
    pub fn generate(&self, name: &str) -> i32 {
        generate(self.algorithm, &self.salt, name)
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}
