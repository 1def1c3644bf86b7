//! Core value types shared across the engine.
//!
//! This module defines strongly-typed hashes, ledger addresses, agreement
//! identifiers and signatures. The goal is to avoid "naked" strings and
//! byte buffers in public APIs and instead use domain-specific newtypes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SquidError;
use crate::id;

/// Decentralized identifiers (`did:op:<id>`).
pub mod did;

pub use did::{DID_PREFIX, Did};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// Used for agreement digests, condition keys and value hashes. It is
/// always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Hashes a sequence of fields, each prefixed with its length.
    ///
    /// The length prefix keeps `["ab", "c"]` and `["a", "bc"]` apart.
    pub fn compute_fields<I, T>(fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut hasher = blake3::Hasher::new();
        for field in fields {
            let bytes = field.as_ref();
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        Hash256(*hasher.finalize().as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Returns the `0x`-prefixed lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// Ledger account address (e.g. `0x00Bd138aBD70e2F00903268F3Db08f2D25677C9e`).
///
/// The engine never interprets the address; it is passed through to the
/// ledger, embedded in download URLs and used as a map key.
#[derive(
    Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Address(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one service agreement.
///
/// Agreement identifiers are address-shaped (`0x` + 64 hex chars) so the
/// ledger can take them as `bytes32` arguments. This keeps them visually
/// distinct from asset identifiers, which never carry the prefix.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgreementId(String);

impl AgreementId {
    /// Generates a fresh, random agreement identifier.
    pub fn generate() -> Self {
        AgreementId(id::generate_prefixed_id())
    }

    /// Wraps an identifier received from elsewhere (events, callers).
    ///
    /// Fails unless the value carries the `0x` prefix.
    pub fn parse(value: &str) -> Result<Self, SquidError> {
        if value.len() > 2 && value.starts_with("0x") {
            Ok(AgreementId(value.to_string()))
        } else {
            Err(SquidError::InvalidAgreementId(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgreementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detached signature bytes produced by the ledger's signer.
///
/// The encoding is whatever the ledger returns; the engine only carries it
/// through to the gateway and to `executeAgreement`. On the wire it is a
/// `0x`-prefixed hex string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    pub fn from_hex(value: &str) -> Result<Self, SquidError> {
        let trimmed = value.strip_prefix("0x").unwrap_or(value);
        hex::decode(trimmed)
            .map(Signature)
            .map_err(|e| SquidError::InvalidSignature(format!("{value}: {e}")))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Signature::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}
