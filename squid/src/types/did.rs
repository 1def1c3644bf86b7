//! Decentralized identifiers.
//!
//! A [`Did`] is the canonical reference to an asset: `did:op:<id>`, where
//! `<id>` is the bare asset identifier. The `0x` prefix is reserved for raw
//! ledger addresses and agreement ids, so an id segment starting with `0x`
//! is rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SquidError;
use crate::id;

/// Literal prefix of every DID handled by this crate.
pub const DID_PREFIX: &str = "did:op:";

/// Parsed decentralized identifier.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Did {
    id: String,
}

impl Did {
    /// Parses `text` into a [`Did`].
    ///
    /// Fails with [`SquidError::InvalidDidFormat`] when the prefix is
    /// missing, the id segment is empty, or the id segment starts with `0x`.
    pub fn parse(text: &str) -> Result<Self, SquidError> {
        match text.strip_prefix(DID_PREFIX) {
            Some(id) if !id.is_empty() && !id.starts_with("0x") => Ok(Did { id: id.to_string() }),
            _ => Err(SquidError::InvalidDidFormat(text.to_string())),
        }
    }

    /// Wraps a freshly generated identifier.
    pub fn generate() -> Self {
        Did {
            id: id::generate_id(),
        }
    }

    /// Returns the bare id segment (no `did:op:` prefix).
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DID_PREFIX}{}", self.id)
    }
}

impl FromStr for Did {
    type Err = SquidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Did::parse(s)
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Did::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_did_roundtrips_through_its_string_form() {
        let did = Did::generate();
        let parsed = Did::parse(&did.to_string()).expect("generated DID should parse");
        assert_eq!(parsed, did);
        assert_eq!(parsed.id(), did.id());
    }

    #[test]
    fn address_shaped_id_segment_is_rejected() {
        let err = Did::parse("did:op:0xabc123").unwrap_err();
        assert!(
            matches!(err, SquidError::InvalidDidFormat(_)),
            "unexpected: {err:?}"
        );
    }

    #[test]
    fn missing_prefix_is_rejected() {
        for text in ["not-a-did", "did:ex:abc", "", "did:op:"] {
            let err = Did::parse(text).unwrap_err();
            assert!(
                matches!(err, SquidError::InvalidDidFormat(_)),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn display_adds_prefix_and_id_strips_it() {
        let did: Did = "did:op:4d517500da0acb0d65a716f61330969334630363ce4a6a9d39691026ac7908ea"
            .parse()
            .unwrap();
        assert_eq!(
            did.id(),
            "4d517500da0acb0d65a716f61330969334630363ce4a6a9d39691026ac7908ea"
        );
        assert!(did.to_string().starts_with(DID_PREFIX));
    }

    #[test]
    fn serde_uses_the_canonical_string() {
        let did = Did::parse("did:op:abc").unwrap();
        assert_eq!(serde_json::to_string(&did).unwrap(), "\"did:op:abc\"");
        assert!(serde_json::from_str::<Did>("\"did:op:0x12\"").is_err());
    }
}
