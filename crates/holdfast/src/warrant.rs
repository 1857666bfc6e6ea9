//! Warrants: self-contained proofs attached to peer-list changes.
//!
//! A warrant travels as a type tag plus bytes. The [`WarrantRegistry`] maps
//! each tag to a decoder; decoded warrants verify themselves against the
//! receiving node's DHT.

use std::collections::BTreeMap;
use std::fmt::Debug;

use holdfast_crypto::SelfRevocation;
use holdfast_dht::{DhtError, DhtStore};
use holdfast_types::{GetMask, Hash, StatusMask};
use serde_json::Value;

use crate::error::{NodeError, Result};

/// Warrant type of [`SelfRevocationWarrant`].
pub const SELF_REVOCATION_WARRANT: u8 = 0;

pub trait Warrant: Send + Sync + Debug {
    fn warrant_type(&self) -> u8;

    /// Hashes of the identities the warrant speaks about.
    fn parties(&self) -> Result<Vec<Hash>>;

    fn property(&self, key: &str) -> Result<Value>;

    /// Checks the warrant's proof and its consistency with `dht`.
    fn verify(&self, dht: &DhtStore) -> Result<()>;

    fn encode(&self) -> Result<Vec<u8>>;
}

pub type WarrantDecoder = fn(&[u8]) -> Result<Box<dyn Warrant>>;

#[derive(Debug, Clone)]
pub struct WarrantRegistry {
    decoders: BTreeMap<u8, WarrantDecoder>,
}

impl WarrantRegistry {
    /// A registry with no decoders at all.
    pub fn empty() -> Self {
        Self {
            decoders: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, warrant_type: u8, decoder: WarrantDecoder) {
        self.decoders.insert(warrant_type, decoder);
    }

    pub fn decode(&self, warrant_type: u8, bytes: &[u8]) -> Result<Box<dyn Warrant>> {
        let decoder = self
            .decoders
            .get(&warrant_type)
            .ok_or(NodeError::UnknownWarrantType(warrant_type))?;
        decoder(bytes)
    }
}

impl Default for WarrantRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(SELF_REVOCATION_WARRANT, SelfRevocationWarrant::decode);
        registry
    }
}

// ============================================================================
// SelfRevocationWarrant
// ============================================================================

/// An agent's own statement that its old key is retired.
///
/// Verifies when both keys signed the revocation and the DHT already shows
/// the old key modified into the new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfRevocationWarrant {
    revocation: SelfRevocation,
}

impl SelfRevocationWarrant {
    pub fn new(revocation: SelfRevocation) -> Self {
        Self { revocation }
    }

    pub fn revocation(&self) -> &SelfRevocation {
        &self.revocation
    }

    fn decode(bytes: &[u8]) -> Result<Box<dyn Warrant>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| NodeError::validation_failed(format!("warrant is not text: {e}")))?;
        Ok(Box::new(Self::new(SelfRevocation::unmarshal(text)?)))
    }
}

impl Warrant for SelfRevocationWarrant {
    fn warrant_type(&self) -> u8 {
        SELF_REVOCATION_WARRANT
    }

    /// Old key, then new key.
    fn parties(&self) -> Result<Vec<Hash>> {
        Ok(vec![
            self.revocation.old_key()?.peer_id().into(),
            self.revocation.new_key()?.peer_id().into(),
        ])
    }

    fn property(&self, key: &str) -> Result<Value> {
        if key != "payload" {
            return Err(NodeError::WarrantPropertyNotFound);
        }
        let payload = self.revocation.payload()?;
        Ok(Value::String(String::from_utf8_lossy(payload).into_owned()))
    }

    fn verify(&self, dht: &DhtStore) -> Result<()> {
        self.revocation.verify()?;
        let parties = self.parties()?;
        match dht.get(&parties[0], StatusMask::DEFAULT, GetMask::DEFAULT) {
            Err(DhtError::HashModified { follow }) if follow == parties[1] => Ok(()),
            Err(DhtError::HashModified { .. }) => Err(NodeError::validation_failed(
                "expected old key to point to new key on DHT",
            )),
            _ => Err(NodeError::validation_failed(
                "expected old key to be modified on DHT",
            )),
        }
    }

    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.revocation.marshal()?.into_bytes())
    }
}
