//! The node's agent identity.
//!
//! Identity is global mutable state: a key rotation changes the signing key,
//! the peer id and the agent entry at once. [`AgentContext`] keeps all of it
//! behind one lock and changes it only through [`AgentContext::rotate`].

use std::sync::{RwLock, RwLockReadGuard};

use holdfast_crypto::{SelfRevocation, SigningKey, VerifyingKey};
use holdfast_types::{AgentEntry, Entry, Hash, Header, KEY_ENTRY_TYPE, PeerId, Signature, Timestamp};

use crate::error::{NodeError, Result};

#[derive(Debug)]
struct AgentIdentity {
    name: String,
    key: SigningKey,
    /// Marshaled revocation of the previous key, once rotated.
    revocation: String,
}

/// Outcome of a key rotation.
#[derive(Debug, Clone)]
pub struct Rotation {
    pub old_peer: PeerId,
    pub new_peer: PeerId,
    pub old_key: VerifyingKey,
    pub revocation: SelfRevocation,
}

#[derive(Debug)]
pub struct AgentContext {
    identity: RwLock<AgentIdentity>,
}

impl AgentContext {
    pub fn new(name: impl Into<String>, key: SigningKey) -> Self {
        Self {
            identity: RwLock::new(AgentIdentity {
                name: name.into(),
                key,
                revocation: String::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, AgentIdentity>> {
        self.identity
            .read()
            .map_err(|_| NodeError::internal("lock poisoned"))
    }

    pub fn name(&self) -> Result<String> {
        Ok(self.read()?.name.clone())
    }

    pub fn public_key(&self) -> Result<VerifyingKey> {
        Ok(self.read()?.key.verifying_key())
    }

    pub fn peer_id(&self) -> Result<PeerId> {
        Ok(self.public_key()?.peer_id())
    }

    pub(crate) fn signing_key(&self) -> Result<SigningKey> {
        Ok(self.read()?.key.clone())
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        Ok(self.read()?.key.sign(message))
    }

    /// Content of the `%agent` entry for the current identity.
    pub fn agent_entry(&self) -> Result<Entry> {
        let identity = self.read()?;
        Ok(AgentEntry {
            identity: identity.name.clone(),
            revocation: identity.revocation.clone(),
            public_key: identity.key.verifying_key().to_b58(),
        }
        .to_entry()?)
    }

    /// The virtual `%key` entry: the public key text, addressed by peer id.
    pub fn key_entry(&self) -> Result<Entry> {
        Ok(Entry::new(self.public_key()?.to_b58()))
    }

    /// Header served with the `%key` entry. It is never on the chain, so it
    /// links to nothing and its entry link is the peer id.
    pub(crate) fn key_header(&self) -> Result<Header> {
        let identity = self.read()?;
        let entry_link = Hash::from(identity.key.verifying_key().peer_id());
        Ok(Header {
            entry_type: KEY_ENTRY_TYPE.to_string(),
            time: Timestamp::now(),
            header_link: Hash::NULL,
            entry_link,
            type_link: Hash::NULL,
            signature: identity.key.sign(entry_link.as_bytes()),
            change: None,
        })
    }

    /// Replaces the signing key, recording a revocation signed by both keys.
    pub(crate) fn rotate(&self, new_key: SigningKey, payload: &[u8]) -> Result<Rotation> {
        let mut identity = self
            .identity
            .write()
            .map_err(|_| NodeError::internal("lock poisoned"))?;
        let old_key = identity.key.verifying_key();
        let revocation = SelfRevocation::new(&identity.key, &new_key, payload);
        identity.revocation = revocation.marshal()?;
        identity.key = new_key;

        let rotation = Rotation {
            old_peer: old_key.peer_id(),
            new_peer: identity.key.verifying_key().peer_id(),
            old_key,
            revocation,
        };
        tracing::info!(old = %rotation.old_peer, new = %rotation.new_peer, "agent key rotated");
        Ok(rotation)
    }
}
