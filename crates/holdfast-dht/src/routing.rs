//! Peer table ordered by XOR distance to a hash.

use std::collections::BTreeSet;
use std::sync::RwLock;

use holdfast_types::{Hash, PeerId};

use crate::DhtError;

/// Default number of peers that should hold each hash.
pub const CLOSER_PEER_COUNT: usize = 10;

/// Number of peers queried in parallel per lookup round.
pub const ALPHA: usize = 3;

#[derive(Debug)]
pub struct PeerTable {
    self_id: RwLock<PeerId>,
    peers: RwLock<BTreeSet<PeerId>>,
}

impl PeerTable {
    pub fn new(self_id: PeerId) -> Self {
        Self {
            self_id: RwLock::new(self_id),
            peers: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn self_id(&self) -> Result<PeerId, DhtError> {
        self.self_id
            .read()
            .map(|id| *id)
            .map_err(|_| DhtError::internal("lock poisoned"))
    }

    /// Replaces this node's own identity after a key rotation.
    pub fn set_self_id(&self, id: PeerId) -> Result<(), DhtError> {
        let mut current = self
            .self_id
            .write()
            .map_err(|_| DhtError::internal("lock poisoned"))?;
        *current = id;
        Ok(())
    }

    pub fn add(&self, peer: PeerId) -> Result<(), DhtError> {
        if peer == self.self_id()? {
            return Ok(());
        }
        self.peers
            .write()
            .map_err(|_| DhtError::internal("lock poisoned"))?
            .insert(peer);
        Ok(())
    }

    pub fn remove(&self, peer: &PeerId) -> Result<bool, DhtError> {
        Ok(self
            .peers
            .write()
            .map_err(|_| DhtError::internal("lock poisoned"))?
            .remove(peer))
    }

    pub fn contains(&self, peer: &PeerId) -> Result<bool, DhtError> {
        Ok(self
            .peers
            .read()
            .map_err(|_| DhtError::internal("lock poisoned"))?
            .contains(peer))
    }

    pub fn len(&self) -> Result<usize, DhtError> {
        Ok(self
            .peers
            .read()
            .map_err(|_| DhtError::internal("lock poisoned"))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool, DhtError> {
        Ok(self.len()? == 0)
    }

    fn sorted(hash: &Hash, mut candidates: Vec<PeerId>) -> Vec<PeerId> {
        candidates.sort_by_key(|p| p.as_hash().distance(hash));
        candidates
    }

    /// Up to `count` known peers nearest to `hash`, nearest first.
    pub fn nearest_peers(&self, hash: &Hash, count: usize) -> Result<Vec<PeerId>, DhtError> {
        let peers: Vec<PeerId> = self
            .peers
            .read()
            .map_err(|_| DhtError::internal("lock poisoned"))?
            .iter()
            .copied()
            .collect();
        let mut sorted = Self::sorted(hash, peers);
        sorted.truncate(count);
        Ok(sorted)
    }

    /// Peers better placed than this node to hold `hash`.
    ///
    /// Takes the `count` nearest candidates (this node included when
    /// `include_self`). If this node is among them the answer is empty;
    /// otherwise the candidates are returned nearest first, minus `requester`.
    pub fn better_peers_for_hash(
        &self,
        hash: &Hash,
        requester: &PeerId,
        include_self: bool,
        count: usize,
    ) -> Result<Vec<PeerId>, DhtError> {
        let self_id = self.self_id()?;
        let mut candidates: Vec<PeerId> = self
            .peers
            .read()
            .map_err(|_| DhtError::internal("lock poisoned"))?
            .iter()
            .copied()
            .collect();
        if include_self {
            candidates.push(self_id);
        }
        let mut sorted = Self::sorted(hash, candidates);
        sorted.truncate(count);
        if include_self && sorted.contains(&self_id) {
            return Ok(Vec::new());
        }
        sorted.retain(|p| p != requester);
        Ok(sorted)
    }
}
