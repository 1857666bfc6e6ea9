use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use holdfast_types::{Entry, GetMask, Hash, PeerId, Status, StatusMask};
use holdfast_wire::ListType;

use crate::DhtError;

// ============================================================================
// Records
// ============================================================================

/// A hash held by this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldRecord {
    pub entry_type: String,
    pub entry: Entry,
    pub status: Status,
    pub sources: Vec<PeerId>,
    /// Forward pointer set when the record is modified.
    pub replaced_by: Option<Hash>,
}

/// One add or remove of a `(base, link, tag)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LinkEvent {
    status: Status,
    source: PeerId,
}

/// Latest state of a link, as returned by [`DhtStore::get_links`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub link: Hash,
    pub tag: String,
    pub source: PeerId,
    pub status: Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryKind {
    Close,
    Open,
    Migrate,
}

/// A chain boundary marker recorded against the hash it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryRecord {
    pub kind: BoundaryKind,
    /// Hash of the entry that declared the boundary.
    pub marker: Hash,
    pub source: PeerId,
}

#[derive(Debug, Default)]
struct DhtState {
    records: HashMap<Hash, HeldRecord>,
    links: BTreeMap<(Hash, Hash, String), Vec<LinkEvent>>,
    boundaries: HashMap<Hash, Vec<BoundaryRecord>>,
    lists: HashMap<ListType, Vec<PeerId>>,
    gossipers: HashSet<PeerId>,
}

// ============================================================================
// DhtStore
// ============================================================================

/// The local DHT store of a holding node.
///
/// Every operation takes the store lock once, so each mutation is atomic.
/// Concurrent mutations of one record are last-writer-wins.
#[derive(Debug, Default)]
pub struct DhtStore {
    state: RwLock<DhtState>,
}

impl DhtStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, DhtState>, DhtError> {
        self.state
            .read()
            .map_err(|_| DhtError::internal("lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, DhtState>, DhtError> {
        self.state
            .write()
            .map_err(|_| DhtError::internal("lock poisoned"))
    }

    /// Status of a held hash, if any.
    pub fn status(&self, hash: &Hash) -> Result<Option<Status>, DhtError> {
        Ok(self.read()?.records.get(hash).map(|r| r.status))
    }

    /// Stores a record, or adds `source` to an existing one.
    pub fn put(
        &self,
        hash: Hash,
        entry_type: &str,
        entry: Entry,
        source: PeerId,
        status: Status,
    ) -> Result<(), DhtError> {
        let mut state = self.write()?;
        match state.records.get_mut(&hash) {
            Some(record) => {
                if !record.sources.contains(&source) {
                    record.sources.push(source);
                }
            }
            None => {
                state.records.insert(
                    hash,
                    HeldRecord {
                        entry_type: entry_type.to_string(),
                        entry,
                        status,
                        sources: vec![source],
                        replaced_by: None,
                    },
                );
            }
        }
        tracing::debug!(hash = %hash, %status, "dht record stored");
        Ok(())
    }

    /// Looks up a record, filtered by status and trimmed to `get_mask`.
    ///
    /// With [`StatusMask::DEFAULT`] only live records are returned; deleted,
    /// rejected and modified records yield their redirect error instead.
    pub fn get(
        &self,
        hash: &Hash,
        status_mask: StatusMask,
        get_mask: GetMask,
    ) -> Result<HeldRecord, DhtError> {
        let state = self.read()?;
        let record = state.records.get(hash).ok_or(DhtError::HashNotFound)?;

        if status_mask.is_default() {
            match record.status {
                Status::Live => {}
                Status::Deleted => return Err(DhtError::HashDeleted),
                Status::Rejected => return Err(DhtError::HashRejected),
                Status::Modified => {
                    return Err(DhtError::HashModified {
                        follow: record.replaced_by.unwrap_or(Hash::NULL),
                    });
                }
            }
        } else if !status_mask.accepts(record.status) {
            return Err(DhtError::HashNotFound);
        }

        let mut out = record.clone();
        if !get_mask.includes(GetMask::ENTRY) {
            out.entry = Entry::new("");
        }
        if !get_mask.includes(GetMask::ENTRY_TYPE) {
            out.entry_type.clear();
        }
        if !get_mask.includes(GetMask::SOURCES) {
            out.sources.clear();
        }
        Ok(out)
    }

    fn transition(
        state: &mut DhtState,
        hash: &Hash,
        status: Status,
        replaced_by: Option<Hash>,
    ) -> Result<(), DhtError> {
        let record = state.records.get_mut(hash).ok_or(DhtError::HashNotFound)?;
        match record.status {
            Status::Rejected => return Err(DhtError::HashRejected),
            Status::Deleted if status == Status::Deleted => return Ok(()),
            Status::Deleted => return Err(DhtError::HashDeleted),
            Status::Live | Status::Modified => {}
        }
        record.status = status;
        if replaced_by.is_some() {
            record.replaced_by = replaced_by;
        }
        Ok(())
    }

    /// Marks `old` as modified, pointing at `new`.
    pub fn modify(&self, old: &Hash, new: &Hash) -> Result<(), DhtError> {
        let mut state = self.write()?;
        Self::transition(&mut state, old, Status::Modified, Some(*new))?;
        tracing::debug!(old = %old, new = %new, "dht record modified");
        Ok(())
    }

    pub fn delete(&self, hash: &Hash) -> Result<(), DhtError> {
        let mut state = self.write()?;
        Self::transition(&mut state, hash, Status::Deleted, None)?;
        tracing::debug!(hash = %hash, "dht record deleted");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------------

    pub fn put_link(&self, source: PeerId, base: &Hash, link: &Hash, tag: &str) -> Result<(), DhtError> {
        let mut state = self.write()?;
        let status = state
            .records
            .get(base)
            .map(|r| r.status)
            .ok_or(DhtError::HashNotFound)?;
        if status != Status::Live {
            return Err(DhtError::BaseNotLive {
                base: *base,
                status,
            });
        }
        state
            .links
            .entry((*base, *link, tag.to_string()))
            .or_default()
            .push(LinkEvent {
                status: Status::Live,
                source,
            });
        tracing::debug!(base = %base, link = %link, tag, "link added");
        Ok(())
    }

    pub fn del_link(&self, source: PeerId, base: &Hash, link: &Hash, tag: &str) -> Result<(), DhtError> {
        let mut state = self.write()?;
        let events = state
            .links
            .get_mut(&(*base, *link, tag.to_string()))
            .ok_or(DhtError::LinkNotFound)?;
        events.push(LinkEvent {
            status: Status::Deleted,
            source,
        });
        tracing::debug!(base = %base, link = %link, tag, "link removed");
        Ok(())
    }

    /// Links from `base` whose latest event matches `status_mask`.
    ///
    /// An empty `tag` returns links of every tag. The default mask means live.
    pub fn get_links(
        &self,
        base: &Hash,
        tag: &str,
        status_mask: StatusMask,
    ) -> Result<Vec<LinkRecord>, DhtError> {
        let state = self.read()?;
        let status = state
            .records
            .get(base)
            .map(|r| r.status)
            .ok_or(DhtError::HashNotFound)?;
        if status != Status::Live && status != Status::Modified {
            return Err(DhtError::BaseNotLive {
                base: *base,
                status,
            });
        }
        let mask = if status_mask.is_default() {
            StatusMask::LIVE
        } else {
            status_mask
        };

        let from = (*base, Hash::NULL, String::new());
        let links = state
            .links
            .range(from..)
            .take_while(|((b, _, _), _)| b == base)
            .filter(|((_, _, t), _)| tag.is_empty() || t == tag)
            .filter_map(|((_, link, t), events)| {
                let last = events.last()?;
                mask.accepts(last.status).then(|| LinkRecord {
                    link: *link,
                    tag: t.clone(),
                    source: last.source,
                    status: last.status,
                })
            })
            .collect();
        Ok(links)
    }

    // ------------------------------------------------------------------------
    // Chain boundaries
    // ------------------------------------------------------------------------

    pub fn record_boundary(
        &self,
        target: &Hash,
        kind: BoundaryKind,
        marker: &Hash,
        source: PeerId,
    ) -> Result<(), DhtError> {
        let mut state = self.write()?;
        let records = state.boundaries.entry(*target).or_default();
        if !records.iter().any(|r| r.kind == kind && r.marker == *marker) {
            records.push(BoundaryRecord {
                kind,
                marker: *marker,
                source,
            });
        }
        tracing::debug!(target = %target, ?kind, "chain boundary recorded");
        Ok(())
    }

    pub fn boundaries(&self, target: &Hash) -> Result<Vec<BoundaryRecord>, DhtError> {
        Ok(self
            .read()?
            .boundaries
            .get(target)
            .cloned()
            .unwrap_or_default())
    }

    // ------------------------------------------------------------------------
    // Peer lists and gossip tracking
    // ------------------------------------------------------------------------

    /// Adds peers to a list.
    ///
    /// For the blocked list the peers are also dropped from gossip tracking,
    /// and `on_blocked` runs, inside the same critical section.
    pub fn add_to_list(
        &self,
        list_type: &ListType,
        peers: &[PeerId],
        on_blocked: impl FnOnce(&[PeerId]),
    ) -> Result<(), DhtError> {
        let mut state = self.write()?;
        let list = state.lists.entry(list_type.clone()).or_default();
        for peer in peers {
            if !list.contains(peer) {
                list.push(*peer);
            }
        }
        if *list_type == ListType::Blocked {
            for peer in peers {
                state.gossipers.remove(peer);
            }
            on_blocked(peers);
        }
        tracing::info!(list = %list_type, count = peers.len(), "peers added to list");
        Ok(())
    }

    pub fn get_list(&self, list_type: &ListType) -> Result<Vec<PeerId>, DhtError> {
        Ok(self
            .read()?
            .lists
            .get(list_type)
            .cloned()
            .unwrap_or_default())
    }

    pub fn is_blocked(&self, peer: &PeerId) -> Result<bool, DhtError> {
        Ok(self
            .read()?
            .lists
            .get(&ListType::Blocked)
            .is_some_and(|l| l.contains(peer)))
    }

    /// Starts gossiping with `peer` unless it is blocked.
    ///
    /// `on_admitted` runs inside the same critical section as the block
    /// check, mirroring `on_blocked` in [`DhtStore::add_to_list`], so a peer
    /// is never admitted elsewhere after it has been blocked.
    pub fn admit_peer(
        &self,
        peer: PeerId,
        on_admitted: impl FnOnce(&PeerId),
    ) -> Result<bool, DhtError> {
        let mut state = self.write()?;
        let blocked = state
            .lists
            .get(&ListType::Blocked)
            .is_some_and(|l| l.contains(&peer));
        if blocked {
            return Ok(false);
        }
        state.gossipers.insert(peer);
        on_admitted(&peer);
        Ok(true)
    }

    pub fn is_gossiper(&self, peer: &PeerId) -> Result<bool, DhtError> {
        Ok(self.read()?.gossipers.contains(peer))
    }
}
