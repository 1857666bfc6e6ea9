//! Marshaled chain subsets, as shipped inside validation packages.

use holdfast_crypto::VerifyingKey;
use holdfast_types::{AGENT_ENTRY_TYPE, Entry, Header};
use serde::{Deserialize, Serialize};

use crate::chain::{check_links, check_signatures};
use crate::{Chain, ChainError};

/// Controls which parts of the chain are marshaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MarshalFlags(u8);

impl MarshalFlags {
    pub const NONE: MarshalFlags = MarshalFlags(0x00);
    pub const NO_HEADERS: MarshalFlags = MarshalFlags(0x01);
    pub const NO_ENTRIES: MarshalFlags = MarshalFlags(0x02);
    pub const OMIT_DNA: MarshalFlags = MarshalFlags(0x04);

    pub fn contains(self, flag: MarshalFlags) -> bool {
        self.0 & flag.0 == flag.0 && flag.0 != 0
    }

    pub fn union(self, other: MarshalFlags) -> Self {
        Self(self.0 | other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceEntry {
    Omitted,
    /// Entry of a private type: present on the chain but never shipped.
    Private,
    Present(Entry),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceRecord {
    pub header: Option<Header>,
    pub entry: SliceEntry,
}

/// A decoded chain subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSlice {
    /// True when no position was filtered out, so header links can be checked.
    pub contiguous: bool,
    pub records: Vec<SliceRecord>,
}

impl Chain {
    /// Marshals the chain, or the positions whose type is in `types`.
    ///
    /// Position 0 (the DNA) survives a type filter unless `OMIT_DNA` is set.
    /// `%agent` positions survive every filter, entries included, so a
    /// receiver can follow key rotations when checking signatures.
    /// Entries of `private_types` are replaced by a placeholder.
    pub fn marshal(
        &self,
        flags: MarshalFlags,
        types: &[String],
        private_types: &[String],
    ) -> Result<Vec<u8>, ChainError> {
        let mut records = Vec::new();
        let mut contiguous = true;
        for (i, (header, entry)) in self.headers().iter().zip(self.entries()).enumerate() {
            let is_agent = header.entry_type == AGENT_ENTRY_TYPE;
            let selected = if i == 0 {
                !flags.contains(MarshalFlags::OMIT_DNA)
            } else {
                is_agent || types.is_empty() || types.contains(&header.entry_type)
            };
            if !selected {
                contiguous = false;
                continue;
            }
            let entry = if flags.contains(MarshalFlags::NO_ENTRIES) && !is_agent {
                SliceEntry::Omitted
            } else if private_types.contains(&header.entry_type) {
                SliceEntry::Private
            } else {
                SliceEntry::Present(entry.clone())
            };
            let header = (!flags.contains(MarshalFlags::NO_HEADERS)).then(|| header.clone());
            records.push(SliceRecord { header, entry });
        }
        let slice = ChainSlice {
            contiguous,
            records,
        };
        Ok(postcard::to_allocvec(&slice)?)
    }
}

impl ChainSlice {
    pub fn unmarshal(bytes: &[u8]) -> Result<Self, ChainError> {
        Ok(postcard::from_bytes(bytes)?)
    }

    pub fn has_headers(&self) -> bool {
        self.records.iter().any(|r| r.header.is_some())
    }

    pub fn headers(&self) -> impl Iterator<Item = &Header> {
        self.records.iter().filter_map(|r| r.header.as_ref())
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.records.iter().filter_map(|r| match &r.entry {
            SliceEntry::Present(e) => Some(e),
            SliceEntry::Omitted | SliceEntry::Private => None,
        })
    }

    /// Checks entry hashes against their headers, header signatures against
    /// `signer` (the source agent's current key), and header links when the
    /// slice is contiguous.
    pub fn validate(&self, signer: &VerifyingKey) -> Result<(), ChainError> {
        if self.contiguous && self.records.iter().all(|r| r.header.is_some()) {
            let headers: Vec<Header> = self.headers().cloned().collect();
            check_links(&headers, &[], true)?;
        }
        for (index, record) in self.records.iter().enumerate() {
            if let (Some(header), SliceEntry::Present(entry)) = (&record.header, &record.entry) {
                if entry.hash() != header.entry_link {
                    return Err(ChainError::EntryMismatch { index });
                }
            }
        }
        let signed: Vec<_> = self
            .records
            .iter()
            .enumerate()
            .filter_map(|(index, r)| {
                let entry = match &r.entry {
                    SliceEntry::Present(e) => Some(e),
                    SliceEntry::Omitted | SliceEntry::Private => None,
                };
                r.header.as_ref().map(|h| (index, h, entry))
            })
            .collect();
        check_signatures(&signed, signer)
    }
}
