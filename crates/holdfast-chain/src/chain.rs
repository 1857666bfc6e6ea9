use std::collections::HashMap;

use holdfast_crypto::{SelfRevocation, SigningKey, VerifyingKey};
use holdfast_types::{AGENT_ENTRY_TYPE, AgentEntry, Entry, Hash, Header, Timestamp};

use crate::ChainError;

/// A header built for a specific chain position, not yet appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedHeader {
    pub index: usize,
    pub hash: Hash,
    pub header: Header,
}

/// An agent's append-only chain of headers and entries.
#[derive(Debug, Default, Clone)]
pub struct Chain {
    hashes: Vec<Hash>,
    headers: Vec<Header>,
    entries: Vec<Entry>,
    /// Index of the latest header of each entry type.
    type_tops: HashMap<String, usize>,
    header_index: HashMap<Hash, usize>,
    entry_index: HashMap<Hash, usize>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Hash and header of the latest position.
    pub fn top(&self) -> Option<(Hash, &Header)> {
        let last = self.headers.len().checked_sub(1)?;
        Some((self.hashes[last], &self.headers[last]))
    }

    /// Hash and header of the latest position holding `entry_type`.
    pub fn top_type(&self, entry_type: &str) -> Option<(Hash, &Header)> {
        let i = *self.type_tops.get(entry_type)?;
        Some((self.hashes[i], &self.headers[i]))
    }

    /// Builds and signs the header for the next chain position.
    ///
    /// The returned index is only valid while the chain length is unchanged;
    /// [`Chain::add_entry`] refuses a stale one.
    pub fn prepare_header(
        &self,
        now: Timestamp,
        entry_type: &str,
        entry: &Entry,
        key: &SigningKey,
        change: Option<Hash>,
    ) -> Result<PreparedHeader, ChainError> {
        let entry_link = entry.hash();
        let header = Header {
            entry_type: entry_type.to_string(),
            time: now,
            header_link: self.top().map_or(Hash::NULL, |(h, _)| h),
            entry_link,
            type_link: self.top_type(entry_type).map_or(Hash::NULL, |(h, _)| h),
            signature: key.sign(entry_link.as_bytes()),
            change,
        };
        Ok(PreparedHeader {
            index: self.len(),
            hash: header.hash()?,
            header,
        })
    }

    /// Appends a prepared header and its entry.
    pub fn add_entry(&mut self, prepared: PreparedHeader, entry: Entry) -> Result<(), ChainError> {
        let PreparedHeader {
            index,
            hash,
            header,
        } = prepared;
        if index != self.len() {
            return Err(ChainError::IndexMismatch {
                expected: index,
                actual: self.len(),
            });
        }
        tracing::debug!(index, entry_type = %header.entry_type, hash = %hash, "chain entry appended");
        self.type_tops.insert(header.entry_type.clone(), index);
        self.header_index.insert(hash, index);
        self.entry_index.insert(header.entry_link, index);
        self.hashes.push(hash);
        self.headers.push(header);
        self.entries.push(entry);
        Ok(())
    }

    /// Header hash, header and entry at position `index`.
    pub fn get(&self, index: usize) -> Option<(Hash, &Header, &Entry)> {
        Some((
            *self.hashes.get(index)?,
            self.headers.get(index)?,
            self.entries.get(index)?,
        ))
    }

    pub fn get_entry(&self, entry_hash: &Hash) -> Option<(&Entry, &str)> {
        let i = *self.entry_index.get(entry_hash)?;
        Some((&self.entries[i], self.headers[i].entry_type.as_str()))
    }

    pub fn get_entry_header(&self, entry_hash: &Hash) -> Option<(Hash, &Header)> {
        let i = *self.entry_index.get(entry_hash)?;
        Some((self.hashes[i], &self.headers[i]))
    }

    pub fn get_header(&self, header_hash: &Hash) -> Option<&Header> {
        self.header_index
            .get(header_hash)
            .map(|&i| &self.headers[i])
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Visits positions from the top of the chain down to the first entry.
    pub fn walk<E>(
        &self,
        mut visit: impl FnMut(Hash, &Header, &Entry) -> Result<(), E>,
    ) -> Result<(), E> {
        for i in (0..self.len()).rev() {
            visit(self.hashes[i], &self.headers[i], &self.entries[i])?;
        }
        Ok(())
    }

    /// Checks header links, header signatures and, unless `skip_entries`,
    /// entry hashes. `signer` is the agent's current key.
    pub fn validate(&self, signer: &VerifyingKey, skip_entries: bool) -> Result<(), ChainError> {
        check_links(&self.headers, &self.entries, skip_entries)?;
        let records: Vec<_> = self
            .headers
            .iter()
            .zip(&self.entries)
            .enumerate()
            .map(|(index, (header, entry))| (index, header, Some(entry)))
            .collect();
        check_signatures(&records, signer)
    }
}

pub(crate) fn check_links(
    headers: &[Header],
    entries: &[Entry],
    skip_entries: bool,
) -> Result<(), ChainError> {
    let mut previous = Hash::NULL;
    for (index, header) in headers.iter().enumerate() {
        if header.header_link != previous {
            return Err(ChainError::BrokenLink { index });
        }
        if !skip_entries {
            if let Some(entry) = entries.get(index) {
                if entry.hash() != header.entry_link {
                    return Err(ChainError::EntryMismatch { index });
                }
            }
        }
        previous = header.hash()?;
    }
    Ok(())
}

/// Verifies every header signature from the top down.
///
/// Headers above a rotated `%agent` entry are signed by the key it introduced
/// and headers below it by the key its revocation retires, so walking down
/// swaps to the old key after checking the revocation.
pub(crate) fn check_signatures(
    records: &[(usize, &Header, Option<&Entry>)],
    signer: &VerifyingKey,
) -> Result<(), ChainError> {
    let mut key = signer.clone();
    for &(index, header, entry) in records.iter().rev() {
        key.verify(header.entry_link.as_bytes(), &header.signature)
            .map_err(|_| ChainError::BadSignature { index })?;
        if header.entry_type != AGENT_ENTRY_TYPE {
            continue;
        }
        if let Some(retired) = retired_key(index, entry, &key)? {
            tracing::trace!(index, "following key rotation down the chain");
            key = retired;
        }
    }
    Ok(())
}

fn retired_key(
    index: usize,
    entry: Option<&Entry>,
    current: &VerifyingKey,
) -> Result<Option<VerifyingKey>, ChainError> {
    let Some(entry) = entry else {
        return Ok(None);
    };
    let agent: AgentEntry = entry.decode_json()?;
    if agent.revocation.is_empty() {
        return Ok(None);
    }
    let revocation = SelfRevocation::unmarshal(&agent.revocation)?;
    revocation.verify()?;
    if revocation.new_key()? != *current {
        return Err(ChainError::RevocationMismatch { index });
    }
    Ok(Some(revocation.old_key()?))
}
