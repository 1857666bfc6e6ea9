//! # holdfast-types: Core types for `holdfast`
//!
//! This crate contains the shared vocabulary of the ledger:
//! - Content addressing ([`struct@Hash`], [`PeerId`])
//! - Temporal types ([`Timestamp`])
//! - Chain records ([`Entry`], [`Header`], [`Signature`])
//! - Entry definitions and application layout ([`EntryDef`], [`Dna`], [`Zome`])
//! - DHT status and query masks ([`Status`], [`StatusMask`], [`GetMask`])
//! - System entry payloads ([`LinksEntry`], [`DelEntry`], [`AgentEntry`], ...)
//! - Schema validation ([`SchemaValidator`], [`JsonSchema`])

use std::{
    fmt::{Debug, Display},
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

mod dna;
mod entry;
mod error;
mod payload;
mod schema;

pub use dna::{Dna, Zome};
pub use entry::{
    AGENT_ENTRY_TYPE, CLOSE_ENTRY_TYPE, DEL_ENTRY_TYPE, DNA_ENTRY_TYPE, DataFormat, Entry,
    EntryDef, HEADERS_ENTRY_TYPE, Header, KEY_ENTRY_TYPE, MIGRATE_ENTRY_TYPE, OPEN_ENTRY_TYPE,
    Sharing, SystemType,
};
pub use error::TypeError;
pub use payload::{
    AgentEntry, BoundaryEntry, DelEntry, LINK_ACTION_DEL, LinkSpec, LinksEntry, MigrateEntry,
    MigrateType,
};
pub use schema::{JsonSchema, SchemaValidator};

// ============================================================================
// Hash - Copy (32-byte sha2-256 digest)
// ============================================================================

/// Length of a content hash digest in bytes.
pub const HASH_LENGTH: usize = 32;

/// Multihash prefix for a sha2-256 digest (code 0x12, length 0x20).
const MULTIHASH_SHA2_256: [u8; 2] = [0x12, 0x20];

/// Content address of an entry, header or public key.
///
/// The text form is the base58 encoding of the multihash bytes, so every
/// hash renders as a 46-character string starting with `Qm`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LENGTH]);

impl Hash {
    /// The null hash (all zeros), used as the link of the first header in a chain.
    pub const NULL: Hash = Hash([0u8; HASH_LENGTH]);

    /// Hashes arbitrary bytes with sha2-256.
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; HASH_LENGTH];
        out.copy_from_slice(&digest);
        Self(out)
    }

    /// Creates a hash from raw digest bytes.
    pub fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// Returns true if this is the null hash.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    /// Parses the base58 multihash text form.
    pub fn from_b58(text: &str) -> Result<Self, TypeError> {
        let raw = bs58::decode(text)
            .into_vec()
            .map_err(|e| TypeError::InvalidHash(e.to_string()))?;
        if raw.len() != HASH_LENGTH + MULTIHASH_SHA2_256.len() {
            return Err(TypeError::InvalidHash(format!(
                "expected {} bytes, got {}",
                HASH_LENGTH + MULTIHASH_SHA2_256.len(),
                raw.len()
            )));
        }
        if raw[..2] != MULTIHASH_SHA2_256 {
            return Err(TypeError::InvalidHash("unknown multihash code".to_string()));
        }
        let mut out = [0u8; HASH_LENGTH];
        out.copy_from_slice(&raw[2..]);
        Ok(Self(out))
    }

    /// Renders the base58 multihash text form.
    pub fn to_b58(&self) -> String {
        let mut raw = Vec::with_capacity(HASH_LENGTH + 2);
        raw.extend_from_slice(&MULTIHASH_SHA2_256);
        raw.extend_from_slice(&self.0);
        bs58::encode(raw).into_string()
    }

    /// XOR distance between two hashes, compared big-endian.
    pub fn distance(&self, other: &Hash) -> [u8; HASH_LENGTH] {
        let mut out = [0u8; HASH_LENGTH];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }
        out
    }
}

impl Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 8 bytes are enough to tell hashes apart in logs
        write!(
            f,
            "Hash({:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5], self.0[6], self.0[7]
        )
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_b58())
    }
}

impl FromStr for Hash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_b58(s)
    }
}

impl Default for Hash {
    fn default() -> Self {
        Self::NULL
    }
}

impl From<[u8; HASH_LENGTH]> for Hash {
    fn from(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ============================================================================
// PeerId - Copy (hash of a marshaled public key)
// ============================================================================

/// Network identity of a node: the hash of its marshaled public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(Hash);

impl PeerId {
    pub fn new(hash: Hash) -> Self {
        Self(hash)
    }

    /// The DHT address of this peer.
    pub fn as_hash(&self) -> &Hash {
        &self.0
    }

    pub fn from_b58(text: &str) -> Result<Self, TypeError> {
        Hash::from_b58(text).map(Self)
    }

    pub fn to_b58(&self) -> String {
        self.0.to_b58()
    }
}

impl Debug for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = self.0.to_b58();
        write!(f, "PeerId({}..)", &text[..text.len().min(10)])
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<PeerId> for Hash {
    fn from(peer: PeerId) -> Self {
        peer.0
    }
}

// ============================================================================
// Timestamp - Copy (nanoseconds since the Unix epoch)
// ============================================================================

/// Wall-clock timestamp stamped into headers and protocol messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The Unix epoch (1970-01-01 00:00:00 UTC).
    pub const EPOCH: Timestamp = Timestamp(0);

    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Creates a timestamp for the current time.
    ///
    /// A clock set before the Unix epoch reads as the epoch.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self(nanos)
    }

    /// Milliseconds elapsed between `self` and `later`, saturating at zero.
    pub fn millis_until(&self, later: Timestamp) -> u64 {
        later.0.saturating_sub(self.0) / 1_000_000
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secs = self.0 / 1_000_000_000;
        let nanos = self.0 % 1_000_000_000;
        write!(f, "{secs}.{nanos:09}")
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::EPOCH
    }
}

// ============================================================================
// Signature - raw signature bytes
// ============================================================================

/// Detached signature bytes as carried in headers and warrants.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

// ============================================================================
// Status - DHT record lifecycle
// ============================================================================

/// Status of a record held on the DHT.
///
/// Values are single bits so that a [`StatusMask`] can select several at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Status {
    Live = 0x01,
    Rejected = 0x02,
    Deleted = 0x04,
    Modified = 0x08,
}

impl Status {
    pub fn bits(self) -> u8 {
        self as u8
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Live => "live",
            Status::Rejected => "rejected",
            Status::Deleted => "deleted",
            Status::Modified => "modified",
        };
        f.write_str(name)
    }
}

/// Selects which record statuses a query accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StatusMask(u8);

impl StatusMask {
    /// Live only, with redirect errors for modified and deleted records.
    pub const DEFAULT: StatusMask = StatusMask(0x00);
    pub const LIVE: StatusMask = StatusMask(0x01);
    pub const REJECTED: StatusMask = StatusMask(0x02);
    pub const DELETED: StatusMask = StatusMask(0x04);
    pub const MODIFIED: StatusMask = StatusMask(0x08);
    pub const ANY: StatusMask = StatusMask(0xFF);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_default(self) -> bool {
        self.0 == 0
    }

    /// Returns true if `status` is selected by this mask.
    pub fn accepts(self, status: Status) -> bool {
        self.0 & status.bits() != 0
    }

    pub fn union(self, other: StatusMask) -> Self {
        Self(self.0 | other.0)
    }
}

/// Selects which parts of a held record a Get returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GetMask(u8);

impl GetMask {
    /// Treated as [`GetMask::ENTRY`].
    pub const DEFAULT: GetMask = GetMask(0x00);
    pub const ENTRY: GetMask = GetMask(0x01);
    pub const ENTRY_TYPE: GetMask = GetMask(0x02);
    pub const SOURCES: GetMask = GetMask(0x04);
    pub const ALL: GetMask = GetMask(0xFF);

    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every bit of `part` is requested.
    pub fn includes(self, part: GetMask) -> bool {
        let effective = if self.0 == 0 { Self::ENTRY.0 } else { self.0 };
        effective & part.0 == part.0
    }

    pub fn union(self, other: GetMask) -> Self {
        Self(self.0 | other.0)
    }
}
