//! JSON payloads of the system entry types.
//!
//! Field names are PascalCase on the wire; hashes travel as base58 text.

use serde::{Deserialize, Serialize};

use crate::{Entry, Hash, TypeError};

/// Marks a link spec as a removal.
pub const LINK_ACTION_DEL: &str = "d";

/// Content of a links-format entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinksEntry {
    pub links: Vec<LinkSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LinkSpec {
    pub base: String,
    pub link: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub link_action: String,
}

impl LinkSpec {
    pub fn new(base: &Hash, link: &Hash, tag: impl Into<String>) -> Self {
        Self {
            base: base.to_b58(),
            link: link.to_b58(),
            tag: tag.into(),
            link_action: String::new(),
        }
    }

    /// Turns this spec into a link removal.
    pub fn removal(mut self) -> Self {
        self.link_action = LINK_ACTION_DEL.to_string();
        self
    }

    pub fn is_removal(&self) -> bool {
        self.link_action == LINK_ACTION_DEL
    }

    pub fn base_hash(&self) -> Result<Hash, TypeError> {
        Hash::from_b58(&self.base)
    }

    pub fn link_hash(&self) -> Result<Hash, TypeError> {
        Hash::from_b58(&self.link)
    }
}

impl LinksEntry {
    pub fn new(links: Vec<LinkSpec>) -> Self {
        Self { links }
    }

    pub fn to_entry(&self) -> Result<Entry, TypeError> {
        Ok(Entry::new(serde_json::to_string(self)?))
    }
}

/// Content of a `%del` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DelEntry {
    pub hash: String,
    #[serde(default)]
    pub message: String,
}

impl DelEntry {
    pub fn new(hash: &Hash, message: impl Into<String>) -> Self {
        Self {
            hash: hash.to_b58(),
            message: message.into(),
        }
    }

    pub fn target(&self) -> Result<Hash, TypeError> {
        Hash::from_b58(&self.hash)
    }

    pub fn to_entry(&self) -> Result<Entry, TypeError> {
        Ok(Entry::new(serde_json::to_string(self)?))
    }
}

/// Content of a `%close` or `%open` entry: the hash on the other side of the
/// chain boundary plus a free-form reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundaryEntry {
    pub hash: String,
    #[serde(default)]
    pub message: String,
}

impl BoundaryEntry {
    pub fn new(hash: &Hash, message: impl Into<String>) -> Self {
        Self {
            hash: hash.to_b58(),
            message: message.into(),
        }
    }

    pub fn target(&self) -> Result<Hash, TypeError> {
        Hash::from_b58(&self.hash)
    }

    pub fn to_entry(&self) -> Result<Entry, TypeError> {
        Ok(Entry::new(serde_json::to_string(self)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrateType {
    Close,
    Open,
}

/// Content of a `%migrate` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateEntry {
    #[serde(rename = "Type")]
    pub migrate_type: MigrateType,
    /// DNA hash of the chain on the other side of the migration.
    #[serde(rename = "DNAHash")]
    pub dna_hash: String,
    /// Agent key hash on the other side of the migration.
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Data", default)]
    pub data: String,
}

impl MigrateEntry {
    pub fn new(migrate_type: MigrateType, dna_hash: &Hash, key: &Hash, data: impl Into<String>) -> Self {
        Self {
            migrate_type,
            dna_hash: dna_hash.to_b58(),
            key: key.to_b58(),
            data: data.into(),
        }
    }

    pub fn dna(&self) -> Result<Hash, TypeError> {
        Hash::from_b58(&self.dna_hash)
    }

    pub fn key_hash(&self) -> Result<Hash, TypeError> {
        Hash::from_b58(&self.key)
    }

    pub fn to_entry(&self) -> Result<Entry, TypeError> {
        Ok(Entry::new(serde_json::to_string(self)?))
    }
}

/// Content of an `%agent` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentEntry {
    pub identity: String,
    /// Marshaled self-revocation when this entry records a key rotation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub revocation: String,
    pub public_key: String,
}

impl AgentEntry {
    pub fn to_entry(&self) -> Result<Entry, TypeError> {
        Ok(Entry::new(serde_json::to_string(self)?))
    }
}
