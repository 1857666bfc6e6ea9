//! Entries, headers and entry definitions.

use std::fmt::Debug;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::schema::{JsonSchema, SchemaValidator};
use crate::{Hash, Signature, Timestamp, TypeError};

pub const DNA_ENTRY_TYPE: &str = "%dna";
pub const AGENT_ENTRY_TYPE: &str = "%agent";
pub const KEY_ENTRY_TYPE: &str = "%key";
pub const HEADERS_ENTRY_TYPE: &str = "%header";
pub const DEL_ENTRY_TYPE: &str = "%del";
pub const MIGRATE_ENTRY_TYPE: &str = "%migrate";
pub const CLOSE_ENTRY_TYPE: &str = "%close";
pub const OPEN_ENTRY_TYPE: &str = "%open";

// ============================================================================
// Entry
// ============================================================================

/// Opaque entry content. Its hash is the hash of the content bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    content: String,
}

impl Entry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn hash(&self) -> Hash {
        Hash::of(self.content.as_bytes())
    }

    /// Decodes the content as JSON into `T`.
    pub fn decode_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, TypeError> {
        serde_json::from_str(&self.content).map_err(TypeError::from)
    }
}

// ============================================================================
// Header
// ============================================================================

/// Signed chain record pointing at an entry and at the previous header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub entry_type: String,
    pub time: Timestamp,
    /// Hash of the previous header, or [`Hash::NULL`] for the first one.
    pub header_link: Hash,
    pub entry_link: Hash,
    /// Hash of the previous header of the same entry type.
    pub type_link: Hash,
    /// Signature over the `entry_link` bytes.
    pub signature: Signature,
    /// Entry replaced or deleted by this commit, if any.
    pub change: Option<Hash>,
}

impl Header {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypeError> {
        postcard::to_allocvec(self).map_err(TypeError::from)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypeError> {
        postcard::from_bytes(bytes).map_err(TypeError::from)
    }

    /// Hash of the marshaled header. This is the value the next header links to.
    pub fn hash(&self) -> Result<Hash, TypeError> {
        Ok(Hash::of(&self.to_bytes()?))
    }
}

// ============================================================================
// EntryDef
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Json,
    String,
    RawScript,
    Links,
    /// The base58 text of a public key.
    SysKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sharing {
    Public,
    Partial,
    Private,
}

/// Built-in entry types with structural validation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemType {
    Dna,
    Agent,
    Key,
    Headers,
    Del,
    Migrate,
    Close,
    Open,
}

impl SystemType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            DNA_ENTRY_TYPE => Some(Self::Dna),
            AGENT_ENTRY_TYPE => Some(Self::Agent),
            KEY_ENTRY_TYPE => Some(Self::Key),
            HEADERS_ENTRY_TYPE => Some(Self::Headers),
            DEL_ENTRY_TYPE => Some(Self::Del),
            MIGRATE_ENTRY_TYPE => Some(Self::Migrate),
            CLOSE_ENTRY_TYPE => Some(Self::Close),
            OPEN_ENTRY_TYPE => Some(Self::Open),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Dna => DNA_ENTRY_TYPE,
            Self::Agent => AGENT_ENTRY_TYPE,
            Self::Key => KEY_ENTRY_TYPE,
            Self::Headers => HEADERS_ENTRY_TYPE,
            Self::Del => DEL_ENTRY_TYPE,
            Self::Migrate => MIGRATE_ENTRY_TYPE,
            Self::Close => CLOSE_ENTRY_TYPE,
            Self::Open => OPEN_ENTRY_TYPE,
        }
    }

    /// The singleton definition for this system type.
    pub fn def(self) -> &'static EntryDef {
        &SYSTEM_DEFS[self as usize]
    }
}

/// Declares an entry type: its format, sharing policy and optional schema.
#[derive(Clone, Serialize, Deserialize)]
pub struct EntryDef {
    pub name: String,
    pub data_format: DataFormat,
    pub sharing: Sharing,
    #[serde(skip)]
    pub schema: Option<Arc<dyn SchemaValidator>>,
    #[serde(skip)]
    system: Option<SystemType>,
}

impl EntryDef {
    /// Declares an application entry type.
    pub fn new(name: impl Into<String>, data_format: DataFormat, sharing: Sharing) -> Self {
        Self {
            name: name.into(),
            data_format,
            sharing,
            schema: None,
            system: None,
        }
    }

    pub fn with_schema(mut self, schema: Arc<dyn SchemaValidator>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Attaches a JSON Schema given in text form.
    pub fn with_json_schema(self, text: &str) -> Result<Self, TypeError> {
        Ok(self.with_schema(Arc::new(JsonSchema::compile(text)?)))
    }

    /// The system type this definition is the singleton for.
    ///
    /// Application definitions always return `None`, even when named like a
    /// system type, so identity checks cannot be spoofed by name.
    pub fn system_type(&self) -> Option<SystemType> {
        self.system
    }

    pub fn is_system(&self) -> bool {
        self.system.is_some()
    }

    /// Links are always shared: link resolution depends on DHT presence.
    pub fn is_sharing_public(&self) -> bool {
        self.sharing == Sharing::Public || self.data_format == DataFormat::Links
    }
}

impl Debug for EntryDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryDef")
            .field("name", &self.name)
            .field("data_format", &self.data_format)
            .field("sharing", &self.sharing)
            .field("schema", &self.schema.is_some())
            .field("system", &self.system)
            .finish()
    }
}

fn system_def(system: SystemType, data_format: DataFormat, schema: Option<Value>) -> EntryDef {
    EntryDef {
        name: system.name().to_string(),
        data_format,
        sharing: Sharing::Public,
        schema: schema.map(|s| Arc::new(JsonSchema::deferred(s)) as Arc<dyn SchemaValidator>),
        system: Some(system),
    }
}

/// Schema requiring every field in `fields` to be a string.
fn string_fields(fields: &[&str]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| ((*f).to_string(), json!({ "type": "string" })))
        .collect();
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": properties,
        "required": fields,
    })
}

// Indexed by `SystemType as usize`.
static SYSTEM_DEFS: LazyLock<[EntryDef; 8]> = LazyLock::new(|| {
    let boundary = || string_fields(&["Hash", "Message"]);
    [
        system_def(SystemType::Dna, DataFormat::Json, None),
        system_def(SystemType::Agent, DataFormat::Json, None),
        system_def(SystemType::Key, DataFormat::SysKey, None),
        system_def(SystemType::Headers, DataFormat::Json, None),
        system_def(SystemType::Del, DataFormat::Json, Some(boundary())),
        system_def(
            SystemType::Migrate,
            DataFormat::Json,
            Some(string_fields(&["Type", "DNAHash", "Key", "Data"])),
        ),
        system_def(SystemType::Close, DataFormat::Json, Some(boundary())),
        system_def(SystemType::Open, DataFormat::Json, Some(boundary())),
    ]
});
