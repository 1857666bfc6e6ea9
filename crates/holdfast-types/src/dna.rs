//! Application layout: a DNA is a set of zomes, each declaring entry types.

use serde::{Deserialize, Serialize};

use crate::{Entry, EntryDef, Hash, SystemType, TypeError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zome {
    pub name: String,
    pub entries: Vec<EntryDef>,
    /// Functions other applications may call through a bridge.
    #[serde(default)]
    pub bridge_funcs: Vec<String>,
    /// Application this zome calls into, if any.
    #[serde(default)]
    pub bridge_to: Option<Hash>,
}

impl Zome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            bridge_funcs: Vec::new(),
            bridge_to: None,
        }
    }

    pub fn with_bridge_funcs<I, S>(mut self, funcs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bridge_funcs.extend(funcs.into_iter().map(Into::into));
        self
    }

    pub fn with_bridge_to(mut self, app: Hash) -> Self {
        self.bridge_to = Some(app);
        self
    }

    pub fn with_entry(mut self, def: EntryDef) -> Self {
        self.entries.push(def);
        self
    }

    pub fn entry_def(&self, name: &str) -> Option<&EntryDef> {
        self.entries.iter().find(|d| d.name == name)
    }
}

/// Application definition. Committed as entry 0 of every chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dna {
    pub name: String,
    pub uuid: String,
    pub zomes: Vec<Zome>,
}

impl Dna {
    pub fn new(name: impl Into<String>, uuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: uuid.into(),
            zomes: Vec::new(),
        }
    }

    pub fn with_zome(mut self, zome: Zome) -> Self {
        self.zomes.push(zome);
        self
    }

    /// Resolves an entry type to its owning zome and definition.
    ///
    /// System types resolve to their singleton definition with no zome.
    pub fn entry_def(&self, entry_type: &str) -> Result<(Option<&Zome>, &EntryDef), TypeError> {
        if let Some(system) = SystemType::from_name(entry_type) {
            return Ok((None, system.def()));
        }
        self.zomes
            .iter()
            .find_map(|z| z.entry_def(entry_type).map(|d| (Some(z), d)))
            .ok_or_else(|| TypeError::NoDefinition(entry_type.to_string()))
    }

    pub fn zome(&self, name: &str) -> Option<&Zome> {
        self.zomes.iter().find(|z| z.name == name)
    }

    pub fn to_entry(&self) -> Result<Entry, TypeError> {
        Ok(Entry::new(serde_json::to_string(self)?))
    }

    pub fn hash(&self) -> Result<Hash, TypeError> {
        Ok(self.to_entry()?.hash())
    }
}
