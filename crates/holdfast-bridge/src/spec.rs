use std::collections::{BTreeMap, BTreeSet};

use crate::BridgeError;

const WILDCARD: &str = "*";

/// Zome functions reachable through a bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeSpec {
    /// Every function of every zome.
    Wildcard,
    Functions(BTreeMap<String, BTreeSet<String>>),
}

impl BridgeSpec {
    /// Builds a spec from `(zome, bridged functions)` pairs, skipping zomes
    /// that bridge nothing.
    pub fn from_zomes<'a>(
        zomes: impl IntoIterator<Item = (&'a str, &'a [String])>,
    ) -> Self {
        let functions = zomes
            .into_iter()
            .filter(|(_, funcs)| !funcs.is_empty())
            .map(|(zome, funcs)| (zome.to_string(), funcs.iter().cloned().collect()))
            .collect();
        Self::Functions(functions)
    }

    pub fn allows(&self, zome: &str, function: &str) -> bool {
        match self {
            BridgeSpec::Wildcard => true,
            BridgeSpec::Functions(map) => map.get(zome).is_some_and(|f| f.contains(function)),
        }
    }

    /// Zomes named by the spec; empty for the wildcard.
    pub fn zomes(&self) -> Vec<&str> {
        match self {
            BridgeSpec::Wildcard => Vec::new(),
            BridgeSpec::Functions(map) => map.keys().map(String::as_str).collect(),
        }
    }

    pub fn encode(&self) -> Result<String, BridgeError> {
        match self {
            BridgeSpec::Wildcard => Ok(WILDCARD.to_string()),
            BridgeSpec::Functions(map) => Ok(serde_json::to_string(map)?),
        }
    }

    pub fn decode(text: &str) -> Result<Self, BridgeError> {
        if text == WILDCARD {
            return Ok(BridgeSpec::Wildcard);
        }
        Ok(BridgeSpec::Functions(serde_json::from_str(text)?))
    }
}
