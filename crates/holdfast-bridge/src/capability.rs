use std::collections::BTreeMap;
use std::sync::RwLock;

use rand::Rng;

use crate::BridgeError;

/// Opaque tokens mapped to the capability they grant.
#[derive(Debug, Default)]
pub struct CapabilityStore {
    tokens: RwLock<BTreeMap<String, String>>,
}

impl CapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `capability` under a fresh random token.
    pub fn new_capability(&self, capability: impl Into<String>) -> Result<String, BridgeError> {
        let token = (rand::thread_rng().r#gen::<u64>() >> 1).to_string();
        self.tokens
            .write()
            .map_err(|_| BridgeError::internal("lock poisoned"))?
            .insert(token.clone(), capability.into());
        tracing::debug!(token = %token, "capability issued");
        Ok(token)
    }

    /// Returns the capability granted by `token`.
    pub fn validate(&self, token: &str) -> Result<String, BridgeError> {
        self.tokens
            .read()
            .map_err(|_| BridgeError::internal("lock poisoned"))?
            .get(token)
            .cloned()
            .ok_or(BridgeError::InvalidCapability)
    }

    pub fn revoke(&self, token: &str) -> Result<(), BridgeError> {
        self.tokens
            .write()
            .map_err(|_| BridgeError::internal("lock poisoned"))?
            .remove(token)
            .map(|_| ())
            .ok_or(BridgeError::InvalidCapability)
    }

    pub fn tokens(&self) -> Result<Vec<String>, BridgeError> {
        Ok(self
            .tokens
            .read()
            .map_err(|_| BridgeError::internal("lock poisoned"))?
            .keys()
            .cloned()
            .collect())
    }
}
