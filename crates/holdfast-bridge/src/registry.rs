//! Bridges held by one application, on either side.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use holdfast_types::Hash;

use crate::{BridgeError, BridgeSpec, CapabilityStore};

/// Which end of a bridge an application sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeSide {
    /// Calls into another application.
    Caller,
    /// Exposes functions to another application.
    Callee,
}

impl fmt::Display for BridgeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeSide::Caller => f.write_str("caller"),
            BridgeSide::Callee => f.write_str("callee"),
        }
    }
}

/// The application code a bridge reaches into.
pub trait BridgeHost: Send + Sync {
    /// Lets `zome` accept or refuse a new bridge. `Err` carries a failure
    /// reported by the zome itself.
    fn bridge_genesis(
        &self,
        zome: &str,
        side: BridgeSide,
        other_app: &Hash,
        app_data: &str,
    ) -> Result<bool, String>;

    /// Invokes an exposed zome function.
    fn call(&self, zome: &str, function: &str, args: &str) -> Result<String, String>;
}

/// One bridge as listed by [`BridgeRegistry::bridges`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bridge {
    pub side: BridgeSide,
    pub app: Hash,
    /// Only known on the callee side.
    pub spec: Option<BridgeSpec>,
}

#[derive(Debug, Clone)]
struct CallerRecord {
    token: String,
    url: String,
}

#[derive(Debug, Default)]
pub struct BridgeRegistry {
    capabilities: CapabilityStore,
    callees: RwLock<BTreeMap<Hash, String>>,
    callers: RwLock<BTreeMap<Hash, CallerRecord>>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capabilities(&self) -> &CapabilityStore {
        &self.capabilities
    }

    /// Registers this application as callee of `from_app`, returning the
    /// token the caller must present.
    ///
    /// Every zome named in `spec` runs bridge genesis. If any refuses, the
    /// token is revoked and the bridge is not recorded.
    pub fn add_bridge_as_callee(
        &self,
        from_app: &Hash,
        spec: &BridgeSpec,
        app_data: &str,
        host: &dyn BridgeHost,
    ) -> Result<String, BridgeError> {
        let token = self.capabilities.new_capability(spec.encode()?)?;

        for zome in spec.zomes() {
            if let Err(e) = run_genesis(host, zome, BridgeSide::Callee, from_app, app_data) {
                self.capabilities.revoke(&token)?;
                return Err(e);
            }
        }

        self.callees
            .write()
            .map_err(|_| BridgeError::internal("lock poisoned"))?
            .insert(*from_app, token.clone());
        tracing::info!(app = %from_app, "bridge added as callee");
        Ok(token)
    }

    /// Registers this application as caller of `to_app`. Genesis runs for
    /// each zome in `zomes` that bridges to that application.
    pub fn add_bridge_as_caller(
        &self,
        to_app: &Hash,
        token: &str,
        url: &str,
        zomes: &[&str],
        app_data: &str,
        host: &dyn BridgeHost,
    ) -> Result<(), BridgeError> {
        for zome in zomes {
            run_genesis(host, zome, BridgeSide::Caller, to_app, app_data)?;
        }

        self.callers
            .write()
            .map_err(|_| BridgeError::internal("lock poisoned"))?
            .insert(
                *to_app,
                CallerRecord {
                    token: token.to_string(),
                    url: url.to_string(),
                },
            );
        tracing::info!(app = %to_app, url, "bridge added as caller");
        Ok(())
    }

    /// Token and url for calling into `to_app`.
    pub fn bridge_token(&self, to_app: &Hash) -> Result<(String, String), BridgeError> {
        self.callers
            .read()
            .map_err(|_| BridgeError::internal("lock poisoned"))?
            .get(to_app)
            .map(|r| (r.token.clone(), r.url.clone()))
            .ok_or(BridgeError::AppNotFound)
    }

    /// Serves a call arriving over a bridge. All failures come back as
    /// [`BridgeError::Call`].
    pub fn bridge_call(
        &self,
        zome: &str,
        function: &str,
        args: &str,
        token: &str,
        host: &dyn BridgeHost,
    ) -> Result<String, BridgeError> {
        let granted = self
            .capabilities
            .validate(token)
            .map_err(|e| BridgeError::Call(e.to_string()))?;
        let spec = BridgeSpec::decode(&granted).map_err(|e| BridgeError::Call(e.to_string()))?;
        if !spec.allows(zome, function) {
            tracing::warn!(zome, function, "refused unbridged call");
            return Err(BridgeError::Call(BridgeError::NotBridged.to_string()));
        }
        host.call(zome, function, args).map_err(BridgeError::Call)
    }

    /// Every bridge on either side.
    pub fn bridges(&self) -> Result<Vec<Bridge>, BridgeError> {
        let mut out = Vec::new();
        for (app, token) in self
            .callees
            .read()
            .map_err(|_| BridgeError::internal("lock poisoned"))?
            .iter()
        {
            let spec = match self.capabilities.validate(token) {
                Ok(granted) => Some(BridgeSpec::decode(&granted)?),
                Err(BridgeError::InvalidCapability) => None,
                Err(e) => return Err(e),
            };
            out.push(Bridge {
                side: BridgeSide::Callee,
                app: *app,
                spec,
            });
        }
        for app in self
            .callers
            .read()
            .map_err(|_| BridgeError::internal("lock poisoned"))?
            .keys()
        {
            out.push(Bridge {
                side: BridgeSide::Caller,
                app: *app,
                spec: None,
            });
        }
        Ok(out)
    }
}

fn run_genesis(
    host: &dyn BridgeHost,
    zome: &str,
    side: BridgeSide,
    other_app: &Hash,
    app_data: &str,
) -> Result<(), BridgeError> {
    match host.bridge_genesis(zome, side, other_app, app_data) {
        Ok(true) => Ok(()),
        Ok(false) => Err(BridgeError::GenesisRefused {
            zome: zome.to_string(),
        }),
        Err(reason) => Err(BridgeError::GenesisFailed {
            zome: zome.to_string(),
            reason,
        }),
    }
}
