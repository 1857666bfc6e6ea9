use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid capability")]
    InvalidCapability,

    #[error("function not bridged")]
    NotBridged,

    #[error("bridge app not found")]
    AppNotFound,

    #[error("bridge genesis refused by zome {zome}")]
    GenesisRefused { zome: String },

    #[error("bridge genesis failed in zome {zome}: {reason}")]
    GenesisFailed { zome: String, reason: String },

    #[error("invalid bridge spec: {0}")]
    Spec(#[from] serde_json::Error),

    /// Any failure of a bridged call, as seen by the caller.
    #[error("bridging error: {0}")]
    Call(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
