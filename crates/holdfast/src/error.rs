//! Node-level error type.

use holdfast_bridge::BridgeError;
use holdfast_chain::ChainError;
use holdfast_config::ConfigError;
use holdfast_crypto::CryptoError;
use holdfast_dht::DhtError;
use holdfast_types::{Hash, PeerId, TypeError};
use holdfast_wire::{ErrorKind, ErrorResp, WireError};
use thiserror::Error;

/// Default reason when a validation callback answers `false`.
pub const VALIDATION_FAILED: &str = "Validation Failed";

pub type Result<T, E = NodeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum NodeError {
    // ------------------------------------------------------------------------
    // Structural rejections
    // ------------------------------------------------------------------------
    #[error("Invalid action for DNA type")]
    NotValidForDnaType,

    #[error("Invalid action for Agent type")]
    NotValidForAgentType,

    #[error("Invalid action for Key type")]
    NotValidForKeyType,

    #[error("Invalid action for Headers type")]
    NotValidForHeadersType,

    #[error("Invalid action for Del type")]
    NotValidForDelType,

    #[error("Invalid Entry Definition")]
    EntryDefInvalid,

    #[error("mod: invalid for Links entry")]
    ModInvalidForLinks,

    #[error("mod: missing header")]
    ModMissingHeader,

    #[error("mod: replaces must be different from original hash")]
    ModReplacesHashNotDifferent,

    #[error("nil entry invalid")]
    NilEntryInvalid,

    #[error("Action is missing header")]
    ActionMissingHeader,

    #[error("action only valid for links entry type")]
    LinksOnly,

    #[error("hash not of a linking entry")]
    NotLinkingEntry,

    /// System or application validation said no.
    #[error("{0}")]
    ValidationFailed(String),

    #[error("{callback} should return boolean or string")]
    BadCallbackReturn { callback: String },

    // ------------------------------------------------------------------------
    // Protocol
    // ------------------------------------------------------------------------
    #[error("Action {0} has no DHT counterpart")]
    NonDhtAction(&'static str),

    #[error("expected ValidateQuery got {0}")]
    ExpectedValidateQuery(&'static str),

    #[error("expected {expected} from {peer} got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        peer: PeerId,
        got: &'static str,
    },

    /// A validation response that is not the data the queried hash addresses.
    #[error("validation response from {peer} for {hash} refused: {reason}")]
    ForgedResponse {
        peer: PeerId,
        hash: Hash,
        reason: &'static str,
    },

    #[error("FollowHash loop detected")]
    FollowLoop,

    #[error("nobody should actually get the DNA")]
    DnaNotGettable,

    #[error("List add request rejected on warrant failure: {0}")]
    WarrantRejected(String),

    #[error("unknown warrant type {0}")]
    UnknownWarrantType(u8),

    #[error("warrant property not found")]
    WarrantPropertyNotFound,

    #[error("peer {0} is blocked")]
    Blocked(PeerId),

    #[error("peer {0} is unreachable")]
    Unreachable(PeerId),

    /// An error reported by the remote side of a request.
    #[error("{0}")]
    Remote(String),

    // ------------------------------------------------------------------------
    // Bundles and bridging
    // ------------------------------------------------------------------------
    #[error("chain locked for bundle")]
    ChainLockedForBundle,

    #[error("bundle not started")]
    BundleNotStarted,

    #[error("no bridge host configured")]
    NoBridgeHost,

    #[error("application receive failed: {0}")]
    Receive(String),

    // ------------------------------------------------------------------------
    // Lower layers
    // ------------------------------------------------------------------------
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Dht(#[from] DhtError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl NodeError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn validation_failed(reason: impl Into<String>) -> Self {
        Self::ValidationFailed(reason.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, NodeError::Dht(DhtError::HashNotFound))
    }

    /// Wire classification of this error.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            NodeError::Dht(DhtError::HashNotFound) => ErrorKind::HashNotFound,
            NodeError::Dht(DhtError::HashDeleted) => ErrorKind::HashDeleted,
            NodeError::Dht(DhtError::HashRejected) => ErrorKind::HashRejected,
            NodeError::Dht(DhtError::LinkNotFound) => ErrorKind::LinkNotFound,
            NodeError::Blocked(_) => ErrorKind::Blocked,
            _ => ErrorKind::Other,
        }
    }

    pub fn to_error_resp(&self) -> ErrorResp {
        ErrorResp {
            kind: self.error_kind(),
            message: self.to_string(),
        }
    }

    /// Rebuilds the error a remote peer reported.
    pub fn from_error_resp(resp: ErrorResp) -> Self {
        match resp.kind {
            ErrorKind::HashNotFound => NodeError::Dht(DhtError::HashNotFound),
            ErrorKind::HashDeleted => NodeError::Dht(DhtError::HashDeleted),
            ErrorKind::HashRejected => NodeError::Dht(DhtError::HashRejected),
            ErrorKind::LinkNotFound => NodeError::Dht(DhtError::LinkNotFound),
            ErrorKind::Blocked | ErrorKind::Other => NodeError::Remote(resp.message),
        }
    }
}
