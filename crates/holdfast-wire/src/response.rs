use holdfast_types::{Entry, Hash, Header, PeerId, Signature, Status};
use serde::{Deserialize, Serialize};

use crate::WireError;

/// A holding node's answer to a hold request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldResp {
    pub status: Status,
    /// Holder's signature over the request fingerprint.
    pub signature: Signature,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GetResp {
    pub entry: Option<Entry>,
    pub entry_type: String,
    pub sources: Vec<PeerId>,
    /// Set when the requested hash was modified; the caller re-gets this hash.
    pub follow_hash: Option<Hash>,
}

/// Peers better placed to hold or serve a hash, nearest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloserPeersResp {
    pub closer_peers: Vec<PeerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedHash {
    pub hash: Hash,
    pub tag: String,
    pub entry_type: String,
    pub source: PeerId,
    pub entry: Option<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkQueryResp {
    pub links: Vec<TaggedHash>,
}

/// Chain data shipped with a validate response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Package {
    /// Marshaled chain subset, when the application asked for one.
    pub chain: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub entry_type: String,
    /// The answering agent's current public key, in text form.
    pub public_key: String,
    pub header: Option<Header>,
    pub entry: Option<Entry>,
    pub package: Package,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    HashNotFound,
    HashDeleted,
    HashRejected,
    LinkNotFound,
    Blocked,
    Other,
}

/// A request that failed on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResp {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Hold(HoldResp),
    Get(GetResp),
    CloserPeers(CloserPeersResp),
    LinkQuery(LinkQueryResp),
    Validate(ValidateResponse),
    App(String),
    DhtChangeOk,
    Error(ErrorResp),
}

impl Response {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(postcard::from_bytes(bytes)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Response::Hold(_) => "HoldResp",
            Response::Get(_) => "GetResp",
            Response::CloserPeers(_) => "CloserPeersResp",
            Response::LinkQuery(_) => "LinkQueryResp",
            Response::Validate(_) => "ValidateResponse",
            Response::App(_) => "AppResponse",
            Response::DhtChangeOk => "DHTChangeOK",
            Response::Error(_) => "ErrorResponse",
        }
    }
}
