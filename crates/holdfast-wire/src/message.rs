use std::fmt::Display;

use holdfast_types::{GetMask, Hash, PeerId, StatusMask, Timestamp};
use serde::{Deserialize, Serialize};

use crate::WireError;

// ============================================================================
// Message Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Action,
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MsgType {
    AppMessage,
    PutRequest,
    GetRequest,
    ModRequest,
    DelRequest,
    LinkRequest,
    GetLinkRequest,
    ListAddRequest,
    CloseRequest,
    OpenRequest,
    MigrateRequest,
    ValidatePutRequest,
    ValidateModRequest,
    ValidateDelRequest,
    ValidateLinkRequest,
    ValidateCloseRequest,
    ValidateOpenRequest,
    ValidateMigrateRequest,
}

impl MsgType {
    pub const ALL: [MsgType; 18] = [
        MsgType::AppMessage,
        MsgType::PutRequest,
        MsgType::GetRequest,
        MsgType::ModRequest,
        MsgType::DelRequest,
        MsgType::LinkRequest,
        MsgType::GetLinkRequest,
        MsgType::ListAddRequest,
        MsgType::CloseRequest,
        MsgType::OpenRequest,
        MsgType::MigrateRequest,
        MsgType::ValidatePutRequest,
        MsgType::ValidateModRequest,
        MsgType::ValidateDelRequest,
        MsgType::ValidateLinkRequest,
        MsgType::ValidateCloseRequest,
        MsgType::ValidateOpenRequest,
        MsgType::ValidateMigrateRequest,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MsgType::AppMessage => "APP_MESSAGE",
            MsgType::PutRequest => "PUT_REQUEST",
            MsgType::GetRequest => "GET_REQUEST",
            MsgType::ModRequest => "MOD_REQUEST",
            MsgType::DelRequest => "DEL_REQUEST",
            MsgType::LinkRequest => "LINK_REQUEST",
            MsgType::GetLinkRequest => "GETLINK_REQUEST",
            MsgType::ListAddRequest => "LISTADD_REQUEST",
            MsgType::CloseRequest => "CLOSE_REQUEST",
            MsgType::OpenRequest => "OPEN_REQUEST",
            MsgType::MigrateRequest => "MIGRATE_REQUEST",
            MsgType::ValidatePutRequest => "VALIDATE_PUT_REQUEST",
            MsgType::ValidateModRequest => "VALIDATE_MOD_REQUEST",
            MsgType::ValidateDelRequest => "VALIDATE_DEL_REQUEST",
            MsgType::ValidateLinkRequest => "VALIDATE_LINK_REQUEST",
            MsgType::ValidateCloseRequest => "VALIDATE_CLOSE_REQUEST",
            MsgType::ValidateOpenRequest => "VALIDATE_OPEN_REQUEST",
            MsgType::ValidateMigrateRequest => "VALIDATE_MIGRATE_REQUEST",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, WireError> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| WireError::UnknownType(name.to_string()))
    }

    pub fn protocol(self) -> Protocol {
        match self {
            MsgType::ValidatePutRequest
            | MsgType::ValidateModRequest
            | MsgType::ValidateDelRequest
            | MsgType::ValidateLinkRequest
            | MsgType::ValidateCloseRequest
            | MsgType::ValidateOpenRequest
            | MsgType::ValidateMigrateRequest => Protocol::Validate,
            _ => Protocol::Action,
        }
    }

    /// The validate-protocol query a holding node sends back to the source
    /// while processing this hold request.
    pub fn validate_request(self) -> Option<MsgType> {
        match self {
            MsgType::PutRequest => Some(MsgType::ValidatePutRequest),
            MsgType::ModRequest => Some(MsgType::ValidateModRequest),
            MsgType::DelRequest => Some(MsgType::ValidateDelRequest),
            MsgType::LinkRequest => Some(MsgType::ValidateLinkRequest),
            MsgType::CloseRequest => Some(MsgType::ValidateCloseRequest),
            MsgType::OpenRequest => Some(MsgType::ValidateOpenRequest),
            MsgType::MigrateRequest => Some(MsgType::ValidateMigrateRequest),
            _ => None,
        }
    }
}

impl Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Request Bodies
// ============================================================================

/// Asks a holding node to validate and store a change to `entry_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldReq {
    pub entry_hash: Hash,
    /// Entry replaced, deleted or linked from, depending on the request type.
    pub related_hash: Option<Hash>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetReq {
    pub hash: Hash,
    pub status_mask: StatusMask,
    pub get_mask: GetMask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkQuery {
    pub base: Hash,
    /// Empty means every tag.
    pub tag: String,
    pub status_mask: StatusMask,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListType {
    Blocked,
    Named(String),
}

impl Display for ListType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListType::Blocked => f.write_str("blockedlist"),
            ListType::Named(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListAddReq {
    pub list_type: ListType,
    /// Base58 peer ids.
    pub peers: Vec<String>,
    pub warrant_type: u8,
    pub warrant: Vec<u8>,
}

/// Asks the source of a change for the data needed to validate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateQuery {
    pub hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppMsg {
    pub zome: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Body {
    Hold(HoldReq),
    Get(GetReq),
    LinkQuery(LinkQuery),
    ListAdd(ListAddReq),
    ValidateQuery(ValidateQuery),
    App(AppMsg),
}

impl Body {
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Hold(_) => "HoldReq",
            Body::Get(_) => "GetReq",
            Body::LinkQuery(_) => "LinkQuery",
            Body::ListAdd(_) => "ListAddReq",
            Body::ValidateQuery(_) => "ValidateQuery",
            Body::App(_) => "AppMsg",
        }
    }
}

// ============================================================================
// Message Envelope
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg_type: MsgType,
    pub from: PeerId,
    pub time: Timestamp,
    pub body: Body,
}

impl Message {
    pub fn new(msg_type: MsgType, from: PeerId, body: Body) -> Self {
        Self {
            msg_type,
            from,
            time: Timestamp::now(),
            body,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        Ok(postcard::from_bytes(bytes)?)
    }

    /// Hash of the encoded message; what a holder signs in its hold response.
    pub fn fingerprint(&self) -> Result<Hash, WireError> {
        Ok(Hash::of(&self.encode()?))
    }

    fn unexpected(&self, expected: &'static str) -> WireError {
        WireError::UnexpectedBody {
            body: self.body.kind(),
            msg_type: self.msg_type.name().to_string(),
            expected,
        }
    }

    pub fn hold_req(&self) -> Result<&HoldReq, WireError> {
        match &self.body {
            Body::Hold(req) => Ok(req),
            _ => Err(self.unexpected("HoldReq")),
        }
    }

    pub fn get_req(&self) -> Result<&GetReq, WireError> {
        match &self.body {
            Body::Get(req) => Ok(req),
            _ => Err(self.unexpected("GetReq")),
        }
    }

    pub fn link_query(&self) -> Result<&LinkQuery, WireError> {
        match &self.body {
            Body::LinkQuery(query) => Ok(query),
            _ => Err(self.unexpected("LinkQuery")),
        }
    }

    pub fn list_add_req(&self) -> Result<&ListAddReq, WireError> {
        match &self.body {
            Body::ListAdd(req) => Ok(req),
            _ => Err(self.unexpected("ListAddReq")),
        }
    }

    pub fn validate_query(&self) -> Result<&ValidateQuery, WireError> {
        match &self.body {
            Body::ValidateQuery(query) => Ok(query),
            _ => Err(self.unexpected("ValidateQuery")),
        }
    }

    pub fn app_msg(&self) -> Result<&AppMsg, WireError> {
        match &self.body {
            Body::App(msg) => Ok(msg),
            _ => Err(self.unexpected("AppMsg")),
        }
    }
}
