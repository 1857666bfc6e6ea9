//! Actions: the closed set of state changes a node performs or holds.
//!
//! Each variant lives in its own module and implements the polymorphic
//! contract through [`ValidatingAction`] and, when it writes to the local
//! chain, [`CommittingAction`]. Inbound messages are mapped onto
//! [`ActionKind`], whose dispatch is exhaustive.

mod boundary;
mod commit;
mod delete;
mod link;
mod list_add;
mod modify;
mod query;

use holdfast_types::{DataFormat, Entry, EntryDef, Hash, Header, PeerId, SystemType};
use holdfast_wire::{Body, Message, MsgType, Response, WireError};

use crate::error::{NodeError, Result};
use crate::node::Node;
use crate::package::ValidationPackage;

pub use boundary::{BoundaryAction, MigrateAction};
pub use commit::{CommitAction, PutAction};
pub use delete::DelAction;
pub use link::LinkAction;
pub use list_add::ListAddAction;
pub use modify::ModAction;
pub use query::{GetAction, GetLinksAction, GetLinksOptions, GetOptions, GetResult, SendAction};

// ============================================================================
// Contracts
// ============================================================================

/// An action that can be put through the validation engine.
pub trait ValidatingAction: Send + Sync {
    /// Stable discriminator; application callbacks are named after it.
    fn name(&self) -> &'static str;

    /// Structural checks that need no application code.
    fn sys_validation(
        &self,
        def: &EntryDef,
        pkg: &ValidationPackage,
        sources: &[PeerId],
    ) -> Result<()>;

    fn entry(&self) -> Option<&Entry> {
        None
    }

    fn header(&self) -> Option<&Header> {
        None
    }

    /// Hash the entry replaces, deletes, links from or marks a boundary of.
    fn related_hash(&self) -> Option<Hash> {
        None
    }
}

/// An action that appends an entry to the local chain.
pub trait CommittingAction: ValidatingAction {
    fn entry_type(&self) -> &str;

    fn set_header(&mut self, header: Header);

    /// Recorded in the header's `change` field.
    fn change(&self) -> Option<Hash> {
        None
    }

    /// Emits the DHT change requests for a committed entry.
    fn share(&self, node: &Node, def: &EntryDef) -> Result<()>;
}

/// Hash of the committed entry, from the attached header.
pub(crate) fn committed_hash(action: &dyn ValidatingAction) -> Result<Hash> {
    action
        .header()
        .map(|h| h.entry_link)
        .ok_or(NodeError::ActionMissingHeader)
}

// ============================================================================
// ActionKind
// ============================================================================

/// Tag of every action variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Commit,
    Put,
    Mod,
    Del,
    Link,
    Close,
    Open,
    Migrate,
    ListAdd,
    Get,
    GetLinks,
    Send,
}

impl ActionKind {
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::Commit => "commit",
            ActionKind::Put => "put",
            ActionKind::Mod => "mod",
            ActionKind::Del => "del",
            ActionKind::Link => "link",
            ActionKind::Close => "close",
            ActionKind::Open => "open",
            ActionKind::Migrate => "migrate",
            ActionKind::ListAdd => "listAdd",
            ActionKind::Get => "get",
            ActionKind::GetLinks => "getLinks",
            ActionKind::Send => "send",
        }
    }

    /// Maps an action-protocol message onto its action, checking that the
    /// body is the one its tag requires.
    pub fn from_message(msg: &Message) -> Result<Self> {
        let kind = match msg.msg_type {
            MsgType::AppMessage => ActionKind::Send,
            MsgType::PutRequest => ActionKind::Put,
            MsgType::GetRequest => ActionKind::Get,
            MsgType::ModRequest => ActionKind::Mod,
            MsgType::DelRequest => ActionKind::Del,
            MsgType::LinkRequest => ActionKind::Link,
            MsgType::GetLinkRequest => ActionKind::GetLinks,
            MsgType::ListAddRequest => ActionKind::ListAdd,
            MsgType::CloseRequest => ActionKind::Close,
            MsgType::OpenRequest => ActionKind::Open,
            MsgType::MigrateRequest => ActionKind::Migrate,
            other => return Err(WireError::NotInActionProtocol(other.name().to_string()).into()),
        };
        match kind {
            ActionKind::Send => {
                msg.app_msg()?;
            }
            ActionKind::Get => {
                msg.get_req()?;
            }
            ActionKind::GetLinks => {
                msg.link_query()?;
            }
            ActionKind::ListAdd => {
                msg.list_add_req()?;
            }
            _ => {
                msg.hold_req()?;
            }
        }
        Ok(kind)
    }

    /// The action whose data a `VALIDATE_*_REQUEST` asks for.
    pub fn from_validate_type(msg_type: MsgType) -> Result<Self> {
        match msg_type {
            MsgType::ValidatePutRequest => Ok(ActionKind::Put),
            MsgType::ValidateModRequest => Ok(ActionKind::Mod),
            MsgType::ValidateDelRequest => Ok(ActionKind::Del),
            MsgType::ValidateLinkRequest => Ok(ActionKind::Link),
            MsgType::ValidateCloseRequest => Ok(ActionKind::Close),
            MsgType::ValidateOpenRequest => Ok(ActionKind::Open),
            MsgType::ValidateMigrateRequest => Ok(ActionKind::Migrate),
            other => Err(WireError::NotInValidateProtocol(other.name().to_string()).into()),
        }
    }

    /// Check the source runs before answering a validator's request.
    pub fn check_validation_request(self, def: &EntryDef) -> Result<()> {
        if self != ActionKind::Link {
            return Ok(());
        }
        match def.system_type() {
            Some(SystemType::Key) => Err(NodeError::NotValidForKeyType),
            Some(SystemType::Agent) => Err(NodeError::NotValidForAgentType),
            Some(SystemType::Dna) => Err(NodeError::NotValidForDnaType),
            _ if def.data_format != DataFormat::Links => Err(NodeError::NotLinkingEntry),
            _ => Ok(()),
        }
    }

    /// DHT-side handling of an inbound message of this action.
    pub fn receive(self, node: &Node, msg: &Message) -> Result<Response> {
        match self {
            ActionKind::Commit => Err(NodeError::NonDhtAction(self.name())),
            ActionKind::Put => commit::receive_put(node, msg),
            ActionKind::Mod => modify::receive(node, msg),
            ActionKind::Del => delete::receive(node, msg),
            ActionKind::Link => link::receive(node, msg),
            ActionKind::Close | ActionKind::Open => boundary::receive_boundary(node, msg, self),
            ActionKind::Migrate => boundary::receive_migrate(node, msg),
            ActionKind::ListAdd => list_add::receive(node, msg),
            ActionKind::Get => query::receive_get(node, msg),
            ActionKind::GetLinks => query::receive_get_links(node, msg),
            ActionKind::Send => query::receive_app(node, msg),
        }
    }
}

// ============================================================================
// ChainAction
// ============================================================================

/// A committing action, kept whole so a bundle can queue its share step.
#[derive(Debug, Clone)]
pub enum ChainAction {
    Commit(CommitAction),
    Mod(ModAction),
    Del(DelAction),
    Boundary(BoundaryAction),
    Migrate(MigrateAction),
}

impl ChainAction {
    pub fn as_committing(&self) -> &dyn CommittingAction {
        match self {
            ChainAction::Commit(a) => a,
            ChainAction::Mod(a) => a,
            ChainAction::Del(a) => a,
            ChainAction::Boundary(a) => a,
            ChainAction::Migrate(a) => a,
        }
    }

    pub fn as_committing_mut(&mut self) -> &mut dyn CommittingAction {
        match self {
            ChainAction::Commit(a) => a,
            ChainAction::Mod(a) => a,
            ChainAction::Del(a) => a,
            ChainAction::Boundary(a) => a,
            ChainAction::Migrate(a) => a,
        }
    }
}

/// Builds a hold request body for `entry_hash`.
pub(crate) fn hold_body(entry_hash: Hash, related_hash: Option<Hash>) -> Body {
    Body::Hold(holdfast_wire::HoldReq {
        entry_hash,
        related_hash,
    })
}
