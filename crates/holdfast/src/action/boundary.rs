//! Chain boundaries: closing a chain, opening its successor, migrating.

use holdfast_dht::BoundaryKind;
use holdfast_types::{
    BoundaryEntry, CLOSE_ENTRY_TYPE, Entry, EntryDef, Hash, Header, MIGRATE_ENTRY_TYPE,
    MigrateEntry, OPEN_ENTRY_TYPE, PeerId, Status, SystemType,
};
use holdfast_wire::{Message, MsgType, Response};

use super::{ActionKind, CommittingAction, ValidatingAction, committed_hash, hold_body};
use crate::error::{NodeError, Result};
use crate::node::Node;
use crate::package::ValidationPackage;
use crate::validate::sys_validate_entry;

// ============================================================================
// Close / Open
// ============================================================================

/// A `%close` or `%open` marker naming the chain on the other side.
#[derive(Debug, Clone)]
pub struct BoundaryAction {
    kind: BoundaryKind,
    target: Hash,
    entry: Entry,
    header: Option<Header>,
}

impl BoundaryAction {
    pub fn close(target: &Hash, message: impl Into<String>) -> Result<Self> {
        Self::new(BoundaryKind::Close, target, message)
    }

    pub fn open(target: &Hash, message: impl Into<String>) -> Result<Self> {
        Self::new(BoundaryKind::Open, target, message)
    }

    fn new(kind: BoundaryKind, target: &Hash, message: impl Into<String>) -> Result<Self> {
        Ok(Self {
            kind,
            target: *target,
            entry: BoundaryEntry::new(target, message).to_entry()?,
            header: None,
        })
    }

    fn from_entry(kind: BoundaryKind, entry: Entry, header: Option<Header>) -> Result<Self> {
        let boundary: BoundaryEntry = entry.decode_json()?;
        Ok(Self {
            kind,
            target: boundary.target()?,
            entry,
            header,
        })
    }

    pub fn kind(&self) -> BoundaryKind {
        self.kind
    }

    pub fn target(&self) -> &Hash {
        &self.target
    }

    fn system_type(&self) -> SystemType {
        if self.kind == BoundaryKind::Open {
            SystemType::Open
        } else {
            SystemType::Close
        }
    }

    fn request_type(&self) -> MsgType {
        if self.kind == BoundaryKind::Open {
            MsgType::OpenRequest
        } else {
            MsgType::CloseRequest
        }
    }
}

impl ValidatingAction for BoundaryAction {
    fn name(&self) -> &'static str {
        if self.kind == BoundaryKind::Open {
            "open"
        } else {
            "close"
        }
    }

    fn sys_validation(&self, def: &EntryDef, _pkg: &ValidationPackage, _sources: &[PeerId]) -> Result<()> {
        if def.system_type() != Some(self.system_type()) {
            return Err(NodeError::EntryDefInvalid);
        }
        Ok(())
    }

    fn entry(&self) -> Option<&Entry> {
        Some(&self.entry)
    }

    fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    fn related_hash(&self) -> Option<Hash> {
        Some(self.target)
    }
}

impl CommittingAction for BoundaryAction {
    fn entry_type(&self) -> &str {
        if self.kind == BoundaryKind::Open {
            OPEN_ENTRY_TYPE
        } else {
            CLOSE_ENTRY_TYPE
        }
    }

    fn set_header(&mut self, header: Header) {
        self.header = Some(header);
    }

    fn share(&self, node: &Node, def: &EntryDef) -> Result<()> {
        if !def.is_sharing_public() {
            return Ok(());
        }
        let hash = committed_hash(self)?;
        node.change(&hash, MsgType::PutRequest, hold_body(hash, None))?;
        node.change(
            &self.target,
            self.request_type(),
            hold_body(hash, Some(self.target)),
        )
    }
}

pub(super) fn receive_boundary(node: &Node, msg: &Message, kind: ActionKind) -> Result<Response> {
    let kind = if kind == ActionKind::Open {
        BoundaryKind::Open
    } else {
        BoundaryKind::Close
    };
    let hold = msg.hold_req()?;
    let (resp, pkg) = node.fetch_validation_response(msg, &hold.entry_hash)?;
    let entry = resp.entry.ok_or(NodeError::NilEntryInvalid)?;
    let action = BoundaryAction::from_entry(kind, entry, resp.header)?;
    node.validate_action(&action, &resp.entry_type, &pkg, &[msg.from])
        .inspect_err(|e| tracing::warn!(hash = %hold.entry_hash, error = %e, "boundary rejected"))?;

    node.dht()
        .record_boundary(&action.target, kind, &hold.entry_hash, msg.from)?;
    node.stats().record_hold();
    node.hold_response(msg, Status::Live)
}

// ============================================================================
// Migrate
// ============================================================================

/// Records that this agent moved to or from a chain of another DNA.
#[derive(Debug, Clone)]
pub struct MigrateAction {
    migrate: MigrateEntry,
    dna: Hash,
    entry: Entry,
    header: Option<Header>,
}

impl MigrateAction {
    pub fn new(migrate: MigrateEntry) -> Result<Self> {
        Ok(Self {
            dna: migrate.dna()?,
            entry: migrate.to_entry()?,
            migrate,
            header: None,
        })
    }

    fn from_entry(entry: Entry, header: Option<Header>) -> Result<Self> {
        let migrate: MigrateEntry = entry.decode_json()?;
        Ok(Self {
            dna: migrate.dna()?,
            migrate,
            entry,
            header,
        })
    }

    pub fn migrate(&self) -> &MigrateEntry {
        &self.migrate
    }
}

impl ValidatingAction for MigrateAction {
    fn name(&self) -> &'static str {
        "migrate"
    }

    fn sys_validation(&self, def: &EntryDef, pkg: &ValidationPackage, _sources: &[PeerId]) -> Result<()> {
        if def.system_type() != Some(SystemType::Migrate) {
            return Err(NodeError::EntryDefInvalid);
        }
        if self.header.is_none() {
            return Err(NodeError::ActionMissingHeader);
        }
        sys_validate_entry(def, Some(&self.entry), pkg)
    }

    fn entry(&self) -> Option<&Entry> {
        Some(&self.entry)
    }

    fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    fn related_hash(&self) -> Option<Hash> {
        Some(self.dna)
    }
}

impl CommittingAction for MigrateAction {
    fn entry_type(&self) -> &str {
        MIGRATE_ENTRY_TYPE
    }

    fn set_header(&mut self, header: Header) {
        self.header = Some(header);
    }

    /// Holders of the other DNA's hash learn of the migration.
    fn share(&self, node: &Node, def: &EntryDef) -> Result<()> {
        if !def.is_sharing_public() {
            return Ok(());
        }
        let hash = committed_hash(self)?;
        node.change(&hash, MsgType::PutRequest, hold_body(hash, None))?;
        node.change(
            &self.dna,
            MsgType::MigrateRequest,
            hold_body(hash, Some(self.dna)),
        )
    }
}

pub(super) fn receive_migrate(node: &Node, msg: &Message) -> Result<Response> {
    let hold = msg.hold_req()?;
    let (resp, pkg) = node.fetch_validation_response(msg, &hold.entry_hash)?;
    let entry = resp.entry.ok_or(NodeError::NilEntryInvalid)?;
    let action = MigrateAction::from_entry(entry, resp.header)?;
    node.validate_action(&action, &resp.entry_type, &pkg, &[msg.from])
        .inspect_err(|e| tracing::warn!(hash = %hold.entry_hash, error = %e, "migrate rejected"))?;

    node.dht().record_boundary(
        &action.dna,
        BoundaryKind::Migrate,
        &hold.entry_hash,
        msg.from,
    )?;
    node.stats().record_hold();
    node.hold_response(msg, Status::Live)
}
