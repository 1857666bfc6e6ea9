use holdfast_types::{
    DEL_ENTRY_TYPE, DelEntry, Entry, EntryDef, Hash, Header, PeerId, Status, SystemType,
};
use holdfast_wire::{Message, MsgType, Response};

use super::{CommittingAction, ValidatingAction, committed_hash, hold_body};
use crate::error::{NodeError, Result};
use crate::node::Node;
use crate::package::ValidationPackage;

/// Marks an entry deleted by committing a `%del` entry that names it.
#[derive(Debug, Clone)]
pub struct DelAction {
    del: DelEntry,
    target: Hash,
    entry: Entry,
    header: Option<Header>,
}

impl DelAction {
    pub fn new(target: &Hash, message: impl Into<String>) -> Result<Self> {
        let del = DelEntry::new(target, message);
        Ok(Self {
            entry: del.to_entry()?,
            target: *target,
            del,
            header: None,
        })
    }

    fn from_entry(entry: Entry, header: Option<Header>) -> Result<Self> {
        let del: DelEntry = entry.decode_json()?;
        Ok(Self {
            target: del.target()?,
            del,
            entry,
            header,
        })
    }

    pub fn target(&self) -> &Hash {
        &self.target
    }

    pub fn message(&self) -> &str {
        &self.del.message
    }
}

impl ValidatingAction for DelAction {
    fn name(&self) -> &'static str {
        "del"
    }

    fn sys_validation(&self, def: &EntryDef, _pkg: &ValidationPackage, _sources: &[PeerId]) -> Result<()> {
        if def.system_type() != Some(SystemType::Del) {
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

impl CommittingAction for DelAction {
    fn entry_type(&self) -> &str {
        DEL_ENTRY_TYPE
    }

    fn set_header(&mut self, header: Header) {
        self.header = Some(header);
    }

    fn change(&self) -> Option<Hash> {
        Some(self.target)
    }

    fn share(&self, node: &Node, def: &EntryDef) -> Result<()> {
        if !def.is_sharing_public() {
            return Ok(());
        }
        let hash = committed_hash(self)?;
        node.change(&hash, MsgType::PutRequest, hold_body(hash, None))?;
        node.change(
            &self.target,
            MsgType::DelRequest,
            hold_body(hash, Some(self.target)),
        )
    }
}

pub(super) fn receive(node: &Node, msg: &Message) -> Result<Response> {
    let hold = msg.hold_req()?;
    let (resp, pkg) = node.fetch_validation_response(msg, &hold.entry_hash)?;
    let entry = resp.entry.ok_or(NodeError::NilEntryInvalid)?;
    let action = DelAction::from_entry(entry, resp.header)?;
    node.validate_action(&action, &resp.entry_type, &pkg, &[msg.from])
        .inspect_err(|e| tracing::warn!(hash = %hold.entry_hash, error = %e, "del rejected"))?;

    node.dht().delete(&action.target)?;
    node.stats().record_hold();
    tracing::info!(target = %action.target, "record deleted");
    node.hold_response(msg, Status::Live)
}
