use holdfast_types::{DataFormat, Entry, EntryDef, Hash, Header, PeerId, Status, SystemType};
use holdfast_wire::{Message, MsgType, Response};

use super::{CommittingAction, ValidatingAction, committed_hash, hold_body};
use crate::error::{NodeError, Result};
use crate::node::Node;
use crate::package::ValidationPackage;
use crate::validate::sys_validate_entry;

/// Replaces an entry with a new one.
#[derive(Debug, Clone)]
pub struct ModAction {
    entry_type: String,
    entry: Option<Entry>,
    header: Option<Header>,
    replaces: Hash,
}

impl ModAction {
    pub fn new(entry_type: impl Into<String>, entry: Entry, replaces: Hash) -> Self {
        Self {
            entry_type: entry_type.into(),
            entry: Some(entry),
            header: None,
            replaces,
        }
    }

    pub fn replaces(&self) -> &Hash {
        &self.replaces
    }
}

impl ValidatingAction for ModAction {
    fn name(&self) -> &'static str {
        "mod"
    }

    fn sys_validation(&self, def: &EntryDef, pkg: &ValidationPackage, _sources: &[PeerId]) -> Result<()> {
        match def.system_type() {
            Some(SystemType::Dna) => return Err(NodeError::NotValidForDnaType),
            Some(SystemType::Headers) => return Err(NodeError::NotValidForHeadersType),
            Some(SystemType::Del) => return Err(NodeError::NotValidForDelType),
            _ => {}
        }
        if def.data_format == DataFormat::Links {
            return Err(NodeError::ModInvalidForLinks);
        }
        if self.entry.is_none() {
            return Err(NodeError::NilEntryInvalid);
        }
        let Some(header) = &self.header else {
            return Err(NodeError::ModMissingHeader);
        };
        if self.replaces == header.entry_link {
            return Err(NodeError::ModReplacesHashNotDifferent);
        }
        sys_validate_entry(def, self.entry.as_ref(), pkg)
    }

    fn entry(&self) -> Option<&Entry> {
        self.entry.as_ref()
    }

    fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    fn related_hash(&self) -> Option<Hash> {
        Some(self.replaces)
    }
}

impl CommittingAction for ModAction {
    fn entry_type(&self) -> &str {
        &self.entry_type
    }

    fn set_header(&mut self, header: Header) {
        self.header = Some(header);
    }

    fn change(&self) -> Option<Hash> {
        Some(self.replaces)
    }

    fn share(&self, node: &Node, def: &EntryDef) -> Result<()> {
        if !def.is_sharing_public() {
            return Ok(());
        }
        let hash = committed_hash(self)?;
        node.change(&hash, MsgType::PutRequest, hold_body(hash, None))?;
        node.change(
            &self.replaces,
            MsgType::ModRequest,
            hold_body(hash, Some(self.replaces)),
        )
    }
}

/// Marks the replaced record modified, pointing at the new entry.
pub(super) fn receive(node: &Node, msg: &Message) -> Result<Response> {
    let hold = msg.hold_req()?;
    let replaces = hold
        .related_hash
        .ok_or_else(|| NodeError::validation_failed("mod request has no replaced hash"))?;
    let (resp, pkg) = node.fetch_validation_response(msg, &hold.entry_hash)?;
    let action = ModAction {
        entry_type: resp.entry_type.clone(),
        entry: resp.entry,
        header: resp.header,
        replaces,
    };
    node.validate_action(&action, &resp.entry_type, &pkg, &[msg.from])
        .inspect_err(|e| tracing::warn!(hash = %hold.entry_hash, error = %e, "mod rejected"))?;

    node.dht().modify(&replaces, &hold.entry_hash)?;
    node.stats().record_hold();
    node.hold_response(msg, Status::Live)
}
