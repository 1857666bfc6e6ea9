use std::collections::BTreeSet;

use holdfast_types::{DataFormat, Entry, EntryDef, Header, LinksEntry, PeerId, Status};
use holdfast_wire::{CloserPeersResp, Message, MsgType, Response, ValidateResponse};

use super::{CommittingAction, ValidatingAction, committed_hash, hold_body};
use crate::error::Result;
use crate::node::Node;
use crate::package::ValidationPackage;
use crate::validate::sys_validate_entry;

// ============================================================================
// Commit
// ============================================================================

/// Appends an entry to the local chain and shares it.
#[derive(Debug, Clone)]
pub struct CommitAction {
    entry_type: String,
    entry: Option<Entry>,
    header: Option<Header>,
}

impl CommitAction {
    pub fn new(entry_type: impl Into<String>, entry: Entry) -> Self {
        Self {
            entry_type: entry_type.into(),
            entry: Some(entry),
            header: None,
        }
    }
}

impl ValidatingAction for CommitAction {
    fn name(&self) -> &'static str {
        "commit"
    }

    fn sys_validation(&self, def: &EntryDef, pkg: &ValidationPackage, _sources: &[PeerId]) -> Result<()> {
        sys_validate_entry(def, self.entry.as_ref(), pkg)
    }

    fn entry(&self) -> Option<&Entry> {
        self.entry.as_ref()
    }

    fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }
}

impl CommittingAction for CommitAction {
    fn entry_type(&self) -> &str {
        &self.entry_type
    }

    fn set_header(&mut self, header: Header) {
        self.header = Some(header);
    }

    /// Links entries go to the holders of each base, then public entries are put.
    fn share(&self, node: &Node, def: &EntryDef) -> Result<()> {
        let hash = committed_hash(self)?;
        if def.data_format == DataFormat::Links {
            if let Some(entry) = &self.entry {
                let links: LinksEntry = entry.decode_json()?;
                let mut bases = BTreeSet::new();
                for link in &links.links {
                    bases.insert(link.base_hash()?);
                }
                for base in bases {
                    node.change(&base, MsgType::LinkRequest, hold_body(hash, Some(base)))?;
                }
            }
        }
        if def.is_sharing_public() {
            node.change(&hash, MsgType::PutRequest, hold_body(hash, None))?;
        }
        Ok(())
    }
}

// ============================================================================
// Put
// ============================================================================

/// A holding node's re-validation of an entry some source committed.
#[derive(Debug, Clone)]
pub struct PutAction {
    entry_type: String,
    entry: Option<Entry>,
    header: Option<Header>,
}

impl PutAction {
    pub(crate) fn from_response(resp: &ValidateResponse) -> Self {
        Self {
            entry_type: resp.entry_type.clone(),
            entry: resp.entry.clone(),
            header: resp.header.clone(),
        }
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }
}

impl ValidatingAction for PutAction {
    fn name(&self) -> &'static str {
        "put"
    }

    fn sys_validation(&self, def: &EntryDef, pkg: &ValidationPackage, _sources: &[PeerId]) -> Result<()> {
        sys_validate_entry(def, self.entry.as_ref(), pkg)
    }

    fn entry(&self) -> Option<&Entry> {
        self.entry.as_ref()
    }

    fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }
}

/// Holds a put. A hash already held in any status answers with that status
/// and is not validated again.
pub(super) fn receive_put(node: &Node, msg: &Message) -> Result<Response> {
    let hash = msg.hold_req()?.entry_hash;
    if let Some(status) = node.dht().status(&hash)? {
        tracing::debug!(hash = %hash, %status, "put already held");
        return node.hold_response(msg, status);
    }

    let (resp, pkg) = node.fetch_validation_response(msg, &hash)?;
    let action = PutAction::from_response(&resp);
    let status = match node.validate_action(&action, &resp.entry_type, &pkg, &[msg.from]) {
        Ok(_) => Status::Live,
        Err(e) => {
            tracing::warn!(hash = %hash, from = %msg.from, error = %e, "put rejected");
            Status::Rejected
        }
    };
    let entry = resp.entry.unwrap_or_else(|| Entry::new(""));
    node.dht().put(hash, &resp.entry_type, entry, msg.from, status)?;
    node.stats().record_hold();
    tracing::info!(hash = %hash, entry_type = %resp.entry_type, %status, "record held");

    let closer = node
        .routing()
        .better_peers_for_hash(&hash, &msg.from, true, node.redundancy())?;
    if !closer.is_empty() {
        tracing::debug!(hash = %hash, count = closer.len(), "pointing requester at closer peers");
        return Ok(Response::CloserPeers(CloserPeersResp {
            closer_peers: closer,
        }));
    }
    node.hold_response(msg, status)
}
