use holdfast_types::{DataFormat, Entry, EntryDef, Hash, Header, LinkSpec, LinksEntry, PeerId, Status};
use holdfast_wire::{Message, Response};

use super::ValidatingAction;
use crate::error::{NodeError, Result};
use crate::node::Node;
use crate::package::ValidationPackage;

/// A holding node's view of a links entry, restricted to one base.
///
/// Links are committed as ordinary entries; this action exists only on the
/// DHT side, where the holder of each base validates and stores them.
#[derive(Debug, Clone)]
pub struct LinkAction {
    entry_type: String,
    links: Vec<LinkSpec>,
    validation_base: Hash,
    entry: Entry,
    header: Option<Header>,
}

impl LinkAction {
    pub fn links(&self) -> &[LinkSpec] {
        &self.links
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    /// The base this holder is validating for.
    pub fn validation_base(&self) -> &Hash {
        &self.validation_base
    }
}

impl ValidatingAction for LinkAction {
    fn name(&self) -> &'static str {
        "link"
    }

    fn sys_validation(&self, def: &EntryDef, _pkg: &ValidationPackage, _sources: &[PeerId]) -> Result<()> {
        if def.data_format != DataFormat::Links {
            return Err(NodeError::LinksOnly);
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
        Some(self.validation_base)
    }
}

/// Adds or removes the links of one entry that hang off the requested base.
pub(super) fn receive(node: &Node, msg: &Message) -> Result<Response> {
    let hold = msg.hold_req()?;
    let base = hold
        .related_hash
        .ok_or_else(|| NodeError::validation_failed("link request has no base"))?;
    let (resp, pkg) = node.fetch_validation_response(msg, &hold.entry_hash)?;
    let entry = resp.entry.ok_or(NodeError::NilEntryInvalid)?;
    let links: LinksEntry = entry.decode_json()?;
    let action = LinkAction {
        entry_type: resp.entry_type.clone(),
        links: links.links,
        validation_base: base,
        entry,
        header: resp.header,
    };
    node.validate_action(&action, &resp.entry_type, &pkg, &[msg.from])
        .inspect_err(|e| tracing::warn!(base = %base, error = %e, "link rejected"))?;

    for spec in &action.links {
        if spec.base_hash()? != base {
            continue;
        }
        let target = spec.link_hash()?;
        if spec.is_removal() {
            node.dht().del_link(msg.from, &base, &target, &spec.tag)?;
        } else {
            node.dht().put_link(msg.from, &base, &target, &spec.tag)?;
        }
    }
    node.stats().record_hold();
    node.hold_response(msg, Status::Live)
}
