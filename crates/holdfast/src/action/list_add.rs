use holdfast_types::PeerId;
use holdfast_wire::{ListType, Message, Response};

use crate::error::{NodeError, Result};
use crate::node::Node;
use crate::warrant::Warrant;

/// Adds peers to a named list on the strength of a warrant.
#[derive(Debug)]
pub struct ListAddAction {
    list_type: ListType,
    peers: Vec<PeerId>,
    warrant: Box<dyn Warrant>,
}

impl ListAddAction {
    pub fn new(list_type: ListType, peers: Vec<PeerId>, warrant: Box<dyn Warrant>) -> Self {
        Self {
            list_type,
            peers,
            warrant,
        }
    }

    pub fn list_type(&self) -> &ListType {
        &self.list_type
    }

    pub fn peers(&self) -> &[PeerId] {
        &self.peers
    }

    pub fn warrant(&self) -> &dyn Warrant {
        self.warrant.as_ref()
    }

    /// Verifies the warrant, then mutates the list.
    ///
    /// Blocked peers leave the routing table and the gossiper set inside the
    /// same store critical section that blocks them.
    pub(crate) fn apply(&self, node: &Node) -> Result<()> {
        self.warrant
            .verify(node.dht())
            .map_err(|e| NodeError::WarrantRejected(e.to_string()))?;

        node.dht().add_to_list(&self.list_type, &self.peers, |blocked| {
            for peer in blocked {
                if let Err(e) = node.routing().remove(peer) {
                    tracing::warn!(peer = %peer, error = %e, "failed to drop blocked peer from routing");
                }
            }
        })?;
        Ok(())
    }
}

pub(super) fn receive(node: &Node, msg: &Message) -> Result<Response> {
    let req = msg.list_add_req()?;
    let peers = req
        .peers
        .iter()
        .map(|p| PeerId::from_b58(p))
        .collect::<Result<Vec<_>, _>>()?;
    let warrant = node
        .warrants()
        .decode(req.warrant_type, &req.warrant)
        .map_err(|e| NodeError::WarrantRejected(format!("unable to decode warrant ({e})")))?;

    let action = ListAddAction::new(req.list_type.clone(), peers, warrant);
    action.apply(node)?;
    Ok(Response::DhtChangeOk)
}
