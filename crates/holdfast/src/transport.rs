//! The seam between a node and its network.
//!
//! [`MemoryNetwork`] runs many nodes in one process. Messages and responses
//! still go through the wire codec so every exchange is one a real network
//! could carry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

use holdfast_types::PeerId;
use holdfast_wire::{Message, Protocol, Response};

use crate::error::{NodeError, Result};
use crate::node::Node;

pub trait Transport: Send + Sync {
    /// Delivers `msg` to `to` and waits for the answer. A remote failure
    /// comes back as the error the remote reported.
    fn send(&self, protocol: Protocol, to: &PeerId, msg: &Message) -> Result<Response>;

    /// Moves this node's endpoint from `old` to `new` after a key rotation.
    fn rebind(&self, old: &PeerId, new: &PeerId) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryNetwork {
    nodes: RwLock<HashMap<PeerId, Weak<Node>>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lookup(&self, peer: &PeerId) -> Result<Option<Arc<Node>>> {
        Ok(self
            .nodes
            .read()
            .map_err(|_| NodeError::internal("lock poisoned"))?
            .get(peer)
            .and_then(Weak::upgrade))
    }

    fn others(&self, except: &PeerId) -> Result<Vec<Arc<Node>>> {
        Ok(self
            .nodes
            .read()
            .map_err(|_| NodeError::internal("lock poisoned"))?
            .iter()
            .filter(|(id, _)| *id != except)
            .filter_map(|(_, node)| node.upgrade())
            .collect())
    }

    /// Connects `node` with every node already on the network, then
    /// announces its key and agent entries.
    pub fn join(self: &Arc<Self>, node: &Arc<Node>) -> Result<()> {
        let id = node.peer_id()?;
        for other in self.others(&id)? {
            other.connect(id)?;
            node.connect(other.peer_id()?)?;
        }
        self.nodes
            .write()
            .map_err(|_| NodeError::internal("lock poisoned"))?
            .insert(id, Arc::downgrade(node));
        node.attach_transport(Arc::clone(self) as Arc<dyn Transport>)?;
        tracing::debug!(peer = %id, "node joined memory network");
        node.announce()
    }
}

impl Transport for MemoryNetwork {
    fn send(&self, protocol: Protocol, to: &PeerId, msg: &Message) -> Result<Response> {
        let node = self.lookup(to)?.ok_or(NodeError::Unreachable(*to))?;
        let msg = Message::decode(&msg.encode()?)?;
        let resp = match node.handle(protocol, &msg) {
            Ok(resp) => resp,
            Err(e) => Response::Error(e.to_error_resp()),
        };
        match Response::decode(&resp.encode()?)? {
            Response::Error(err) => Err(NodeError::from_error_resp(err)),
            resp => Ok(resp),
        }
    }

    fn rebind(&self, old: &PeerId, new: &PeerId) -> Result<()> {
        {
            let mut nodes = self
                .nodes
                .write()
                .map_err(|_| NodeError::internal("lock poisoned"))?;
            let node = nodes.remove(old).ok_or(NodeError::Unreachable(*old))?;
            nodes.insert(*new, node);
        }
        for other in self.others(new)? {
            other.connect(*new)?;
        }
        tracing::debug!(old = %old, new = %new, "endpoint rebound");
        Ok(())
    }
}
