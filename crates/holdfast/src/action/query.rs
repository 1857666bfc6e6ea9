//! Read-side actions: Get, GetLinks and application messages.

use std::collections::HashSet;

use holdfast_dht::DhtError;
use holdfast_types::{Entry, GetMask, Hash, PeerId, StatusMask};
use holdfast_wire::{
    AppMsg, Body, CloserPeersResp, GetReq, GetResp, LinkQuery, LinkQueryResp, Message, MsgType,
    Response, TaggedHash,
};

use crate::error::{NodeError, Result};
use crate::node::Node;

// ============================================================================
// Get
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetOptions {
    pub status_mask: StatusMask,
    pub get_mask: GetMask,
    /// Read the local chain instead of the DHT.
    pub local: bool,
    /// Read the open bundle instead of the DHT.
    pub bundle: bool,
}

impl GetOptions {
    pub fn with_status_mask(mut self, mask: StatusMask) -> Self {
        self.status_mask = mask;
        self
    }

    pub fn with_get_mask(mut self, mask: GetMask) -> Self {
        self.get_mask = mask;
        self
    }

    pub fn local() -> Self {
        Self {
            local: true,
            ..Self::default()
        }
    }

    pub fn bundle() -> Self {
        Self {
            bundle: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetResult {
    pub entry: Option<Entry>,
    pub entry_type: String,
    pub sources: Vec<PeerId>,
}

#[derive(Debug, Clone)]
pub struct GetAction {
    hash: Hash,
    options: GetOptions,
}

impl GetAction {
    pub fn new(hash: Hash, options: GetOptions) -> Self {
        Self { hash, options }
    }

    pub(crate) fn run(&self, node: &Node) -> Result<GetResult> {
        if self.hash == *node.dna_hash() {
            return Err(NodeError::DnaNotGettable);
        }
        if self.options.local || self.options.bundle {
            let found = if self.options.bundle {
                node.source_chain().bundle_entry(&self.hash)?
            } else {
                node.source_chain().entry(&self.hash)?
            };
            let (entry, entry_type) = found.ok_or(DhtError::HashNotFound)?;
            return Ok(GetResult {
                entry: Some(entry),
                entry_type,
                sources: vec![node.peer_id()?],
            });
        }

        // Modified records redirect; chase them, refusing to revisit a hash.
        let mut current = self.hash;
        let mut visited = HashSet::new();
        loop {
            visited.insert(current);
            let body = Body::Get(GetReq {
                hash: current,
                status_mask: self.options.status_mask,
                get_mask: self.options.get_mask,
            });
            let resp = match node.query(&current, MsgType::GetRequest, body)? {
                Response::Get(resp) => resp,
                other => {
                    return Err(NodeError::UnexpectedResponse {
                        expected: "GetResp",
                        peer: node.peer_id()?,
                        got: other.kind(),
                    });
                }
            };
            match resp.follow_hash {
                Some(next) if visited.contains(&next) => return Err(NodeError::FollowLoop),
                Some(next) => {
                    tracing::debug!(from = %current, to = %next, "following modified hash");
                    current = next;
                }
                None => {
                    return Ok(GetResult {
                        entry: resp.entry,
                        entry_type: resp.entry_type,
                        sources: resp.sources,
                    });
                }
            }
        }
    }
}

/// Answers from the local store, or points at closer peers when the hash
/// is not held here.
pub(super) fn receive_get(node: &Node, msg: &Message) -> Result<Response> {
    let req = msg.get_req()?;
    match node.dht().get(&req.hash, req.status_mask, req.get_mask) {
        Ok(record) => Ok(Response::Get(GetResp {
            entry: req.get_mask.includes(GetMask::ENTRY).then_some(record.entry),
            entry_type: record.entry_type,
            sources: record.sources,
            follow_hash: None,
        })),
        Err(DhtError::HashModified { follow }) => Ok(Response::Get(GetResp {
            follow_hash: Some(follow),
            ..GetResp::default()
        })),
        Err(DhtError::HashNotFound) => closer_or_not_found(node, &req.hash, &msg.from),
        Err(e) => Err(e.into()),
    }
}

fn closer_or_not_found(node: &Node, hash: &Hash, requester: &PeerId) -> Result<Response> {
    let closer = node
        .routing()
        .better_peers_for_hash(hash, requester, true, node.closer_peer_count())?;
    if closer.is_empty() {
        return Err(DhtError::HashNotFound.into());
    }
    Ok(Response::CloserPeers(CloserPeersResp {
        closer_peers: closer,
    }))
}

// ============================================================================
// GetLinks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GetLinksOptions {
    pub status_mask: StatusMask,
    /// Fetch each linked entry as well.
    pub load: bool,
}

#[derive(Debug, Clone)]
pub struct GetLinksAction {
    base: Hash,
    tag: String,
    options: GetLinksOptions,
}

impl GetLinksAction {
    pub fn new(base: Hash, tag: impl Into<String>, options: GetLinksOptions) -> Self {
        Self {
            base,
            tag: tag.into(),
            options,
        }
    }

    pub(crate) fn run(&self, node: &Node) -> Result<Vec<TaggedHash>> {
        let body = Body::LinkQuery(LinkQuery {
            base: self.base,
            tag: self.tag.clone(),
            status_mask: self.options.status_mask,
        });
        let mut links = match node.query(&self.base, MsgType::GetLinkRequest, body)? {
            Response::LinkQuery(resp) => resp.links,
            other => {
                return Err(NodeError::UnexpectedResponse {
                    expected: "LinkQueryResp",
                    peer: node.peer_id()?,
                    got: other.kind(),
                });
            }
        };
        if self.options.load {
            let options = GetOptions::default().with_get_mask(GetMask::ENTRY.union(GetMask::ENTRY_TYPE));
            for link in &mut links {
                let result = GetAction::new(link.hash, options).run(node)?;
                link.entry = result.entry;
                link.entry_type = result.entry_type;
            }
        }
        Ok(links)
    }
}

pub(super) fn receive_get_links(node: &Node, msg: &Message) -> Result<Response> {
    let query = msg.link_query()?;
    match node.dht().get_links(&query.base, &query.tag, query.status_mask) {
        Ok(records) => {
            let links = records
                .into_iter()
                .map(|r| TaggedHash {
                    hash: r.link,
                    tag: r.tag,
                    entry_type: String::new(),
                    source: r.source,
                    entry: None,
                })
                .collect();
            Ok(Response::LinkQuery(LinkQueryResp { links }))
        }
        Err(DhtError::HashNotFound) => closer_or_not_found(node, &query.base, &msg.from),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Send
// ============================================================================

/// An application message for another node's receive callback.
#[derive(Debug, Clone)]
pub struct SendAction {
    to: PeerId,
    message: AppMsg,
}

impl SendAction {
    pub fn new(to: PeerId, zome: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to,
            message: AppMsg {
                zome: zome.into(),
                body: body.into(),
            },
        }
    }

    pub(crate) fn run(&self, node: &Node) -> Result<String> {
        let msg = Message::new(
            MsgType::AppMessage,
            node.peer_id()?,
            Body::App(self.message.clone()),
        );
        match node.send(holdfast_wire::Protocol::Action, &self.to, &msg)? {
            Response::App(reply) => Ok(reply),
            other => Err(NodeError::UnexpectedResponse {
                expected: "AppResponse",
                peer: self.to,
                got: other.kind(),
            }),
        }
    }
}

pub(super) fn receive_app(node: &Node, msg: &Message) -> Result<Response> {
    let app = msg.app_msg()?;
    node.callbacks()
        .receive(&msg.from, app)
        .map(Response::App)
        .map_err(NodeError::Receive)
}
