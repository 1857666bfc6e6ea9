//! A holdfast node: one agent's chain, its slice of the DHT and the
//! dispatcher that connects them to the network.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use holdfast_bridge::{Bridge, BridgeHost, BridgeRegistry, BridgeSpec};
use holdfast_chain::Chain;
use holdfast_config::HoldfastConfig;
use holdfast_crypto::SigningKey;
use holdfast_dht::{DhtError, DhtStore, PeerTable};
use holdfast_types::{
    AGENT_ENTRY_TYPE, Dna, Entry, Hash, LinkSpec, LinksEntry, MigrateEntry, PeerId, Status,
    Timestamp,
};
use holdfast_wire::{
    Body, HoldResp, ListAddReq, ListType, Message, MsgType, Protocol, Response, TaggedHash,
    WireError,
};
use tracing::instrument;

use crate::action::{
    ActionKind, BoundaryAction, ChainAction, CommitAction, DelAction, GetAction, GetLinksAction,
    GetLinksOptions, GetOptions, GetResult, MigrateAction, ModAction, SendAction, hold_body,
};
use crate::agent::{AgentContext, Rotation};
use crate::callback::{AcceptAll, BundleCancelResponse, ValidationCallback};
use crate::error::{NodeError, Result};
use crate::package::ValidationPackage;
use crate::source_chain::{AppendOutcome, BundleInfo, SourceChain};
use crate::transport::Transport;
use crate::warrant::{SelfRevocationWarrant, Warrant, WarrantDecoder, WarrantRegistry};

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Default)]
pub struct NodeStats {
    validation_requests: AtomicU64,
    holds: AtomicU64,
    commit_retries: AtomicU64,
}

/// Point-in-time copy of [`NodeStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Validate-protocol requests this node answered as a source.
    pub validation_requests: u64,
    /// Hold requests that changed this node's DHT store.
    pub holds: u64,
    /// Commits that lost the race for a chain position and went round again.
    pub commit_retries: u64,
}

impl NodeStats {
    pub(crate) fn record_validation_request(&self) {
        self.validation_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hold(&self) {
        self.holds.fetch_add(1, Ordering::Relaxed);
    }

    fn record_commit_retry(&self) {
        self.commit_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            validation_requests: self.validation_requests.load(Ordering::Relaxed),
            holds: self.holds.load(Ordering::Relaxed),
            commit_retries: self.commit_retries.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct NodeBuilder {
    dna: Dna,
    agent: Option<(String, SigningKey)>,
    config: HoldfastConfig,
    callbacks: Arc<dyn ValidationCallback>,
    bridge_host: Option<Arc<dyn BridgeHost>>,
    warrants: WarrantRegistry,
}

impl NodeBuilder {
    fn new(dna: Dna) -> Self {
        Self {
            dna,
            agent: None,
            config: HoldfastConfig::default(),
            callbacks: Arc::new(AcceptAll),
            bridge_host: None,
            warrants: WarrantRegistry::default(),
        }
    }

    /// Agent identity. Without one the node generates a key and takes its
    /// name from the configuration.
    pub fn agent(mut self, name: impl Into<String>, key: SigningKey) -> Self {
        self.agent = Some((name.into(), key));
        self
    }

    pub fn config(mut self, config: HoldfastConfig) -> Self {
        self.config = config;
        self
    }

    pub fn callbacks(mut self, callbacks: Arc<dyn ValidationCallback>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn bridge_host(mut self, host: Arc<dyn BridgeHost>) -> Self {
        self.bridge_host = Some(host);
        self
    }

    pub fn warrant_decoder(mut self, warrant_type: u8, decoder: WarrantDecoder) -> Self {
        self.warrants.register(warrant_type, decoder);
        self
    }

    /// Creates the node and writes its genesis entries.
    pub fn build(self) -> Result<Arc<Node>> {
        self.config.validate()?;
        let (name, key) = self
            .agent
            .unwrap_or_else(|| (self.config.node.name.clone(), SigningKey::generate()));
        let agent = AgentContext::new(name, key);
        let peer = agent.peer_id()?;
        let dna_hash = self.dna.hash()?;

        let chain = SourceChain::new(self.config.bundle.default_timeout_ms);
        chain.genesis(
            Timestamp::now(),
            &agent.signing_key()?,
            self.dna.to_entry()?,
            agent.agent_entry()?,
        )?;
        tracing::info!(peer = %peer, dna = %dna_hash, "node initialized");

        Ok(Arc::new(Node {
            dna: self.dna,
            dna_hash,
            agent,
            chain,
            dht: DhtStore::new(),
            routing: PeerTable::new(peer),
            callbacks: self.callbacks,
            bridges: BridgeRegistry::new(),
            bridge_host: self.bridge_host,
            warrants: self.warrants,
            transport: RwLock::new(None),
            config: self.config,
            stats: NodeStats::default(),
        }))
    }
}

// ============================================================================
// Node
// ============================================================================

pub struct Node {
    dna: Dna,
    dna_hash: Hash,
    agent: AgentContext,
    chain: SourceChain,
    dht: DhtStore,
    routing: PeerTable,
    callbacks: Arc<dyn ValidationCallback>,
    bridges: BridgeRegistry,
    bridge_host: Option<Arc<dyn BridgeHost>>,
    warrants: WarrantRegistry,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    config: HoldfastConfig,
    stats: NodeStats,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("dna", &self.dna_hash)
            .field("peer", &self.routing.self_id().ok())
            .finish_non_exhaustive()
    }
}

impl Node {
    pub fn builder(dna: Dna) -> NodeBuilder {
        NodeBuilder::new(dna)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn dna(&self) -> &Dna {
        &self.dna
    }

    pub fn dna_hash(&self) -> &Hash {
        &self.dna_hash
    }

    pub fn agent(&self) -> &AgentContext {
        &self.agent
    }

    pub fn peer_id(&self) -> Result<PeerId> {
        self.agent.peer_id()
    }

    pub fn dht(&self) -> &DhtStore {
        &self.dht
    }

    pub fn routing(&self) -> &PeerTable {
        &self.routing
    }

    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }

    pub fn config(&self) -> &HoldfastConfig {
        &self.config
    }

    pub fn warrants(&self) -> &WarrantRegistry {
        &self.warrants
    }

    pub(crate) fn callbacks(&self) -> &dyn ValidationCallback {
        self.callbacks.as_ref()
    }

    pub(crate) fn source_chain(&self) -> &SourceChain {
        &self.chain
    }

    /// Copy of the committed chain.
    pub fn chain(&self) -> Result<Chain> {
        self.chain.snapshot()
    }

    pub fn chain_len(&self) -> Result<usize> {
        self.chain.len()
    }

    pub(crate) fn redundancy(&self) -> usize {
        self.config.dht.effective_redundancy()
    }

    pub(crate) fn closer_peer_count(&self) -> usize {
        self.config.dht.closer_peer_count
    }

    // ------------------------------------------------------------------------
    // Network
    // ------------------------------------------------------------------------

    pub fn attach_transport(&self, transport: Arc<dyn Transport>) -> Result<()> {
        *self
            .transport
            .write()
            .map_err(|_| NodeError::internal("lock poisoned"))? = Some(transport);
        Ok(())
    }

    fn transport(&self) -> Result<Option<Arc<dyn Transport>>> {
        Ok(self
            .transport
            .read()
            .map_err(|_| NodeError::internal("lock poisoned"))?
            .clone())
    }

    /// Adds a peer to the routing table and gossiper set. Blocked peers are
    /// ignored.
    pub fn connect(&self, peer: PeerId) -> Result<()> {
        let admitted = self.dht.admit_peer(peer, |peer| {
            if let Err(e) = self.routing.add(*peer) {
                tracing::warn!(peer = %peer, error = %e, "failed to add peer to routing");
            }
        })?;
        if !admitted {
            tracing::debug!(peer = %peer, "not connecting to blocked peer");
        }
        Ok(())
    }

    /// Puts this agent's `%key` and `%agent` entries to the DHT.
    pub fn announce(&self) -> Result<()> {
        let key_hash = Hash::from(self.peer_id()?);
        self.change(&key_hash, MsgType::PutRequest, hold_body(key_hash, None))?;
        let agent_hash = self
            .chain
            .read(|c| c.top_type(AGENT_ENTRY_TYPE).map(|(_, h)| h.entry_link))?;
        if let Some(hash) = agent_hash {
            self.change(&hash, MsgType::PutRequest, hold_body(hash, None))?;
        }
        Ok(())
    }

    /// Handles one inbound message.
    #[instrument(skip_all, fields(msg_type = %msg.msg_type, from = %msg.from))]
    pub fn handle(&self, protocol: Protocol, msg: &Message) -> Result<Response> {
        if msg.msg_type.protocol() != protocol {
            let name = msg.msg_type.name().to_string();
            return Err(match protocol {
                Protocol::Action => WireError::NotInActionProtocol(name),
                Protocol::Validate => WireError::NotInValidateProtocol(name),
            }
            .into());
        }
        if self.dht.is_blocked(&msg.from)? {
            tracing::warn!("refusing message from blocked peer");
            return Err(NodeError::Blocked(msg.from));
        }
        match protocol {
            Protocol::Action => ActionKind::from_message(msg)?.receive(self, msg),
            Protocol::Validate => self.receive_validate(msg),
        }
    }

    /// Sends to a peer, short-circuiting messages to this node.
    pub(crate) fn send(&self, protocol: Protocol, to: &PeerId, msg: &Message) -> Result<Response> {
        if *to == self.peer_id()? {
            return self.handle(protocol, msg);
        }
        let transport = self.transport()?.ok_or(NodeError::Unreachable(*to))?;
        transport.send(protocol, to, msg)
    }

    pub(crate) fn hold_response(&self, msg: &Message, status: Status) -> Result<Response> {
        let signature = self.agent.sign(msg.fingerprint()?.as_bytes())?;
        Ok(Response::Hold(HoldResp { status, signature }))
    }

    /// Sends a change request to this node, then to the peers that should
    /// hold `key`. Individual failures are logged, not returned.
    pub(crate) fn change(&self, key: &Hash, msg_type: MsgType, body: Body) -> Result<()> {
        let me = self.peer_id()?;
        let msg = Message::new(msg_type, me, body);
        if let Err(e) = self.handle(Protocol::Action, &msg) {
            tracing::warn!(key = %key, %msg_type, error = %e, "local change failed");
        }

        let mut queue: VecDeque<PeerId> = self.routing.nearest_peers(key, self.redundancy())?.into();
        let mut visited = HashSet::from([me]);
        while let Some(peer) = queue.pop_front() {
            if !visited.insert(peer) {
                continue;
            }
            match self.send(Protocol::Action, &peer, &msg) {
                Ok(Response::CloserPeers(resp)) => {
                    tracing::debug!(key = %key, peer = %peer, count = resp.closer_peers.len(), "change redirected");
                    queue.extend(resp.closer_peers);
                }
                Ok(_) => tracing::debug!(key = %key, peer = %peer, %msg_type, "change delivered"),
                Err(e) => tracing::warn!(key = %key, peer = %peer, %msg_type, error = %e, "change failed"),
            }
        }
        Ok(())
    }

    /// Asks this node, then successively closer peers, until one answers.
    pub(crate) fn query(&self, key: &Hash, msg_type: MsgType, body: Body) -> Result<Response> {
        let me = self.peer_id()?;
        let msg = Message::new(msg_type, me, body);
        match self.handle(Protocol::Action, &msg) {
            Ok(Response::CloserPeers(_)) => {}
            Ok(resp) => return Ok(resp),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let mut queue: VecDeque<PeerId> = self.routing.nearest_peers(key, self.config.dht.alpha)?.into();
        let mut visited = HashSet::from([me]);
        while let Some(peer) = queue.pop_front() {
            if !visited.insert(peer) {
                continue;
            }
            match self.send(Protocol::Action, &peer, &msg) {
                Ok(Response::CloserPeers(resp)) => {
                    queue.extend(resp.closer_peers.into_iter().filter(|p| !visited.contains(p)));
                }
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_not_found() => {}
                Err(e @ NodeError::Dht(DhtError::HashDeleted | DhtError::HashRejected)) => {
                    return Err(e);
                }
                Err(e) => tracing::debug!(key = %key, peer = %peer, error = %e, "query hop failed"),
            }
        }
        Err(DhtError::HashNotFound.into())
    }

    // ------------------------------------------------------------------------
    // Committing
    // ------------------------------------------------------------------------

    /// Validates and appends a committing action, retrying while other
    /// commits take the position it prepared for.
    pub(crate) fn do_commit(&self, mut action: ChainAction) -> Result<Hash> {
        let me = self.peer_id()?;
        loop {
            let committing = action.as_committing();
            let entry_type = committing.entry_type().to_string();
            let entry = committing.entry().cloned().ok_or(NodeError::NilEntryInvalid)?;
            let change = committing.change();

            let key = self.agent.signing_key()?;
            let reservation = self
                .chain
                .reserve(Timestamp::now(), &entry_type, &entry, &key, change)?;
            let entry_hash = reservation.prepared.header.entry_link;
            action
                .as_committing_mut()
                .set_header(reservation.prepared.header.clone());

            let def = self.validate_action(
                action.as_committing(),
                &entry_type,
                &ValidationPackage::default(),
                &[me],
            )?;

            match self.chain.append(reservation, entry, &action)? {
                AppendOutcome::Main => {
                    tracing::info!(hash = %entry_hash, %entry_type, "entry committed");
                    action.as_committing().share(self, &def)?;
                    return Ok(entry_hash);
                }
                AppendOutcome::Bundle => {
                    tracing::debug!(hash = %entry_hash, %entry_type, "entry committed to bundle");
                    return Ok(entry_hash);
                }
                AppendOutcome::Stale => {
                    self.stats.record_commit_retry();
                    tracing::debug!(%entry_type, "chain moved, retrying commit");
                }
            }
        }
    }

    pub fn commit(&self, entry_type: &str, content: impl Into<String>) -> Result<Hash> {
        let action = CommitAction::new(entry_type, Entry::new(content));
        self.do_commit(ChainAction::Commit(action))
    }

    /// Commits a links entry of `entry_type`.
    pub fn commit_links(&self, entry_type: &str, links: Vec<LinkSpec>) -> Result<Hash> {
        let entry = LinksEntry::new(links).to_entry()?;
        self.do_commit(ChainAction::Commit(CommitAction::new(entry_type, entry)))
    }

    /// Commits `content` as the replacement of `replaces`.
    pub fn update(&self, entry_type: &str, content: impl Into<String>, replaces: &Hash) -> Result<Hash> {
        let action = ModAction::new(entry_type, Entry::new(content), *replaces);
        self.do_commit(ChainAction::Mod(action))
    }

    pub fn remove(&self, target: &Hash, message: &str) -> Result<Hash> {
        self.do_commit(ChainAction::Del(DelAction::new(target, message)?))
    }

    /// Marks this chain closed, naming the chain that continues it.
    pub fn close_chain(&self, successor: &Hash, message: &str) -> Result<Hash> {
        self.do_commit(ChainAction::Boundary(BoundaryAction::close(successor, message)?))
    }

    /// Marks this chain as continuing `predecessor`.
    pub fn open_chain(&self, predecessor: &Hash, message: &str) -> Result<Hash> {
        self.do_commit(ChainAction::Boundary(BoundaryAction::open(predecessor, message)?))
    }

    pub fn migrate(&self, migrate: MigrateEntry) -> Result<Hash> {
        self.do_commit(ChainAction::Migrate(MigrateAction::new(migrate)?))
    }

    // ------------------------------------------------------------------------
    // Bundles
    // ------------------------------------------------------------------------

    /// Stages subsequent commits until [`Node::close_bundle`]. A zero
    /// timeout takes the configured default.
    pub fn start_bundle(&self, timeout_ms: u64, user_param: &str) -> Result<()> {
        self.chain.start_bundle(timeout_ms, user_param)
    }

    /// Commits or discards the open bundle. The application may turn a
    /// cancel into a commit.
    pub fn close_bundle(&self, commit: bool) -> Result<()> {
        if self.chain.bundle_info()?.is_none() {
            return Err(NodeError::BundleNotStarted);
        }
        let mut commit = commit;
        if !commit && self.callbacks.bundle_canceled("userCancel") == BundleCancelResponse::Commit {
            tracing::info!("bundle cancel overridden by application");
            commit = true;
        }

        for action in self.chain.close_bundle(commit)? {
            let committing = action.as_committing();
            let (_, def) = self.dna.entry_def(committing.entry_type())?;
            committing.share(self, def)?;
        }
        Ok(())
    }

    pub fn bundle_info(&self) -> Result<Option<BundleInfo>> {
        self.chain.bundle_info()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn get(&self, hash: &Hash, options: GetOptions) -> Result<GetResult> {
        GetAction::new(*hash, options).run(self)
    }

    pub fn get_links(&self, base: &Hash, tag: &str, options: GetLinksOptions) -> Result<Vec<TaggedHash>> {
        GetLinksAction::new(*base, tag, options).run(self)
    }

    /// Sends an application message to `to` and returns its reply.
    pub fn send_app(&self, to: &PeerId, zome: &str, body: &str) -> Result<String> {
        SendAction::new(*to, zome, body).run(self)
    }

    // ------------------------------------------------------------------------
    // Peer lists and key rotation
    // ------------------------------------------------------------------------

    /// Asks the holders of each peer's address to add it to a list.
    pub fn add_to_list(&self, list_type: &ListType, peers: &[PeerId], warrant: &dyn Warrant) -> Result<()> {
        let req = ListAddReq {
            list_type: list_type.clone(),
            peers: peers.iter().map(PeerId::to_b58).collect(),
            warrant_type: warrant.warrant_type(),
            warrant: warrant.encode()?,
        };
        for peer in peers {
            self.change(peer.as_hash(), MsgType::ListAddRequest, Body::ListAdd(req.clone()))?;
        }
        Ok(())
    }

    /// Retires the current key in favour of `new_key`.
    ///
    /// The new identity is live on the transport before anything is
    /// published, so validators calling back reach it under the new id.
    pub fn rotate_key(&self, new_key: SigningKey, payload: &str) -> Result<Rotation> {
        let rotation = self.agent.rotate(new_key, payload.as_bytes())?;
        if let Some(transport) = self.transport()? {
            transport.rebind(&rotation.old_peer, &rotation.new_peer)?;
        }
        self.routing.set_self_id(rotation.new_peer)?;

        self.commit(AGENT_ENTRY_TYPE, self.agent.agent_entry()?.content())?;

        let old_hash = Hash::from(rotation.old_peer);
        let new_hash = Hash::from(rotation.new_peer);
        self.change(&new_hash, MsgType::PutRequest, hold_body(new_hash, None))?;
        self.change(&old_hash, MsgType::ModRequest, hold_body(new_hash, Some(old_hash)))?;

        let warrant = SelfRevocationWarrant::new(rotation.revocation.clone());
        self.add_to_list(&ListType::Blocked, &[rotation.old_peer], &warrant)?;
        Ok(rotation)
    }

    // ------------------------------------------------------------------------
    // Bridging
    // ------------------------------------------------------------------------

    fn bridge_host(&self) -> Result<&dyn BridgeHost> {
        self.bridge_host.as_deref().ok_or(NodeError::NoBridgeHost)
    }

    /// Lets `from_app` call the bridged functions of this application's zomes.
    pub fn add_bridge_as_callee(&self, from_app: &Hash, app_data: &str) -> Result<String> {
        let spec = BridgeSpec::from_zomes(
            self.dna
                .zomes
                .iter()
                .map(|z| (z.name.as_str(), z.bridge_funcs.as_slice())),
        );
        Ok(self
            .bridges
            .add_bridge_as_callee(from_app, &spec, app_data, self.bridge_host()?)?)
    }

    /// Records the token for calling `to_app`, running genesis in every
    /// zome that bridges to it.
    pub fn add_bridge_as_caller(&self, to_app: &Hash, token: &str, url: &str, app_data: &str) -> Result<()> {
        let zomes: Vec<&str> = self
            .dna
            .zomes
            .iter()
            .filter(|z| z.bridge_to == Some(*to_app))
            .map(|z| z.name.as_str())
            .collect();
        self.bridges
            .add_bridge_as_caller(to_app, token, url, &zomes, app_data, self.bridge_host()?)?;
        Ok(())
    }

    pub fn bridge_call(&self, zome: &str, function: &str, args: &str, token: &str) -> Result<String> {
        Ok(self
            .bridges
            .bridge_call(zome, function, args, token, self.bridge_host()?)?)
    }

    pub fn bridge_token(&self, to_app: &Hash) -> Result<(String, String)> {
        Ok(self.bridges.bridge_token(to_app)?)
    }

    pub fn bridges(&self) -> Result<Vec<Bridge>> {
        Ok(self.bridges.bridges()?)
    }
}
