use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use holdfast_bridge::BridgeError;
use holdfast_dht::{DhtError, DhtStore};
use holdfast_types::{KEY_ENTRY_TYPE, Signature, Timestamp};
use holdfast_chain::ChainError;
use holdfast_wire::{
    Body, GetReq, HoldReq, Message, MsgType, Package, Response, ValidateResponse,
};
use serde_json::{Value, json};
use test_case::test_case;

use super::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn key(n: u8) -> SigningKey {
    SigningKey::from_seed(&[n; 32])
}

fn test_dna() -> Dna {
    Dna::new("holdfast-tests", "00000000-0000-0000-0000-000000000001").with_zome(
        Zome::new("profiles")
            .with_entry(EntryDef::new("profile", DataFormat::Json, Sharing::Public))
            .with_entry(EntryDef::new("diary", DataFormat::String, Sharing::Private))
            .with_entry(EntryDef::new("handles", DataFormat::Links, Sharing::Public)),
    )
}

fn builder(n: u8) -> NodeBuilder {
    Node::builder(test_dna())
        .agent(format!("agent-{n}"), key(n))
        .config(HoldfastConfig::development())
}

fn solo(n: u8) -> Arc<Node> {
    builder(n).build().expect("build node")
}

fn joined(network: &Arc<MemoryNetwork>, node: Arc<Node>) -> Arc<Node> {
    network.join(&node).expect("join network");
    node
}

fn profile(name: &str) -> String {
    json!({ "name": name }).to_string()
}

fn content_of(result: &GetResult) -> &str {
    result.entry.as_ref().map_or("", Entry::content)
}

/// Counts validator invocations and accepts everything.
#[derive(Debug, Default)]
struct CountingCallback {
    calls: AtomicUsize,
}

impl ValidationCallback for CountingCallback {
    fn validate(&self, _request: &ValidationRequest<'_>) -> Value {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Value::Bool(true)
    }
}

/// Refuses puts of profiles mentioning spam and requires full chain
/// packages for remote validation.
#[derive(Debug, Default)]
struct PickyCallback;

impl ValidationCallback for PickyCallback {
    fn validate(&self, request: &ValidationRequest<'_>) -> Value {
        if request.action.name() == "commit" {
            return Value::Bool(true);
        }
        if request.package.chain.is_none() {
            return Value::String("missing chain package".to_string());
        }
        let content = request.action.entry().map_or("", Entry::content);
        if content.contains("spam") {
            return Value::String("no spam".to_string());
        }
        Value::Bool(true)
    }

    fn packaging_request(&self, _action: &str, _def: &EntryDef) -> PackagingRequest {
        PackagingRequest::full()
    }
}

/// Keeps every canceled bundle.
#[derive(Debug, Default)]
struct KeepBundles;

impl ValidationCallback for KeepBundles {
    fn validate(&self, _request: &ValidationRequest<'_>) -> Value {
        Value::Bool(true)
    }

    fn bundle_canceled(&self, _reason: &str) -> BundleCancelResponse {
        BundleCancelResponse::Commit
    }
}

/// Answers application messages with an echo.
#[derive(Debug, Default)]
struct EchoReceiver;

impl ValidationCallback for EchoReceiver {
    fn validate(&self, _request: &ValidationRequest<'_>) -> Value {
        Value::Bool(true)
    }

    fn receive(&self, _from: &PeerId, message: &AppMsg) -> std::result::Result<String, String> {
        Ok(format!("{} got {}", message.zome, message.body))
    }
}

#[derive(Debug, Default)]
struct EchoHost {
    refuse_genesis: bool,
}

impl BridgeHost for EchoHost {
    fn bridge_genesis(
        &self,
        _zome: &str,
        _side: BridgeSide,
        _other_app: &Hash,
        _app_data: &str,
    ) -> std::result::Result<bool, String> {
        Ok(!self.refuse_genesis)
    }

    fn call(&self, zome: &str, function: &str, args: &str) -> std::result::Result<String, String> {
        Ok(format!("{zome}.{function}({args})"))
    }
}

// ============================================================================
// Node Construction
// ============================================================================

#[test]
fn genesis_writes_dna_then_agent() {
    let node = solo(1);
    let chain = node.chain().expect("chain");
    assert_eq!(chain.len(), 2);
    let key = node.agent().public_key().expect("key");
    chain.validate(&key, false).expect("genesis chain is linked and signed");

    let (_, agent_header) = chain.top_type("%agent").expect("agent header");
    assert_eq!(agent_header.entry_type, "%agent");
    assert_eq!(node.peer_id().expect("peer"), self::key(1).verifying_key().peer_id());
    assert_eq!(node.agent().name().expect("name"), "agent-1");
}

#[test]
fn invalid_config_is_refused() {
    let mut config = HoldfastConfig::development();
    config.dht.alpha = 0;
    let err = Node::builder(test_dna())
        .config(config)
        .build()
        .expect_err("alpha must be positive");
    assert!(matches!(err, NodeError::Config(_)));
}

#[test]
fn unknown_entry_type_cannot_be_committed() {
    let node = solo(1);
    let err = node.commit("recipe", "{}").expect_err("no such type");
    assert!(err.to_string().contains("recipe"), "unexpected error: {err}");
}

// ============================================================================
// Commit
// ============================================================================

#[test]
fn concurrent_commits_keep_the_chain_linear() {
    let node = solo(1);
    std::thread::scope(|s| {
        for t in 0..4 {
            let node = &node;
            s.spawn(move || {
                for i in 0..10 {
                    let content = json!({ "thread": t, "n": i }).to_string();
                    node.commit("profile", content).expect("commit");
                }
            });
        }
    });

    let chain = node.chain().expect("chain");
    assert_eq!(chain.len(), 2 + 40);
    let key = node.agent().public_key().expect("key");
    chain
        .validate(&key, false)
        .expect("every header links to its predecessor");
    for index in 1..chain.len() {
        let (prev_hash, _, _) = chain.get(index - 1).expect("previous");
        let (_, header, _) = chain.get(index).expect("current");
        assert_eq!(header.header_link, prev_hash, "fork at index {index}");
    }
}

#[test]
fn committed_entries_are_held_locally() {
    let node = solo(1);
    let hash = node.commit("profile", profile("ada")).expect("commit");

    let found = node.get(&hash, GetOptions::default()).expect("get");
    assert_eq!(content_of(&found), profile("ada"));
    assert_eq!(node.dht().status(&hash).expect("status"), Some(Status::Live));

    let local = node.get(&hash, GetOptions::local()).expect("local get");
    assert_eq!(local.entry_type, "profile");
}

#[test]
fn private_entries_stay_on_the_chain() {
    let node = solo(1);
    let hash = node.commit("diary", "dear diary").expect("commit");

    assert_eq!(node.dht().status(&hash).expect("status"), None);
    let local = node.get(&hash, GetOptions::local()).expect("local get");
    assert_eq!(content_of(&local), "dear diary");
}

#[test]
fn application_rejection_blocks_the_commit() {
    struct Refuse;
    impl ValidationCallback for Refuse {
        fn validate(&self, _request: &ValidationRequest<'_>) -> Value {
            Value::Bool(false)
        }
    }

    let node = builder(1).callbacks(Arc::new(Refuse)).build().expect("build");
    let err = node.commit("profile", profile("ada")).expect_err("refused");
    assert_eq!(err.to_string(), VALIDATION_FAILED);
    assert_eq!(node.chain_len().expect("len"), 2);
}

#[test]
fn self_replacement_never_reaches_the_application() {
    let counter = Arc::new(CountingCallback::default());
    let node = builder(1).callbacks(counter.clone()).build().expect("build");
    let content = profile("ada");
    let same = Entry::new(content.clone()).hash();

    let err = node.update("profile", content, &same).expect_err("self replacement");
    assert!(matches!(err, NodeError::ModReplacesHashNotDifferent));
    assert_eq!(counter.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn entry_schemas_gate_commits() {
    let card = EntryDef::new("card", DataFormat::Json, Sharing::Public)
        .with_json_schema(
            r#"{"type":"object","properties":{"tier":{"enum":["free","gold"]}},"required":["tier"]}"#,
        )
        .expect("schema");
    let node = Node::builder(test_dna().with_zome(Zome::new("cards").with_entry(card)))
        .agent("agent-1", key(1))
        .config(HoldfastConfig::development())
        .build()
        .expect("build");

    node.commit("card", json!({ "tier": "gold" }).to_string())
        .expect("valid card");
    let err = node
        .commit("card", json!({ "tier": "platinum" }).to_string())
        .expect_err("outside the enum");
    assert!(matches!(err, NodeError::ValidationFailed(_)));
}

#[test]
fn bad_key_entries_are_refused() {
    let node = solo(1);
    let err = node.commit(KEY_ENTRY_TYPE, "garbage").expect_err("bad key");
    assert_eq!(err.to_string(), "bad public key format");

    node.commit(KEY_ENTRY_TYPE, key(7).verifying_key().to_b58())
        .expect("valid key commits");
}

// ============================================================================
// Mod, Del and Links
// ============================================================================

#[test]
fn modified_entries_redirect_to_their_replacement() {
    let node = solo(1);
    let v1 = node.commit("profile", profile("ada")).expect("v1");
    let v2 = node.update("profile", profile("ada lovelace"), &v1).expect("v2");

    assert_eq!(node.dht().status(&v1).expect("status"), Some(Status::Modified));
    let found = node.get(&v1, GetOptions::default()).expect("follow");
    assert_eq!(content_of(&found), profile("ada lovelace"));

    let raw = node
        .get(&v1, GetOptions::default().with_status_mask(StatusMask::MODIFIED))
        .expect("modified record");
    assert_eq!(content_of(&raw), profile("ada"));
    assert_ne!(v1, v2);
}

#[test]
fn follow_loops_are_detected() {
    let node = solo(1);
    let v1 = node.commit("profile", profile("ada")).expect("v1");
    node.dht().modify(&v1, &v1).expect("corrupt record");

    let err = node.get(&v1, GetOptions::default()).expect_err("loop");
    assert!(matches!(err, NodeError::FollowLoop));
}

#[test]
fn the_dna_is_not_gettable() {
    let node = solo(1);
    let err = node.get(node.dna_hash(), GetOptions::default()).expect_err("dna");
    assert!(matches!(err, NodeError::DnaNotGettable));
}

#[test]
fn links_are_found_from_their_base() {
    let node = solo(1);
    let base = node.commit("profile", profile("ada")).expect("base");
    let friend = node.commit("profile", profile("charles")).expect("friend");

    node.commit_links("handles", vec![LinkSpec::new(&base, &friend, "friend")])
        .expect("link");
    let links = node
        .get_links(&base, "friend", GetLinksOptions::default())
        .expect("links");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].hash, friend);
    assert_eq!(links[0].tag, "friend");
    assert!(links[0].entry.is_none());

    let loaded = node
        .get_links(&base, "", GetLinksOptions { load: true, ..Default::default() })
        .expect("loaded links");
    assert_eq!(loaded[0].entry.as_ref().map(Entry::content), Some(profile("charles").as_str()));
    assert_eq!(loaded[0].entry_type, "profile");

    node.commit_links("handles", vec![LinkSpec::new(&base, &friend, "friend").removal()])
        .expect("unlink");
    let links = node
        .get_links(&base, "friend", GetLinksOptions::default())
        .expect("links after removal");
    assert!(links.is_empty());
}

#[test]
fn links_need_a_live_base() {
    let node = solo(1);
    let base = Entry::new("never committed").hash();
    let err = node
        .get_links(&base, "", GetLinksOptions::default())
        .expect_err("unknown base");
    assert!(err.is_not_found(), "unexpected error: {err}");
}

#[test]
fn chain_boundaries_are_recorded_on_the_target() {
    let node = solo(1);
    let successor = node.commit("profile", profile("next")).expect("successor");
    node.close_chain(&successor, "moving on").expect("close");

    let records = node.dht().boundaries(&successor).expect("boundaries");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, BoundaryKind::Close);
}

#[test]
fn migrations_are_recorded_on_the_other_dna() {
    let node = solo(1);
    let other_dna = Entry::new("other application").hash();
    let own_key = Hash::from(node.peer_id().expect("peer"));
    let migrate = MigrateEntry::new(MigrateType::Close, &other_dna, &own_key, "");
    node.migrate(migrate).expect("migrate");

    let records = node.dht().boundaries(&other_dna).expect("boundaries");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, BoundaryKind::Migrate);
}

// ============================================================================
// Bundles
// ============================================================================

#[test]
fn bundle_commits_are_isolated_until_close() {
    let node = solo(1);
    let before = node.chain_len().expect("len");
    node.start_bundle(0, "batch").expect("start");

    let info = node.bundle_info().expect("info").expect("open bundle");
    assert_eq!(info.user_param, "batch");
    assert_eq!(info.timeout_ms, 5000);

    let hash = node.commit("profile", profile("staged")).expect("staged commit");
    assert_eq!(node.chain_len().expect("len"), before);
    assert_eq!(node.dht().status(&hash).expect("status"), None);
    let staged = node.get(&hash, GetOptions::bundle()).expect("bundle get");
    assert_eq!(content_of(&staged), profile("staged"));
    assert_eq!(node.bundle_info().expect("info").map(|i| i.len), Some(1));

    node.close_bundle(true).expect("close");
    assert_eq!(node.chain_len().expect("len"), before + 1);
    assert_eq!(node.dht().status(&hash).expect("status"), Some(Status::Live));
    let key = node.agent().public_key().expect("key");
    node.chain().expect("chain").validate(&key, false).expect("linked");
}

#[test]
fn canceled_bundles_leave_no_trace() {
    let node = solo(1);
    let before = node.chain_len().expect("len");
    node.start_bundle(1000, "").expect("start");
    let hash = node.commit("profile", profile("discarded")).expect("staged commit");
    node.close_bundle(false).expect("cancel");

    assert_eq!(node.chain_len().expect("len"), before);
    assert!(node.bundle_info().expect("info").is_none());
    let err = node.get(&hash, GetOptions::local()).expect_err("discarded");
    assert!(err.is_not_found());
    let err = node.get(&hash, GetOptions::bundle()).expect_err("no bundle");
    assert!(matches!(err, NodeError::BundleNotStarted));
}

#[test]
fn application_can_keep_a_canceled_bundle() {
    let node = builder(1).callbacks(Arc::new(KeepBundles)).build().expect("build");
    let before = node.chain_len().expect("len");
    node.start_bundle(0, "").expect("start");
    node.commit("profile", profile("kept")).expect("staged commit");
    node.close_bundle(false).expect("cancel overridden");
    assert_eq!(node.chain_len().expect("len"), before + 1);
}

#[test]
fn only_one_bundle_at_a_time() {
    let node = solo(1);
    let err = node.close_bundle(true).expect_err("nothing open");
    assert!(matches!(err, NodeError::BundleNotStarted));

    node.start_bundle(0, "").expect("start");
    let err = node.start_bundle(0, "").expect_err("already open");
    assert!(matches!(err, NodeError::ChainLockedForBundle));
}

#[test]
fn bundle_expiry_is_reported_not_enforced() {
    let node = solo(1);
    node.start_bundle(1, "").expect("start");
    let info = node.bundle_info().expect("info").expect("open");
    let later = Timestamp::from_nanos(info.started.as_nanos() + 10_000_000);
    assert!(info.is_expired(later));
    node.commit("profile", profile("late")).expect("still accepting commits");
}

// ============================================================================
// DHT Holding
// ============================================================================

#[test]
fn repeated_puts_are_validated_once() {
    let network = MemoryNetwork::new();
    let a = joined(&network, solo(1));
    let hash = a.commit("profile", profile("ada")).expect("commit");
    let b = joined(&network, solo(2));

    let before = a.stats().snapshot().validation_requests;
    let msg = Message::new(
        MsgType::PutRequest,
        a.peer_id().expect("peer"),
        Body::Hold(HoldReq {
            entry_hash: hash,
            related_hash: None,
        }),
    );
    let first = b.handle(Protocol::Action, &msg).expect("first put");
    let second = b.handle(Protocol::Action, &msg).expect("second put");

    assert_eq!(first, second);
    match first {
        Response::Hold(resp) => assert_eq!(resp.status, Status::Live),
        other => panic!("expected hold response, got {other:?}"),
    }
    assert_eq!(a.stats().snapshot().validation_requests, before + 1);
    assert_eq!(b.dht().status(&hash).expect("status"), Some(Status::Live));
}

#[test]
fn deletes_are_seen_by_every_node() {
    let network = MemoryNetwork::new();
    let a = joined(&network, solo(1));
    let b = joined(&network, solo(2));
    let c = joined(&network, solo(3));

    let hash = a.commit("profile", profile("short lived")).expect("commit");
    a.remove(&hash, "gone").expect("remove");

    for node in [&a, &b, &c] {
        let err = node.get(&hash, GetOptions::default()).expect_err("deleted");
        assert!(matches!(err, NodeError::Dht(DhtError::HashDeleted)), "unexpected error: {err}");

        let record = node
            .get(&hash, GetOptions::default().with_status_mask(StatusMask::DELETED))
            .expect("deleted record");
        assert_eq!(content_of(&record), profile("short lived"));
    }
}

#[test]
fn holders_point_at_closer_peers() {
    let mut config = HoldfastConfig::development();
    config.dht.redundancy_factor = 2;

    let content = profile("placed");
    let hash = Entry::new(content.clone()).hash();
    let network = MemoryNetwork::new();
    let mut nodes: Vec<Arc<Node>> = (1..=5)
        .map(|n| {
            let node = builder(n).config(config.clone()).build().expect("build");
            joined(&network, node)
        })
        .collect();
    nodes.sort_by_key(|n| n.peer_id().expect("peer").as_hash().distance(&hash));

    let source = &nodes[2];
    let farthest = &nodes[4];
    source.commit("profile", content).expect("commit");
    assert_eq!(farthest.dht().status(&hash).expect("status"), None);

    let msg = Message::new(
        MsgType::PutRequest,
        source.peer_id().expect("peer"),
        Body::Hold(HoldReq {
            entry_hash: hash,
            related_hash: None,
        }),
    );
    let expected = vec![
        nodes[0].peer_id().expect("peer"),
        nodes[1].peer_id().expect("peer"),
    ];
    match farthest.handle(Protocol::Action, &msg).expect("put") {
        Response::CloserPeers(resp) => assert_eq!(resp.closer_peers, expected),
        other => panic!("expected closer peers, got {other:?}"),
    }
    for holder in &nodes[..2] {
        assert_eq!(holder.dht().status(&hash).expect("status"), Some(Status::Live));
    }
}

#[test]
fn rejected_entries_are_held_as_rejected() {
    let network = MemoryNetwork::new();
    let a = joined(&network, builder(1).callbacks(Arc::new(PickyCallback)).build().expect("build"));
    let b = joined(&network, builder(2).callbacks(Arc::new(PickyCallback)).build().expect("build"));

    let good = a.commit("profile", profile("ada")).expect("good");
    let spam = a.commit("profile", profile("spam spam")).expect("commit succeeds locally");

    assert_eq!(b.dht().status(&good).expect("status"), Some(Status::Live));
    assert_eq!(b.dht().status(&spam).expect("status"), Some(Status::Rejected));
    let err = b.get(&spam, GetOptions::default()).expect_err("rejected");
    assert!(matches!(err, NodeError::Dht(DhtError::HashRejected)));
}

#[test]
fn action_and_validate_protocols_do_not_mix() {
    let node = solo(1);
    let msg = Message::new(
        MsgType::GetRequest,
        node.peer_id().expect("peer"),
        Body::Get(GetReq {
            hash: Entry::new("x").hash(),
            status_mask: StatusMask::DEFAULT,
            get_mask: GetMask::DEFAULT,
        }),
    );
    let err = node.handle(Protocol::Validate, &msg).expect_err("wrong protocol");
    assert_eq!(err.to_string(), "message type GET_REQUEST not in validate protocol");
}

#[test]
fn validation_queries_need_a_validate_body() {
    let node = solo(1);
    let msg = Message::new(
        MsgType::ValidatePutRequest,
        node.peer_id().expect("peer"),
        Body::Hold(HoldReq {
            entry_hash: Entry::new("x").hash(),
            related_hash: None,
        }),
    );
    let err = node.handle(Protocol::Validate, &msg).expect_err("wrong body");
    assert!(matches!(err, NodeError::ExpectedValidateQuery("HoldReq")));
}

#[test]
fn keys_cannot_be_linked_from() {
    let node = solo(1);
    let own = Hash::from(node.peer_id().expect("peer"));
    let err = node
        .get_validation_response(ActionKind::Link, &own)
        .expect_err("key is not a links entry");
    assert!(matches!(err, NodeError::NotValidForKeyType));

    let resp = node
        .get_validation_response(ActionKind::Put, &own)
        .expect("key served for puts");
    assert_eq!(resp.entry_type, KEY_ENTRY_TYPE);
    assert!(resp.header.is_some());
}

// ============================================================================
// Application Messages
// ============================================================================

#[test]
fn app_messages_reach_the_receiver() {
    let network = MemoryNetwork::new();
    let a = joined(&network, solo(1));
    let b = joined(&network, builder(2).callbacks(Arc::new(EchoReceiver)).build().expect("build"));

    let reply = a
        .send_app(&b.peer_id().expect("peer"), "chat", "hello")
        .expect("reply");
    assert_eq!(reply, "chat got hello");

    let err = b
        .send_app(&a.peer_id().expect("peer"), "chat", "hello")
        .expect_err("no receiver");
    assert_eq!(
        err.to_string(),
        "application receive failed: zome chat has no receive function"
    );
}

// ============================================================================
// Key Rotation and Peer Lists
// ============================================================================

#[test]
fn rotated_keys_are_blocked_everywhere() {
    let network = MemoryNetwork::new();
    let a = joined(&network, solo(1));
    let b = joined(&network, solo(2));
    // a joined first and had nobody to announce its key to
    a.announce().expect("re-announce");

    let old = a.peer_id().expect("peer");
    let rotation = a.rotate_key(key(9), "lost laptop").expect("rotate");
    assert_eq!(rotation.old_peer, old);
    assert_eq!(a.peer_id().expect("peer"), rotation.new_peer);
    assert_eq!(rotation.new_peer, key(9).verifying_key().peer_id());

    for node in [&a, &b] {
        assert!(node.dht().is_blocked(&old).expect("blocked"));
        assert!(!node.routing().contains(&old).expect("routing"));
    }
    assert!(b.routing().contains(&rotation.new_peer).expect("routing"));

    let found = b
        .get(&Hash::from(old), GetOptions::default())
        .expect("old key follows");
    assert_eq!(content_of(&found), key(9).verifying_key().to_b58());

    let from_old = Message::new(
        MsgType::GetRequest,
        old,
        Body::Get(GetReq {
            hash: Hash::from(old),
            status_mask: StatusMask::DEFAULT,
            get_mask: GetMask::DEFAULT,
        }),
    );
    let err = b.handle(Protocol::Action, &from_old).expect_err("blocked sender");
    assert!(matches!(err, NodeError::Blocked(peer) if peer == old));
}

#[test]
fn rotation_records_the_revocation_in_the_agent_entry() {
    let node = solo(1);
    let rotation = node.rotate_key(key(9), "scheduled").expect("rotate");

    let chain = node.chain().expect("chain");
    let (_, header) = chain.top_type("%agent").expect("agent header");
    let (entry, _) = chain.get_entry(&header.entry_link).expect("agent entry");
    let agent: AgentEntry = entry.decode_json().expect("agent json");
    assert_eq!(agent.public_key, key(9).verifying_key().to_b58());
    let revocation = SelfRevocation::unmarshal(&agent.revocation).expect("revocation");
    assert_eq!(revocation, rotation.revocation);
    revocation.verify().expect("signed by both keys");
}

#[test]
fn list_add_with_undecodable_warrant_is_rejected() {
    let node = solo(1);
    let msg = Message::new(
        MsgType::ListAddRequest,
        node.peer_id().expect("peer"),
        Body::ListAdd(holdfast_wire::ListAddReq {
            list_type: ListType::Blocked,
            peers: vec![key(5).verifying_key().peer_id().to_b58()],
            warrant_type: SELF_REVOCATION_WARRANT,
            warrant: b"not a revocation".to_vec(),
        }),
    );
    let err = node.handle(Protocol::Action, &msg).expect_err("bad warrant");
    assert!(
        err.to_string()
            .starts_with("List add request rejected on warrant failure: unable to decode warrant"),
        "unexpected error: {err}"
    );
    assert!(!node.dht().is_blocked(&key(5).verifying_key().peer_id()).expect("blocked"));
}

#[test]
fn peers_blocked_while_connecting_never_stay_routed() {
    let node = solo(1);
    let peers: Vec<PeerId> = (10..=60).map(|n| key(n).verifying_key().peer_id()).collect();

    std::thread::scope(|s| {
        s.spawn(|| {
            for p in &peers {
                node.connect(*p).expect("connect");
            }
        });
        s.spawn(|| {
            for p in &peers {
                node.dht()
                    .add_to_list(&ListType::Blocked, &[*p], |blocked| {
                        for b in blocked {
                            node.routing().remove(b).expect("remove");
                        }
                    })
                    .expect("block");
            }
        });
    });

    for p in &peers {
        assert!(node.dht().is_blocked(p).expect("blocked"));
        assert!(!node.routing().contains(p).expect("routing"), "blocked peer {p} still routed");
        assert!(!node.dht().is_gossiper(p).expect("gossiper"));
    }
}

// ============================================================================
// Warrants
// ============================================================================

fn revocation_warrant() -> SelfRevocationWarrant {
    SelfRevocationWarrant::new(SelfRevocation::new(&key(1), &key(2), b"retired"))
}

#[test]
fn warrant_names_both_keys() {
    let warrant = revocation_warrant();
    let parties = warrant.parties().expect("parties");
    assert_eq!(
        parties,
        vec![
            Hash::from(key(1).verifying_key().peer_id()),
            Hash::from(key(2).verifying_key().peer_id()),
        ]
    );
    assert_eq!(warrant.property("payload").expect("payload"), Value::String("retired".into()));
    assert!(matches!(
        warrant.property("reason"),
        Err(NodeError::WarrantPropertyNotFound)
    ));
}

#[test]
fn warrant_requires_the_old_key_to_be_modified() {
    let warrant = revocation_warrant();
    let parties = warrant.parties().expect("parties");
    let dht = DhtStore::new();
    let source = key(1).verifying_key().peer_id();
    dht.put(parties[0], KEY_ENTRY_TYPE, Entry::new("old"), source, Status::Live)
        .expect("put old key");

    let err = warrant.verify(&dht).expect_err("not modified yet");
    assert_eq!(err.to_string(), "expected old key to be modified on DHT");

    dht.modify(&parties[0], &Entry::new("elsewhere").hash()).expect("modify");
    let err = warrant.verify(&dht).expect_err("wrong target");
    assert_eq!(err.to_string(), "expected old key to point to new key on DHT");
}

#[test]
fn warrant_verifies_once_the_dht_agrees() {
    let warrant = revocation_warrant();
    let parties = warrant.parties().expect("parties");
    let dht = DhtStore::new();
    let source = key(1).verifying_key().peer_id();
    dht.put(parties[0], KEY_ENTRY_TYPE, Entry::new("old"), source, Status::Live)
        .expect("put old key");
    dht.modify(&parties[0], &parties[1]).expect("modify");
    warrant.verify(&dht).expect("verifies");
}

#[test]
fn warrants_decode_by_type() {
    let registry = WarrantRegistry::default();
    let warrant = revocation_warrant();
    let bytes = warrant.encode().expect("encode");

    let decoded = registry
        .decode(SELF_REVOCATION_WARRANT, &bytes)
        .expect("decode");
    assert_eq!(decoded.parties().expect("parties"), warrant.parties().expect("parties"));

    let err = registry.decode(42, &bytes).expect_err("unknown type");
    assert!(matches!(err, NodeError::UnknownWarrantType(42)));
    let err = WarrantRegistry::empty()
        .decode(SELF_REVOCATION_WARRANT, &bytes)
        .expect_err("no decoders");
    assert!(matches!(err, NodeError::UnknownWarrantType(SELF_REVOCATION_WARRANT)));
}

// ============================================================================
// Validation Callbacks
// ============================================================================

#[test_case(json!(true), None; "true is valid")]
#[test_case(json!(""), None; "empty string is valid")]
#[test_case(json!(false), Some("Validation Failed"); "false fails")]
#[test_case(json!("too short"), Some("too short"); "string is the reason")]
#[test_case(json!(7), Some("validatePut should return boolean or string"); "number is a protocol error")]
#[test_case(json!(null), Some("validatePut should return boolean or string"); "null is a protocol error")]
fn callback_outcomes(outcome: Value, expected: Option<&str>) {
    let result = interpret_outcome("validatePut", &outcome);
    match expected {
        None => result.expect("valid"),
        Some(message) => {
            let err = result.expect_err("invalid");
            assert_eq!(err.to_string(), message);
        }
    }
}

#[test]
fn callback_names_follow_the_action() {
    let entry = Entry::new("{}");
    let action = CommitAction::new("profile", entry);
    let def = EntryDef::new("profile", DataFormat::Json, Sharing::Public);
    let package = ValidationPackage::default();
    let request = ValidationRequest {
        action: &action,
        def: &def,
        package: &package,
        sources: &[],
    };
    assert_eq!(request.callback_name(), "validateCommit");
}

// ============================================================================
// Validation Packages
// ============================================================================

#[test]
fn packages_omit_the_dna_and_hide_private_entries() {
    let node = solo(1);
    node.commit("diary", "secret").expect("private");
    node.commit("profile", profile("ada")).expect("public");

    let chain = node.chain().expect("chain");
    let package = make_package(&chain, node.dna(), &PackagingRequest::full()).expect("package");
    let signer = node.agent().public_key().expect("key");
    let decoded = make_validation_package(Some(&package), &signer).expect("decode");
    let slice = decoded.chain.expect("chain slice");
    let contents: Vec<String> = slice
        .entries()
        .map(|e| e.content().to_string())
        .collect();
    assert!(!contents.iter().any(|c| c == "secret"));
    assert!(contents.contains(&profile("ada")));

    let empty = make_package(&chain, node.dna(), &PackagingRequest::default()).expect("package");
    assert!(empty.chain.is_none());
}

#[test]
fn packages_are_checked_against_the_sources_key() {
    let node = solo(1);
    node.commit("profile", profile("ada")).expect("commit");
    let chain = node.chain().expect("chain");
    let package = make_package(&chain, node.dna(), &PackagingRequest::full()).expect("package");

    let err = make_validation_package(Some(&package), &key(2).verifying_key())
        .expect_err("signed by someone else");
    assert!(matches!(
        err,
        NodeError::Chain(ChainError::BadSignature { .. })
    ));
}

// ============================================================================
// Untrusted Sources
// ============================================================================

/// Ways a source can misrepresent the entry behind a hash.
#[derive(Debug, Clone, Copy)]
enum Lie {
    ForgedEntry,
    ForeignKey,
    ForeignSignature,
    OtherEntryLink,
}

/// Answers every validation query on behalf of `key(1)` with `{"name":"forged"}`.
#[derive(Debug)]
struct LyingSource {
    lie: Lie,
}

impl LyingSource {
    fn answer(&self, hash: Hash) -> ValidateResponse {
        let forged = Entry::new(profile("forged"));
        let (entry, entry_link) = match self.lie {
            Lie::ForgedEntry | Lie::ForeignKey | Lie::ForeignSignature => (forged, hash),
            Lie::OtherEntryLink => (forged.clone(), forged.hash()),
        };
        let signing = match self.lie {
            Lie::ForeignSignature => key(3),
            _ => key(1),
        };
        let public_key = match self.lie {
            Lie::ForeignKey => key(3).verifying_key().to_b58(),
            _ => key(1).verifying_key().to_b58(),
        };
        ValidateResponse {
            entry_type: "profile".to_string(),
            public_key,
            header: Some(Header {
                entry_type: "profile".to_string(),
                time: Timestamp::now(),
                header_link: Hash::NULL,
                entry_link,
                type_link: Hash::NULL,
                signature: signing.sign(entry_link.as_bytes()),
                change: None,
            }),
            entry: Some(entry),
            package: Package::default(),
        }
    }
}

impl Transport for LyingSource {
    fn send(&self, protocol: Protocol, to: &PeerId, msg: &Message) -> Result<Response> {
        match (&protocol, &msg.body) {
            (Protocol::Validate, Body::ValidateQuery(query)) => {
                Ok(Response::Validate(self.answer(query.hash)))
            }
            _ => Err(NodeError::Unreachable(*to)),
        }
    }

    fn rebind(&self, _old: &PeerId, _new: &PeerId) -> Result<()> {
        Ok(())
    }
}

#[test_case(Lie::ForgedEntry, "entry does not hash to the queried hash"; "content swapped")]
#[test_case(Lie::ForeignKey, "key does not belong to the sender"; "someone else's key")]
#[test_case(Lie::ForeignSignature, "header signature does not verify"; "signed by another agent")]
#[test_case(Lie::OtherEntryLink, "header links another entry"; "header for another entry")]
fn holders_refuse_data_that_is_not_what_the_hash_addresses(lie: Lie, expected: &str) {
    let holder = solo(2);
    holder
        .attach_transport(Arc::new(LyingSource { lie }))
        .expect("attach");
    let honest = Entry::new(profile("honest")).hash();
    let source = key(1).verifying_key().peer_id();
    let msg = Message::new(
        MsgType::PutRequest,
        source,
        Body::Hold(HoldReq {
            entry_hash: honest,
            related_hash: None,
        }),
    );

    let err = holder.handle(Protocol::Action, &msg).expect_err("refused");
    match err {
        NodeError::ForgedResponse { peer, hash, reason } => {
            assert_eq!(peer, source);
            assert_eq!(hash, honest);
            assert_eq!(reason, expected);
        }
        other => panic!("expected a refused response, got {other}"),
    }
    assert_eq!(holder.dht().status(&honest).expect("status"), None);
    assert!(holder.get(&honest, GetOptions::default()).is_err());
}

// ============================================================================
// Bridging
// ============================================================================

fn bridged_dna() -> Dna {
    test_dna().with_zome(Zome::new("api").with_bridge_funcs(["lookup"]))
}

#[test]
fn bridge_calls_need_a_granted_function() {
    let callee = Node::builder(bridged_dna())
        .agent("callee", key(1))
        .config(HoldfastConfig::development())
        .bridge_host(Arc::new(EchoHost::default()))
        .build()
        .expect("build");
    let caller_app = Entry::new("caller app").hash();

    let token = callee.add_bridge_as_callee(&caller_app, "").expect("bridge");
    let reply = callee.bridge_call("api", "lookup", "ada", &token).expect("call");
    assert_eq!(reply, "api.lookup(ada)");

    let err = callee
        .bridge_call("api", "drop_tables", "", &token)
        .expect_err("not bridged");
    assert_eq!(err.to_string(), "bridging error: function not bridged");
    let err = callee
        .bridge_call("api", "lookup", "", "forged")
        .expect_err("bad token");
    assert!(matches!(err, NodeError::Bridge(BridgeError::Call(_))));

    let bridges = callee.bridges().expect("bridges");
    assert_eq!(bridges.len(), 1);
    assert_eq!(bridges[0].side, BridgeSide::Callee);
    assert_eq!(bridges[0].app, caller_app);
}

#[test]
fn callers_remember_their_token() {
    let callee_app = Entry::new("callee app").hash();
    let dna = test_dna().with_zome(Zome::new("client").with_bridge_to(callee_app));
    let caller = Node::builder(dna)
        .config(HoldfastConfig::development())
        .bridge_host(Arc::new(EchoHost::default()))
        .build()
        .expect("build");

    caller
        .add_bridge_as_caller(&callee_app, "token-1", "mem://callee", "")
        .expect("bridge");
    let (token, url) = caller.bridge_token(&callee_app).expect("token");
    assert_eq!(token, "token-1");
    assert_eq!(url, "mem://callee");
}

#[test]
fn refused_genesis_adds_no_bridge() {
    let callee = Node::builder(bridged_dna())
        .config(HoldfastConfig::development())
        .bridge_host(Arc::new(EchoHost {
            refuse_genesis: true,
        }))
        .build()
        .expect("build");
    let err = callee
        .add_bridge_as_callee(&Entry::new("caller app").hash(), "")
        .expect_err("refused");
    assert!(matches!(err, NodeError::Bridge(BridgeError::GenesisRefused { .. })));
    assert!(callee.bridges().expect("bridges").is_empty());
}

#[test]
fn bridging_needs_a_host() {
    let node = solo(1);
    let err = node
        .add_bridge_as_callee(&Entry::new("caller app").hash(), "")
        .expect_err("no host");
    assert!(matches!(err, NodeError::NoBridgeHost));
}

// ============================================================================
// Errors on the Wire
// ============================================================================

#[test]
fn not_found_survives_the_wire() {
    let err = NodeError::from(DhtError::HashNotFound);
    let back = NodeError::from_error_resp(err.to_error_resp());
    assert!(back.is_not_found());

    let err = NodeError::validation_failed("no spam");
    let back = NodeError::from_error_resp(err.to_error_resp());
    assert!(matches!(back, NodeError::Remote(ref m) if m == "no spam"));
}

#[test]
fn hold_responses_are_signed_by_the_holder() {
    let network = MemoryNetwork::new();
    let a = joined(&network, solo(1));
    let b = joined(&network, solo(2));
    let hash = a.commit("profile", profile("ada")).expect("commit");

    let msg = Message::new(
        MsgType::PutRequest,
        a.peer_id().expect("peer"),
        Body::Hold(HoldReq {
            entry_hash: hash,
            related_hash: None,
        }),
    );
    let signature: Signature = match b.handle(Protocol::Action, &msg).expect("hold") {
        Response::Hold(resp) => resp.signature,
        other => panic!("expected hold response, got {other:?}"),
    };
    let fingerprint = msg.fingerprint().expect("fingerprint");
    key(2)
        .verifying_key()
        .verify(fingerprint.as_bytes(), &signature)
        .expect("holder signature");
}
