use std::sync::Mutex;

use super::*;
use holdfast_types::Hash;
use test_case::test_case;

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Default)]
struct Host {
    refuse: Option<&'static str>,
    genesis_calls: Mutex<Vec<(String, BridgeSide)>>,
}

impl BridgeHost for Host {
    fn bridge_genesis(
        &self,
        zome: &str,
        side: BridgeSide,
        _other_app: &Hash,
        _app_data: &str,
    ) -> Result<bool, String> {
        self.genesis_calls
            .lock()
            .expect("lock")
            .push((zome.to_string(), side));
        Ok(self.refuse != Some(zome))
    }

    fn call(&self, zome: &str, function: &str, args: &str) -> Result<String, String> {
        if function == "explode" {
            return Err("zome panicked".to_string());
        }
        Ok(format!("{zome}.{function}({args})"))
    }
}

fn spec() -> BridgeSpec {
    let funcs = vec!["getProfile".to_string()];
    let none: Vec<String> = Vec::new();
    BridgeSpec::from_zomes([("profiles", funcs.as_slice()), ("empty", none.as_slice())])
}

// ============================================================================
// Capabilities
// ============================================================================

#[test]
fn capability_tokens_are_numeric_and_revocable() {
    let caps = CapabilityStore::new();
    let token = caps.new_capability("grant").expect("issue");
    assert!(token.parse::<u64>().expect("numeric") <= i64::MAX as u64);
    assert_eq!(caps.validate(&token).expect("valid"), "grant");

    caps.revoke(&token).expect("revoke");
    assert_eq!(
        caps.validate(&token).expect_err("revoked").to_string(),
        "invalid capability"
    );
    assert!(matches!(
        caps.revoke(&token),
        Err(BridgeError::InvalidCapability)
    ));
}

#[test]
fn spec_skips_zomes_without_functions() {
    let spec = spec();
    assert_eq!(spec.zomes(), vec!["profiles"]);
    let decoded = BridgeSpec::decode(&spec.encode().expect("encode")).expect("decode");
    assert_eq!(decoded, spec);
}

#[test_case("profiles", "getProfile", true; "bridged function")]
#[test_case("profiles", "setProfile", false; "other function")]
#[test_case("posts", "getProfile", false; "other zome")]
fn spec_allows(zome: &str, function: &str, expected: bool) {
    assert_eq!(spec().allows(zome, function), expected);
    assert!(BridgeSpec::Wildcard.allows(zome, function));
}

// ============================================================================
// Bridging
// ============================================================================

#[test]
fn bridged_call_reaches_host() {
    let registry = BridgeRegistry::new();
    let host = Host::default();
    let token = registry
        .add_bridge_as_callee(&Hash::of(b"caller dna"), &spec(), "{}", &host)
        .expect("callee");
    assert_eq!(
        host.genesis_calls.lock().expect("lock").as_slice(),
        &[("profiles".to_string(), BridgeSide::Callee)]
    );

    let out = registry
        .bridge_call("profiles", "getProfile", "\"alice\"", &token, &host)
        .expect("call");
    assert_eq!(out, "profiles.getProfile(\"alice\")");
}

#[test_case("profiles", "setProfile", "bridging error: function not bridged"; "not bridged")]
#[test_case("profiles", "explode", "bridging error: function not bridged"; "unlisted failing function")]
fn bridged_call_rejections(zome: &str, function: &str, message: &str) {
    let registry = BridgeRegistry::new();
    let host = Host::default();
    let token = registry
        .add_bridge_as_callee(&Hash::of(b"caller dna"), &spec(), "", &host)
        .expect("callee");
    let err = registry
        .bridge_call(zome, function, "", &token, &host)
        .expect_err("refused");
    assert_eq!(err.to_string(), message);
}

#[test]
fn bridged_call_errors_are_prefixed() {
    let registry = BridgeRegistry::new();
    let host = Host::default();
    let err = registry
        .bridge_call("profiles", "getProfile", "", "12345", &host)
        .expect_err("bad token");
    assert_eq!(err.to_string(), "bridging error: invalid capability");

    let token = registry
        .add_bridge_as_callee(&Hash::of(b"dna"), &BridgeSpec::Wildcard, "", &host)
        .expect("callee");
    let err = registry
        .bridge_call("profiles", "explode", "", &token, &host)
        .expect_err("host failure");
    assert_eq!(err.to_string(), "bridging error: zome panicked");
}

#[test]
fn refused_genesis_revokes_token() {
    let registry = BridgeRegistry::new();
    let host = Host {
        refuse: Some("profiles"),
        ..Host::default()
    };
    let err = registry
        .add_bridge_as_callee(&Hash::of(b"dna"), &spec(), "", &host)
        .expect_err("refused");
    assert!(matches!(err, BridgeError::GenesisRefused { .. }));
    assert!(registry.capabilities().tokens().expect("tokens").is_empty());
    assert!(registry.bridges().expect("bridges").is_empty());
}

#[test]
fn caller_side_stores_token_and_url() {
    let registry = BridgeRegistry::new();
    let host = Host::default();
    let callee = Hash::of(b"callee dna");
    assert!(matches!(
        registry.bridge_token(&callee),
        Err(BridgeError::AppNotFound)
    ));

    registry
        .add_bridge_as_caller(&callee, "42", "http://localhost:4141", &["posts"], "", &host)
        .expect("caller");
    let (token, url) = registry.bridge_token(&callee).expect("token");
    assert_eq!(token, "42");
    assert_eq!(url, "http://localhost:4141");

    let bridges = registry.bridges().expect("bridges");
    assert_eq!(bridges.len(), 1);
    assert_eq!(bridges[0].side, BridgeSide::Caller);
    assert_eq!(bridges[0].app, callee);
}
