use super::*;
use holdfast_types::Signature;
use test_case::test_case;

// ============================================================================
// Test Helpers
// ============================================================================

fn key(seed: u8) -> SigningKey {
    SigningKey::from_seed(&[seed; 32])
}

// ============================================================================
// Public key text form
// ============================================================================

#[test]
fn public_key_text_is_49_chars_and_round_trips() {
    for seed in 1..=20 {
        let public = key(seed).verifying_key();
        let text = public.to_b58();
        assert_eq!(text.len(), PUBLIC_KEY_TEXT_LENGTH);
        assert_eq!(VerifyingKey::from_b58(&text).expect("parse"), public);
    }
}

#[test_case(""; "empty")]
#[test_case("not a key"; "not base58")]
#[test_case("Qmb2GWQYHFE4ChTy2MRhbd86A9KhwyU2CbEbQ7Aoi2Tn6v"; "content hash instead of key")]
fn malformed_public_keys_are_rejected(text: &str) {
    assert!(matches!(
        VerifyingKey::from_b58(text),
        Err(CryptoError::BadPublicKeyFormat)
    ));
}

#[test]
fn peer_id_is_stable_per_key() {
    let public = key(7).verifying_key();
    assert_eq!(public.peer_id(), key(7).verifying_key().peer_id());
    assert_ne!(public.peer_id(), key(8).verifying_key().peer_id());
    assert_eq!(
        peer_id_from_b58(&public.to_b58()).expect("peer id"),
        public.peer_id()
    );
}

// ============================================================================
// Signatures
// ============================================================================

#[test]
fn signatures_verify_only_for_signed_message_and_key() {
    let signer = key(1);
    let sig = signer.sign(b"entry link");

    assert!(signer.verifying_key().verify(b"entry link", &sig).is_ok());
    assert!(signer.verifying_key().verify(b"other", &sig).is_err());
    assert!(key(2).verifying_key().verify(b"entry link", &sig).is_err());
    assert!(
        signer
            .verifying_key()
            .verify(b"entry link", &Signature::from_bytes(vec![0; 3]))
            .is_err()
    );
}

#[test]
fn signing_key_debug_is_redacted() {
    let debug = format!("{:?}", key(3));
    assert!(debug.contains("<redacted>"));
}

// ============================================================================
// Self-revocation
// ============================================================================

#[test]
fn revocation_verifies_and_exposes_parts() {
    let (old, new) = (key(1), key(2));
    let revocation = SelfRevocation::new(&old, &new, b"lost laptop");

    revocation.verify().expect("both signatures valid");
    assert_eq!(revocation.old_key().expect("old"), old.verifying_key());
    assert_eq!(revocation.new_key().expect("new"), new.verifying_key());
    assert_eq!(revocation.payload().expect("payload"), b"lost laptop");

    let text = revocation.marshal().expect("marshal");
    assert_eq!(SelfRevocation::unmarshal(&text).expect("unmarshal"), revocation);
}

#[test]
fn tampered_revocation_fails_verification() {
    let revocation = SelfRevocation::new(&key(1), &key(2), b"payload");
    let mut value: serde_json::Value =
        serde_json::from_str(&revocation.marshal().expect("marshal")).expect("json");
    let last = value["Data"].as_array().expect("data").len() - 1;
    value["Data"][last] = serde_json::json!(0);

    let tampered = SelfRevocation::unmarshal(&value.to_string()).expect("still well formed");
    assert!(matches!(tampered.verify(), Err(CryptoError::BadSignature)));
}

#[test]
fn unmarshal_rejects_garbage() {
    assert!(matches!(
        SelfRevocation::unmarshal("{}"),
        Err(CryptoError::BadRevocationFormat(_))
    ));
    assert!(matches!(
        SelfRevocation::unmarshal(r#"{"Data":[],"OldSig":[],"NewSig":[]}"#),
        Err(CryptoError::BadRevocationFormat(_))
    ));
}
