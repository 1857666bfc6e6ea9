//! Ed25519 signing and verifying keys.

use ed25519_dalek::Signer;
use holdfast_types::{Hash, PeerId, Signature};
use rand::rngs::OsRng;

use crate::CryptoError;

/// Key type and length tag prepended to the raw key bytes when marshaling.
const KEY_PREFIX: [u8; 4] = [0x08, 0x01, 0x12, 0x20];

/// Length of a marshaled public key.
pub const MARSHALED_KEY_LENGTH: usize = KEY_PREFIX.len() + 32;

/// Length of the base58 text form of a marshaled public key.
pub const PUBLIC_KEY_TEXT_LENGTH: usize = 49;

// ============================================================================
// SigningKey
// ============================================================================

/// An agent's private key.
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

// Manual Debug implementation to avoid exposing key material
impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("public", &self.verifying_key().to_b58())
            .field("inner", &"<redacted>")
            .finish()
    }
}

impl SigningKey {
    /// Generates a new key from system randomness.
    pub fn generate() -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::generate(&mut OsRng),
        }
    }

    /// Creates a key from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    pub fn to_seed(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::from_bytes(self.inner.sign(message).to_bytes().to_vec())
    }
}

impl Clone for SigningKey {
    fn clone(&self) -> Self {
        Self::from_seed(&self.to_seed())
    }
}

// ============================================================================
// VerifyingKey
// ============================================================================

/// An agent's public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl VerifyingKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let inner =
            ed25519_dalek::VerifyingKey::from_bytes(bytes).map_err(|_| CryptoError::BadPublicKeyFormat)?;
        Ok(Self { inner })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }

    /// Marshals the key with its type prefix.
    pub fn marshal(&self) -> [u8; MARSHALED_KEY_LENGTH] {
        let mut out = [0u8; MARSHALED_KEY_LENGTH];
        out[..KEY_PREFIX.len()].copy_from_slice(&KEY_PREFIX);
        out[KEY_PREFIX.len()..].copy_from_slice(&self.inner.to_bytes());
        out
    }

    pub fn unmarshal(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != MARSHALED_KEY_LENGTH || bytes[..KEY_PREFIX.len()] != KEY_PREFIX {
            return Err(CryptoError::BadPublicKeyFormat);
        }
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&bytes[KEY_PREFIX.len()..]);
        Self::from_bytes(&raw)
    }

    /// Base58 text form of the marshaled key.
    pub fn to_b58(&self) -> String {
        bs58::encode(self.marshal()).into_string()
    }

    pub fn from_b58(text: &str) -> Result<Self, CryptoError> {
        let raw = bs58::decode(text)
            .into_vec()
            .map_err(|_| CryptoError::BadPublicKeyFormat)?;
        Self::unmarshal(&raw)
    }

    /// The peer id of the agent holding this key.
    pub fn peer_id(&self) -> PeerId {
        PeerId::new(Hash::of(&self.marshal()))
    }

    /// Verifies a signature, rejecting non-canonical encodings.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        let bytes: [u8; 64] = signature
            .as_bytes()
            .try_into()
            .map_err(|_| CryptoError::BadSignature)?;
        let sig = ed25519_dalek::Signature::from_bytes(&bytes);
        self.inner
            .verify_strict(message, &sig)
            .map_err(|_| CryptoError::BadSignature)
    }
}

/// Resolves the peer id addressed by a public key in text form.
pub fn peer_id_from_b58(text: &str) -> Result<PeerId, CryptoError> {
    Ok(VerifyingKey::from_b58(text)?.peer_id())
}
