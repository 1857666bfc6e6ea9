//! # holdfast-crypto: Agent keys for `holdfast`
//!
//! Wraps `ed25519-dalek` with the text and identity formats used across the
//! ledger:
//! - [`SigningKey`] / [`VerifyingKey`]: header, hold-response and warrant signatures
//! - public key text form: base58 of the marshaled key (always 49 characters)
//! - [`VerifyingKey::peer_id`]: the DHT address of an agent
//! - [`SelfRevocation`]: a statement signed by both an old and a new key

mod error;
mod keys;
mod revocation;

pub use error::CryptoError;
pub use keys::{MARSHALED_KEY_LENGTH, PUBLIC_KEY_TEXT_LENGTH, SigningKey, VerifyingKey, peer_id_from_b58};
pub use revocation::SelfRevocation;

#[cfg(test)]
mod tests;
