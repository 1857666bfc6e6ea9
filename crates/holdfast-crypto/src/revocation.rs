//! Self-revocation: an agent retiring its old key in favour of a new one.

use holdfast_types::Signature;
use serde::{Deserialize, Serialize};

use crate::{CryptoError, MARSHALED_KEY_LENGTH, SigningKey, VerifyingKey};

/// A statement that the old key is replaced by the new key, signed by both.
///
/// The signed data is `[len(old)] || old || new || payload`, with both keys
/// in their marshaled form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SelfRevocation {
    data: Vec<u8>,
    old_sig: Signature,
    new_sig: Signature,
}

impl SelfRevocation {
    pub fn new(old: &SigningKey, new: &SigningKey, payload: &[u8]) -> Self {
        let old_marshaled = old.verifying_key().marshal();
        let new_marshaled = new.verifying_key().marshal();

        let mut data = Vec::with_capacity(1 + 2 * MARSHALED_KEY_LENGTH + payload.len());
        data.push(old_marshaled.len() as u8);
        data.extend_from_slice(&old_marshaled);
        data.extend_from_slice(&new_marshaled);
        data.extend_from_slice(payload);

        Self {
            old_sig: old.sign(&data),
            new_sig: new.sign(&data),
            data,
        }
    }

    fn split(&self) -> Result<(&[u8], &[u8], &[u8]), CryptoError> {
        let Some((&old_len, rest)) = self.data.split_first() else {
            return Err(CryptoError::BadRevocationFormat("empty data".to_string()));
        };
        let old_len = usize::from(old_len);
        if rest.len() < old_len + MARSHALED_KEY_LENGTH {
            return Err(CryptoError::BadRevocationFormat("data too short".to_string()));
        }
        let (old, rest) = rest.split_at(old_len);
        let (new, payload) = rest.split_at(MARSHALED_KEY_LENGTH);
        Ok((old, new, payload))
    }

    pub fn old_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::unmarshal(self.split()?.0)
    }

    pub fn new_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::unmarshal(self.split()?.1)
    }

    pub fn payload(&self) -> Result<&[u8], CryptoError> {
        Ok(self.split()?.2)
    }

    /// Checks both signatures over the revocation data.
    pub fn verify(&self) -> Result<(), CryptoError> {
        self.old_key()?.verify(&self.data, &self.old_sig)?;
        self.new_key()?.verify(&self.data, &self.new_sig)
    }

    pub fn marshal(&self) -> Result<String, CryptoError> {
        serde_json::to_string(self).map_err(|e| CryptoError::BadRevocationFormat(e.to_string()))
    }

    /// Parses a marshaled revocation. Only the structure is checked, not the signatures.
    pub fn unmarshal(text: &str) -> Result<Self, CryptoError> {
        let revocation: Self =
            serde_json::from_str(text).map_err(|e| CryptoError::BadRevocationFormat(e.to_string()))?;
        revocation.split()?;
        Ok(revocation)
    }
}
