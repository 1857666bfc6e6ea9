//! The validation engine and the source side of the validation phase.

use holdfast_crypto::{SelfRevocation, VerifyingKey};
use holdfast_dht::DhtError;
use holdfast_types::{
    AgentEntry, DNA_ENTRY_TYPE, DataFormat, DelEntry, Entry, EntryDef, Hash, KEY_ENTRY_TYPE,
    PeerId, SystemType,
};
use holdfast_wire::{Body, Message, Package, Protocol, Response, ValidateQuery, ValidateResponse};
use serde_json::Value;

use crate::action::{ActionKind, ValidatingAction};
use crate::callback::{ValidationRequest, interpret_outcome};
use crate::error::{NodeError, Result};
use crate::node::Node;
use crate::package::{ValidationPackage, make_package, make_validation_package};

// ============================================================================
// Validation Engine
// ============================================================================

impl Node {
    /// Runs system validation and, for application types, the application
    /// validator. Returns the resolved definition.
    pub(crate) fn validate_action(
        &self,
        action: &dyn ValidatingAction,
        entry_type: &str,
        pkg: &ValidationPackage,
        sources: &[PeerId],
    ) -> Result<EntryDef> {
        let (_, def) = self.dna().entry_def(entry_type)?;

        action.sys_validation(def, pkg, sources)?;
        if def.is_system() {
            return Ok(def.clone());
        }

        let request = ValidationRequest {
            action,
            def,
            package: pkg,
            sources,
        };
        let outcome = self.callbacks().validate(&request);
        interpret_outcome(&request.callback_name(), &outcome)?;
        tracing::trace!(action = action.name(), entry_type, "application validation passed");
        Ok(def.clone())
    }
}

/// Structural checks shared by every entry-carrying action.
pub(crate) fn sys_validate_entry(
    def: &EntryDef,
    entry: Option<&Entry>,
    _pkg: &ValidationPackage,
) -> Result<()> {
    if def.system_type() == Some(SystemType::Dna) {
        return Err(NodeError::NotValidForDnaType);
    }
    let entry = entry.ok_or(NodeError::NilEntryInvalid)?;

    match def.system_type() {
        Some(SystemType::Key) => {
            VerifyingKey::from_b58(entry.content())?;
        }
        Some(SystemType::Agent) => {
            let agent: AgentEntry = entry.decode_json()?;
            VerifyingKey::from_b58(&agent.public_key)?;
            if !agent.revocation.is_empty() {
                SelfRevocation::unmarshal(&agent.revocation)?;
            }
        }
        _ => {}
    }

    if let Some(schema) = &def.schema {
        let value = match def.data_format {
            DataFormat::Json | DataFormat::Links => {
                serde_json::from_str::<Value>(entry.content()).map_err(|e| {
                    NodeError::validation_failed(format!("invalid json entry: {e}"))
                })?
            }
            _ => Value::String(entry.content().to_string()),
        };
        if def.system_type() == Some(SystemType::Del) {
            let del: DelEntry = entry.decode_json()?;
            Hash::from_b58(&del.hash).map_err(|e| {
                NodeError::validation_failed(format!(
                    "Error ({e}) when decoding Hash value '{}'",
                    del.hash
                ))
            })?;
        }
        schema.validate(&value).map_err(NodeError::validation_failed)?;
    } else if def.data_format == DataFormat::Links {
        validate_links_shape(entry.content())?;
    }
    Ok(())
}

/// Checks `{"Links":[{"Base":..,"Link":..,"Tag":..}, ...]}` field by field.
fn validate_links_shape(content: &str) -> Result<()> {
    let invalid = |reason: String| NodeError::validation_failed(format!("invalid links entry{reason}"));

    let value: Value =
        serde_json::from_str(content).map_err(|e| invalid(format!(", invalid json: {e}")))?;
    let links = value
        .get("Links")
        .and_then(Value::as_array)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| invalid(": you must specify at least one link".to_string()))?;

    for link in links {
        for field in ["Base", "Link"] {
            let text = link
                .get(field)
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(format!(": missing {field}")))?;
            Hash::from_b58(text).map_err(|e| invalid(format!(": {field} {e}")))?;
        }
        if link.get("Tag").and_then(Value::as_str).is_none() {
            return Err(invalid(": missing Tag".to_string()));
        }
    }
    Ok(())
}

// ============================================================================
// Validation Phase
// ============================================================================

impl Node {
    /// Source side: the entry, header and package a validator asked for.
    pub(crate) fn get_validation_response(
        &self,
        kind: ActionKind,
        hash: &Hash,
    ) -> Result<ValidateResponse> {
        let found = self.source_chain().read(|chain| {
            chain.get_entry(hash).map(|(entry, entry_type)| {
                let header = chain.get_entry_header(hash).map(|(_, h)| h.clone());
                (entry.clone(), entry_type.to_string(), header)
            })
        })?;

        let (entry, entry_type, header) = match found {
            Some(found) => found,
            None if *hash == Hash::from(self.peer_id()?) => (
                self.agent().key_entry()?,
                KEY_ENTRY_TYPE.to_string(),
                Some(self.agent().key_header()?),
            ),
            None => return Err(DhtError::HashNotFound.into()),
        };

        if entry_type == DNA_ENTRY_TYPE {
            return Err(NodeError::DnaNotGettable);
        }
        let (_, def) = self.dna().entry_def(&entry_type)?;
        kind.check_validation_request(def)?;

        let package = if def.is_system() {
            Package::default()
        } else {
            let request = self.callbacks().packaging_request(kind.name(), def);
            self.source_chain()
                .read(|chain| make_package(chain, self.dna(), &request))??
        };

        Ok(ValidateResponse {
            entry_type,
            public_key: self.agent().public_key()?.to_b58(),
            header,
            entry: Some(entry),
            package,
        })
    }

    /// Answers a `VALIDATE_*_REQUEST`.
    pub(crate) fn receive_validate(&self, msg: &Message) -> Result<Response> {
        self.stats().record_validation_request();
        let kind = ActionKind::from_validate_type(msg.msg_type)?;
        let Body::ValidateQuery(query) = &msg.body else {
            return Err(NodeError::ExpectedValidateQuery(msg.body.kind()));
        };
        tracing::debug!(hash = %query.hash, from = %msg.from, action = kind.name(), "serving validation request");
        Ok(Response::Validate(
            self.get_validation_response(kind, &query.hash)?,
        ))
    }

    /// Holder side: asks the sender of a hold request for the data to
    /// validate `hash` with. The answer must be the entry `hash` addresses,
    /// under a header signed by the sender; its package is decoded and
    /// checked against the same key.
    pub(crate) fn fetch_validation_response(
        &self,
        msg: &Message,
        hash: &Hash,
    ) -> Result<(ValidateResponse, ValidationPackage)> {
        let validate_type = msg
            .msg_type
            .validate_request()
            .ok_or(NodeError::NonDhtAction(msg.msg_type.name()))?;
        let query = Message::new(
            validate_type,
            self.peer_id()?,
            Body::ValidateQuery(ValidateQuery { hash: *hash }),
        );
        let resp = match self.send(Protocol::Validate, &msg.from, &query)? {
            Response::Validate(resp) => resp,
            other => {
                return Err(NodeError::UnexpectedResponse {
                    expected: "ValidateResponse",
                    peer: msg.from,
                    got: other.kind(),
                });
            }
        };
        let signer = check_response(&resp, &msg.from, hash)?;
        let package = make_validation_package(Some(&resp.package), &signer)?;
        Ok((resp, package))
    }
}

/// Binds a validation response to the queried hash and to the peer that
/// answered. Returns the answering agent's key.
fn check_response(resp: &ValidateResponse, source: &PeerId, hash: &Hash) -> Result<VerifyingKey> {
    let forged = |reason| NodeError::ForgedResponse {
        peer: *source,
        hash: *hash,
        reason,
    };

    let signer = VerifyingKey::from_b58(&resp.public_key).map_err(|_| forged("bad public key"))?;
    if signer.peer_id() != *source {
        return Err(forged("key does not belong to the sender"));
    }
    let header = resp.header.as_ref().ok_or_else(|| forged("missing header"))?;
    if header.entry_link != *hash {
        return Err(forged("header links another entry"));
    }
    signer
        .verify(hash.as_bytes(), &header.signature)
        .map_err(|_| forged("header signature does not verify"))?;

    if let Some(entry) = &resp.entry {
        // A virtual %key entry lives at its peer id rather than its content hash
        let addressed = entry.hash() == *hash
            || (resp.entry_type == KEY_ENTRY_TYPE
                && VerifyingKey::from_b58(entry.content())
                    .is_ok_and(|key| Hash::from(key.peer_id()) == *hash));
        if !addressed {
            return Err(forged("entry does not hash to the queried hash"));
        }
    }
    Ok(signer)
}
