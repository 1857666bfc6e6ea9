//! The application side of validation.
//!
//! Application code runs in an execution sandbox the node knows nothing
//! about. It is reached through [`ValidationCallback`], which receives the
//! action under validation and answers with a JSON value:
//!
//! - `true` or `""`: valid
//! - `false`: invalid, with the reason "Validation Failed"
//! - a non-empty string: invalid, with that string as the reason
//! - anything else is a protocol error

use holdfast_types::{EntryDef, PeerId};
use holdfast_wire::AppMsg;
use serde_json::Value;

use crate::action::ValidatingAction;
use crate::error::{NodeError, Result, VALIDATION_FAILED};
use crate::package::{PackagingRequest, ValidationPackage};

/// Everything an application validator gets to look at.
pub struct ValidationRequest<'a> {
    pub action: &'a dyn ValidatingAction,
    pub def: &'a EntryDef,
    pub package: &'a ValidationPackage,
    pub sources: &'a [PeerId],
}

impl ValidationRequest<'_> {
    /// Name of the application function serving this request, e.g. `validateMod`.
    pub fn callback_name(&self) -> String {
        callback_name("validate", self.action.name(), "")
    }
}

/// What the application wants done with a bundle the user canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BundleCancelResponse {
    #[default]
    Ok,
    /// Commit the bundle anyway.
    Commit,
}

pub trait ValidationCallback: Send + Sync {
    fn validate(&self, request: &ValidationRequest<'_>) -> Value;

    /// Chain data the validators of `action` on `def` entries need shipped.
    fn packaging_request(&self, _action: &str, _def: &EntryDef) -> PackagingRequest {
        PackagingRequest::default()
    }

    fn bundle_canceled(&self, _reason: &str) -> BundleCancelResponse {
        BundleCancelResponse::Ok
    }

    /// Handles an application message sent by another node.
    fn receive(&self, _from: &PeerId, message: &AppMsg) -> Result<String, String> {
        Err(format!("zome {} has no receive function", message.zome))
    }
}

/// Accepts everything. Useful for applications with no rules of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl ValidationCallback for AcceptAll {
    fn validate(&self, _request: &ValidationRequest<'_>) -> Value {
        Value::Bool(true)
    }
}

/// Turns a callback's return value into a validation result.
pub fn interpret_outcome(callback: &str, outcome: &Value) -> Result<()> {
    match outcome {
        Value::Bool(true) => Ok(()),
        Value::Bool(false) => Err(NodeError::validation_failed(VALIDATION_FAILED)),
        Value::String(reason) if reason.is_empty() => Ok(()),
        Value::String(reason) => Err(NodeError::validation_failed(reason.clone())),
        _ => Err(NodeError::BadCallbackReturn {
            callback: callback.to_string(),
        }),
    }
}

/// `prefix` + capitalized `action` + `suffix`, e.g. `validateCommit`.
pub(crate) fn callback_name(prefix: &str, action: &str, suffix: &str) -> String {
    let mut chars = action.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("{prefix}{capitalized}{suffix}")
}
