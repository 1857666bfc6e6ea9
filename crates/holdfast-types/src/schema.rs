//! JSON Schema validators for entry content.

use std::fmt::Debug;
use std::sync::OnceLock;

use serde_json::Value;

use crate::TypeError;

/// Validates decoded entry content against a declared schema.
///
/// JSON entries are validated after decoding; string entries are passed as
/// a [`Value::String`].
pub trait SchemaValidator: Send + Sync + Debug {
    fn validate(&self, value: &Value) -> Result<(), String>;
}

/// A JSON Schema document and its compiled validator.
pub struct JsonSchema {
    document: Value,
    compiled: OnceLock<Result<jsonschema::Validator, String>>,
}

impl JsonSchema {
    /// Compiles a schema from its text form.
    pub fn compile(text: &str) -> Result<Self, TypeError> {
        Self::from_document(serde_json::from_str(text)?)
    }

    /// Compiles an already decoded schema document.
    pub fn from_document(document: Value) -> Result<Self, TypeError> {
        let schema = Self::deferred(document);
        schema.validator().map_err(TypeError::Schema)?;
        Ok(schema)
    }

    /// Defers compilation to first use. A document that fails to compile
    /// rejects every value with the compilation error.
    pub(crate) fn deferred(document: Value) -> Self {
        Self {
            document,
            compiled: OnceLock::new(),
        }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    fn validator(&self) -> Result<&jsonschema::Validator, String> {
        self.compiled
            .get_or_init(|| jsonschema::validator_for(&self.document).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl SchemaValidator for JsonSchema {
    fn validate(&self, value: &Value) -> Result<(), String> {
        self.validator()?
            .validate(value)
            .map_err(|e| e.to_string())
    }
}

impl Debug for JsonSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchema")
            .field("document", &self.document)
            .finish_non_exhaustive()
    }
}
