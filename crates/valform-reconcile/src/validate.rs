//! Advisory schema validation of values
//!
//! Findings are returned as data and never block edits or commits.

use crate::json::yaml_to_json;
use jsonschema::JSONSchema;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use tracing::debug;
use valform_document::{SchemaDocument, SchemaError, ValuesDocument};
use valform_model::KeyPath;

/// One schema violation at a key path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Key path of the offending value; the root for document-level issues
    pub key: KeyPath,
    pub message: String,
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.key, self.message)
        }
    }
}

/// Compiled schema ready to check values documents
pub struct Validator {
    compiled: JSONSchema,
}

impl Validator {
    /// Compile a schema
    ///
    /// # Errors
    /// Returns `SchemaError::Invalid` if the schema is not valid JSON Schema.
    pub fn new(schema: &SchemaDocument) -> Result<Self, SchemaError> {
        Ok(Self {
            compiled: schema.compile()?,
        })
    }

    /// Check a values document; an empty document is checked as `{}`
    #[must_use]
    pub fn check(&self, values: &ValuesDocument) -> Vec<ValidationIssue> {
        let instance = match values.value() {
            serde_yaml::Value::Null => Value::Object(Map::new()),
            other => yaml_to_json(other),
        };
        let issues: Vec<ValidationIssue> = match self.compiled.validate(&instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|error| ValidationIssue {
                    key: pointer_to_key(&error.instance_path.to_string()),
                    message: error.to_string(),
                })
                .collect(),
        };
        debug!(issues = issues.len(), "validated values");
        issues
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

/// Compile `schema` and check `values` in one step
///
/// # Errors
/// Returns `SchemaError::Invalid` if the schema is not valid JSON Schema.
pub fn validate_values(
    schema: &SchemaDocument,
    values: &ValuesDocument,
) -> Result<Vec<ValidationIssue>, SchemaError> {
    Ok(Validator::new(schema)?.check(values))
}

/// Convert a JSON pointer (`/a/b~1c`) into a key path
fn pointer_to_key(pointer: &str) -> KeyPath {
    let segments = pointer
        .split('/')
        .skip(1)
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect();
    KeyPath::new(segments)
}
