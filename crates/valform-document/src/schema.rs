//! JSON Schema documents
//!
//! A schema arrives either as a parsed JSON object or as JSON text. Both
//! forms are kept: the object for traversal, the pretty-printed text for
//! display and submission.

use crate::error::{DocumentResult, ParseError, SchemaError};
use jsonschema::JSONSchema;
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use tracing::debug;
use valform_model::ContentHash;

/// A JSON Schema held as both object and canonical text
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDocument {
    value: Value,
    text: String,
    hash: ContentHash,
}

impl SchemaDocument {
    /// Wrap a parsed schema
    ///
    /// `null` is treated as the empty schema `{}`.
    ///
    /// # Errors
    /// Returns `ParseError::SchemaNotObject` for arrays and scalars.
    pub fn from_value(value: Value) -> DocumentResult<Self> {
        let value = match value {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => value,
            other => return Err(ParseError::SchemaNotObject(json_kind(&other))),
        };
        let text = serde_json::to_string_pretty(&value).map_err(|e| ParseError::from_json(&e))?;
        let hash = ContentHash::of_text(&text);
        debug!(hash = %hash.short(), "loaded schema");
        Ok(Self { value, text, hash })
    }

    /// Parse schema text; blank text is the empty schema
    ///
    /// # Errors
    /// - `ParseError::Json` for malformed JSON
    /// - `ParseError::SchemaNotObject` for arrays and scalars
    pub fn from_json_str(text: &str) -> DocumentResult<Self> {
        if text.trim().is_empty() {
            return Self::from_value(Value::Null);
        }
        let value = serde_json::from_str(text).map_err(|e| ParseError::from_json(&e))?;
        Self::from_value(value)
    }

    /// The empty schema `{}`
    #[must_use]
    pub fn empty() -> Self {
        Self {
            value: Value::Object(Map::new()),
            text: "{}".to_string(),
            hash: ContentHash::of_text("{}"),
        }
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Canonical pretty-printed JSON text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[inline]
    #[must_use]
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// Top-level `properties`, in declaration order
    #[must_use]
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        self.value.get("properties").and_then(Value::as_object)
    }

    /// Check if the schema declares no properties
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties().map_or(true, Map::is_empty)
    }

    /// Compile for validation
    ///
    /// # Errors
    /// Returns `SchemaError::Invalid` if the schema is not valid JSON Schema.
    pub fn compile(&self) -> Result<JSONSchema, SchemaError> {
        JSONSchema::compile(&self.value).map_err(|e| SchemaError::Invalid(e.to_string()))
    }
}

impl Default for SchemaDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl Display for SchemaDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for SchemaDocument {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_json_str(s)
    }
}

impl TryFrom<Value> for SchemaDocument {
    type Error = ParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_and_object_forms_agree() {
        let from_text = SchemaDocument::from_json_str(r#"{"properties": {"a": {"type": "string"}}}"#)
            .unwrap();
        let from_value =
            SchemaDocument::from_value(json!({"properties": {"a": {"type": "string"}}})).unwrap();
        assert_eq!(from_text, from_value);
        assert_eq!(from_text.hash(), from_value.hash());
        assert!(from_text.as_str().contains("\"properties\""));
    }

    #[test]
    fn blank_text_is_empty_schema() {
        let schema = SchemaDocument::from_json_str("  \n").unwrap();
        assert_eq!(schema.value(), &json!({}));
        assert!(schema.is_empty());
        assert_eq!(SchemaDocument::from_value(Value::Null).unwrap().value(), &json!({}));
    }

    #[test]
    fn property_order_is_kept() {
        let schema =
            SchemaDocument::from_json_str(r#"{"properties": {"z": {}, "a": {}, "m": {}}}"#).unwrap();
        let keys: Vec<&str> = schema.properties().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn malformed_and_non_object_schemas() {
        assert!(matches!(
            SchemaDocument::from_json_str("{\"a\": "),
            Err(ParseError::Json { .. })
        ));
        assert_eq!(
            SchemaDocument::from_value(json!([1, 2])),
            Err(ParseError::SchemaNotObject("array"))
        );
    }

    #[test]
    fn compile_rejects_invalid_schema() {
        let schema = SchemaDocument::from_value(json!({"type": 12})).unwrap();
        assert!(matches!(schema.compile(), Err(SchemaError::Invalid(_))));

        let schema = SchemaDocument::from_value(json!({"type": "object"})).unwrap();
        assert!(schema.compile().is_ok());
    }
}
