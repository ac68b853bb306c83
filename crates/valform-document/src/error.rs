//! Error types for document parsing and writing
//!
//! Provides error handling for:
//! - Parse operations (text → values document or schema)
//! - Write operations (setting a value at a key path)
//! - Schema compilation

use valform_model::KeyPath;

/// Errors while parsing values or schema text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Malformed YAML
    #[error("unable to parse values: {message}")]
    Yaml {
        message: String,
        line: Option<usize>,
        column: Option<usize>,
    },

    /// More than one YAML document in the values text
    #[error("unable to parse values: expected a single YAML document, found {0}")]
    MultipleDocuments(usize),

    /// Malformed JSON schema text
    #[error("unable to parse schema: {message} at line {line} column {column}")]
    Json {
        message: String,
        line: usize,
        column: usize,
    },

    /// Schema parsed, but is not a JSON object
    #[error("unable to parse schema: expected a JSON object, found {0}")]
    SchemaNotObject(&'static str),
}

impl ParseError {
    /// Build from a serde_yaml error, keeping its location
    #[must_use]
    pub fn from_yaml(err: &serde_yaml::Error) -> Self {
        let location = err.location();
        Self::Yaml {
            message: err.to_string(),
            line: location.as_ref().map(serde_yaml::Location::line),
            column: location.as_ref().map(serde_yaml::Location::column),
        }
    }

    /// Build from a serde_json error, keeping its location
    #[must_use]
    pub fn from_json(err: &serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }
}

/// Errors while writing a value into a document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// Writing requires a non-empty key path
    #[error("cannot write to the document root")]
    EmptyPath,

    /// The document root is a scalar or sequence
    #[error("cannot set '{0}': document root is not a mapping")]
    RootNotMapping(KeyPath),

    /// A node on the path could not be re-read for a structural edit
    #[error("cannot set '{key}': {message}")]
    Fragment { key: KeyPath, message: String },

    /// The edited text no longer parses
    #[error("edit of '{key}' produced invalid YAML: {source}")]
    Reparse {
        key: KeyPath,
        #[source]
        source: ParseError,
    },
}

/// Errors from schema compilation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The schema is not a valid JSON Schema
    #[error("invalid schema: {0}")]
    Invalid(String),
}

/// Result type alias for document operations
pub type DocumentResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_error_keeps_location() {
        let err = serde_yaml::from_str::<serde_yaml::Value>("a: [unterminated").unwrap_err();
        let parsed = ParseError::from_yaml(&err);
        assert!(parsed.to_string().starts_with("unable to parse values: "));
        assert!(matches!(parsed, ParseError::Yaml { line: Some(_), .. }));
    }

    #[test]
    fn write_error_display() {
        let err = WriteError::RootNotMapping(KeyPath::single("a"));
        assert_eq!(err.to_string(), "cannot set 'a': document root is not a mapping");
    }

    #[test]
    fn from_json_keeps_location() {
        let err = serde_json::from_str::<serde_json::Value>("{\n  \"a\": }").unwrap_err();
        let parsed = ParseError::from_json(&err);
        assert!(matches!(parsed, ParseError::Json { line: 2, .. }));
    }
}
