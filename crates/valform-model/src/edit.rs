//! Field edits produced by form controls
//!
//! Provides [`ScalarEdit`], the tagged value a form control hands to the
//! patch applier. The [`EditKind`] tag says how the raw text is written back
//! into the values document.

use crate::path::KeyPath;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// How the raw text of an edit is coerced when written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    /// Checkbox: written as a YAML boolean
    Bool,
    /// Numeric input or slider: written as a YAML number
    Number,
    /// Free text: written as a YAML string
    String,
    /// Array editor: written as a flow sequence
    Array,
    /// Object editor: written as a flow mapping
    Object,
}

impl EditKind {
    /// Map an input control type to an edit kind
    ///
    /// Unknown control types are treated as free text.
    #[must_use]
    pub fn from_control(control: &str) -> Self {
        match control {
            "checkbox" | "boolean" => Self::Bool,
            "number" | "integer" | "range" => Self::Number,
            "array" => Self::Array,
            "object" => Self::Object,
            _ => Self::String,
        }
    }

    /// Name used in CLI arguments and logs
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl Display for EditKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditKind {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(Self::Bool),
            "number" => Ok(Self::Number),
            "string" => Ok(Self::String),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            other => Err(EditError::UnknownKind(other.to_string())),
        }
    }
}

/// A single pending edit to one parameter
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ScalarEdit {
    /// Target key path
    pub key: KeyPath,
    /// Coercion applied when writing
    pub kind: EditKind,
    /// Raw text as entered in the control
    pub raw: String,
}

impl ScalarEdit {
    /// Create new edit
    #[inline]
    #[must_use]
    pub fn new(key: KeyPath, kind: EditKind, raw: impl Into<String>) -> Self {
        Self {
            key,
            kind,
            raw: raw.into(),
        }
    }

    /// Checkbox edit
    #[inline]
    #[must_use]
    pub fn bool(key: KeyPath, value: bool) -> Self {
        Self::new(key, EditKind::Bool, value.to_string())
    }

    /// Numeric edit from already-typed input
    #[inline]
    #[must_use]
    pub fn number(key: KeyPath, raw: impl Into<String>) -> Self {
        Self::new(key, EditKind::Number, raw)
    }

    /// Free-text edit
    #[inline]
    #[must_use]
    pub fn string(key: KeyPath, raw: impl Into<String>) -> Self {
        Self::new(key, EditKind::String, raw)
    }

    /// Parse `key=value` as given on a command line
    ///
    /// # Errors
    /// Returns error if there is no `=` or the key is not a valid path
    pub fn parse_assignment(assignment: &str, kind: EditKind) -> Result<Self, EditError> {
        let (key, raw) = assignment
            .split_once('=')
            .ok_or_else(|| EditError::MissingValue(assignment.to_string()))?;
        let key: KeyPath = key.parse().map_err(|e| EditError::InvalidKey {
            key: key.to_string(),
            source: e,
        })?;
        if key.is_empty() {
            return Err(EditError::MissingKey(assignment.to_string()));
        }
        Ok(Self::new(key, kind, raw))
    }
}

/// Errors when building edits
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    /// Edit kind name not recognised
    #[error("unknown edit kind: '{0}'")]
    UnknownKind(String),

    /// Assignment had no `=`
    #[error("expected key=value, got '{0}'")]
    MissingValue(String),

    /// Assignment had an empty key
    #[error("missing key in '{0}'")]
    MissingKey(String),

    /// Key path did not parse
    #[error("invalid key '{key}': {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: crate::path::PathError,
    },
}
