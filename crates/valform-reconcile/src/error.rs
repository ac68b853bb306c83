//! Error types for reconciliation
//!
//! Provides error handling for:
//! - Writing edits into a values document
//! - Editor session lifecycle (illegal transitions, missing inputs)
//! - Configuration loading
//!
//! Schema validation findings are data ([`ValidationIssue`](crate::ValidationIssue)),
//! and coercion failures are downgraded to strings, so neither appears here.

use crate::state_machine::SessionState;
use valform_document::{ParseError, SchemaError, WriteError};
use valform_model::KeyPath;

/// Main reconciliation error type
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Values or schema text did not parse
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An edit could not be written
    #[error(transparent)]
    Apply(#[from] ApplyError),

    /// Session lifecycle error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Schema could not be compiled
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors while applying edits to a values document
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// The edit targets the document root
    #[error("cannot write to the document root")]
    EmptyKey,

    /// The values root is a scalar or sequence
    #[error("cannot set '{0}': values root is not a mapping")]
    RootNotMapping(KeyPath),

    /// A node on the key path could not be re-read
    #[error("cannot set '{key}': {message}")]
    Fragment { key: KeyPath, message: String },

    /// The edited text no longer parses
    #[error("edit of '{key}' produced invalid YAML: {source}")]
    Parse {
        key: KeyPath,
        #[source]
        source: ParseError,
    },
}

impl ApplyError {
    /// Key the failed edit targeted, if any
    #[must_use]
    pub fn key(&self) -> Option<&KeyPath> {
        match self {
            Self::EmptyKey => None,
            Self::RootNotMapping(key) | Self::Fragment { key, .. } | Self::Parse { key, .. } => {
                Some(key)
            }
        }
    }
}

impl From<WriteError> for ApplyError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::EmptyPath => Self::EmptyKey,
            WriteError::RootNotMapping(key) => Self::RootNotMapping(key),
            WriteError::Fragment { key, message } => Self::Fragment { key, message },
            WriteError::Reparse { key, source } => Self::Parse { key, source },
        }
    }
}

/// Editor session errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// State machine rejected a transition
    #[error("illegal session transition: {from} -> {to}")]
    IllegalTransition { from: SessionState, to: SessionState },

    /// An operation needs a schema and none is loaded
    #[error("no schema loaded")]
    NoSchema,

    /// Input text did not parse
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Committing buffered edits failed
    #[error(transparent)]
    Apply(#[from] ApplyError),
}

impl SessionError {
    /// Create illegal transition error
    #[inline]
    #[must_use]
    pub fn illegal_transition(from: SessionState, to: SessionState) -> Self {
        Self::IllegalTransition { from, to }
    }

    /// Check if the error came from user input rather than misuse of the session
    #[inline]
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Apply(_))
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML did not parse into a configuration
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A setting is out of range
    #[error("invalid setting '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    /// Create out-of-range setting error
    #[inline]
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, ReconcileError>;
