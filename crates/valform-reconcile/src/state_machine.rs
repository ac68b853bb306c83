//! Editor session state machine
//!
//! ```text
//! Idle ──► ParsingValues ──► Extracting ──► Idle
//!   │  └─► ParsingSchema ──┘      ▲
//!   └────► Committing ────────────┘
//! ```
//!
//! A failed parse or commit returns straight to `Idle`.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Lifecycle state of an editor session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for input
    #[default]
    Idle,
    /// Parsing a values text
    ParsingValues,
    /// Parsing a schema
    ParsingSchema,
    /// Regenerating the parameter list
    Extracting,
    /// Writing buffered edits into the values document
    Committing,
}

impl SessionState {
    /// All states, in declaration order
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::ParsingValues,
        Self::ParsingSchema,
        Self::Extracting,
        Self::Committing,
    ];

    /// Lowercase state name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ParsingValues => "parsing_values",
            Self::ParsingSchema => "parsing_schema",
            Self::Extracting => "extracting",
            Self::Committing => "committing",
        }
    }

    /// Check if the session is between operations
    #[inline]
    #[must_use]
    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates a state transition
///
/// # Errors
/// Returns `SessionError::IllegalTransition` if `to` is not reachable from `from`.
pub fn validate_transition(from: SessionState, to: SessionState) -> Result<(), SessionError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(SessionError::illegal_transition(from, to))
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: SessionState) -> Vec<SessionState> {
    use SessionState::{Committing, Extracting, Idle, ParsingSchema, ParsingValues};
    match from {
        Idle => vec![ParsingValues, ParsingSchema, Committing],
        ParsingValues | ParsingSchema | Committing => vec![Extracting, Idle],
        Extracting => vec![Idle],
    }
}

fn allowed(from: SessionState, to: SessionState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}
