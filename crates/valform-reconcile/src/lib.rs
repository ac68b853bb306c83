//! valform Reconcile
//!
//! Keeps a schema-driven form and a YAML values document in sync:
//! - Extracts editable parameters from a schema and up to three values documents
//! - Coerces field edits and writes them without disturbing other lines
//! - Buffers edits in a delayed commit queue with eager flush triggers
//! - Reports advisory schema violations
//! - Drives all of it through an explicit session state machine
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use valform_reconcile::prelude::*;
//!
//! let mut session = EditorSession::default();
//! session
//!     .load_schema_text(r#"{"properties": {"replicaCount": {"type": "integer"}}}"#)
//!     .unwrap();
//! session
//!     .load_values(ValuesSource::Current, "replicaCount: 1 # scale\n")
//!     .unwrap();
//!
//! let now = Instant::now();
//! session.edit(ScalarEdit::number("replicaCount".parse().unwrap(), "3"), now);
//! session.tick(now + Duration::from_secs(1)).unwrap();
//! assert_eq!(session.values_text(), "replicaCount: 3 # scale\n");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod apply;
pub mod config;
pub mod error;
pub mod extract;
mod json;
pub mod queue;
pub mod session;
pub mod state_machine;
pub mod validate;

// Re-exports for convenience
pub use apply::{coerce, Applier};
pub use config::ReconcileConfig;
pub use error::{ApplyError, ConfigError, ReconcileError, Result, SessionError};
pub use extract::{
    extract_parameters, filter_parameters, modified_parameters, EditableParameter, Extractor,
    ParamType, Sources,
};
pub use json::yaml_to_json;
pub use queue::{CommitQueue, FlushTrigger};
pub use session::{DeploymentRequest, EditorSession, ValuesSource};
pub use state_machine::{allowed_transitions, validate_transition, SessionState};
pub use validate::{validate_values, ValidationIssue, Validator};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with valform Reconcile
    pub use crate::{
        Applier, CommitQueue, DeploymentRequest, EditableParameter, EditorSession, Extractor,
        FlushTrigger, ReconcileConfig, SessionState, Sources, ValidationIssue, ValuesSource,
    };
    pub use valform_document::{SchemaDocument, ValuesDocument};
    pub use valform_model::{DeploymentEvent, EditKind, KeyPath, ScalarEdit};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
