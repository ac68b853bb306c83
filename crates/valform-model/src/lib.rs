//! valform Model
//!
//! Shared vocabulary for values/schema reconciliation.
//!
//! # Core Concepts
//!
//! - [`KeyPath`]: dotted address of a value inside a values document
//! - [`ScalarEdit`]: a tagged edit from a form control, coerced by [`EditKind`]
//! - [`DeploymentEvent`]: install vs. upgrade, deciding whether deployed values apply
//! - [`ContentHash`]: Blake3 fingerprint of a document's source text
//!
//! # Example
//!
//! ```rust
//! use valform_model::{EditKind, KeyPath, ScalarEdit};
//!
//! let key: KeyPath = "image.tag".parse().unwrap();
//! let edit = ScalarEdit::new(key, EditKind::String, "1.2.3");
//! assert_eq!(edit.key.to_string(), "image.tag");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod edit;
mod event;
mod hash;
mod path;

pub use edit::{EditError, EditKind, ScalarEdit};
pub use event::{DeploymentEvent, EventError};
pub use hash::ContentHash;
pub use path::{KeyPath, PathError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn edit_targets_parsed_path() {
        let edit = ScalarEdit::parse_assignment("service.ports\\.http=8080", EditKind::Number)
            .unwrap();
        assert_eq!(edit.key.segments(), &["service", "ports.http"]);
        assert_eq!(edit.key.to_string(), "service.ports\\.http");
    }
}
