//! valform Document Layer
//!
//! Lossless boundary between values/schema text and the reconciler.
//!
//! # Core Operations
//!
//! - **Parse**: YAML values text into a [`ValuesDocument`], JSON Schema into a [`SchemaDocument`]
//! - **Write**: set a value at a [`KeyPath`](valform_model::KeyPath), touching only its span
//! - **Serialize**: return the text, byte-identical where nothing was edited
//!
//! # Architecture
//!
//! ```text
//! values text → DocumentIndex (spans) ─┐
//!             → serde_yaml::Value ─────┴→ ValuesDocument ─set→ splice → re-parse
//! ```
//!
//! # Example
//!
//! ```rust
//! use valform_document::ValuesDocument;
//!
//! let mut doc = ValuesDocument::parse("# replicas\nreplicaCount: 1 # scale\n").unwrap();
//! doc.set(&"replicaCount".parse().unwrap(), &serde_yaml::Value::from(3)).unwrap();
//! assert_eq!(doc.as_str(), "# replicas\nreplicaCount: 3 # scale\n");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
mod index;
pub mod render;
pub mod schema;
pub mod values;

pub use error::{DocumentResult, ParseError, SchemaError, WriteError};
pub use render::{render_flow, render_key};
pub use schema::SchemaDocument;
pub use values::{ValuesDocument, DEFAULT_INDENT};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with documents
    pub use crate::error::{ParseError, SchemaError, WriteError};
    pub use crate::schema::SchemaDocument;
    pub use crate::values::ValuesDocument;
    pub use valform_model::{ContentHash, KeyPath};
}

#[cfg(test)]
mod integration_tests {
    use super::prelude::*;
    use pretty_assertions::assert_eq;
    use serde_yaml::Value;

    const VALUES: &str = "\
# Default values for web.
replicaCount: 1

image:
  repository: nginx # upstream
  tag: \"\"

service:
  type: ClusterIP
  port: 80
";

    #[test]
    fn sequential_edits_touch_only_their_lines() {
        let mut doc = ValuesDocument::parse(VALUES).unwrap();
        doc.set(&"image.tag".parse().unwrap(), &Value::String("1.25".into()))
            .unwrap();
        doc.set(&"service.port".parse().unwrap(), &Value::from(8080))
            .unwrap();
        doc.set(&"ingress.enabled".parse().unwrap(), &Value::Bool(false))
            .unwrap();

        let expected = VALUES
            .replace("tag: \"\"", "tag: \"1.25\"")
            .replace("port: 80", "port: 8080")
            + "ingress:\n  enabled: false\n";
        assert_eq!(doc.as_str(), expected);
    }

    #[test]
    fn failed_edit_leaves_document_unchanged() {
        let mut doc = ValuesDocument::parse("scalar root\n").unwrap();
        let before = doc.clone();
        assert!(doc.set(&"a".parse().unwrap(), &Value::from(1)).is_err());
        assert_eq!(doc, before);
    }
}
