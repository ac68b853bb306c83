//! Testing utilities for the valform workspace
//!
//! Shared fixtures: a small chart-like values file with comments, the
//! matching schema, and helpers that panic on bad fixture input.

#![allow(missing_docs)]

use serde_json::{json, Value};
use valform_document::{SchemaDocument, ValuesDocument};
use valform_model::{EditKind, KeyPath, ScalarEdit};

/// Package default values with comments, blank lines and a key the schema lacks
pub const DEFAULT_VALUES: &str = "\
## Default values for web.
replicaCount: 1

image:
  repository: nginx # upstream image
  tag: \"1.25\"
  pullPolicy: IfNotPresent

service:
  type: ClusterIP
  port: 80

# Not described by the schema.
extra: 1

tolerations: []
";

/// Values of a deployed release of the same package
pub const DEPLOYED_VALUES: &str = "\
replicaCount: 2
image:
  repository: nginx
  tag: \"1.24\"
  pullPolicy: Always
service:
  type: NodePort
  port: 8080
tolerations: []
";

/// Schema describing [`DEFAULT_VALUES`]
#[must_use]
pub fn sample_schema_value() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "replicaCount": {
                "type": "integer",
                "title": "Replicas",
                "minimum": 1,
                "maximum": 10
            },
            "image": {
                "type": "object",
                "properties": {
                    "repository": {"type": "string"},
                    "tag": {"type": "string", "description": "Image tag"},
                    "pullPolicy": {"type": "string", "enum": ["Always", "IfNotPresent", "Never"]}
                }
            },
            "service": {
                "type": "object",
                "required": ["port"],
                "properties": {
                    "type": {"type": "string"},
                    "port": {"type": "integer", "minimum": 1, "maximum": 65535}
                }
            },
            "tolerations": {"type": "array", "items": {"type": "object"}}
        }
    })
}

#[must_use]
pub fn sample_schema() -> SchemaDocument {
    SchemaDocument::from_value(sample_schema_value()).expect("fixture schema is an object")
}

/// Parse a fixture values text
#[must_use]
pub fn values(text: &str) -> ValuesDocument {
    ValuesDocument::parse(text).expect("fixture values parse")
}

#[must_use]
pub fn default_values() -> ValuesDocument {
    values(DEFAULT_VALUES)
}

#[must_use]
pub fn deployed_values() -> ValuesDocument {
    values(DEPLOYED_VALUES)
}

/// Parse a dotted key path
#[must_use]
pub fn key(path: &str) -> KeyPath {
    path.parse().expect("fixture key path parses")
}

/// Build an edit from `key=value` text
#[must_use]
pub fn edit(assignment: &str, kind: EditKind) -> ScalarEdit {
    ScalarEdit::parse_assignment(assignment, kind).expect("fixture assignment parses")
}

/// Lines that differ between two texts, as `(line number, before, after)`
#[must_use]
pub fn changed_lines<'a>(before: &'a str, after: &'a str) -> Vec<(usize, &'a str, &'a str)> {
    before
        .lines()
        .zip(after.lines())
        .enumerate()
        .filter(|(_, (b, a))| b != a)
        .map(|(i, (b, a))| (i + 1, b, a))
        .collect()
}
