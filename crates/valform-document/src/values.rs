//! Lossless YAML values documents
//!
//! [`ValuesDocument`] keeps the original text next to its parsed value.
//! Serializing an unedited document returns the text unchanged, and
//! [`ValuesDocument::set`] rewrites only the span of the value it targets,
//! so comments, blank lines and key order elsewhere survive byte-for-byte.

use crate::error::{DocumentResult, ParseError, WriteError};
use crate::index::{split_properties, DocumentIndex, Entry, MappingNode, Root, ValueNode};
use crate::render::{render_flow, render_key};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fmt::{self, Display, Formatter};
use std::ops::Range;
use std::str::FromStr;
use tracing::{debug, warn};
use valform_model::{ContentHash, KeyPath};

/// Indentation used for new nested keys when the document shows none
pub const DEFAULT_INDENT: usize = 2;

/// A YAML values document that round-trips its source text
#[derive(Debug, Clone)]
pub struct ValuesDocument {
    source: String,
    value: Value,
    index: DocumentIndex,
    hash: ContentHash,
    default_indent: usize,
}

/// A planned text replacement
#[derive(Debug)]
struct Splice {
    range: Range<usize>,
    text: String,
}

impl ValuesDocument {
    /// Parse YAML text
    ///
    /// Empty or comment-only text is the empty document.
    ///
    /// # Errors
    /// - `ParseError::Yaml` if the text is not valid YAML
    /// - `ParseError::MultipleDocuments` if the text holds more than one document
    pub fn parse(text: impl Into<String>) -> DocumentResult<Self> {
        let source = text.into();
        let value = parse_single_document(&source)?;
        let index = DocumentIndex::build(&source);
        let hash = ContentHash::of_text(&source);
        debug!(bytes = source.len(), hash = %hash.short(), "parsed values document");
        Ok(Self {
            source,
            value,
            index,
            hash,
            default_indent: DEFAULT_INDENT,
        })
    }

    /// The empty document
    #[must_use]
    pub fn empty() -> Self {
        Self {
            source: String::new(),
            value: Value::Null,
            index: DocumentIndex::build(""),
            hash: ContentHash::of_text(""),
            default_indent: DEFAULT_INDENT,
        }
    }

    /// Indentation for new nested keys when the document has no nested mappings
    #[must_use]
    pub fn with_default_indent(mut self, indent: usize) -> Self {
        self.default_indent = indent.max(1);
        self
    }

    /// Source text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Consume into source text
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.source
    }

    /// Parsed value of the whole document
    #[inline]
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Fingerprint of the source text
    #[inline]
    #[must_use]
    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    /// Check if the document holds no values
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::Mapping(map) => map.is_empty(),
            _ => false,
        }
    }

    /// Get the value at a key path
    ///
    /// Numeric segments index into sequences and `<<` merge keys are
    /// resolved. Missing paths return `None`; an explicit `null` returns
    /// `Some(Value::Null)`.
    #[must_use]
    pub fn get(&self, path: &KeyPath) -> Option<&Value> {
        path.iter().try_fold(&self.value, lookup)
    }

    /// Check if a key path exists
    #[inline]
    #[must_use]
    pub fn contains(&self, path: &KeyPath) -> bool {
        self.get(path).is_some()
    }

    /// Set the value at a key path, creating missing parent mappings
    ///
    /// Only the text of the targeted value changes. New keys are appended
    /// after the last entry of their parent mapping.
    ///
    /// # Errors
    /// - `WriteError::EmptyPath` for the root path
    /// - `WriteError::RootNotMapping` if the root is a scalar or sequence
    /// - `WriteError::Fragment` if a node on the path cannot be re-read
    /// - `WriteError::Reparse` if the edited text no longer parses
    pub fn set(&mut self, path: &KeyPath, value: &Value) -> Result<(), WriteError> {
        if path.is_empty() {
            return Err(WriteError::EmptyPath);
        }

        let splice = self.plan_root(path.segments(), path, value)?;
        let mut text = self.source.clone();
        text.replace_range(splice.range.clone(), &splice.text);

        let reparsed = Self::parse(text)
            .map_err(|source| WriteError::Reparse {
                key: path.clone(),
                source,
            })?
            .with_default_indent(self.default_indent);
        if reparsed.get(path) != Some(value) {
            warn!(key = %path, "written value reads back differently");
        }
        debug!(
            key = %path,
            at = splice.range.start,
            replaced = splice.range.len(),
            "set value"
        );
        *self = reparsed;
        Ok(())
    }

    fn step(&self) -> usize {
        self.index.indent_step.unwrap_or(self.default_indent)
    }

    fn newline(&self) -> &'static str {
        self.index.newline
    }

    fn plan_root(
        &self,
        segments: &[String],
        key: &KeyPath,
        value: &Value,
    ) -> Result<Splice, WriteError> {
        match &self.index.root {
            Root::Empty => {
                let end = self.source.len();
                let mut text = String::new();
                if !self.source.is_empty() && !self.source.ends_with('\n') {
                    text.push_str(self.newline());
                }
                text.push_str(&self.block_chain(segments, value, 0));
                text.push_str(self.newline());
                Ok(Splice {
                    range: end..end,
                    text,
                })
            }
            Root::Mapping(mapping) => self.plan_mapping(mapping, segments, key, value),
            Root::Opaque { span } => match &self.value {
                Value::Mapping(_) => {
                    self.plan_fragment(span.clone(), "", String::new(), segments, key, value)
                }
                Value::Null => Ok(Splice {
                    range: span.clone(),
                    text: self.block_chain(segments, value, 0),
                }),
                _ => Err(WriteError::RootNotMapping(key.clone())),
            },
        }
    }

    fn plan_mapping(
        &self,
        mapping: &MappingNode,
        segments: &[String],
        key: &KeyPath,
        value: &Value,
    ) -> Result<Splice, WriteError> {
        let (head, rest) = segments.split_first().ok_or(WriteError::EmptyPath)?;

        let Some(entry) = mapping.find(head) else {
            let at = mapping.end();
            let mut text = String::from(self.newline());
            text.push_str(&self.block_chain(segments, value, mapping.indent));
            return Ok(Splice { range: at..at, text });
        };

        if rest.is_empty() {
            return Ok(self.replace_value(entry, value));
        }

        let child_indent = mapping.indent + self.step();
        match &entry.value {
            ValueNode::Mapping(child) => self.plan_mapping(child, rest, key, value),
            ValueNode::Empty => {
                let mut text = String::from(self.newline());
                text.push_str(&self.block_chain(rest, value, child_indent));
                Ok(Splice {
                    range: entry.line_end..entry.line_end,
                    text,
                })
            }
            ValueNode::Inline { span, flow: true } => {
                self.plan_fragment(span.clone(), "", String::new(), rest, key, value)
            }
            ValueNode::Inline { flow: false, .. } => {
                // A scalar parent becomes a mapping.
                let mut text = self.comment_suffix(entry);
                text.push_str(self.newline());
                text.push_str(&self.block_chain(rest, value, child_indent));
                Ok(Splice {
                    range: entry.colon_end..entry.line_end,
                    text,
                })
            }
            ValueNode::Opaque => self.plan_fragment(
                entry.colon_end..entry.end,
                " ",
                self.comment_suffix(entry),
                rest,
                key,
                value,
            ),
        }
    }

    fn replace_value(&self, entry: &Entry, value: &Value) -> Splice {
        let literal = render_flow(value);
        match &entry.value {
            ValueNode::Empty => Splice {
                range: entry.colon_end..entry.colon_end,
                text: format!(" {literal}"),
            },
            ValueNode::Inline { span, .. } => Splice {
                range: span.clone(),
                text: literal,
            },
            ValueNode::Mapping(_) | ValueNode::Opaque => Splice {
                range: entry.colon_end..entry.end,
                text: format!(
                    " {}{}",
                    with_properties(self.anchor(entry), literal),
                    self.comment_suffix(entry)
                ),
            },
        }
    }

    /// Anchor written on an entry's key line; a replaced value drops its tag
    fn anchor(&self, entry: &Entry) -> &str {
        let value_end = entry.comment.as_ref().map_or(entry.line_end, |c| c.start);
        anchor_of(split_properties(&self.source[entry.colon_end..value_end]).0)
    }

    /// Re-read one node, set the value inside it and render it as a flow literal
    fn plan_fragment(
        &self,
        range: Range<usize>,
        prefix: &str,
        suffix: String,
        segments: &[String],
        key: &KeyPath,
        value: &Value,
    ) -> Result<Splice, WriteError> {
        let fragment = &self.source[range.clone()];
        let (properties, _) = split_properties(fragment);
        let node = if fragment.trim().is_empty() {
            Value::Null
        } else {
            match serde_yaml::from_str(fragment) {
                Ok(node) => node,
                // Aliases to anchors outside the fragment only resolve in the whole document.
                Err(e) => self
                    .get(&KeyPath::new(key.segments()[..key.len() - segments.len()].to_vec()))
                    .cloned()
                    .ok_or_else(|| WriteError::Fragment {
                        key: key.clone(),
                        message: e.to_string(),
                    })?,
            }
        };
        let (mut node, properties) = match node {
            Value::Tagged(tagged) if !properties.is_empty() => (tagged.value, properties),
            node @ (Value::Mapping(_) | Value::Sequence(_)) => (node, properties),
            // A scalar turned into a mapping keeps its anchor only.
            node => (node, anchor_of(properties)),
        };
        set_in_value(&mut node, segments, value.clone());
        debug!(key = %key, "rewrote node as flow literal");
        Ok(Splice {
            range,
            text: format!("{prefix}{}{suffix}", with_properties(properties, render_flow(&node))),
        })
    }

    fn comment_suffix(&self, entry: &Entry) -> String {
        entry
            .comment
            .as_ref()
            .map(|range| format!(" {}", &self.source[range.clone()]))
            .unwrap_or_default()
    }

    /// Render `a:\n  b:\n    c: value` starting at `indent`
    fn block_chain(&self, segments: &[String], value: &Value, indent: usize) -> String {
        let step = self.step();
        let last = segments.len().saturating_sub(1);
        let mut out = String::new();
        for (depth, segment) in segments.iter().enumerate() {
            if depth > 0 {
                out.push_str(self.newline());
            }
            out.push_str(&" ".repeat(indent + depth * step));
            out.push_str(&render_key(segment));
            out.push(':');
            if depth == last {
                out.push(' ');
                out.push_str(&render_flow(value));
            }
        }
        out
    }
}

fn anchor_of(properties: &str) -> &str {
    properties
        .split_whitespace()
        .find(|token| token.starts_with('&'))
        .unwrap_or("")
}

/// Prefix a rendered literal with the node properties it replaces
fn with_properties(properties: &str, literal: String) -> String {
    if properties.is_empty() {
        literal
    } else {
        format!("{properties} {literal}")
    }
}

fn parse_single_document(source: &str) -> DocumentResult<Value> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(source) {
        let mut value = Value::deserialize(document).map_err(|e| ParseError::from_yaml(&e))?;
        value.apply_merge().map_err(|e| ParseError::from_yaml(&e))?;
        documents.push(value);
    }
    match documents.len() {
        0 => Ok(Value::Null),
        1 => Ok(documents.remove(0)),
        n => Err(ParseError::MultipleDocuments(n)),
    }
}

fn key_matches(key: &Value, segment: &str) -> bool {
    match key {
        Value::String(s) => s == segment,
        Value::Number(n) => n.to_string() == segment,
        Value::Bool(b) => b.to_string() == segment,
        _ => false,
    }
}

fn lookup<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Mapping(map) => map
            .iter()
            .find(|(k, _)| key_matches(k, segment))
            .map(|(_, v)| v),
        Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Tagged(tagged) => lookup(&tagged.value, segment),
        _ => None,
    }
}

/// Set `value` at `segments` inside a parsed node, creating mappings as needed
fn set_in_value(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if let Value::Sequence(items) = node {
        if let Some(item) = head.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            set_in_value(item, rest, value);
            return;
        }
    }

    if !matches!(node, Value::Mapping(_)) {
        *node = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = node {
        let existing = map.keys().find(|k| key_matches(k, head)).cloned();
        let child = map
            .entry(existing.unwrap_or_else(|| Value::String(head.clone())))
            .or_insert(Value::Null);
        set_in_value(child, rest, value);
    }
}

impl PartialEq for ValuesDocument {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for ValuesDocument {}

impl Default for ValuesDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl Display for ValuesDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for ValuesDocument {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(path: &str) -> KeyPath {
        path.parse().unwrap()
    }

    fn set(source: &str, path: &str, value: Value) -> String {
        let mut doc = ValuesDocument::parse(source).unwrap();
        doc.set(&key(path), &value).unwrap();
        doc.into_string()
    }

    fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn empty_text_is_empty_document() {
        let doc = ValuesDocument::parse("").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.value(), &Value::Null);

        let doc = ValuesDocument::parse("# nothing yet\n").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn malformed_text_is_an_error() {
        let err = ValuesDocument::parse("a: [unterminated").unwrap_err();
        assert!(matches!(err, ParseError::Yaml { .. }));
    }

    #[test]
    fn multiple_documents_are_an_error() {
        let err = ValuesDocument::parse("a: 1\n---\nb: 2\n").unwrap_err();
        assert_eq!(err, ParseError::MultipleDocuments(2));
    }

    #[test]
    fn unedited_document_roundtrips() {
        let source = "# top\nimage:\n  repo: nginx   # pinned\n\n  tag: '1.25'\nlist:\n- a\n";
        let doc = ValuesDocument::parse(source).unwrap();
        assert_eq!(doc.to_string(), source);
    }

    #[test]
    fn get_nested_and_sequence_paths() {
        let doc = ValuesDocument::parse("a:\n  b: 1\n  c: null\nhosts:\n- name: x\n").unwrap();
        assert_eq!(doc.get(&key("a.b")), Some(&Value::from(1)));
        assert_eq!(doc.get(&key("a.c")), Some(&Value::Null));
        assert_eq!(doc.get(&key("hosts.0.name")), Some(&string("x")));
        assert_eq!(doc.get(&key("a.missing")), None);
        assert_eq!(doc.get(&key("a.b.deeper")), None);
    }

    #[test]
    fn replace_scalar_keeps_neighbours() {
        assert_eq!(set("a: b\n\nc: d\n", "a", string("e")), "a: e\n\nc: d\n");
    }

    #[test]
    fn replace_keeps_trailing_comment() {
        assert_eq!(
            set("replicas: 1 # how many\nport: 80\n", "replicas", Value::from(3)),
            "replicas: 3 # how many\nport: 80\n"
        );
    }

    #[test]
    fn replace_nested_value() {
        let source = "image:\n  repo: nginx\n  # the tag\n  tag: latest\nother: x\n";
        assert_eq!(
            set(source, "image.tag", string("1.25.3")),
            "image:\n  repo: nginx\n  # the tag\n  tag: 1.25.3\nother: x\n"
        );
    }

    #[test]
    fn fill_empty_value() {
        assert_eq!(set("a:\nb: 2\n", "a", Value::Bool(true)), "a: true\nb: 2\n");
    }

    #[test]
    fn append_new_top_level_key() {
        assert_eq!(set("a: 1\n# trailing\n", "b", Value::from(2)), "a: 1\nb: 2\n# trailing\n");
        assert_eq!(set("a: 1", "b", Value::from(2)), "a: 1\nb: 2");
    }

    #[test]
    fn append_into_nested_mapping_uses_its_indent() {
        let source = "service:\n    type: ClusterIP\nx: 1\n";
        assert_eq!(
            set(source, "service.port", Value::from(80)),
            "service:\n    type: ClusterIP\n    port: 80\nx: 1\n"
        );
    }

    #[test]
    fn create_missing_parents() {
        assert_eq!(
            set("a: 1\n", "resources.limits.cpu", string("500m")),
            "a: 1\nresources:\n  limits:\n    cpu: 500m\n"
        );
    }

    #[test]
    fn create_under_empty_parent() {
        assert_eq!(
            set("ingress: # off\nx: 1\n", "ingress.enabled", Value::Bool(true)),
            "ingress: # off\n  enabled: true\nx: 1\n"
        );
    }

    #[test]
    fn scalar_parent_becomes_mapping() {
        assert_eq!(
            set("tls: null # none\n", "tls.secret", string("s")),
            "tls: # none\n  secret: s\n"
        );
    }

    #[test]
    fn write_into_empty_document() {
        assert_eq!(set("", "a.b", Value::from(1)), "a:\n  b: 1\n");
        assert_eq!(set("# header", "a", Value::from(1)), "# header\na: 1\n");
    }

    #[test]
    fn write_inside_flow_mapping() {
        assert_eq!(
            set("obj: {a: 1} # c\nz: 0\n", "obj.b", Value::from(2)),
            "obj: {a: 1, b: 2} # c\nz: 0\n"
        );
    }

    #[test]
    fn write_inside_block_sequence() {
        let source = "hosts:\n  - name: a\n  - name: b\nport: 1\n";
        assert_eq!(
            set(source, "hosts.1.name", string("c")),
            "hosts: [{name: a}, {name: c}]\nport: 1\n"
        );
    }

    #[test]
    fn replace_block_mapping_with_literal() {
        let source = "labels: # keep\n  a: b\nafter: 1\n";
        let mut map = Mapping::new();
        map.insert(string("x"), string("y"));
        assert_eq!(
            set(source, "labels", Value::Mapping(map)),
            "labels: {x: y} # keep\nafter: 1\n"
        );
    }

    #[test]
    fn quoted_strings_when_needed() {
        assert_eq!(set("tag: x\n", "tag", string("1.20")), "tag: \"1.20\"\n");
    }

    #[test]
    fn keys_with_dots() {
        let source = "annotations:\n  example.com/team: core\n";
        let path = KeyPath::new(vec!["annotations".into(), "example.com/team".into()]);
        let mut doc = ValuesDocument::parse(source).unwrap();
        assert_eq!(doc.get(&path), Some(&string("core")));
        doc.set(&path, &string("platform")).unwrap();
        assert_eq!(doc.as_str(), "annotations:\n  example.com/team: platform\n");
    }

    #[test]
    fn crlf_is_preserved_for_new_lines() {
        assert_eq!(set("a: 1\r\n", "b", Value::from(2)), "a: 1\r\nb: 2\r\n");
    }

    #[test]
    fn scalar_root_cannot_be_written() {
        let mut doc = ValuesDocument::parse("just text\n").unwrap();
        let err = doc.set(&key("a"), &Value::from(1)).unwrap_err();
        assert!(matches!(err, WriteError::RootNotMapping(_)));
    }

    #[test]
    fn root_path_cannot_be_written() {
        let mut doc = ValuesDocument::parse("a: 1\n").unwrap();
        assert_eq!(doc.set(&KeyPath::root(), &Value::Null), Err(WriteError::EmptyPath));
    }

    #[test]
    fn hash_tracks_text() {
        let mut doc = ValuesDocument::parse("a: 1\n").unwrap();
        let before = doc.hash();
        doc.set(&key("a"), &Value::from(2)).unwrap();
        assert_ne!(doc.hash(), before);
        assert_eq!(doc.hash(), ContentHash::of_text("a: 2\n"));
    }

    #[test]
    fn anchored_mapping_keeps_its_anchor() {
        let mut doc = ValuesDocument::parse("base: &b\n  x: 1\nother: *b\n").unwrap();
        doc.set(&key("base.x"), &Value::from(2)).unwrap();
        assert_eq!(doc.as_str(), "base: &b {x: 2}\nother: *b\n");
        assert_eq!(doc.get(&key("other.x")), Some(&Value::from(2)));
    }

    #[test]
    fn anchored_scalar_keeps_its_anchor() {
        assert_eq!(
            set("port: &p 80 # http\nhealth: *p\n", "port", Value::from(8080)),
            "port: &p 8080 # http\nhealth: *p\n"
        );
    }

    #[test]
    fn edit_through_alias_copies_the_target() {
        let mut doc = ValuesDocument::parse("base: &b\n  x: 1\nother: *b\n").unwrap();
        doc.set(&key("other.x"), &Value::from(5)).unwrap();
        assert_eq!(doc.as_str(), "base: &b\n  x: 1\nother: {x: 5}\n");
        assert_eq!(doc.get(&key("base.x")), Some(&Value::from(1)));
    }

    #[test]
    fn leading_bom_edits_existing_key() {
        assert_eq!(
            set("\u{feff}a: 1\nb: 2\n", "a", Value::from(3)),
            "\u{feff}a: 3\nb: 2\n"
        );
    }

    #[test]
    fn append_after_keep_chomped_scalar_keeps_its_newlines() {
        let source = "outer:\n  s: |+\n    text\n\n";
        let mut doc = ValuesDocument::parse(source).unwrap();
        doc.set(&key("outer.new"), &Value::from(1)).unwrap();
        assert_eq!(doc.as_str(), "outer:\n  s: |+\n    text\n\n  new: 1\n");
        assert_eq!(doc.get(&key("outer.s")), Some(&string("text\n\n")));

        assert_eq!(
            set(source, "z", Value::from(1)),
            "outer:\n  s: |+\n    text\n\nz: 1\n"
        );
    }

    #[test]
    fn merge_keys_resolve_on_lookup() {
        let source = "base: &b\n  x: 1\nother:\n  <<: *b\n  y: 2\n";
        let mut doc = ValuesDocument::parse(source).unwrap();
        assert_eq!(doc.get(&key("other.x")), Some(&Value::from(1)));
        assert_eq!(doc.as_str(), source);

        doc.set(&key("other.x"), &Value::from(5)).unwrap();
        assert_eq!(doc.as_str(), "base: &b\n  x: 1\nother:\n  <<: *b\n  y: 2\n  x: 5\n");
        assert_eq!(doc.get(&key("other.x")), Some(&Value::from(5)));
        assert_eq!(doc.get(&key("base.x")), Some(&Value::from(1)));
    }
}
