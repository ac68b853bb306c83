//! Patch application
//!
//! Turns [`ScalarEdit`]s into YAML values and writes them into a
//! [`ValuesDocument`]. Coercion never fails: text that does not fit the
//! edit's kind is written as a string.

use crate::error::ApplyError;
use serde_yaml::Value;
use tracing::{debug, info, warn};
use valform_document::ValuesDocument;
use valform_model::{EditKind, ScalarEdit};

/// Coerce an edit's raw text into the value it writes
#[must_use]
pub fn coerce(edit: &ScalarEdit) -> Value {
    let raw = edit.raw.as_str();
    let coerced = match edit.kind {
        EditKind::String => return Value::String(raw.to_string()),
        EditKind::Bool => match raw.trim() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        EditKind::Number => parse_number(raw.trim()),
        EditKind::Array => parse_yaml(raw).filter(|v| matches!(v, Value::Sequence(_))),
        EditKind::Object => parse_yaml(raw).filter(|v| matches!(v, Value::Mapping(_))),
    };
    coerced.unwrap_or_else(|| {
        warn!(key = %edit.key, kind = %edit.kind, raw, "value does not fit its kind, writing a string");
        Value::String(raw.to_string())
    })
}

fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::from(int));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::from)
}

fn parse_yaml(raw: &str) -> Option<Value> {
    serde_yaml::from_str(raw).ok()
}

/// Writes coerced edits into values documents
#[derive(Debug, Clone, Copy)]
pub struct Applier {
    indent_step: usize,
}

impl Applier {
    /// Create an applier that indents new nested keys by `indent_step`
    /// when a document shows no indentation of its own
    #[inline]
    #[must_use]
    pub fn new(indent_step: usize) -> Self {
        Self {
            indent_step: indent_step.max(1),
        }
    }

    /// Apply one edit
    ///
    /// # Errors
    /// Returns `ApplyError` if the key cannot be written; the document is
    /// left unchanged.
    pub fn apply(&self, doc: &mut ValuesDocument, edit: &ScalarEdit) -> Result<(), ApplyError> {
        let value = coerce(edit);
        doc.set(&edit.key, &value)?;
        debug!(key = %edit.key, kind = %edit.kind, "applied edit");
        Ok(())
    }

    /// Apply edits in order, all or nothing
    ///
    /// # Errors
    /// Returns the first `ApplyError`; the document keeps its previous text.
    pub fn apply_batch<'a, I>(&self, doc: &mut ValuesDocument, edits: I) -> Result<usize, ApplyError>
    where
        I: IntoIterator<Item = &'a ScalarEdit>,
    {
        let mut working = doc.clone();
        let mut applied = 0;
        for edit in edits {
            self.apply(&mut working, edit)?;
            applied += 1;
        }
        if applied > 0 {
            info!(edits = applied, hash = %working.hash().short(), "committed edits");
        }
        *doc = working;
        Ok(applied)
    }

    /// Parse values text, apply edits and return the new text
    ///
    /// # Errors
    /// - `ReconcileError::Parse` if `text` does not parse
    /// - `ReconcileError::Apply` for any error from [`apply_batch`](Self::apply_batch)
    pub fn apply_to_text<'a, I>(&self, text: &str, edits: I) -> crate::Result<String>
    where
        I: IntoIterator<Item = &'a ScalarEdit>,
    {
        let mut doc = self.prepare(ValuesDocument::parse(text)?);
        self.apply_batch(&mut doc, edits)?;
        Ok(doc.into_string())
    }

    /// Prepare a parsed document for writing with this applier's indentation
    #[must_use]
    pub fn prepare(&self, doc: ValuesDocument) -> ValuesDocument {
        doc.with_default_indent(self.indent_step)
    }
}

impl Default for Applier {
    fn default() -> Self {
        Self::new(valform_document::DEFAULT_INDENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;
    use pretty_assertions::assert_eq;
    use valform_document::ParseError;
    use valform_model::KeyPath;

    fn edit(key: &str, kind: EditKind, raw: &str) -> ScalarEdit {
        ScalarEdit::new(key.parse().unwrap(), kind, raw)
    }

    #[test]
    fn coercion_by_kind() {
        assert_eq!(coerce(&edit("a", EditKind::Bool, "true")), Value::Bool(true));
        assert_eq!(coerce(&edit("a", EditKind::Number, "42")), Value::from(42));
        assert_eq!(coerce(&edit("a", EditKind::Number, " 1.5 ")), Value::from(1.5));
        assert_eq!(coerce(&edit("a", EditKind::String, "10")), Value::String("10".into()));
        assert_eq!(
            coerce(&edit("a", EditKind::Array, "[\"x\", 2]")),
            serde_yaml::from_str::<Value>("[x, 2]").unwrap()
        );
        assert_eq!(
            coerce(&edit("a", EditKind::Object, "{\"k\": \"v\"}")),
            serde_yaml::from_str::<Value>("{k: v}").unwrap()
        );
    }

    #[test]
    fn coercion_falls_back_to_string() {
        for (kind, raw) in [
            (EditKind::Number, "ten"),
            (EditKind::Number, ""),
            (EditKind::Number, "inf"),
            (EditKind::Bool, "maybe"),
            (EditKind::Array, "[unterminated"),
            (EditKind::Array, "{a: 1}"),
            (EditKind::Object, "[1]"),
        ] {
            assert_eq!(coerce(&edit("a", kind, raw)), Value::String(raw.into()), "{kind} {raw}");
        }
    }

    #[test]
    fn apply_to_text_keeps_formatting() {
        let text = "# comment\na: b\n\nc: d\n";
        let out = Applier::default()
            .apply_to_text(text, &[edit("a", EditKind::String, "e")])
            .unwrap();
        assert_eq!(out, "# comment\na: e\n\nc: d\n");
    }

    #[test]
    fn batch_applies_in_order() {
        let edits = [
            edit("x", EditKind::Number, "1"),
            edit("x", EditKind::Number, "2"),
            edit("y.z", EditKind::Array, "[a]"),
        ];
        let out = Applier::default().apply_to_text("", &edits).unwrap();
        assert_eq!(out, "x: 2\ny:\n  z: [a]\n");
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let mut doc = ValuesDocument::parse("a: 1\n").unwrap();
        let before = doc.clone();
        let edits = [edit("a", EditKind::Number, "2"), ScalarEdit::string(KeyPath::root(), "x")];
        let err = Applier::default().apply_batch(&mut doc, &edits).unwrap_err();
        assert_eq!(err, ApplyError::EmptyKey);
        assert_eq!(doc, before);
    }

    #[test]
    fn configured_indent_applies_to_flat_documents() {
        let out = Applier::new(4)
            .apply_to_text("a: 1\n", &[edit("b.c", EditKind::Bool, "false")])
            .unwrap();
        assert_eq!(out, "a: 1\nb:\n    c: false\n");
    }

    #[test]
    fn unparseable_text_is_reported() {
        let err = Applier::default()
            .apply_to_text("a: [", &[edit("a", EditKind::String, "x")])
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Parse(ParseError::Yaml { .. })));
    }

    #[test]
    fn failed_edit_in_text_is_an_apply_error() {
        let err = Applier::default()
            .apply_to_text("- a\n", &[edit("a", EditKind::String, "x")])
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Apply(ApplyError::RootNotMapping(_))));
    }
}
