//! Parameter extraction
//!
//! Walks a schema's `properties` depth-first and pairs every property with
//! the values found at its key path in up to three values documents: the
//! user's current values, the package defaults and, during an upgrade, the
//! deployed values. The result is a flat, schema-ordered list of
//! [`EditableParameter`] rows; grouping rows (`hasProperties`) are followed
//! directly by their children.
//!
//! Extraction never fails. Paths missing from a document yield `None`, and
//! keys present in a document but absent from the schema produce no row.

use crate::config::ReconcileConfig;
use crate::json::encode_collections;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use tracing::debug;
use valform_document::{SchemaDocument, ValuesDocument};
use valform_model::{DeploymentEvent, EditKind, KeyPath};

/// Extension keywords that hand a property to an external component
const CUSTOM_COMPONENT_KEYS: &[&str] = &["customComponent", "x-custom-component"];

/// Parameter type as declared or inferred from the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            _ => None,
        }
    }

    /// Resolve the type of a property schema
    ///
    /// A `type` list resolves to its first non-`null` entry. Without a usable
    /// `type`, `properties` means object, `items` means array, and anything
    /// else is a string.
    #[must_use]
    pub fn of_schema(schema: &Value) -> Self {
        let declared = match schema.get("type") {
            Some(Value::String(name)) => Self::from_name(name),
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .filter(|name| *name != "null")
                .find_map(Self::from_name),
            _ => None,
        };
        declared.unwrap_or_else(|| {
            if schema.get("properties").is_some() {
                Self::Object
            } else if schema.get("items").is_some() {
                Self::Array
            } else {
                Self::String
            }
        })
    }

    /// Lowercase schema type name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    /// Check if values of this type are numbers
    #[inline]
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }

    /// Edit kind of the control rendered for this type
    #[must_use]
    pub fn edit_kind(self) -> EditKind {
        match self {
            Self::Boolean => EditKind::Bool,
            Self::Number | Self::Integer => EditKind::Number,
            Self::Array => EditKind::Array,
            Self::Object => EditKind::Object,
            Self::String => EditKind::String,
        }
    }
}

impl Display for ParamType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One form row derived from a schema property
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableParameter {
    /// Full key path of the property
    pub key: KeyPath,
    /// Segments joined with `/`, for nested display
    pub path: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Value in the user's current document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<Value>,
    /// Value in the package defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Value in the deployed release; only set during an upgrade
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_value: Option<Value>,
    /// Sub-schema at this path
    pub schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    pub is_required: bool,
    pub read_only: bool,
    /// Grouping row; its children follow it directly
    pub has_properties: bool,
    /// Nesting level, 0 for top-level properties
    pub depth: usize,
    pub is_custom_component: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    effective_minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    effective_maximum: Option<f64>,
}

impl EditableParameter {
    /// Input step for numeric rows
    ///
    /// `multipleOf` when declared, otherwise the configured default for the type.
    #[inline]
    #[must_use]
    pub fn step(&self) -> Option<f64> {
        self.step
    }

    /// Lower display bound: the larger of `minimum` and `exclusiveMinimum` plus epsilon
    #[inline]
    #[must_use]
    pub fn effective_minimum(&self) -> Option<f64> {
        self.effective_minimum
    }

    /// Upper display bound: the smaller of `maximum` and `exclusiveMaximum` minus epsilon
    #[inline]
    #[must_use]
    pub fn effective_maximum(&self) -> Option<f64> {
        self.effective_maximum
    }

    /// Check if this row holds an editable value
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        !self.has_properties
    }

    /// Check if the current value differs from its baseline
    ///
    /// The baseline is the deployed value when one was extracted (upgrade),
    /// otherwise the default value. Grouping rows are never modified.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        if self.has_properties {
            return false;
        }
        let baseline = self.deployed_value.as_ref().or(self.default_value.as_ref());
        self.current_value.as_ref() != baseline
    }

    /// Case-insensitive match of a lowercase query against key, title and description
    fn matches(&self, query: &str) -> bool {
        self.key.to_string().to_lowercase().contains(query)
            || self.title.to_lowercase().contains(query)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(query))
    }
}

/// Values documents an extraction reads from
#[derive(Debug, Clone, Copy, Default)]
pub struct Sources<'a> {
    pub current: Option<&'a ValuesDocument>,
    pub defaults: Option<&'a ValuesDocument>,
    pub deployed: Option<&'a ValuesDocument>,
    pub event: DeploymentEvent,
}

impl<'a> Sources<'a> {
    /// Sources with only the user's current values
    #[inline]
    #[must_use]
    pub fn new(current: &'a ValuesDocument) -> Self {
        Self {
            current: Some(current),
            ..Self::default()
        }
    }

    /// With package default values
    #[inline]
    #[must_use]
    pub fn with_defaults(mut self, defaults: &'a ValuesDocument) -> Self {
        self.defaults = Some(defaults);
        self
    }

    /// With deployed values, read only during an upgrade
    #[inline]
    #[must_use]
    pub fn with_deployed(mut self, deployed: &'a ValuesDocument) -> Self {
        self.deployed = Some(deployed);
        self
    }

    /// With deployment event
    #[inline]
    #[must_use]
    pub fn with_event(mut self, event: DeploymentEvent) -> Self {
        self.event = event;
        self
    }
}

/// Schema-driven parameter extractor
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ReconcileConfig,
}

impl Extractor {
    #[inline]
    #[must_use]
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Produce the ordered parameter list for a schema and its values
    #[must_use]
    pub fn extract(&self, schema: &SchemaDocument, sources: &Sources<'_>) -> Vec<EditableParameter> {
        let mut out = Vec::new();
        if let Some(properties) = schema.properties() {
            let required = required_of(schema.value());
            self.walk(properties, &required, &KeyPath::root(), 0, sources, &mut out);
        }
        debug!(
            count = out.len(),
            event = %sources.event,
            schema = %schema.hash().short(),
            "extracted parameters"
        );
        out
    }

    fn walk(
        &self,
        properties: &Map<String, Value>,
        required: &[&str],
        parent: &KeyPath,
        depth: usize,
        sources: &Sources<'_>,
        out: &mut Vec<EditableParameter>,
    ) {
        for (name, schema) in properties {
            let key = parent.child(name.as_str());
            let kind = ParamType::of_schema(schema);
            let children = schema
                .get("properties")
                .and_then(Value::as_object)
                .filter(|children| kind == ParamType::Object && !children.is_empty());

            let mut param = self.parameter(key, name, kind, schema, depth);
            param.is_required = required.contains(&name.as_str());
            if children.is_some() {
                param.has_properties = true;
            } else {
                param.current_value = self.lookup(sources.current, &param.key, schema);
                param.default_value = self.lookup(sources.defaults, &param.key, schema);
                if sources.event.is_upgrade() {
                    param.deployed_value = sources
                        .deployed
                        .and_then(|doc| doc.get(&param.key))
                        .map(encode_collections);
                }
            }

            let key = param.key.clone();
            out.push(param);
            if let Some(children) = children {
                let required = required_of(schema);
                self.walk(children, &required, &key, depth + 1, sources, out);
            }
        }
    }

    fn parameter(
        &self,
        key: KeyPath,
        name: &str,
        kind: ParamType,
        schema: &Value,
        depth: usize,
    ) -> EditableParameter {
        let minimum = number(schema, "minimum");
        let maximum = number(schema, "maximum");
        let exclusive_minimum = exclusive_bound(schema, "exclusiveMinimum", minimum);
        let exclusive_maximum = exclusive_bound(schema, "exclusiveMaximum", maximum);
        let multiple_of = number(schema, "multipleOf").filter(|m| *m > 0.0);

        let (step, epsilon) = match kind {
            ParamType::Integer => (Some(multiple_of.unwrap_or(self.config.integer_step)), 1.0),
            ParamType::Number => (
                Some(multiple_of.unwrap_or(self.config.number_step)),
                multiple_of.unwrap_or(self.config.number_epsilon),
            ),
            _ => (None, self.config.number_epsilon),
        };
        let effective_minimum = [minimum, exclusive_minimum.map(|b| b + epsilon)]
            .into_iter()
            .flatten()
            .reduce(f64::max);
        let effective_maximum = [maximum, exclusive_maximum.map(|b| b - epsilon)]
            .into_iter()
            .flatten()
            .reduce(f64::min);

        EditableParameter {
            path: key.display_path(),
            key,
            kind,
            title: string(schema, "title").unwrap_or_else(|| name.to_string()),
            description: string(schema, "description"),
            current_value: None,
            default_value: None,
            deployed_value: None,
            schema: schema.clone(),
            minimum,
            maximum,
            exclusive_minimum,
            exclusive_maximum,
            multiple_of,
            min_items: unsigned(schema, "minItems"),
            max_items: unsigned(schema, "maxItems"),
            min_length: unsigned(schema, "minLength"),
            max_length: unsigned(schema, "maxLength"),
            pattern: string(schema, "pattern"),
            enum_values: schema.get("enum").and_then(Value::as_array).cloned(),
            is_required: false,
            read_only: schema.get("readOnly").and_then(Value::as_bool).unwrap_or(false),
            has_properties: false,
            depth,
            is_custom_component: CUSTOM_COMPONENT_KEYS
                .iter()
                .any(|k| schema.get(*k).is_some_and(is_truthy)),
            step,
            effective_minimum,
            effective_maximum,
        }
    }

    fn lookup(&self, doc: Option<&ValuesDocument>, key: &KeyPath, schema: &Value) -> Option<Value> {
        doc.and_then(|doc| doc.get(key))
            .map(encode_collections)
            .or_else(|| {
                if self.config.schema_default_fallback {
                    schema.get("default").map(encode_json_collections)
                } else {
                    None
                }
            })
    }
}

/// Extract with the default configuration
#[must_use]
pub fn extract_parameters(schema: &SchemaDocument, sources: &Sources<'_>) -> Vec<EditableParameter> {
    Extractor::default().extract(schema, sources)
}

/// Keep rows matching a search query, plus the grouping rows above each match
///
/// Matching is case-insensitive over key, title and description. A blank
/// query keeps every row.
#[must_use]
pub fn filter_parameters<'a>(
    params: &'a [EditableParameter],
    query: &str,
) -> Vec<&'a EditableParameter> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return params.iter().collect();
    }
    let matched: Vec<&KeyPath> = params
        .iter()
        .filter(|p| p.matches(&query))
        .map(|p| &p.key)
        .collect();
    params
        .iter()
        .filter(|p| {
            matched.contains(&&p.key)
                || (p.has_properties && matched.iter().any(|k| p.key.is_ancestor_of(k)))
        })
        .collect()
}

/// Leaf rows whose current value differs from their baseline
#[must_use]
pub fn modified_parameters(params: &[EditableParameter]) -> Vec<&EditableParameter> {
    params.iter().filter(|p| p.is_modified()).collect()
}

fn required_of(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn number(schema: &Value, name: &str) -> Option<f64> {
    schema.get(name).and_then(Value::as_f64)
}

fn unsigned(schema: &Value, name: &str) -> Option<u64> {
    schema.get(name).and_then(Value::as_u64)
}

fn string(schema: &Value, name: &str) -> Option<String> {
    schema.get(name).and_then(Value::as_str).map(str::to_string)
}

/// Numeric exclusive bound, or the sibling bound under draft-04 `true`
fn exclusive_bound(schema: &Value, name: &str, sibling: Option<f64>) -> Option<f64> {
    match schema.get(name)? {
        Value::Bool(true) => sibling,
        other => other.as_f64(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn encode_json_collections(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        scalar => scalar.clone(),
    }
}
