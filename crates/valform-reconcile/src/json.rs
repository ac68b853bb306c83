//! YAML to JSON value conversion

use serde_json::{Map, Number, Value as Json};
use serde_yaml::Value as Yaml;
use valform_document::render_flow;

/// Convert a YAML value into JSON
///
/// Mapping keys that are not strings are rendered as YAML literals, tags are
/// dropped and non-finite floats become strings.
#[must_use]
pub fn yaml_to_json(value: &Yaml) -> Json {
    match value {
        Yaml::Null => Json::Null,
        Yaml::Bool(b) => Json::Bool(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Json::from(i)
            } else if let Some(u) = n.as_u64() {
                Json::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map_or_else(|| Json::String(n.to_string()), Json::Number)
            }
        }
        Yaml::String(s) => Json::String(s.clone()),
        Yaml::Sequence(items) => Json::Array(items.iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => {
            let mut object = Map::with_capacity(map.len());
            for (k, v) in map {
                let key = match k {
                    Yaml::String(s) => s.clone(),
                    other => render_flow(other),
                };
                object.insert(key, yaml_to_json(v));
            }
            Json::Object(object)
        }
        Yaml::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

/// Compact JSON text for collections, plain conversion for scalars
#[must_use]
pub(crate) fn encode_collections(value: &Yaml) -> Json {
    let json = yaml_to_json(value);
    match json {
        Json::Array(_) | Json::Object(_) => Json::String(json.to_string()),
        scalar => scalar,
    }
}
