//! YAML literal rendering
//!
//! Values written into a document are rendered as single-line literals:
//! scalars plain when that reads back unchanged, collections in flow style.

use serde_yaml::Value;

/// Words older YAML 1.1 readers resolve to booleans
const YAML11_BOOLS: &[&str] = &["y", "n", "yes", "no", "on", "off"];

/// Render a value as a single-line YAML literal
#[must_use]
pub fn render_flow(value: &Value) -> String {
    let mut out = String::new();
    write_flow(&mut out, value, false);
    out
}

/// Render a mapping key for a block mapping line
#[must_use]
pub fn render_key(key: &str) -> String {
    render_string(key, false)
}

fn write_flow(out: &mut String, value: &Value, in_flow: bool) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&render_string(s, in_flow)),
        Value::Sequence(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_flow(out, item, true);
            }
            out.push(']');
        }
        Value::Mapping(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_flow(out, k, true);
                out.push_str(": ");
                write_flow(out, v, true);
            }
            out.push('}');
        }
        Value::Tagged(tagged) => {
            out.push_str(&tagged.tag.to_string());
            out.push(' ');
            write_flow(out, &tagged.value, in_flow);
        }
    }
}

/// Render a string plain if it reads back as the same string, else quoted
fn render_string(s: &str, in_flow: bool) -> String {
    if is_plain_safe(s, in_flow) {
        s.to_string()
    } else {
        double_quoted(s)
    }
}

fn double_quoted(s: &str) -> String {
    // JSON strings are valid YAML double-quoted scalars.
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.escape_default()))
}

fn is_plain_safe(s: &str, in_flow: bool) -> bool {
    let Some(first) = s.chars().next() else {
        return false;
    };
    if s.trim() != s || s.chars().any(char::is_control) {
        return false;
    }
    if "-?:,[]{}#&*!|>'\"%@`".contains(first) {
        return false;
    }
    if s.contains(": ") || s.contains(" #") || s.ends_with(':') {
        return false;
    }
    if in_flow && s.contains([',', '[', ']', '{', '}']) {
        return false;
    }
    if YAML11_BOOLS.contains(&s.to_ascii_lowercase().as_str()) {
        return false;
    }
    matches!(serde_yaml::from_str::<Value>(s), Ok(Value::String(ref back)) if back == s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(render_flow(&Value::Null), "null");
        assert_eq!(render_flow(&Value::Bool(true)), "true");
        assert_eq!(render_flow(&yaml("10")), "10");
        assert_eq!(render_flow(&yaml("1.5")), "1.5");
    }

    #[test]
    fn plain_strings_stay_plain() {
        assert_eq!(render_flow(&Value::String("nginx".into())), "nginx");
        assert_eq!(render_flow(&Value::String("a b c".into())), "a b c");
        assert_eq!(render_flow(&Value::String("docker.io/bitnami".into())), "docker.io/bitnami");
    }

    #[test]
    fn ambiguous_strings_are_quoted() {
        assert_eq!(render_flow(&Value::String("true".into())), "\"true\"");
        assert_eq!(render_flow(&Value::String("10".into())), "\"10\"");
        assert_eq!(render_flow(&Value::String("yes".into())), "\"yes\"");
        assert_eq!(render_flow(&Value::String(String::new())), "\"\"");
        assert_eq!(render_flow(&Value::String("a: b".into())), "\"a: b\"");
        assert_eq!(render_flow(&Value::String(" padded".into())), "\" padded\"");
        assert_eq!(render_flow(&Value::String("two\nlines".into())), "\"two\\nlines\"");
        assert_eq!(render_flow(&Value::String("null".into())), "\"null\"");
    }

    #[test]
    fn flow_collections() {
        assert_eq!(render_flow(&yaml("[x, 1, true]")), "[x, 1, true]");
        assert_eq!(render_flow(&yaml("{a: 1, b: [c]}")), "{a: 1, b: [c]}");
        assert_eq!(render_flow(&yaml("[\"a,b\"]")), "[\"a,b\"]");
        assert_eq!(render_flow(&yaml("[]")), "[]");
        assert_eq!(render_flow(&yaml("{}")), "{}");
    }

    #[test]
    fn rendered_literals_read_back() {
        for text in ["[x, \"1\", {k: v}]", "{a: \"on\", b: null}", "\"-dash\""] {
            let value = yaml(text);
            assert_eq!(yaml(&render_flow(&value)), value);
        }
    }

    #[test]
    fn keys() {
        assert_eq!(render_key("replicaCount"), "replicaCount");
        assert_eq!(render_key("example.com/team"), "example.com/team");
        assert_eq!(render_key("a: b"), "\"a: b\"");
    }
}
