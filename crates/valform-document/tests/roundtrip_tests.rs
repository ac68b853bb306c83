use proptest::prelude::*;
use serde_yaml::Value;
use valform_document::ValuesDocument;
use valform_model::KeyPath;

/// Flat `key: value # comment` lines with unique keys
fn flat_document() -> impl Strategy<Value = Vec<(String, String, Option<String>)>> {
    prop::collection::btree_map(
        "k[a-z]{0,7}",
        ("v[a-z0-9]{0,5}", prop::option::of("[a-z ]{0,10}")),
        1..8,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(key, (value, comment))| (key, value, comment))
            .collect()
    })
}

fn render_line(key: &str, value: &str, comment: Option<&String>) -> String {
    match comment {
        Some(comment) => format!("{key}: {value} # {comment}"),
        None => format!("{key}: {value}"),
    }
}

fn render(entries: &[(String, String, Option<String>)]) -> String {
    let mut text = String::from("# generated\n");
    for (key, value, comment) in entries {
        text.push_str(&render_line(key, value, comment.as_ref()));
        text.push('\n');
    }
    text
}

#[test]
fn test_nested_document_roundtrips() {
    let source = "\
a:
  b:
    c: 1   # deep

  list:
    - x
    - y: z
text: |
  line one
  line two
";
    let doc = ValuesDocument::parse(source).unwrap();
    assert_eq!(doc.as_str(), source);
}

#[test]
fn test_edit_next_to_block_scalar() {
    let source = "script: |\n  echo hi\nport: 80\n";
    let mut doc = ValuesDocument::parse(source).unwrap();
    doc.set(&"port".parse().unwrap(), &Value::from(81)).unwrap();
    assert_eq!(doc.as_str(), "script: |\n  echo hi\nport: 81\n");
}

proptest! {
    #[test]
    fn prop_unedited_documents_roundtrip(entries in flat_document()) {
        let text = render(&entries);
        let doc = ValuesDocument::parse(text.clone()).unwrap();
        prop_assert_eq!(doc.to_string(), text);
    }

    #[test]
    fn prop_edit_changes_only_target_line(
        entries in flat_document(),
        pick in any::<prop::sample::Index>(),
        replacement in 0u32..100_000,
    ) {
        let text = render(&entries);
        let target = pick.index(entries.len());
        let (key, _, comment) = &entries[target];

        let mut doc = ValuesDocument::parse(text.clone()).unwrap();
        doc.set(&KeyPath::single(key.as_str()), &Value::from(replacement)).unwrap();

        let before: Vec<&str> = text.lines().collect();
        let after: Vec<&str> = doc.as_str().lines().collect();
        prop_assert_eq!(before.len(), after.len());
        for (i, (old, new)) in before.iter().zip(&after).enumerate() {
            if i == target + 1 {
                let expected = render_line(key, &replacement.to_string(), comment.as_ref());
                prop_assert_eq!(*new, expected.as_str());
            } else {
                prop_assert_eq!(old, new);
            }
        }
    }

    #[test]
    fn prop_new_keys_are_appended(entries in flat_document(), value in "[a-z]{1,6}") {
        let text = render(&entries);
        let mut doc = ValuesDocument::parse(text.clone()).unwrap();
        let key = KeyPath::new(vec!["zz".to_string(), "added".to_string()]);
        doc.set(&key, &Value::String(value.clone())).unwrap();

        prop_assert!(doc.as_str().starts_with(&text));
        prop_assert_eq!(doc.get(&key), Some(&Value::String(value)));
    }
}
