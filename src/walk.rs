//! Schema Tree Walking
//!
//! Extracts per-path metadata (visibility, deprecation, ...) from a schema
//! tree. Both walks descend through `properties` and `items` and record a
//! value wherever the extractor returns one.
//!
//! Two path flavors are produced:
//!
//! - schema paths (`properties/d/items`), one per declared node, array
//!   elements collapsed onto `items`
//! - data paths (`/d/0`), one per node actually present in an instance
//!
//! Property names are escaped as JSON Pointer reference tokens in both
//! flavors (`~` becomes `~0`, `/` becomes `~1`), matching the paths the
//! validator reports. Fields matched by an object-valued
//! `additionalProperties` are walked too.

use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::schema::SchemaNode;

/// Mapping from structural path to a value
pub type PathMap<T> = BTreeMap<String, T>;

/// Escape a property name for use as one path segment
pub fn escape_token(name: &str) -> Cow<'_, str> {
    if name.contains(['~', '/']) {
        Cow::Owned(name.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Walk every declared node of `schema`, keyed by schema path.
///
/// The root node, if it yields a value, is keyed by the empty string.
pub fn walk_schema<'a, T, F>(schema: &'a Value, extract: F) -> PathMap<T>
where
    F: Fn(SchemaNode<'a>) -> Option<T>,
{
    let mut out = PathMap::new();
    let mut segments: Vec<Cow<'a, str>> = Vec::new();
    descend_schema(SchemaNode::new(schema), &mut segments, &extract, &mut out);
    out
}

fn descend_schema<'a, T, F>(
    node: SchemaNode<'a>,
    segments: &mut Vec<Cow<'a, str>>,
    extract: &F,
    out: &mut PathMap<T>,
) where
    F: Fn(SchemaNode<'a>) -> Option<T>,
{
    if let Some(value) = extract(node) {
        out.insert(segments.join("/"), value);
    }

    for (name, child) in node.properties() {
        segments.push(Cow::Borrowed("properties"));
        segments.push(escape_token(name));
        descend_schema(child, segments, extract, out);
        segments.truncate(segments.len() - 2);
    }

    if let Some(additional) = node.additional_properties() {
        segments.push(Cow::Borrowed("additionalProperties"));
        descend_schema(additional, segments, extract, out);
        segments.pop();
    }

    if let Some(items) = node.items() {
        segments.push(Cow::Borrowed("items"));
        descend_schema(items, segments, extract, out);
        segments.pop();
    }
}

/// Walk `schema` aligned against `instance`, keyed by data path.
///
/// Only nodes present in the instance are visited, so absent optional
/// properties produce no entries. Undeclared fields are matched against an
/// object-valued `additionalProperties`. Each array element gets its own entry.
/// Results are inserted into `out`, replacing any existing entry at the
/// same path.
pub fn walk_instance<'a, T, F>(schema: &'a Value, instance: &Value, extract: F, out: &mut PathMap<T>)
where
    F: Fn(SchemaNode<'a>) -> Option<T>,
{
    let mut path = String::new();
    descend_instance(SchemaNode::new(schema), instance, &mut path, &extract, out);
}

fn descend_instance<'a, T, F>(
    node: SchemaNode<'a>,
    instance: &Value,
    path: &mut String,
    extract: &F,
    out: &mut PathMap<T>,
) where
    F: Fn(SchemaNode<'a>) -> Option<T>,
{
    if let Some(value) = extract(node) {
        out.insert(path.clone(), value);
    }

    let base = path.len();
    match instance {
        Value::Object(fields) => {
            for (name, child_value) in fields {
                if let Some(child) = node.field(name) {
                    path.push('/');
                    path.push_str(&escape_token(name));
                    descend_instance(child, child_value, path, extract, out);
                    path.truncate(base);
                }
            }
        }
        Value::Array(elements) => {
            if let Some(items) = node.items() {
                for (index, element) in elements.iter().enumerate() {
                    path.push('/');
                    path.push_str(&index.to_string());
                    descend_instance(items, element, path, extract, out);
                    path.truncate(base);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Visibility;
    use serde_json::json;

    fn nested_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": { "type": "string", "visibility": "frontend" },
                "b": { "type": "string", "deprecated": "use a" },
                "d": {
                    "type": "array",
                    "visibility": "frontend",
                    "items": {
                        "type": "object",
                        "visibility": "secret",
                        "properties": {
                            "c": { "type": "string", "visibility": "backend" }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_schema_paths_collapse_items() {
        let schema = nested_schema();
        let map = walk_schema(&schema, |node| node.visibility());

        let expected: PathMap<Visibility> = [
            ("properties/a", Visibility::Frontend),
            ("properties/d", Visibility::Frontend),
            ("properties/d/items", Visibility::Secret),
            ("properties/d/items/properties/c", Visibility::Backend),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        assert_eq!(map, expected);
    }

    #[test]
    fn test_schema_walk_with_other_extractor() {
        let schema = nested_schema();
        let map = walk_schema(&schema, |node| node.deprecated().map(str::to_string));
        assert_eq!(map.len(), 1);
        assert_eq!(map["properties/b"], "use a");
    }

    #[test]
    fn test_root_uses_empty_key() {
        let schema = json!({ "visibility": "secret" });
        let map = walk_schema(&schema, |node| node.visibility());
        assert_eq!(map.get(""), Some(&Visibility::Secret));
    }

    #[test]
    fn test_instance_paths_fan_out() {
        let schema = nested_schema();
        let instance = json!({
            "a": "x",
            "d": [{ "c": "one" }, { "c": "two" }]
        });
        let mut map = PathMap::new();
        walk_instance(&schema, &instance, |node| node.visibility(), &mut map);

        assert_eq!(map.get("/a"), Some(&Visibility::Frontend));
        assert_eq!(map.get("/d"), Some(&Visibility::Frontend));
        assert_eq!(map.get("/d/0"), Some(&Visibility::Secret));
        assert_eq!(map.get("/d/1"), Some(&Visibility::Secret));
        assert_eq!(map.get("/d/0/c"), Some(&Visibility::Backend));
        assert_eq!(map.get("/d/1/c"), Some(&Visibility::Backend));
        assert_eq!(map.len(), 6);
    }

    #[test]
    fn test_absent_properties_are_skipped() {
        let schema = nested_schema();
        let instance = json!({ "c": "undeclared" });
        let mut map = PathMap::new();
        walk_instance(&schema, &instance, |node| node.visibility(), &mut map);
        assert!(map.is_empty());

        let mut deprecations = PathMap::new();
        walk_instance(
            &schema,
            &json!({ "b": "old" }),
            |node| node.deprecated().map(str::to_string),
            &mut deprecations,
        );
        assert_eq!(deprecations.get("/b").map(String::as_str), Some("use a"));
    }

    #[test]
    fn test_scalar_in_place_of_object_stops_descent() {
        let schema = nested_schema();
        let mut map = PathMap::new();
        walk_instance(&schema, &json!({ "d": "not an array" }), |node| node.visibility(), &mut map);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("/d"), Some(&Visibility::Frontend));
    }

    #[test]
    fn test_escape_token() {
        assert_eq!(escape_token("plain"), "plain");
        assert_eq!(escape_token("/api"), "~1api");
        assert_eq!(escape_token("a~b/c"), "a~0b~1c");
    }

    #[test]
    fn test_slash_keys_do_not_collide_with_nesting() {
        let schema = json!({
            "properties": {
                "a/b": { "visibility": "secret" },
                "a": { "properties": { "b": { "visibility": "frontend" } } }
            }
        });

        let schema_map = walk_schema(&schema, |node| node.visibility());
        assert_eq!(schema_map.get("properties/a~1b"), Some(&Visibility::Secret));
        assert_eq!(schema_map.get("properties/a/properties/b"), Some(&Visibility::Frontend));

        let mut map = PathMap::new();
        walk_instance(&schema, &json!({ "a/b": "x", "a": { "b": 1 } }), |node| node.visibility(), &mut map);
        assert_eq!(map.get("/a~1b"), Some(&Visibility::Secret));
        assert_eq!(map.get("/a/b"), Some(&Visibility::Frontend));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_additional_properties_are_walked() {
        let schema = json!({
            "properties": { "known": { "visibility": "frontend" } },
            "additionalProperties": { "visibility": "secret", "deprecated": "list tokens explicitly" }
        });

        let schema_map = walk_schema(&schema, |node| node.visibility());
        assert_eq!(schema_map.get("additionalProperties"), Some(&Visibility::Secret));

        let instance = json!({ "known": "x", "token": "y" });
        let mut map = PathMap::new();
        walk_instance(&schema, &instance, |node| node.visibility(), &mut map);
        assert_eq!(map.get("/known"), Some(&Visibility::Frontend));
        assert_eq!(map.get("/token"), Some(&Visibility::Secret));

        let mut deprecations = PathMap::new();
        walk_instance(&schema, &instance, |node| node.deprecated().map(str::to_string), &mut deprecations);
        assert_eq!(deprecations.len(), 1);
        assert!(deprecations.contains_key("/token"));
    }
}
