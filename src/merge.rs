//! Schema Merging
//!
//! Folds the fragments contributed by each package into a single schema tree.
//! Fragments are combined with `allOf` semantics: the merged schema accepts an
//! instance only if every fragment would. Overlapping `properties`, `items`
//! and `additionalProperties` are merged recursively, and the merge is built
//! one fragment at a time so that visibility declarations can be checked
//! against whatever an earlier fragment already put at the same path. A
//! `true` subschema is replaced by whatever a later fragment declares there,
//! and `false` always wins.

use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::schema::{SchemaFragment, Visibility, DEPRECATED_KEYWORD, VISIBILITY_KEYWORD};
use crate::walk::escape_token;

/// Keywords that only describe a field. The last fragment to declare one wins.
const ANNOTATION_KEYWORDS: &[&str] = &[
    "title",
    "description",
    "default",
    "examples",
    "$schema",
    "$id",
    "$comment",
];

/// Merge fragments into a single schema tree.
///
/// An empty fragment list yields `{}`, which accepts any instance.
///
/// # Errors
///
/// - `SchemaError::InvalidFormat` if a fragment is not a JSON object
/// - `SchemaError::InvalidVisibility` if a fragment declares an unknown visibility
/// - `SchemaError::VisibilityConflict` if two fragments declare different
///   visibilities at the same path
pub fn merge_fragments(fragments: &[SchemaFragment]) -> Result<Value> {
    let mut merger = Merger::default();
    let mut root = Map::new();

    for fragment in fragments {
        let source = fragment.value.as_object().ok_or_else(|| {
            SchemaError::InvalidFormat(format!(
                "config schema '{}' must be a JSON object",
                fragment.path
            ))
        })?;
        debug!(fragment = %fragment.path, "merging config schema fragment");
        merger.merge_object(&mut root, source, &mut Vec::new(), &fragment.path)?;
    }

    debug!(fragments = fragments.len(), "merged config schema fragments");
    Ok(Value::Object(root))
}

/// Incremental merge state
#[derive(Default)]
struct Merger<'f> {
    /// Which fragment first declared the visibility at each path
    visibility_origin: HashMap<String, &'f str>,
}

impl<'f> Merger<'f> {
    fn merge_object(
        &mut self,
        target: &mut Map<String, Value>,
        source: &Map<String, Value>,
        path: &mut Vec<String>,
        fragment: &'f str,
    ) -> Result<()> {
        for (key, incoming) in source {
            match key.as_str() {
                VISIBILITY_KEYWORD => self.merge_visibility(target, incoming, path, fragment)?,
                DEPRECATED_KEYWORD => {
                    if let Some(previous) = target.get(key).filter(|prev| *prev != incoming) {
                        debug!(
                            path = %keyword_path(path, key),
                            %previous,
                            %incoming,
                            "deprecation reason overridden by later fragment"
                        );
                    }
                    target.insert(key.clone(), incoming.clone());
                }
                "type" => merge_type(target, incoming),
                "properties" if incoming.is_object() && target.get(key).map_or(true, Value::is_object) => {
                    let slot = target
                        .entry("properties".to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let (Value::Object(props), Value::Object(incoming_props)) = (slot, incoming) {
                        for (name, schema) in incoming_props {
                            path.push("properties".to_string());
                            path.push(escape_token(name).into_owned());
                            let merged = self.merge_child(props, name, schema, path, fragment);
                            path.truncate(path.len() - 2);
                            merged?;
                        }
                    }
                }
                "items" | "additionalProperties" if incoming.is_object() || incoming.is_boolean() => {
                    path.push(key.clone());
                    let merged = self.merge_child(target, key, incoming, path, fragment);
                    path.pop();
                    merged?;
                }
                "required" => merge_required(target, incoming),
                "allOf" if incoming.is_array() && target.get(key).map_or(false, Value::is_array) => {
                    if let (Some(Value::Array(existing)), Value::Array(more)) = (target.get_mut(key), incoming) {
                        existing.extend(more.iter().cloned());
                    }
                }
                k if ANNOTATION_KEYWORDS.contains(&k) => {
                    target.insert(key.clone(), incoming.clone());
                }
                _ => merge_constraint(target, key, incoming),
            }
        }
        Ok(())
    }

    /// Merge one subschema into `parent[key]`
    fn merge_child(
        &mut self,
        parent: &mut Map<String, Value>,
        key: &str,
        incoming: &Value,
        path: &mut Vec<String>,
        fragment: &'f str,
    ) -> Result<()> {
        if !parent.contains_key(key) {
            let first = match incoming {
                Value::Object(source) => {
                    let mut fresh = Map::new();
                    self.merge_object(&mut fresh, source, path, fragment)?;
                    Value::Object(fresh)
                }
                other => other.clone(),
            };
            parent.insert(key.to_string(), first);
            return Ok(());
        }
        let Some(slot) = parent.get_mut(key) else {
            return Ok(());
        };

        match (slot, incoming) {
            (Value::Object(existing), Value::Object(source)) => {
                self.merge_object(existing, source, path, fragment)
            }
            // `true` accepts anything, so the incoming schema replaces it
            (slot, Value::Object(source)) if matches!(slot, Value::Bool(true)) => {
                let mut fresh = Map::new();
                self.merge_object(&mut fresh, source, path, fragment)?;
                *slot = Value::Object(fresh);
                Ok(())
            }
            (Value::Bool(false), _) => {
                debug!(path = %path.join("/"), fragment, "subschema already rejects every value");
                Ok(())
            }
            (_, Value::Bool(true)) => Ok(()),
            (slot, Value::Bool(false)) => {
                *slot = Value::Bool(false);
                Ok(())
            }
            // Malformed subschemas are kept so that compilation rejects them
            (_, Value::Object(_)) => Ok(()),
            (slot, other) => {
                *slot = other.clone();
                Ok(())
            }
        }
    }

    fn merge_visibility(
        &mut self,
        target: &mut Map<String, Value>,
        incoming: &Value,
        path: &[String],
        fragment: &'f str,
    ) -> Result<()> {
        let key_path = keyword_path(path, VISIBILITY_KEYWORD);
        let incoming_visibility: Visibility = incoming
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SchemaError::InvalidVisibility {
                fragment: fragment.to_string(),
                path: key_path.clone(),
                value: incoming.to_string(),
            })?;

        // Already validated when it was inserted
        let existing = target
            .get(VISIBILITY_KEYWORD)
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Visibility>().ok());

        match existing {
            Some(existing) if existing != incoming_visibility => {
                let existing_fragment = self
                    .visibility_origin
                    .get(&key_path)
                    .copied()
                    .unwrap_or("<unknown>")
                    .to_string();
                Err(SchemaError::VisibilityConflict {
                    path: key_path,
                    existing,
                    incoming: incoming_visibility,
                    existing_fragment,
                    incoming_fragment: fragment.to_string(),
                })
            }
            Some(_) => Ok(()),
            None => {
                target.insert(VISIBILITY_KEYWORD.to_string(), incoming.clone());
                self.visibility_origin.insert(key_path, fragment);
                Ok(())
            }
        }
    }
}

/// `properties/a/visibility` style path of a keyword below `path`
fn keyword_path(path: &[String], keyword: &str) -> String {
    if path.is_empty() {
        keyword.to_string()
    } else {
        format!("{}/{}", path.join("/"), keyword)
    }
}

fn type_names(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Differing types widen to a type list. Rejecting the mismatch is left to
/// instance validation.
fn merge_type(target: &mut Map<String, Value>, incoming: &Value) {
    if let Some(existing) = target.get_mut("type") {
        if *existing != *incoming {
            let mut types = type_names(existing);
            for name in type_names(incoming) {
                if !types.contains(&name) {
                    types.push(name);
                }
            }
            *existing = if types.len() == 1 {
                Value::String(types.remove(0))
            } else {
                Value::Array(types.into_iter().map(Value::String).collect())
            };
        }
    } else {
        target.insert("type".to_string(), incoming.clone());
    }
}

fn merge_required(target: &mut Map<String, Value>, incoming: &Value) {
    let both_lists = incoming.is_array() && target.get("required").map_or(false, Value::is_array);
    if !both_lists {
        merge_constraint(target, "required", incoming);
        return;
    }
    if let (Some(Value::Array(existing)), Value::Array(names)) = (target.get_mut("required"), incoming) {
        for name in names {
            if !existing.contains(name) {
                existing.push(name.clone());
            }
        }
    }
}

/// Any other keyword: keep the first value and push differing ones into
/// `allOf` so both constraints still apply.
fn merge_constraint(target: &mut Map<String, Value>, key: &str, incoming: &Value) {
    match target.get(key) {
        None => {
            target.insert(key.to_string(), incoming.clone());
        }
        Some(existing) if existing == incoming => {}
        Some(_) => {
            let mut extra = Map::new();
            extra.insert(key.to_string(), incoming.clone());
            let all_of = target
                .entry("allOf".to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if !all_of.is_array() {
                let previous = std::mem::take(all_of);
                *all_of = Value::Array(vec![json!({ "allOf": previous })]);
            }
            if let Value::Array(list) = all_of {
                list.push(Value::Object(extra));
            }
        }
    }
}
