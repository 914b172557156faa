//! Schema fragment model
//!
//! Fragments are plain JSON Schema trees contributed by individual packages.
//! Besides the standard `type`, `properties`, `additionalProperties` and
//! `items` keywords the compiler understands two extension keywords:
//!
//! - `visibility`: one of `frontend`, `backend` or `secret`
//! - `deprecated`: a free-text reason the field is going away

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Extension keyword carrying a field's [`Visibility`]
pub const VISIBILITY_KEYWORD: &str = "visibility";

/// Extension keyword carrying a field's deprecation reason
pub const DEPRECATED_KEYWORD: &str = "deprecated";

// =============================================================================
// Fragments
// =============================================================================

/// One package's contribution to the config schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFragment {
    /// Provenance label (usually the package name), only used in error messages
    pub path: String,
    /// The schema tree
    pub value: Value,
}

impl SchemaFragment {
    /// Create a new fragment
    pub fn new(path: impl Into<String>, value: Value) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }
}

// =============================================================================
// Visibility
// =============================================================================

/// Who may see a config value, ordered from least to most restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Safe to ship to browsers
    Frontend,
    /// Only available to backend code
    #[default]
    Backend,
    /// Backend only, and must never be logged or displayed
    Secret,
}

impl Visibility {
    /// All visibilities, least restrictive first
    pub const ALL: [Visibility; 3] = [Visibility::Frontend, Visibility::Backend, Visibility::Secret];

    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Frontend => "frontend",
            Visibility::Backend => "backend",
            Visibility::Secret => "secret",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known visibility
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown visibility '{0}'")]
pub struct UnknownVisibility(pub String);

impl FromStr for Visibility {
    type Err = UnknownVisibility;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frontend" => Ok(Visibility::Frontend),
            "backend" => Ok(Visibility::Backend),
            "secret" => Ok(Visibility::Secret),
            other => Err(UnknownVisibility(other.to_string())),
        }
    }
}

// =============================================================================
// JSON kinds
// =============================================================================

/// JSON type names as used by the `type` keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonKind {
    pub fn from_json_type(type_str: &str) -> Option<Self> {
        match type_str {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }

    /// The kind of an instance value. Numbers always report `Number`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => Self::String,
            Value::Number(_) => Self::Number,
            Value::Bool(_) => Self::Boolean,
            Value::Object(_) => Self::Object,
            Value::Array(_) => Self::Array,
            Value::Null => Self::Null,
        }
    }

    /// Whether `value` already satisfies this declared kind
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0)
            }
            (kind, value) => *kind == Self::of(value),
        }
    }

    /// Scalar kinds that values may be coerced into
    pub fn is_coercible(&self) -> bool {
        matches!(self, Self::String | Self::Number | Self::Integer | Self::Boolean)
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Schema nodes
// =============================================================================

/// Read-only view over one node of a schema tree
///
/// A node with `properties` is an object node, a node with an object-valued
/// `items` is an array node, everything else is treated as a scalar.
#[derive(Debug, Clone, Copy)]
pub struct SchemaNode<'a> {
    raw: &'a Value,
}

impl<'a> SchemaNode<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    /// The underlying JSON
    pub fn raw(&self) -> &'a Value {
        self.raw
    }

    fn keyword(&self, name: &str) -> Option<&'a Value> {
        self.raw.as_object().and_then(|obj| obj.get(name))
    }

    /// Kinds listed by the `type` keyword, in declaration order.
    /// Unknown type names are skipped.
    pub fn declared_types(&self) -> Vec<JsonKind> {
        match self.keyword("type") {
            Some(Value::String(s)) => JsonKind::from_json_type(s).into_iter().collect(),
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .filter_map(JsonKind::from_json_type)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The `properties` map, if any
    pub fn property_map(&self) -> Option<&'a Map<String, Value>> {
        self.keyword("properties").and_then(Value::as_object)
    }

    /// Child properties in declaration order
    pub fn properties(&self) -> impl Iterator<Item = (&'a str, SchemaNode<'a>)> + 'a {
        self.property_map()
            .into_iter()
            .flat_map(|props| props.iter())
            .map(|(name, schema)| (name.as_str(), SchemaNode::new(schema)))
    }

    /// Item schema of an array node
    pub fn items(&self) -> Option<SchemaNode<'a>> {
        self.keyword("items")
            .filter(|items| items.is_object())
            .map(SchemaNode::new)
    }

    /// Schema for properties not listed in `properties`, when it is an object
    pub fn additional_properties(&self) -> Option<SchemaNode<'a>> {
        self.keyword("additionalProperties")
            .filter(|schema| schema.is_object())
            .map(SchemaNode::new)
    }

    /// Schema node covering the instance field `name`
    pub fn field(&self, name: &str) -> Option<SchemaNode<'a>> {
        self.property_map()
            .and_then(|props| props.get(name))
            .map(SchemaNode::new)
            .or_else(|| self.additional_properties())
    }

    /// Declared visibility. Invalid values are rejected when fragments are
    /// merged, so they simply read as absent here.
    pub fn visibility(&self) -> Option<Visibility> {
        self.keyword(VISIBILITY_KEYWORD)
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Declared deprecation reason
    pub fn deprecated(&self) -> Option<&'a str> {
        self.keyword(DEPRECATED_KEYWORD).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visibility_ordering() {
        assert!(Visibility::Frontend < Visibility::Backend);
        assert!(Visibility::Backend < Visibility::Secret);
        assert_eq!(Visibility::default(), Visibility::Backend);
    }

    #[test]
    fn test_visibility_parse() {
        assert_eq!("secret".parse::<Visibility>(), Ok(Visibility::Secret));
        assert_eq!(
            "public".parse::<Visibility>(),
            Err(UnknownVisibility("public".to_string()))
        );
        assert_eq!(serde_json::to_value(Visibility::Frontend).unwrap(), json!("frontend"));
    }

    #[test]
    fn test_kind_matches() {
        assert!(JsonKind::Number.matches(&json!(1.5)));
        assert!(JsonKind::Integer.matches(&json!(3)));
        assert!(JsonKind::Integer.matches(&json!(3.0)));
        assert!(!JsonKind::Integer.matches(&json!(3.5)));
        assert!(!JsonKind::String.matches(&json!(3)));
        assert!(JsonKind::Null.matches(&Value::Null));
    }

    #[test]
    fn test_node_accessors() {
        let schema = json!({
            "type": "object",
            "visibility": "secret",
            "deprecated": "use b",
            "properties": {
                "z": { "type": ["string", "number"] },
                "a": { "type": "array", "items": { "type": "string" } }
            }
        });
        let node = SchemaNode::new(&schema);

        assert_eq!(node.declared_types(), vec![JsonKind::Object]);
        assert_eq!(node.visibility(), Some(Visibility::Secret));
        assert_eq!(node.deprecated(), Some("use b"));

        let props: Vec<_> = node.properties().collect();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].0, "z");
        assert_eq!(props[0].1.declared_types(), vec![JsonKind::String, JsonKind::Number]);
        assert!(props[1].1.items().is_some());
        assert!(props[0].1.items().is_none());
    }

    #[test]
    fn test_field_falls_back_to_additional_properties() {
        let schema = json!({
            "properties": { "host": { "type": "string" } },
            "additionalProperties": { "type": "number", "visibility": "secret" }
        });
        let node = SchemaNode::new(&schema);

        assert_eq!(node.field("host").map(|n| n.declared_types()), Some(vec![JsonKind::String]));
        assert_eq!(node.field("port").and_then(|n| n.visibility()), Some(Visibility::Secret));

        let closed = json!({ "properties": {}, "additionalProperties": false });
        assert!(SchemaNode::new(&closed).field("port").is_none());
    }

    #[test]
    fn test_node_without_keywords() {
        let schema = json!(true);
        let node = SchemaNode::new(&schema);
        assert!(node.declared_types().is_empty());
        assert_eq!(node.properties().count(), 0);
        assert!(node.visibility().is_none());
    }
}
