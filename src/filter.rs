//! Visibility Filtering
//!
//! Produces a copy of validated config data containing only the values a
//! given audience may see, using the data-path visibility map from
//! validation. Paths without an entry default to [`Visibility::Backend`].
//!
//! - Objects and arrays survive if any child survives, or if the container
//!   itself is visible.
//! - Primitive array elements share the array's visibility unless the
//!   element has its own entry.
//! - `null` values are always dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compiler::ValidationResult;
use crate::schema::Visibility;
use crate::walk::{escape_token, PathMap};

/// A deprecated key found in config data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecatedKey {
    /// Dotted key, e.g. `backend.database.client`
    pub key: String,
    /// Deprecation reason from the schema
    pub description: String,
}

/// Output of [`VisibilityFilter::apply`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilteredConfig {
    /// The filtered data. An empty object if nothing survived.
    pub data: Value,
    /// Dotted keys of the values that were removed, if requested
    pub filtered_keys: Option<Vec<String>>,
    /// Deprecated keys present in the data, if requested
    pub deprecated_keys: Option<Vec<DeprecatedKey>>,
}

/// Filters data by visibility
#[derive(Debug, Clone, Copy)]
pub struct VisibilityFilter<'a> {
    include: &'a [Visibility],
    visibility_by_data_path: &'a PathMap<Visibility>,
    deprecation_by_data_path: &'a PathMap<String>,
}

#[derive(Default)]
struct Report {
    filtered: Vec<String>,
    deprecated: Vec<DeprecatedKey>,
}

impl<'a> VisibilityFilter<'a> {
    pub fn new(
        include: &'a [Visibility],
        visibility_by_data_path: &'a PathMap<Visibility>,
        deprecation_by_data_path: &'a PathMap<String>,
    ) -> Self {
        Self {
            include,
            visibility_by_data_path,
            deprecation_by_data_path,
        }
    }

    /// Filter using the data-path maps of a validation result
    pub fn from_result(include: &'a [Visibility], result: &'a ValidationResult) -> Self {
        Self::new(
            include,
            &result.visibility_by_data_path,
            &result.deprecation_by_data_path,
        )
    }

    pub fn apply(&self, data: &Value, with_filtered_keys: bool, with_deprecated_keys: bool) -> FilteredConfig {
        let mut report = Report::default();
        let data = self
            .transform(data, "", "", false, &mut report)
            .unwrap_or_else(|| Value::Object(Map::new()));

        FilteredConfig {
            data,
            filtered_keys: with_filtered_keys.then_some(report.filtered),
            deprecated_keys: with_deprecated_keys.then_some(report.deprecated),
        }
    }

    fn transform(
        &self,
        value: &Value,
        data_path: &str,
        key: &str,
        inherited: bool,
        report: &mut Report,
    ) -> Option<Value> {
        let visibility = self
            .visibility_by_data_path
            .get(data_path)
            .copied()
            .unwrap_or_default();
        let visible = self.include.contains(&visibility);

        if !inherited {
            if let Some(reason) = self.deprecation_by_data_path.get(data_path) {
                report.deprecated.push(DeprecatedKey {
                    key: key.to_string(),
                    description: reason.clone(),
                });
            }
        }

        match value {
            Value::Null => None,
            Value::Array(elements) => {
                let mut kept = Vec::new();
                for (index, element) in elements.iter().enumerate() {
                    let element_path = format!("{data_path}/{index}");
                    let element_key = format!("{key}[{index}]");
                    let own_entry = self.visibility_by_data_path.contains_key(&element_path)
                        || element.is_object()
                        || element.is_array();
                    let out = if own_entry {
                        self.transform(element, &element_path, &element_key, false, report)
                    } else {
                        self.transform(element, data_path, &element_key, true, report)
                    };
                    kept.extend(out);
                }
                (!kept.is_empty() || visible).then_some(Value::Array(kept))
            }
            Value::Object(fields) => {
                let mut kept = Map::new();
                for (name, field) in fields {
                    let child_key = if key.is_empty() {
                        name.clone()
                    } else {
                        format!("{key}.{name}")
                    };
                    let child_path = format!("{data_path}/{}", escape_token(name));
                    if let Some(out) = self.transform(field, &child_path, &child_key, false, report) {
                        kept.insert(name.clone(), out);
                    }
                }
                (!kept.is_empty() || visible).then_some(Value::Object(kept))
            }
            scalar => {
                if visible {
                    Some(scalar.clone())
                } else {
                    report.filtered.push(key.to_string());
                    None
                }
            }
        }
    }
}
