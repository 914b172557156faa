//! Config Schema Compiler
//!
//! Turns package fragments into a reusable validator for config data.
//!
//! ```text
//! fragments ──► merge ──► merged schema ──┬─► walk (visibility) ──► schema-path map
//!                                         └─► jsonschema validator
//!
//! batch ──► coerce leaves in place ──► validate ──► errors
//!                                  └─► walk against data ──► data-path maps
//! ```
//!
//! Compiling fails only on authoring defects in the fragments. Bad config
//! data never fails a call: it is reported through
//! [`ValidationResult::errors`].

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::debug;

use crate::coerce::coerce_in_place;
use crate::config::CompileOptions;
use crate::error::{Result, SchemaError};
use crate::merge::merge_fragments;
use crate::schema::{SchemaFragment, SchemaNode, Visibility};
use crate::walk::{walk_instance, walk_schema, PathMap};

/// One config document to validate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// Config data. Coercible leaves are rewritten in place.
    pub data: Value,
    /// Where the data came from, e.g. a file path or `env`
    pub context: String,
}

impl ValidationRequest {
    pub fn new(data: Value, context: impl Into<String>) -> Self {
        Self {
            data,
            context: context.into(),
        }
    }
}

/// A single structural violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// The schema keyword that failed, e.g. `type` or `required`
    pub keyword: String,
    /// JSON Pointer to the offending value (empty for the root)
    pub instance_path: String,
    /// `#`-prefixed JSON Pointer to the failing keyword in the merged schema
    pub schema_path: String,
    /// Human-readable description
    pub message: String,
    /// Keyword-specific details, e.g. `{ "type": "number" }`
    pub params: Value,
    /// Context of the request the error came from
    pub context: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  {}: (root): {}", self.context, self.message)
        } else {
            write!(f, "  {}: {}: {}", self.context, self.instance_path, self.message)
        }
    }
}

/// Collection of validation errors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_inner(self) -> Vec<ValidationError> {
        self.errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// Outcome of validating a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Errors from every request, in batch order. Empty on success.
    pub errors: Vec<ValidationError>,
    /// Visibility of every declared node present in the data
    pub visibility_by_data_path: PathMap<Visibility>,
    /// Visibility of every declared node in the merged schema
    pub visibility_by_schema_path: PathMap<Visibility>,
    /// Deprecation reason of every deprecated node present in the data
    pub deprecation_by_data_path: PathMap<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Compile fragments with default options
pub fn compile(fragments: &[SchemaFragment]) -> Result<CompiledSchema> {
    compile_with_options(fragments, &CompileOptions::default())
}

/// Merge `fragments` and build a reusable validator.
///
/// # Errors
///
/// Any merge error (see [`merge_fragments`]), or `SchemaError::Compile` if
/// the merged tree is not a valid JSON Schema.
pub fn compile_with_options(fragments: &[SchemaFragment], options: &CompileOptions) -> Result<CompiledSchema> {
    let schema = merge_fragments(fragments)?;

    let validator = JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|e| SchemaError::Compile(e.to_string()))?;

    let visibility_by_schema_path = walk_schema(&schema, |node| node.visibility());

    debug!(
        fragments = fragments.len(),
        visibility_paths = visibility_by_schema_path.len(),
        coerce_types = options.coerce_types,
        "compiled config schema"
    );

    Ok(CompiledSchema {
        schema,
        validator,
        visibility_by_schema_path,
        options: options.clone(),
    })
}

/// A merged config schema ready to validate data.
///
/// Read-only once built, so a single instance can validate any number of
/// batches, from several threads at once.
pub struct CompiledSchema {
    schema: Value,
    validator: JSONSchema,
    visibility_by_schema_path: PathMap<Visibility>,
    options: CompileOptions,
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("schema", &self.schema)
            .field("visibility_by_schema_path", &self.visibility_by_schema_path)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// The merged schema tree
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Visibility keyed by schema path. Identical for every call.
    pub fn visibility_by_schema_path(&self) -> &PathMap<Visibility> {
        &self.visibility_by_schema_path
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Validate a batch of config documents.
    ///
    /// Each request is coerced (when enabled), validated and then walked to
    /// collect data-path visibility and deprecation. Coercion is applied per
    /// leaf, so a request that fails validation may still have had other
    /// leaves rewritten. Data-path maps are shared across the batch; a later
    /// request overwrites an earlier one at the same path.
    pub fn validate(&self, batch: &mut [ValidationRequest]) -> ValidationResult {
        let mut result = ValidationResult {
            visibility_by_schema_path: self.visibility_by_schema_path.clone(),
            ..ValidationResult::default()
        };

        for request in batch.iter_mut() {
            let coerced = if self.options.coerce_types {
                coerce_tree(SchemaNode::new(&self.schema), &mut request.data)
            } else {
                0
            };

            let before = result.errors.len();
            if let Err(errors) = self.validator.validate(&request.data) {
                result
                    .errors
                    .extend(errors.map(|error| self.describe(&error, &request.context)));
            }

            walk_instance(
                &self.schema,
                &request.data,
                |node| node.visibility(),
                &mut result.visibility_by_data_path,
            );
            walk_instance(
                &self.schema,
                &request.data,
                |node| node.deprecated().map(str::to_string),
                &mut result.deprecation_by_data_path,
            );

            debug!(
                context = %request.context,
                coerced,
                errors = result.errors.len() - before,
                "validated config"
            );
        }

        result
    }

    /// Convert a jsonschema error into an owned record
    fn describe(&self, error: &jsonschema::ValidationError<'_>, context: &str) -> ValidationError {
        let schema_pointer = error.schema_path.to_string();
        let keyword = schema_pointer.rsplit('/').next().unwrap_or_default().to_string();

        let params = match &error.kind {
            ValidationErrorKind::Required { property } => json!({ "missingProperty": property }),
            _ => {
                let mut params = Map::new();
                if let Some(expected) = self.schema.pointer(&schema_pointer) {
                    params.insert(keyword.clone(), expected.clone());
                }
                Value::Object(params)
            }
        };

        ValidationError {
            keyword,
            instance_path: error.instance_path.to_string(),
            schema_path: format!("#{schema_pointer}"),
            message: error.to_string(),
            params,
            context: context.to_string(),
        }
    }
}

/// Coerce every scalar leaf of `value` covered by `node`. Returns how many
/// values were rewritten.
fn coerce_tree(node: SchemaNode<'_>, value: &mut Value) -> usize {
    let mut coerced = usize::from(coerce_in_place(value, &node.declared_types()));

    match value {
        Value::Object(fields) => {
            for (name, field) in fields.iter_mut() {
                if let Some(child) = node.field(name) {
                    coerced += coerce_tree(child, field);
                }
            }
        }
        Value::Array(elements) => {
            if let Some(items) = node.items() {
                for element in elements.iter_mut() {
                    coerced += coerce_tree(items, element);
                }
            }
        }
        _ => {}
    }

    coerced
}
