//! Config Processing
//!
//! Validates a batch of config documents and prepares them for a specific
//! audience: rejects invalid config (unless told otherwise), strips values
//! the audience may not see and reports deprecated keys.

use serde_json::Value;
use tracing::warn;

use crate::compiler::{CompiledSchema, ValidationErrors, ValidationRequest};
use crate::config::ProcessOptions;
use crate::error::{Result, SchemaError};
use crate::filter::{DeprecatedKey, VisibilityFilter};

/// One processed config document
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedConfig {
    /// Coerced and, if requested, visibility-filtered data
    pub data: Value,
    pub context: String,
    /// Keys removed by visibility filtering, if requested
    pub filtered_keys: Option<Vec<String>>,
    /// Deprecated keys present in the data, if requested
    pub deprecated_keys: Option<Vec<DeprecatedKey>>,
}

impl CompiledSchema {
    /// Validate `batch` and prepare each document according to `options`.
    ///
    /// Without `options.visibility` the coerced data is returned untouched.
    ///
    /// # Errors
    ///
    /// `SchemaError::ConfigInvalid` with every validation error of the batch,
    /// unless `options.ignore_schema_errors` is set.
    pub fn process(&self, mut batch: Vec<ValidationRequest>, options: &ProcessOptions) -> Result<Vec<ProcessedConfig>> {
        let result = self.validate(&mut batch);

        if !result.is_valid() {
            if !options.ignore_schema_errors {
                return Err(SchemaError::ConfigInvalid(ValidationErrors::new(result.errors)));
            }
            for error in &result.errors {
                warn!(
                    context = %error.context,
                    path = %error.instance_path,
                    "ignoring config schema error: {}",
                    error.message
                );
            }
        }

        let include = options.included_visibilities();
        let filter = VisibilityFilter::from_result(&include, &result);

        let processed = batch
            .into_iter()
            .map(|request| {
                let filtered = filter.apply(
                    &request.data,
                    options.with_filtered_keys,
                    options.with_deprecated_keys,
                );

                for key in filtered.deprecated_keys.iter().flatten() {
                    warn!(
                        context = %request.context,
                        key = %key.key,
                        "deprecated config key: {}",
                        key.description
                    );
                }

                let data = match options.visibility {
                    Some(_) => filtered.data,
                    None => request.data,
                };

                ProcessedConfig {
                    data,
                    context: request.context,
                    filtered_keys: filtered.filtered_keys,
                    deprecated_keys: filtered.deprecated_keys,
                }
            })
            .collect();

        Ok(processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::schema::{SchemaFragment, Visibility};
    use serde_json::json;

    fn compiled() -> CompiledSchema {
        compile(&[
            SchemaFragment::new(
                "app",
                json!({
                    "type": "object",
                    "properties": {
                        "app": {
                            "type": "object",
                            "properties": {
                                "title": { "type": "string", "visibility": "frontend" },
                                "port": { "type": "number" }
                            }
                        }
                    }
                }),
            ),
            SchemaFragment::new(
                "auth",
                json!({
                    "type": "object",
                    "properties": {
                        "auth": {
                            "type": "object",
                            "properties": {
                                "secret": { "type": "string", "visibility": "secret" },
                                "legacy": { "type": "boolean", "deprecated": "remove before 2.0" }
                            }
                        }
                    }
                }),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_process_frontend() {
        let batch = vec![ValidationRequest::new(
            json!({
                "app": { "title": "Portal", "port": "7007" },
                "auth": { "secret": "s3cr3t", "legacy": "true" }
            }),
            "app-config.yaml",
        )];
        let options = ProcessOptions {
            visibility: Some(vec![Visibility::Frontend]),
            with_filtered_keys: true,
            with_deprecated_keys: true,
            ignore_schema_errors: false,
        };

        let processed = compiled().process(batch, &options).unwrap();
        assert_eq!(processed.len(), 1);
        assert_eq!(processed[0].data, json!({ "app": { "title": "Portal" } }));
        assert_eq!(processed[0].context, "app-config.yaml");
        assert_eq!(
            processed[0].filtered_keys,
            Some(vec![
                "app.port".to_string(),
                "auth.secret".to_string(),
                "auth.legacy".to_string(),
            ])
        );
        assert_eq!(
            processed[0].deprecated_keys,
            Some(vec![DeprecatedKey {
                key: "auth.legacy".to_string(),
                description: "remove before 2.0".to_string(),
            }])
        );
    }

    #[test]
    fn test_process_without_visibility_keeps_coerced_data() {
        let batch = vec![ValidationRequest::new(
            json!({ "app": { "port": "7007", "extra": null } }),
            "env",
        )];
        let processed = compiled().process(batch, &ProcessOptions::default()).unwrap();

        assert_eq!(processed[0].data, json!({ "app": { "port": 7007, "extra": null } }));
        assert_eq!(processed[0].filtered_keys, None);
        assert_eq!(processed[0].deprecated_keys, None);
    }

    #[test]
    fn test_process_rejects_invalid_config() {
        let batch = vec![
            ValidationRequest::new(json!({ "app": { "port": "not a port" } }), "a.yaml"),
            ValidationRequest::new(json!({ "auth": { "legacy": "maybe" } }), "b.yaml"),
        ];
        let err = compiled().process(batch, &ProcessOptions::default()).unwrap_err();

        match err {
            SchemaError::ConfigInvalid(errors) => {
                assert_eq!(errors.len(), 2);
                assert_eq!(errors.errors()[0].context, "a.yaml");
                assert_eq!(errors.errors()[1].context, "b.yaml");
            }
            other => panic!("Expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn test_process_can_ignore_errors() {
        let batch = vec![ValidationRequest::new(json!({ "app": { "port": "not a port" } }), "a.yaml")];
        let options = ProcessOptions {
            ignore_schema_errors: true,
            ..ProcessOptions::default()
        };
        let processed = compiled().process(batch, &options).unwrap();
        assert_eq!(processed[0].data, json!({ "app": { "port": "not a port" } }));
    }
}
