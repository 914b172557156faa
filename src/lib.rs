//! Familiar Config Schema Compiler
//!
//! Merges the config schema fragments shipped by individual packages into a
//! single validator, then uses it to validate, coerce and annotate runtime
//! configuration gathered from files, the environment and remote sources.
//!
//! ## Features
//!
//! - **Fragment Merging**: Overlapping fragments are deep-merged with `allOf`
//!   semantics; conflicting visibility declarations fail compilation
//! - **Visibility**: Every field can be marked `frontend`, `backend` or
//!   `secret`, reported per schema path and per data path
//! - **Deprecation**: Deprecated fields present in config are reported with
//!   their reason
//! - **Coercion**: `"123"`, `"true"` and friends are normalized to the
//!   declared scalar type before validation
//! - **Filtering**: Validated config can be stripped down to what a given
//!   audience may see
//!
//! ## Example
//!
//! ```
//! use familiar_config_schema::{compile, SchemaFragment, ValidationRequest};
//! use serde_json::json;
//!
//! let schema = compile(&[SchemaFragment::new(
//!     "my-plugin",
//!     json!({
//!         "type": "object",
//!         "properties": { "port": { "type": "number", "visibility": "backend" } }
//!     }),
//! )])?;
//!
//! let mut batch = [ValidationRequest::new(json!({ "port": "7007" }), "env")];
//! let result = schema.validate(&mut batch);
//!
//! assert!(result.is_valid());
//! assert_eq!(batch[0].data, json!({ "port": 7007 }));
//! # Ok::<(), familiar_config_schema::SchemaError>(())
//! ```

pub mod coerce;
pub mod compiler;
pub mod config;
pub mod error;
pub mod filter;
pub mod merge;
pub mod process;
pub mod schema;
pub mod walk;

pub use coerce::{coerce, coerce_in_place};
pub use compiler::{
    compile, compile_with_options, CompiledSchema, ValidationError, ValidationErrors,
    ValidationRequest, ValidationResult,
};
pub use config::{CompileOptions, ProcessOptions, SchemaSettings};
pub use error::{Result, SchemaError};
pub use filter::{DeprecatedKey, FilteredConfig, VisibilityFilter};
pub use merge::merge_fragments;
pub use process::ProcessedConfig;
pub use schema::{JsonKind, SchemaFragment, SchemaNode, Visibility};
pub use walk::{escape_token, walk_instance, walk_schema, PathMap};
