//! Settings for the config schema compiler
//!
//! Supports loading settings from:
//! - Default values
//! - Settings file (config-schema.toml)
//! - Environment variables (CONFIG_SCHEMA__*)
//!
//! ## Example settings file (config-schema.toml):
//! ```toml
//! [compile]
//! coerce_types = true
//!
//! [process]
//! visibility = ["frontend"]
//! with_filtered_keys = true
//! with_deprecated_keys = true
//! ignore_schema_errors = false
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::Visibility;

/// Main settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSettings {
    /// How fragments are compiled into a validator
    #[serde(default)]
    pub compile: CompileOptions,

    /// How validated config is post-processed
    #[serde(default)]
    pub process: ProcessOptions,
}

/// Options applied when compiling fragments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Coerce mismatched scalar leaves to their declared type before
    /// reporting type errors
    #[serde(default = "default_true")]
    pub coerce_types: bool,
}

/// Options for [`CompiledSchema::process`](crate::CompiledSchema::process)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// Only keep values with one of these visibilities. Everything is kept
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Vec<Visibility>>,

    /// Report the keys removed by visibility filtering
    #[serde(default)]
    pub with_filtered_keys: bool,

    /// Report deprecated keys present in the config
    #[serde(default)]
    pub with_deprecated_keys: bool,

    /// Return the config even if it failed validation
    #[serde(default)]
    pub ignore_schema_errors: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { coerce_types: true }
    }
}

impl ProcessOptions {
    /// The visibilities to keep
    pub fn included_visibilities(&self) -> Vec<Visibility> {
        self.visibility
            .clone()
            .unwrap_or_else(|| Visibility::ALL.to_vec())
    }
}

impl SchemaSettings {
    /// Load settings from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings, optionally adding a required settings file
    ///
    /// # Errors
    ///
    /// `SchemaError::Settings` if a source is unreadable or malformed.
    pub fn load_from(settings_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let settings_locations = [
            "config-schema.toml",
            ".config-schema.toml",
            "config/config-schema.toml",
        ];

        for location in settings_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "familiar", "config-schema") {
            let xdg_settings = dirs.config_dir().join("config-schema.toml");
            if xdg_settings.exists() {
                builder = builder.add_source(File::from(xdg_settings).required(false));
            }
        }

        if let Some(path) = settings_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // CONFIG_SCHEMA__PROCESS__VISIBILITY=frontend,backend
        builder = builder.add_source(
            Environment::with_prefix("CONFIG_SCHEMA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("process.visibility"),
        );

        let settings: Self = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Save settings to a TOML file
    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;

    #[test]
    fn test_default_settings() {
        let settings = SchemaSettings::default();
        assert!(settings.compile.coerce_types);
        assert!(settings.process.visibility.is_none());
        assert!(!settings.process.ignore_schema_errors);
        assert_eq!(settings.process.included_visibilities(), Visibility::ALL.to_vec());
    }

    #[test]
    fn test_serialize_settings() {
        let settings = SchemaSettings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        assert!(toml_str.contains("[compile]"));
        assert!(toml_str.contains("[process]"));
        assert!(!toml_str.contains("visibility ="));
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: SchemaSettings = toml::from_str(
            r#"
            [process]
            visibility = ["frontend", "backend"]
            "#,
        )
        .unwrap();
        assert!(settings.compile.coerce_types);
        assert_eq!(
            settings.process.included_visibilities(),
            vec![Visibility::Frontend, Visibility::Backend]
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let path = path.to_str().unwrap();

        let settings = SchemaSettings {
            compile: CompileOptions { coerce_types: false },
            process: ProcessOptions {
                visibility: Some(vec![Visibility::Frontend]),
                with_filtered_keys: true,
                with_deprecated_keys: true,
                ignore_schema_errors: false,
            },
        };
        settings.save(path).unwrap();

        let loaded = SchemaSettings::load_from(Some(path)).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_missing_required_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let result = SchemaSettings::load_from(path.to_str());
        assert!(matches!(result, Err(SchemaError::Settings(_))));
    }

    #[test]
    fn test_malformed_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[process]\nvisibility = [\"public\"]\n").unwrap();

        let result = SchemaSettings::load_from(path.to_str());
        assert!(matches!(result, Err(SchemaError::Settings(_))));
    }
}
