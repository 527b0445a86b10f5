//! Export configuration.
//!
//! Settings come from an `appsettings.json` document, optionally wrapped in a
//! `ConfigurationSettings` section:
//!
//! ```json
//! {
//!   "ConfigurationSettings": {
//!     "DataverseSettings": {
//!       "ConnectionString": "AuthType=File;Path=metadata.json",
//!       "PublisherPrefix": ["contoso", ""]
//!     },
//!     "ExportSettings": {
//!       "OutputPath": "attributes.csv",
//!       "IncludeSystemEntities": false,
//!       "ExcludeNonOwnedAttributes": true
//!     }
//!   }
//! }
//! ```
//!
//! Command-line values override file values via [`Overrides`].

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::export::SelectionCriteria;

pub const CONFIG_FILE_NAME: &str = "appsettings.json";
pub const DEFAULT_OUTPUT_PATH: &str = "dataverse_attributes.csv";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Connection string is not configured")]
    MissingConnection,

    #[error("Publisher prefix is not configured")]
    MissingPrefix,

    #[error("Output path is not configured")]
    MissingOutputPath,
}

/// Complete exporter settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Settings {
    pub dataverse_settings: DataverseSettings,
    pub export_settings: ExportSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DataverseSettings {
    pub connection_string: String,

    /// One prefix or a list; `""` selects out-of-the-box entities
    pub publisher_prefix: Option<PrefixSetting>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PrefixSetting {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExportSettings {
    pub output_path: String,
    pub include_system_entities: bool,
    pub exclude_non_owned_attributes: bool,
    pub include_system_attributes: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_path: DEFAULT_OUTPUT_PATH.to_string(),
            include_system_entities: false,
            exclude_non_owned_attributes: false,
            include_system_attributes: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    Wrapped {
        #[serde(rename = "ConfigurationSettings")]
        settings: Settings,
    },
    Bare(Settings),
}

/// Values supplied on the command line. Flags only ever switch behaviour on.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub connection: Option<String>,
    pub prefixes: Vec<String>,
    pub output: Option<PathBuf>,
    pub include_system_entities: bool,
    pub exclude_non_owned_attributes: bool,
    pub skip_system_attributes: bool,
}

impl Settings {
    /// Parses a settings document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let document: ConfigDocument = serde_json::from_str(json)?;
        Ok(match document {
            ConfigDocument::Wrapped { settings } | ConfigDocument::Bare(settings) => settings,
        })
    }

    /// Reads and parses a settings file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(connection) = overrides.connection {
            self.dataverse_settings.connection_string = connection;
        }
        if !overrides.prefixes.is_empty() {
            self.dataverse_settings.publisher_prefix = Some(PrefixSetting::Many(overrides.prefixes));
        }
        if let Some(output) = overrides.output {
            self.export_settings.output_path = output.display().to_string();
        }

        let export = &mut self.export_settings;
        export.include_system_entities |= overrides.include_system_entities;
        export.exclude_non_owned_attributes |= overrides.exclude_non_owned_attributes;
        if overrides.skip_system_attributes {
            export.include_system_attributes = false;
        }
    }

    /// Configured prefixes, in order.
    pub fn prefixes(&self) -> Vec<String> {
        match &self.dataverse_settings.publisher_prefix {
            Some(PrefixSetting::One(prefix)) => vec![prefix.clone()],
            Some(PrefixSetting::Many(prefixes)) => prefixes.clone(),
            None => Vec::new(),
        }
    }

    /// # Errors
    ///
    /// Returns the first missing required setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dataverse_settings.connection_string.trim().is_empty() {
            return Err(ConfigError::MissingConnection);
        }
        if self.prefixes().is_empty() {
            return Err(ConfigError::MissingPrefix);
        }
        if self.export_settings.output_path.trim().is_empty() {
            return Err(ConfigError::MissingOutputPath);
        }
        Ok(())
    }

    pub fn criteria(&self) -> SelectionCriteria {
        let export = &self.export_settings;
        SelectionCriteria::new(self.prefixes())
            .with_system_entities(export.include_system_entities)
            .with_owned_attributes_only(export.exclude_non_owned_attributes)
            .with_system_attributes(export.include_system_attributes)
    }

    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.export_settings.output_path)
    }
}

/// Finds the settings file.
///
/// An explicit path is returned as-is. Otherwise `./appsettings.json` is
/// tried, then the executable's directory and its parents up to the first
/// one holding `appsettings.json` or a `Cargo.toml`.
pub fn locate_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }

    let exe = std::env::current_exe().ok()?;
    find_upwards(exe.parent()?)
}

fn find_upwards(start: &Path) -> Option<PathBuf> {
    for dir in start.ancestors() {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if dir.join("Cargo.toml").is_file() {
            return None;
        }
    }
    None
}
