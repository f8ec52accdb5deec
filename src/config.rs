use crate::error::ResultMessage;
use crate::error::SheetMapperError;
use crate::layout::LayoutTable;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Layout '{0}' is declared more than once")]
    DuplicateLayout(String),

    #[error("Layout '{0}' needs a header range at least two columns wide, got '{1}'")]
    NarrowHeaderRange(String, String),
}

/// Where output goes and which worksheets have an odd layout.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory that relative job paths and output directories are resolved against
    pub base_dir: PathBuf,
    /// Directory receiving one JSON file per worksheet
    pub json_dir: PathBuf,
    /// Directory receiving the mapping file of each workbook
    pub mapping_dir: PathBuf,
    pub layouts: LayoutTable,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_dir: PathBuf::from("."),
            json_dir: PathBuf::from("json"),
            mapping_dir: PathBuf::from("mapping"),
            layouts: LayoutTable::builtin(),
        }
    }
}

impl Config {
    /// Reads a TOML configuration file. Keys left out keep their defaults;
    /// a `[[layouts]]` list replaces the built-in layouts.
    pub fn load(path: &Path) -> Result<Self, SheetMapperError> {
        let text = std::fs::read_to_string(path)?;
        Config::from_toml(&text).with_prefix(&format!("Config '{}'", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self, SheetMapperError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// `path` under `base_dir`, unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for layout in self.layouts.iter() {
            if !names.insert(layout.name.as_str()) {
                return Err(ConfigError::DuplicateLayout(layout.name.to_owned()));
            }
            if layout.header_range.width() < 2 {
                return Err(ConfigError::NarrowHeaderRange(
                    layout.name.to_owned(),
                    layout.header_range.to_string(),
                ));
            }
        }
        Ok(())
    }
}
