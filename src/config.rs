use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::filter::IdentifierPolicy;
use crate::data::loader::DEFAULT_PREVIEW_ROWS;

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV: &str = "DATA_VIEWER_CONFIG";
/// Configuration file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "data-viewer.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parsing config {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("config lists no datasets")]
    NoDatasets,

    #[error("dataset name '{0}' is used more than once")]
    DuplicateDataset(String),

    #[error("preview_rows must be at least 1")]
    EmptyPreview,
}

// ---------------------------------------------------------------------------
// Per-dataset configuration
// ---------------------------------------------------------------------------

/// One tab of the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Tab label, also used for the export file name.
    pub name: String,
    /// Source file (.csv, .xlsx, .parquet or .json).
    pub file_path: PathBuf,
    /// Columns offered as substring filters, in display order.
    #[serde(default)]
    pub filter_columns: Vec<String>,
    /// Whether the year-range selectors apply to this dataset.
    #[serde(default)]
    pub apply_year_filter: bool,
    /// Missing identifier columns are skipped, or fail the year filter when strict.
    #[serde(default)]
    pub identifier_policy: IdentifierPolicy,
}

impl DatasetConfig {
    fn new(name: &str, file_path: &str, filter_columns: &[&str], apply_year_filter: bool) -> Self {
        DatasetConfig {
            name: name.to_string(),
            file_path: PathBuf::from(file_path),
            filter_columns: filter_columns.iter().map(|c| c.to_string()).collect(),
            apply_year_filter,
            identifier_policy: IdentifierPolicy::Skip,
        }
    }
}

/// When full tables are read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    /// Read a dataset when its tab is first shown: a short preview for
    /// display and the full table for filter choices.
    #[default]
    Lazy,
    /// Read every full table at startup and show it as the preview.
    Eager,
}

// ---------------------------------------------------------------------------
// Viewer configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub title: String,
    pub load_strategy: LoadStrategy,
    /// Rows read for a lazy preview.
    pub preview_rows: usize,
    /// Rows shown in the preview table.
    pub preview_head_rows: usize,
    /// Rows shown of a filtered result.
    pub result_rows: usize,
    pub datasets: Vec<DatasetConfig>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Data Viewer and Exporter".to_string(),
            load_strategy: LoadStrategy::Lazy,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            preview_head_rows: 5,
            result_rows: 100,
            datasets: vec![
                DatasetConfig::new(
                    "AllData",
                    "C1-3_summary_2050_variable.csv",
                    &["Category", "Model", "Scenario", "Region", "Variable", "Unit"],
                    true,
                ),
                DatasetConfig::new(
                    "Dataset 2",
                    "AllData.csv",
                    &["Model", "Scenario", "Region", "Variable"],
                    false,
                ),
                DatasetConfig::new("Dataset 3", "AllData3.csv", &["Model", "Scenario", "Region"], false),
                DatasetConfig::new("Dataset 4", "AllData4.csv", &["Model", "Scenario"], false),
            ],
        }
    }
}

impl ViewerConfig {
    /// Read a JSON config. Relative dataset paths resolve against the
    /// directory holding the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: ViewerConfig =
            serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        log::info!(
            "Loaded config {} with {} datasets",
            path.display(),
            config.datasets.len()
        );
        Ok(config)
    }

    /// `$DATA_VIEWER_CONFIG`, then `./data-viewer.json`, then the built-in defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.is_file() {
            return Self::load(local);
        }
        log::info!("No config file found, using built-in datasets");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datasets.is_empty() {
            return Err(ConfigError::NoDatasets);
        }
        if self.preview_rows == 0 {
            return Err(ConfigError::EmptyPreview);
        }
        let mut names = HashSet::new();
        for ds in &self.datasets {
            if !names.insert(ds.name.as_str()) {
                return Err(ConfigError::DuplicateDataset(ds.name.clone()));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for ds in &mut self.datasets {
            if ds.file_path.is_relative() {
                ds.file_path = base.join(&ds.file_path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    #[test]
    fn test_default_has_four_datasets() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        let names: Vec<_> = config.datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["AllData", "Dataset 2", "Dataset 3", "Dataset 4"]);
        let year_filtered: Vec<_> = config
            .datasets
            .iter()
            .filter(|d| d.apply_year_filter)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(year_filtered, vec!["AllData"]);
        assert_eq!(config.datasets[3].filter_columns, vec!["Model", "Scenario"]);
    }

    #[test]
    fn test_load_resolves_relative_paths_and_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("viewer.json");
        fs::write(
            &path,
            r#"{
                "load_strategy": "eager",
                "datasets": [
                    {"name": "Emissions", "file_path": "emissions.csv", "apply_year_filter": true,
                     "identifier_policy": "strict"},
                    {"name": "Absolute", "file_path": "/data/abs.xlsx", "filter_columns": ["Model"]}
                ]
            }"#,
        )
        .unwrap();

        let config = ViewerConfig::load(&path).unwrap();
        assert_eq!(config.load_strategy, LoadStrategy::Eager);
        assert_eq!(config.preview_rows, DEFAULT_PREVIEW_ROWS);
        assert_eq!(config.datasets[0].file_path, temp.path().join("emissions.csv"));
        assert!(config.datasets[0].filter_columns.is_empty());
        assert_eq!(config.datasets[0].identifier_policy, IdentifierPolicy::Strict);
        assert_eq!(config.datasets[1].identifier_policy, IdentifierPolicy::Skip);
        assert_eq!(config.datasets[1].file_path, PathBuf::from("/data/abs.xlsx"));
        assert!(!config.datasets[1].apply_year_filter);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = ViewerConfig::default();
        config.datasets[1].name = "AllData".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateDataset(n)) if n == "AllData"));

        config.datasets.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoDatasets)));

        let config = ViewerConfig {
            preview_rows: 0,
            ..ViewerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyPreview)));
    }

    #[test]
    fn test_malformed_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("viewer.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ViewerConfig::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            ViewerConfig::load(&temp.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
