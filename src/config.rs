//! User configuration: `~/.config/tabfuse/config.toml` layered over built-in defaults.
//!
//! Only values that differ from the defaults override them, and the merged result is
//! validated before use.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::pivot::Aggregation;
use crate::sniff::{Sniffer, DEFAULT_SAMPLE_LINES};

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| EngineError::Config("could not determine config directory".into()))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(EngineError::Config(format!(
                "config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            )));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }

    /// Read and parse `config.toml` from this directory. A missing file yields defaults.
    pub fn read_config(&self) -> Result<AppConfig> {
        let config_path = self.config_path("config.toml");

        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            EngineError::Config(format!(
                "failed to read config file at {}: {}",
                config_path.display(),
                e
            ))
        })?;

        toml::from_str(&content).map_err(|e| {
            EngineError::Config(format!(
                "failed to parse config file at {}: {}",
                config_path.display(),
                e
            ))
        })
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub file_loading: FileLoadingConfig,
    pub display: DisplayConfig,
    pub pivot: PivotConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoadingConfig {
    /// Non-empty lines sampled for delimiter detection
    pub sniff_sample_lines: usize,
    /// Delimiters tried during detection, in priority order (single characters)
    pub candidate_delimiters: Vec<String>,
    /// Used when no candidate is consistent across the sample
    pub fallback_delimiter: String,
    /// Rows used for CSV type inference; None scans every row
    pub infer_schema_length: Option<usize>,
    /// File extensions picked up in folder mode
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub preview_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotConfig {
    pub default_aggregation: Aggregation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            file_loading: FileLoadingConfig::default(),
            display: DisplayConfig::default(),
            pivot: PivotConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for FileLoadingConfig {
    fn default() -> Self {
        Self {
            sniff_sample_lines: DEFAULT_SAMPLE_LINES,
            candidate_delimiters: vec![
                ",".to_string(),
                ";".to_string(),
                "\t".to_string(),
                "|".to_string(),
            ],
            fallback_delimiter: ",".to_string(),
            infer_schema_length: None,
            extensions: vec!["csv".to_string(), "xlsx".to_string()],
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { preview_rows: 20 }
    }
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            default_aggregation: Aggregation::Sum,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        let mut config = AppConfig::default();

        if let Ok(manager) = ConfigManager::new(app_name) {
            config.merge(manager.read_config()?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load defaults merged with the config file found in `manager`'s directory
    pub fn load_from(manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        config.merge(manager.read_config()?);
        config.validate()?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.file_loading.merge(other.file_loading);
        self.display.merge(other.display);
        self.pivot.merge(other.pivot);
        self.logging.merge(other.logging);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(EngineError::Config(format!(
                "unsupported config version: {}. Expected 0.1.x",
                self.version
            )));
        }

        if self.display.preview_rows == 0 {
            return Err(EngineError::Config(
                "preview_rows must be greater than 0".into(),
            ));
        }

        if self.file_loading.sniff_sample_lines == 0 {
            return Err(EngineError::Config(
                "sniff_sample_lines must be greater than 0".into(),
            ));
        }

        if self.file_loading.candidate_delimiters.is_empty() {
            return Err(EngineError::Config(
                "candidate_delimiters must not be empty".into(),
            ));
        }
        for d in &self.file_loading.candidate_delimiters {
            single_byte(d, "candidate_delimiters")?;
        }
        single_byte(&self.file_loading.fallback_delimiter, "fallback_delimiter")?;

        Ok(())
    }

    /// Delimiter sniffer built from `[file_loading]`. Call after [`validate`](Self::validate).
    pub fn sniffer(&self) -> Sniffer {
        let fl = &self.file_loading;
        let candidates = fl
            .candidate_delimiters
            .iter()
            .filter_map(|d| d.as_bytes().first().copied())
            .collect();
        let fallback = fl.fallback_delimiter.as_bytes().first().copied().unwrap_or(b',');
        Sniffer::new(candidates, fl.sniff_sample_lines, fallback)
    }
}

fn single_byte(value: &str, field: &str) -> Result<u8> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(EngineError::Config(format!(
            "{} entries must be a single ASCII character, got {:?}",
            field, value
        ))),
    }
}

// Merge implementations for each config section
impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        let default = FileLoadingConfig::default();
        if other.sniff_sample_lines != default.sniff_sample_lines {
            self.sniff_sample_lines = other.sniff_sample_lines;
        }
        if other.candidate_delimiters != default.candidate_delimiters {
            self.candidate_delimiters = other.candidate_delimiters;
        }
        if other.fallback_delimiter != default.fallback_delimiter {
            self.fallback_delimiter = other.fallback_delimiter;
        }
        if other.infer_schema_length.is_some() {
            self.infer_schema_length = other.infer_schema_length;
        }
        if other.extensions != default.extensions {
            self.extensions = other.extensions;
        }
    }
}

impl DisplayConfig {
    pub fn merge(&mut self, other: Self) {
        if other.preview_rows != DisplayConfig::default().preview_rows {
            self.preview_rows = other.preview_rows;
        }
    }
}

impl PivotConfig {
    pub fn merge(&mut self, other: Self) {
        if other.default_aggregation != PivotConfig::default().default_aggregation {
            self.default_aggregation = other.default_aggregation;
        }
    }
}

impl LoggingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.level != LoggingConfig::default().level {
            self.level = other.level;
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# tabfuse configuration
# Every setting is optional; omitted values use the defaults shown here.

version = "0.1"

[file_loading]
# Non-empty lines sampled when detecting the delimiter of a CSV file
sniff_sample_lines = 20
# Delimiters tried during detection, in priority order
candidate_delimiters = [",", ";", "\t", "|"]
# Delimiter used when detection finds no consistent candidate (single-column files)
fallback_delimiter = ","
# Rows used to infer column types; leave unset to scan every row
# infer_schema_length = 10000
# Extensions read when a folder is given with --dir
extensions = ["csv", "xlsx"]

[display]
# Rows shown in previews
preview_rows = 20

[pivot]
# Aggregation used when --agg is not given: sum, mean, count, max or min
default_aggregation = "sum"

[logging]
# Log filter used when RUST_LOG is not set (error, warn, info, debug, trace)
level = "warn"
"#;
