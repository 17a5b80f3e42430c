use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub trace: TraceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_enrichment_enabled")]
    pub enabled: bool,

    /// Maximum literals placed in one `IN(...)` list.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_colored")]
    pub colored: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TraceConfig {
    #[serde(default)]
    pub enabled: bool,
}

// Default values
fn default_enrichment_enabled() -> bool {
    true
}
fn default_batch_size() -> usize {
    500
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_colored() -> bool {
    true
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: default_enrichment_enabled(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            colored: default_colored(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment override support.
    ///
    /// Layers are merged key by key, so an overlay only replaces the keys
    /// it actually sets.
    pub fn load(config_path: Option<&str>, environment: Option<&str>) -> Result<Self, ConfigError> {
        Self::load_in(Path::new("."), config_path, environment)
    }

    /// [`Config::load`] with the standard locations resolved under `root`.
    pub fn load_in(
        root: &Path,
        config_path: Option<&str>,
        environment: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut layered = toml::Table::new();

        // Base configuration file
        let base = match config_path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::standard_config_paths()
                .into_iter()
                .map(|path| root.join(path))
                .find(|path| path.exists()),
        };
        if let Some(path) = base {
            debug!("Loading config from: {}", path.display());
            merge_tables(&mut layered, read_layer(&path)?);
        }

        // Environment-specific overrides
        if let Some(env) = environment {
            let env_path = root.join(format!("config/{}.toml", env));
            if env_path.exists() {
                debug!("Applying environment config for: {}", env);
                merge_tables(&mut layered, read_layer(&env_path)?);
            }
        }

        // Local overrides (always last)
        let local_path = root.join("config/local.toml");
        if local_path.exists() {
            debug!("Applying local config overrides");
            merge_tables(&mut layered, read_layer(&local_path)?);
        }

        toml::Value::Table(layered)
            .try_into()
            .map_err(|e| ConfigError::Parse("merged configuration".to_string(), e.to_string()))
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_string(), e.to_string()))
    }

    /// Get standard configuration file paths in order of precedence
    fn standard_config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
        ]
    }

    /// Generate a default configuration file
    pub fn generate_default_config(path: &str) -> Result<(), ConfigError> {
        let config = Config::default();
        let toml_content =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, toml_content)
            .map_err(|e| ConfigError::FileWrite(path.to_string(), e.to_string()))?;

        Ok(())
    }
}

/// Parse one layer as a table, rejecting it when it would not load on its
/// own.
fn read_layer(path: &Path) -> Result<toml::Table, ConfigError> {
    let name = path.display().to_string();
    let content =
        fs::read_to_string(path).map_err(|e| ConfigError::FileRead(name.clone(), e.to_string()))?;
    let table: toml::Table = content
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse(name.clone(), e.to_string()))?;
    toml::Value::Table(table.clone())
        .try_into::<Config>()
        .map_err(|e| ConfigError::Parse(name, e.to_string()))?;
    Ok(table)
}

/// Overlay `overlay` onto `base`, descending into nested tables.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(nested) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, nested);
                    continue;
                }
                base.insert(key, toml::Value::Table(nested));
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("Failed to parse config file '{0}': {1}")]
    Parse(String, String),

    #[error("Failed to write config file '{0}': {1}")]
    FileWrite(String, String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}
