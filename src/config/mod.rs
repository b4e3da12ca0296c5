//! Configuration management
//!
//! TOML configuration with validation and environment overrides, loaded once
//! at startup. Defaults are usable out of the box: local FastEmbed model and
//! a local Ollama server.

use crate::error::{HindsightError, Result, ValidationError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta", default)]
    pub meta: MetaConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub retrieval: RetrievalConfig,
    pub indexing: IndexingConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            schema_version: "1.0.0".to_string(),
            created_at: current_timestamp(),
        }
    }
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend name resolved through the embedder registry
    pub backend: String,
    pub model: String,
    pub batch_size: usize,
}

/// LLM (answer service) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Base number of results; question type may widen it
    pub top_k: usize,
}

/// Vector indexing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    pub vector_dim: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HindsightError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| HindsightError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load from `path` if given, from the default location if it exists,
    /// otherwise fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Self::default_path()?;
                if default.exists() {
                    Self::load(&default)
                } else {
                    let mut config = Self::default();
                    config.apply_env_overrides();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| HindsightError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| HindsightError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: HINDSIGHT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("HINDSIGHT_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "LLM__MODEL" => {
                self.llm.model = value.to_string();
            }
            "LLM__BASE_URL" => {
                self.llm.base_url = value.to_string();
            }
            "EMBEDDING__BACKEND" => {
                self.embedding.backend = value.to_string();
            }
            "EMBEDDING__MODEL" => {
                self.embedding.model = value.to_string();
            }
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "RETRIEVAL__TOP_K" => {
                self.retrieval.top_k =
                    value.parse().map_err(|_| HindsightError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as integer", value),
                    })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Validate the configuration, collecting all failures.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.embedding.backend.is_empty() {
            errors.push(ValidationError::new(
                "embedding.backend",
                "backend name must not be empty",
            ));
        }
        if self.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "batch size must be at least 1",
            ));
        }
        if self.retrieval.top_k == 0 {
            errors.push(ValidationError::new(
                "retrieval.top_k",
                "top_k must be at least 1",
            ));
        }
        if self.indexing.vector_dim == 0 {
            errors.push(ValidationError::new(
                "indexing.vector_dim",
                "vector dimension must be positive",
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push(ValidationError::new(
                "llm.temperature",
                "temperature must be in [0.0, 2.0]",
            ));
        }
        if self.llm.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "llm.timeout_secs",
                "timeout must be at least 1 second",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(HindsightError::ConfigValidation { errors })
        }
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            HindsightError::Config("Cannot determine config directory".to_string())
        })?;
        Ok(config_dir.join("hindsight").join("config.toml"))
    }

    /// Get the default data directory
    pub fn default_data_dir() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| HindsightError::Config("Cannot determine home directory".to_string()))?;
        Ok(home_dir.join(".hindsight"))
    }

    /// Location of the vector index snapshot.
    pub fn snapshot_path(&self) -> PathBuf {
        self.storage.data_dir.join("index").join("history.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir =
            Self::default_data_dir().unwrap_or_else(|_| PathBuf::from(".hindsight"));

        Self {
            meta: MetaConfig::default(),
            storage: StorageConfig { data_dir },
            embedding: EmbeddingConfig {
                backend: "fastembed".to_string(),
                model: "all-MiniLM-L6-v2".to_string(),
                batch_size: 32,
            },
            llm: LlmConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.2:latest".to_string(),
                temperature: 0.2,
                timeout_secs: 120,
            },
            retrieval: RetrievalConfig { top_k: 5 },
            indexing: IndexingConfig {
                vector_dim: 384,
                hnsw_ef_construction: 200,
                hnsw_m: 16,
            },
        }
    }
}
