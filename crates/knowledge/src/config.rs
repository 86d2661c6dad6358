//! Knowledge base configuration management.

use crate::embeddings::EmbeddingConfig;
use crate::extract::Format;
use crate::similarity::Metric;
use docent_core::config::STATE_DIR;
use docent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name used when no knowledge base is given.
pub const DEFAULT_BASE: &str = "default";

/// Configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    #[serde(default)]
    pub name: String,

    /// Chunk window in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Largest accepted upload
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Extensions the ingestor accepts
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Default number of chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Budget for assembled context
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default)]
    pub metric: Metric,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Settings for the answer generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    /// Model override; the workspace model is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_max_file_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    Format::ALL
        .iter()
        .flat_map(|f| f.extensions().iter().map(|e| e.to_string()))
        .collect()
}

fn default_top_k() -> usize {
    5
}

fn default_max_context_chars() -> usize {
    6000
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    1024
}

fn default_generation_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_bytes: default_max_file_bytes(),
            allowed_extensions: default_allowed_extensions(),
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
            metric: Metric::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_generation_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl KnowledgeBaseConfig {
    /// Default configuration for a named base.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size <= self.chunk_overlap {
            return Err(AppError::Config(format!(
                "chunk_size ({}) must exceed chunk_overlap ({})",
                self.chunk_size, self.chunk_overlap
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::Config("top_k must be at least 1".to_string()));
        }
        if self.max_context_chars == 0 {
            return Err(AppError::Config(
                "max_context_chars must be positive".to_string(),
            ));
        }
        if self.max_file_bytes == 0 {
            return Err(AppError::Config(
                "max_file_bytes must be positive".to_string(),
            ));
        }
        if let Some(unknown) = self
            .allowed_extensions
            .iter()
            .find(|ext| Format::from_extension(ext).is_none())
        {
            return Err(AppError::Config(format!(
                "allowed_extensions contains unsupported extension '{}'",
                unknown
            )));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(AppError::Config(format!(
                "generation.temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        if self.generation.timeout_secs == 0 {
            return Err(AppError::Config(
                "generation.timeout_secs must be positive".to_string(),
            ));
        }
        self.embedding.validate()
    }
}

/// Load knowledge base configuration.
///
/// Loads from `.docent/knowledge/<base>/config.yaml` if it exists,
/// otherwise returns the defaults for `base_name`. The result is validated
/// either way.
pub fn load_config(workspace: &Path, base_name: &str) -> AppResult<KnowledgeBaseConfig> {
    validate_base_name(base_name)?;
    let config_path = get_config_path(workspace, base_name);

    let config = if config_path.exists() {
        let content = fs::read_to_string(&config_path).map_err(|e| {
            AppError::Config(format!("Failed to read config at {:?}: {}", config_path, e))
        })?;

        let mut config: KnowledgeBaseConfig = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config at {:?}: {}", config_path, e))
        })?;

        // Ensure name matches
        config.name = base_name.to_string();

        tracing::debug!(base = base_name, "Loaded knowledge base config");
        config
    } else {
        tracing::debug!(base = base_name, "Using default knowledge base config");
        KnowledgeBaseConfig::named(base_name)
    };

    config.validate()?;
    Ok(config)
}

/// Save knowledge base configuration.
pub fn save_config(workspace: &Path, config: &KnowledgeBaseConfig) -> AppResult<()> {
    validate_base_name(&config.name)?;
    let config_path = get_config_path(workspace, &config.name);

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Config(format!("Failed to create config directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Serialization(format!("Failed to serialize config: {}", e)))?;

    fs::write(&config_path, yaml).map_err(|e| {
        AppError::Config(format!("Failed to write config to {:?}: {}", config_path, e))
    })?;

    tracing::debug!(base = %config.name, "Saved knowledge base config");
    Ok(())
}

/// Base names become directory names.
fn validate_base_name(base_name: &str) -> AppResult<()> {
    let valid = !base_name.is_empty()
        && base_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !base_name.starts_with('.');
    if !valid {
        return Err(AppError::Config(format!(
            "Invalid knowledge base name '{}': use letters, digits, '-', '_' or '.'",
            base_name
        )));
    }
    Ok(())
}

/// Get the base directory for a knowledge base.
pub fn get_base_dir(workspace: &Path, base_name: &str) -> PathBuf {
    workspace.join(STATE_DIR).join("knowledge").join(base_name)
}

/// Get the path to a base's config file.
pub fn get_config_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("config.yaml")
}

/// Get the index snapshot path for a base.
pub fn get_index_path(workspace: &Path, base_name: &str) -> PathBuf {
    get_base_dir(workspace, base_name).join("index.json")
}

/// Names of every base under the workspace with a directory on disk.
pub fn list_bases(workspace: &Path) -> AppResult<Vec<String>> {
    let root = workspace.join(STATE_DIR).join("knowledge");
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = fs::read_dir(&root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}
