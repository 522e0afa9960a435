// Required external crates for configuration management and serialization
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Configuration for model resolution and loading
#[derive(Debug, Deserialize, Clone)]
pub struct ModelSettings {
    /// Directory where downloaded model files are cached
    pub directory: PathBuf,
    /// Model identifier loaded at startup
    pub default_model: String,
    /// Whether to fetch the quantized model file
    pub quantized: bool,
}

/// Defaults for generation and conversation windowing
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationSettings {
    /// Maximum number of tokens to generate per reply
    pub max_length: usize,
    /// Controls randomness in generation (0.0-1.0)
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub repetition_penalty: f32,
    /// How many stored messages to consider for context
    pub max_history_messages: usize,
    /// Token budget (estimated) for the formatted history
    pub max_context_tokens: usize,
    /// Context window handed to the inference session
    pub context_size: u32,
}

/// Configuration for the HTTP server
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// Host address to bind to
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Configuration for conversation persistence
#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// Directory where conversation files are written
    pub data_dir: PathBuf,
}

/// Configuration for application logging
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Optional log file path
    pub file: Option<PathBuf>,
}

/// Main settings struct that contains all configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub models: ModelSettings,
    pub generation: GenerationSettings,
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Creates a new Settings instance by loading config from multiple
    /// sources in the following order of precedence (highest to lowest):
    /// 1. Environment variables prefixed with LMCHAT_
    /// 2. Local config file (local.toml) if present
    /// 3. Default config file (default.toml)
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = std::env::current_dir()
            .map_err(|e| ConfigError::Message(format!("Failed to get current directory: {}", e)))?
            .join("config");

        if !config_dir.exists() {
            return Err(ConfigError::Message(format!(
                "Config directory not found at: {}",
                config_dir.display()
            )));
        }

        let default_config = config_dir.join("default.toml");
        if !default_config.exists() {
            return Err(ConfigError::Message(format!(
                "Default configuration file not found at: {}",
                default_config.display()
            )));
        }

        let local_config = config_dir.join("local.toml");

        let default_config_path = default_config.to_string_lossy();
        let local_config_path = local_config.to_string_lossy();

        let settings = Config::builder()
            .add_source(File::with_name(&default_config_path))
            .add_source(File::with_name(&local_config_path).required(false))
            .add_source(Environment::with_prefix("LMCHAT").separator("_"))
            .build()?
            .try_deserialize::<Settings>()?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.models.default_model.trim().is_empty() {
            return Err(ConfigError::Message(
                "default_model must not be empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.generation.temperature) {
            return Err(ConfigError::Message(format!(
                "Temperature must be between 0.0 and 1.0, got: {}",
                self.generation.temperature
            )));
        }

        if self.generation.max_length == 0 {
            return Err(ConfigError::Message(
                "max_length must be greater than 0".to_string(),
            ));
        }

        if self.generation.max_context_tokens == 0 || self.generation.context_size == 0 {
            return Err(ConfigError::Message(
                "context budgets must be greater than 0".to_string(),
            ));
        }

        if self.generation.max_history_messages == 0 {
            return Err(ConfigError::Message(
                "max_history_messages must be greater than 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Message(
                "Port must be between 1 and 65535".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(ConfigError::Message(format!(
                    "Invalid logging level: {}. Must be one of: error, warn, info, debug, trace",
                    other
                )))
            }
        }

        // Create log file directory if configured and doesn't exist
        if let Some(log_file) = &self.logging.file {
            if let Some(parent) = log_file.parent() {
                if !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        ConfigError::Message(format!(
                            "Failed to create log directory at {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
        }

        Ok(())
    }
}
