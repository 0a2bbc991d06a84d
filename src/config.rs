// Location: src/config.rs

use std::net::SocketAddr;
use std::path::PathBuf;
use serde::{Serialize, Deserialize};

use crate::error::{Result, ServiceError};

pub const MODEL_PATH_VAR: &str = "VERA_MODEL_PATH";
pub const ALLOWED_ORIGINS_VAR: &str = "ALLOWED_ORIGINS";
pub const PORT_VAR: &str = "PORT";
pub const ENV_VAR: &str = "ENV";
pub const SEED_VAR: &str = "VERA_SEED";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub model: ModelConfig,
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub processing: ProcessingConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Directory holding config.json, tokenizer.json and safetensors weights
    pub model_path: PathBuf,

    /// Prompts longer than this are truncated before generation
    pub max_sequence_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// CORS origins; a single "*" means any origin
    pub allowed_origins: Vec<String>,

    /// Set when ENV=development
    pub development: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Used when a request omits max_tokens
    pub default_max_tokens: usize,

    /// Used when a request omits temperature
    pub default_temperature: f64,

    /// Nucleus sampling threshold
    pub top_p: f64,

    /// Applied to every token already in the sequence, prompt included
    pub repetition_penalty: f32,

    /// Fixed first sampling seed for reproducible runs; random when unset
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Jobs allowed to wait for the generation worker
    pub queue_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                model_path: PathBuf::from("./vera_trained_model"),
                max_sequence_length: 2048,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                allowed_origins: vec!["*".to_string()],
                development: false,
            },
            generation: GenerationConfig {
                default_max_tokens: 512,
                default_temperature: 0.7,
                top_p: 0.9,
                repetition_penalty: 1.1,
                seed: None,
            },
            processing: ProcessingConfig { queue_size: 64 },
            monitoring: MonitoringConfig {
                log_level: LogLevel::Info,
            },
        }
    }
}

impl ServiceConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(MODEL_PATH_VAR) {
            config.model.model_path = PathBuf::from(path);
        }

        if let Some(origins) = lookup(ALLOWED_ORIGINS_VAR) {
            config.server.allowed_origins = parse_origins(&origins);
        }

        if let Some(port) = lookup(PORT_VAR) {
            config.server.port = port.trim().parse().map_err(|e: std::num::ParseIntError| {
                ServiceError::ConfigurationError {
                    message: e.to_string(),
                    parameter: PORT_VAR.to_string(),
                }
            })?;
        }

        if let Some(seed) = lookup(SEED_VAR) {
            let seed = seed.trim().parse().map_err(|e: std::num::ParseIntError| {
                ServiceError::ConfigurationError {
                    message: e.to_string(),
                    parameter: SEED_VAR.to_string(),
                }
            })?;
            config.generation.seed = Some(seed);
        }

        if lookup(ENV_VAR).as_deref() == Some("development") {
            config.server.development = true;
            config.monitoring.log_level = LogLevel::Debug;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.model_path.as_os_str().is_empty() {
            return Err(ServiceError::ConfigurationError {
                message: "Model path cannot be empty".to_string(),
                parameter: MODEL_PATH_VAR.to_string(),
            });
        }

        if self.model.max_sequence_length == 0 {
            return Err(ServiceError::ConfigurationError {
                message: "Maximum sequence length must be positive".to_string(),
                parameter: "max_sequence_length".to_string(),
            });
        }

        if self.server.allowed_origins.is_empty() {
            return Err(ServiceError::ConfigurationError {
                message: "At least one origin must be allowed".to_string(),
                parameter: ALLOWED_ORIGINS_VAR.to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err(ServiceError::ConfigurationError {
                message: "Top-p must be between 0 and 1".to_string(),
                parameter: "top_p".to_string(),
            });
        }

        if self.processing.queue_size == 0 {
            return Err(ServiceError::ConfigurationError {
                message: "Queue size must be positive".to_string(),
                parameter: "queue_size".to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ServiceError::ConfigurationError {
                message: e.to_string(),
                parameter: "host".to_string(),
            })
    }
}

impl ServerConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Settings for the static bundle responder. Fixed; there is no override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    pub port: u16,
    pub root: PathBuf,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            root: ["apps", "web", ".next", "standalone"].iter().collect(),
        }
    }
}

impl StaticConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.model.model_path, PathBuf::from("./vera_trained_model"));
        assert_eq!(config.model.max_sequence_length, 2048);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.allowed_origins, vec!["*"]);
        assert!(!config.server.development);
        assert_eq!(config.generation.default_max_tokens, 512);
        assert_eq!(config.generation.default_temperature, 0.7);
        assert_eq!(config.generation.top_p, 0.9);
        assert_eq!(config.generation.repetition_penalty, 1.1);
        assert_eq!(config.generation.seed, None);
    }

    #[test]
    fn test_seed_override() {
        let config = ServiceConfig::from_lookup(lookup_from(&[(SEED_VAR, "42")])).unwrap();
        assert_eq!(config.generation.seed, Some(42));

        let err = ServiceConfig::from_lookup(lookup_from(&[(SEED_VAR, "-1")])).unwrap_err();
        assert!(matches!(err, ServiceError::ConfigurationError { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            (MODEL_PATH_VAR, "/models/vera"),
            (ALLOWED_ORIGINS_VAR, "https://vera.app, http://localhost:3000,"),
            (PORT_VAR, "9100"),
            (ENV_VAR, "development"),
        ]))
        .unwrap();

        assert_eq!(config.model.model_path, PathBuf::from("/models/vera"));
        assert_eq!(
            config.server.allowed_origins,
            vec!["https://vera.app", "http://localhost:3000"]
        );
        assert!(!config.server.allows_any_origin());
        assert_eq!(config.server.port, 9100);
        assert!(config.server.development);
        assert_eq!(config.monitoring.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_production_env_is_not_development() {
        let config = ServiceConfig::from_lookup(lookup_from(&[(ENV_VAR, "production")])).unwrap();
        assert!(!config.server.development);
        assert_eq!(config.monitoring.log_level, LogLevel::Info);
    }

    #[test]
    fn test_invalid_port() {
        let err = ServiceConfig::from_lookup(lookup_from(&[(PORT_VAR, "eighty")])).unwrap_err();
        match err {
            ServiceError::ConfigurationError { parameter, .. } => assert_eq!(parameter, PORT_VAR),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_origins_rejected() {
        let result = ServiceConfig::from_lookup(lookup_from(&[(ALLOWED_ORIGINS_VAR, " , ")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ServiceConfig::default();
        assert!(config.validate().is_ok());

        config.generation.top_p = 1.5;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.model.model_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_addr() {
        let config = ServiceConfig::default();
        assert_eq!(config.bind_addr().unwrap().port(), 8000);

        let static_config = StaticConfig::default();
        assert_eq!(static_config.bind_addr().port(), 3000);
        assert!(static_config.root.ends_with("standalone"));
    }
}
