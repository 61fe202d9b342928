//! Configuration — YAML file with every field optional.
//!
//! ```yaml
//! target: target.py
//! interpreter: python3
//! debounce_ms: 1000
//! generator:
//!   provider: ollama
//!   model: llama3
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "mend.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MendConfig {
    /// The watched source file.
    pub target: PathBuf,
    /// Target language; used for prompt fences and stub discovery.
    pub language: String,
    /// Interpreter the tracer launches.
    pub interpreter: String,
    /// Minimum gap between accepted change notifications.
    pub debounce_ms: u64,
    /// Hold time after a cycle before the repair guard is released.
    pub settle_ms: u64,
    pub tracer: TracerConfig,
    pub generator: GeneratorConfig,
}

impl Default for MendConfig {
    fn default() -> Self {
        Self {
            target: PathBuf::from("target.py"),
            language: "python".into(),
            interpreter: "python3".into(),
            debounce_ms: 1000,
            settle_ms: 1000,
            tracer: TracerConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracerConfig {
    /// Longest rendered binding before it is cut (0 = unlimited).
    pub max_value_len: usize,
    /// Cap on recorded steps. Unset records everything.
    pub max_steps: Option<usize>,
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            max_value_len: 200,
            max_steps: None,
        }
    }
}

/// Which generation service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    pub provider: Provider,
    pub model: String,
    /// Base URL; `None` picks the provider's default.
    pub endpoint: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// How many trailing trace steps go into the prompt (0 = none).
    pub trace_tail: usize,
    /// HTTP timeout for the single generation call.
    pub request_timeout_secs: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Ollama,
            model: "llama3".into(),
            endpoint: None,
            temperature: 0.2,
            max_tokens: 4096,
            trace_tail: 20,
            request_timeout_secs: None,
        }
    }
}

impl GeneratorConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

impl MendConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml, path)
    }

    /// Load `path` if given, else [`DEFAULT_CONFIG_FILE`] if it exists,
    /// else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("target must not be empty".into()));
        }
        if self.interpreter.trim().is_empty() {
            return Err(ConfigError::Invalid("interpreter must not be empty".into()));
        }
        if self.generator.model.trim().is_empty() {
            return Err(ConfigError::Invalid("generator.model must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.generator.temperature) {
            return Err(ConfigError::Invalid(format!(
                "generator.temperature out of range: {}",
                self.generator.temperature
            )));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_original_behavior() {
        let config = MendConfig::default();
        assert_eq!(config.target, PathBuf::from("target.py"));
        assert_eq!(config.debounce(), Duration::from_secs(1));
        assert_eq!(config.generator.provider, Provider::Ollama);
        assert_eq!(config.generator.model, "llama3");
        assert!(config.tracer.max_steps.is_none());
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "target: app.py\ngenerator:\n  provider: anthropic\n  model: sonnet\n";
        let config = MendConfig::from_yaml(yaml, Path::new("mend.yaml")).unwrap();
        assert_eq!(config.target, PathBuf::from("app.py"));
        assert_eq!(config.generator.provider, Provider::Anthropic);
        assert_eq!(config.generator.model, "sonnet");
        assert_eq!(config.generator.trace_tail, 20);
        assert_eq!(config.interpreter, "python3");
    }

    #[test]
    fn unknown_field_rejected() {
        let err = MendConfig::from_yaml("targett: x.py\n", Path::new("m.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("m.yaml"));
    }

    #[test]
    fn empty_model_rejected() {
        let err =
            MendConfig::from_yaml("generator:\n  model: \"\"\n", Path::new("m.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = MendConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mend.yaml");
        std::fs::write(&path, "debounce_ms: 250\ntracer:\n  max_steps: 1000\n").unwrap();
        let config = MendConfig::load(&path).unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert_eq!(config.tracer.max_steps, Some(1000));
        assert_eq!(config.tracer.max_value_len, 200);
    }

    #[test]
    fn timeout_conversion() {
        let mut config = GeneratorConfig::default();
        assert!(config.request_timeout().is_none());
        config.request_timeout_secs = Some(30);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
    }
}
