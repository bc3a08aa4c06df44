//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `RAGVISION_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CLASS_LABELS, DEFAULT_EMBEDDING_DIM, DEFAULT_EMBEDDING_TIMEOUT_MS,
    DEFAULT_REASONING_TIMEOUT_MS, DEFAULT_SUPPORT_PATCH_SIZE, DEFAULT_SUPPORT_RESOLUTION,
};
use crate::embedding::ClipConfig;
use crate::index::{ClassLabel, LabelSet};
use crate::pipeline::ServiceSettings;
use crate::reasoning::OpenAiConfig;

/// Server configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `RAGVISION_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port. Default: `8080`.
    pub port: u16,

    /// IP address to bind to. Default: `127.0.0.1`.
    pub bind_addr: IpAddr,

    /// Root of the support set: one sub-directory per class. Default: `./data/support`.
    pub support_root: PathBuf,

    /// Class labels in enumeration order. Default: `dirty,clean`.
    pub classes: Vec<String>,

    /// Label that a `true` flag value maps to. Default: the first class.
    pub positive_class: Option<String>,

    /// CLIP `model.safetensors`. Unset runs the deterministic stub embedder.
    pub clip_model_path: Option<PathBuf>,

    pub embedding_dim: usize,
    pub support_resolution: u32,
    pub support_patch_size: u32,

    /// OpenAI-compatible endpoint base. Default: `http://localhost:8000/v1`.
    pub vlm_url: String,
    pub vlm_model: String,
    pub vlm_api_key: Option<String>,

    pub embedding_timeout_ms: u64,
    pub reasoning_timeout_ms: u64,

    /// Answer with the in-process mock invoker instead of calling the VLM.
    pub mock_provider: bool,
}

/// Default VLM endpoint used when `RAGVISION_VLM_URL` is not set.
pub const DEFAULT_VLM_URL: &str = "http://localhost:8000/v1";

/// Default model name sent to the VLM endpoint.
pub const DEFAULT_VLM_MODEL: &str = "Qwen/Qwen2-VL-2B-Instruct";

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            support_root: PathBuf::from("./data/support"),
            classes: DEFAULT_CLASS_LABELS.iter().map(|s| s.to_string()).collect(),
            positive_class: None,
            clip_model_path: None,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            support_resolution: DEFAULT_SUPPORT_RESOLUTION,
            support_patch_size: DEFAULT_SUPPORT_PATCH_SIZE,
            vlm_url: DEFAULT_VLM_URL.to_string(),
            vlm_model: DEFAULT_VLM_MODEL.to_string(),
            vlm_api_key: None,
            embedding_timeout_ms: DEFAULT_EMBEDDING_TIMEOUT_MS,
            reasoning_timeout_ms: DEFAULT_REASONING_TIMEOUT_MS,
            mock_provider: false,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "RAGVISION_PORT";
    const ENV_BIND_ADDR: &'static str = "RAGVISION_BIND_ADDR";
    const ENV_SUPPORT_ROOT: &'static str = "RAGVISION_SUPPORT_ROOT";
    const ENV_CLASSES: &'static str = "RAGVISION_CLASSES";
    const ENV_POSITIVE_CLASS: &'static str = "RAGVISION_POSITIVE_CLASS";
    const ENV_CLIP_MODEL_PATH: &'static str = "RAGVISION_CLIP_MODEL_PATH";
    const ENV_EMBEDDING_DIM: &'static str = "RAGVISION_EMBEDDING_DIM";
    const ENV_SUPPORT_RES: &'static str = "RAGVISION_SUPPORT_RES";
    const ENV_SUPPORT_PATCH_SIZE: &'static str = "RAGVISION_SUPPORT_PATCH_SIZE";
    const ENV_VLM_URL: &'static str = "RAGVISION_VLM_URL";
    const ENV_VLM_MODEL: &'static str = "RAGVISION_VLM_MODEL";
    const ENV_VLM_API_KEY: &'static str = "RAGVISION_VLM_API_KEY";
    const ENV_EMBED_TIMEOUT_MS: &'static str = "RAGVISION_EMBED_TIMEOUT_MS";
    const ENV_REASONING_TIMEOUT_MS: &'static str = "RAGVISION_REASONING_TIMEOUT_MS";
    const ENV_MOCK_PROVIDER: &'static str = "RAGVISION_MOCK_PROVIDER";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            port: Self::parse_port_from_env(defaults.port)?,
            bind_addr: Self::parse_bind_addr_from_env(defaults.bind_addr)?,
            support_root: Self::parse_path_from_env(Self::ENV_SUPPORT_ROOT, defaults.support_root),
            classes: Self::parse_list_from_env(Self::ENV_CLASSES, defaults.classes),
            positive_class: Self::parse_optional_string_from_env(Self::ENV_POSITIVE_CLASS),
            clip_model_path: Self::parse_optional_path_from_env(Self::ENV_CLIP_MODEL_PATH),
            embedding_dim: Self::parse_number_from_env(
                Self::ENV_EMBEDDING_DIM,
                defaults.embedding_dim,
            )?,
            support_resolution: Self::parse_number_from_env(
                Self::ENV_SUPPORT_RES,
                defaults.support_resolution,
            )?,
            support_patch_size: Self::parse_number_from_env(
                Self::ENV_SUPPORT_PATCH_SIZE,
                defaults.support_patch_size,
            )?,
            vlm_url: Self::parse_string_from_env(Self::ENV_VLM_URL, defaults.vlm_url),
            vlm_model: Self::parse_string_from_env(Self::ENV_VLM_MODEL, defaults.vlm_model),
            vlm_api_key: Self::parse_optional_string_from_env(Self::ENV_VLM_API_KEY),
            embedding_timeout_ms: Self::parse_number_from_env(
                Self::ENV_EMBED_TIMEOUT_MS,
                defaults.embedding_timeout_ms,
            )?,
            reasoning_timeout_ms: Self::parse_number_from_env(
                Self::ENV_REASONING_TIMEOUT_MS,
                defaults.reasoning_timeout_ms,
            )?,
            mock_provider: env::var_os(Self::ENV_MOCK_PROVIDER).is_some_and(|v| !v.is_empty()),
        })
    }

    /// Validates paths and basic invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.support_root.exists() && !self.support_root.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.support_root.clone(),
            });
        }

        if let Some(ref path) = self.clip_model_path {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_file() {
                return Err(ConfigError::NotAFile { path: path.clone() });
            }
        }

        let labels = self.label_set()?;
        self.positive_label(&labels)?;

        if self.embedding_dim == 0 {
            return Err(Self::invalid(
                Self::ENV_EMBEDDING_DIM,
                self.embedding_dim,
                "must be positive",
            ));
        }
        if self.support_resolution == 0 {
            return Err(Self::invalid(
                Self::ENV_SUPPORT_RES,
                self.support_resolution,
                "must be positive",
            ));
        }
        if self.support_patch_size == 0 || self.support_patch_size > self.support_resolution {
            return Err(Self::invalid(
                Self::ENV_SUPPORT_PATCH_SIZE,
                self.support_patch_size,
                "must be between 1 and the support resolution",
            ));
        }
        if self.embedding_timeout_ms == 0 {
            return Err(Self::invalid(
                Self::ENV_EMBED_TIMEOUT_MS,
                self.embedding_timeout_ms,
                "must be positive",
            ));
        }
        if self.reasoning_timeout_ms == 0 {
            return Err(Self::invalid(
                Self::ENV_REASONING_TIMEOUT_MS,
                self.reasoning_timeout_ms,
                "must be positive",
            ));
        }

        Ok(())
    }

    /// Returns `"{bind_addr}:{port}"` (useful for logging/binding).
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn label_set(&self) -> Result<LabelSet, ConfigError> {
        LabelSet::new(&self.classes).map_err(|e| ConfigError::InvalidClasses {
            reason: e.to_string(),
        })
    }

    /// The configured positive label, or the first class when unset.
    pub fn positive_label(&self, labels: &LabelSet) -> Result<ClassLabel, ConfigError> {
        match &self.positive_class {
            Some(name) => labels
                .get(name)
                .cloned()
                .map_err(|_| ConfigError::InvalidClasses {
                    reason: format!("positive class '{}' is not a configured class", name),
                }),
            None => Ok(labels.first().clone()),
        }
    }

    /// CLIP settings; stub mode when no model path is configured.
    pub fn clip_config(&self) -> ClipConfig {
        match &self.clip_model_path {
            Some(path) => ClipConfig::new(path.clone()),
            None => ClipConfig::stub(),
        }
        .with_embedding_dim(self.embedding_dim)
    }

    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            base_url: self.vlm_url.clone(),
            model: self.vlm_model.clone(),
            api_key: self.vlm_api_key.clone(),
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            support_resolution: self.support_resolution,
            support_patch_size: self.support_patch_size,
            embedding_timeout: Duration::from_millis(self.embedding_timeout_ms),
            reasoning_timeout: Duration::from_millis(self.reasoning_timeout_ms),
        }
    }

    fn invalid(name: &'static str, value: impl ToString, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            name,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        env::var(var_name).map(PathBuf::from).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        Self::parse_optional_string_from_env(var_name).map(PathBuf::from)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    /// Comma-separated list; blank entries are kept so validation can reject them.
    fn parse_list_from_env(var_name: &str, default: Vec<String>) -> Vec<String> {
        match env::var(var_name) {
            Ok(value) => value.split(',').map(|s| s.trim().to_string()).collect(),
            Err(_) => default,
        }
    }

    fn parse_number_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(var_name) {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|e: T::Err| Self::invalid(var_name, &value, &e.to_string())),
            Err(_) => Ok(default),
        }
    }
}
