//! upwatch.toml configuration parser.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::duration::DurationValue;
use crate::validate::{DEFAULT_FAILURE_THRESHOLD, NewService};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpwatchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Services seeded at startup (skipped when one with the same name exists).
    #[serde(default, rename = "service", skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<NewService>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required for add/delete/reset. Mutations are refused
    /// when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Size of the probe worker pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_failure_threshold")]
    pub default_failure_threshold: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            admin_token: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            default_failure_threshold: default_failure_threshold(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/upwatch")
}

fn default_workers() -> usize {
    8
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

impl UpwatchConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: UpwatchConfig = toml::from_str(content)?;
        if config.scheduler.workers == 0 {
            anyhow::bail!("scheduler.workers must be at least 1");
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A starter config with one example HTTP service.
    pub fn scaffold() -> Self {
        UpwatchConfig {
            server: ServerConfig {
                port: default_port(),
                admin_token: Some("change-me".to_string()),
            },
            storage: StorageConfig::default(),
            scheduler: SchedulerConfig::default(),
            services: vec![NewService {
                name: Some("example".to_string()),
                ping_service_name: Some("http_head".to_string()),
                url: Some("https://example.com/".to_string()),
                timeout: Some(DurationValue::Text("5s".to_string())),
                interval: Some(DurationValue::Text("60s".to_string())),
                failure_interval: Some(DurationValue::Text("30s".to_string())),
                warning_threshold: Some(DurationValue::Text("2s".to_string())),
                ..NewService::default()
            }],
        }
    }
}
