//! tidal.toml configuration parser.
//!
//! Every field has a default matching the reference deployment, so an empty
//! file (or no file at all) yields a usable configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TidalConfig {
    pub server: ServerConfig,
    pub autoscale: AutoscaleConfig,
}

/// Prediction service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Directory holding the observation log.
    pub data_dir: PathBuf,
    /// Model artifact; the service runs without a model if this is unset or missing.
    pub model_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 5000)),
            data_dir: PathBuf::from("/var/lib/tidal"),
            model_path: Some(PathBuf::from("traffic_model.json")),
        }
    }
}

/// Control loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoscaleConfig {
    /// Deployment to scale.
    pub workload: String,
    pub namespace: String,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub poll_interval: String,
    pub cooldown: String,
    /// Requests one replica is assumed to absorb.
    pub capacity_per_replica: f64,
    /// Weight of the live prediction against the seasonal average.
    pub alpha: f64,
    /// Upper bound for every remote call made by the loop.
    pub request_timeout: String,
    /// Base URL of the prediction service.
    pub predictor_url: String,
    pub metrics_listen: SocketAddr,
}

impl Default for AutoscaleConfig {
    fn default() -> Self {
        Self {
            workload: "traffic-server".to_string(),
            namespace: "default".to_string(),
            min_replicas: 1,
            max_replicas: 10,
            poll_interval: "10s".to_string(),
            cooldown: "20s".to_string(),
            capacity_per_replica: 3.0,
            alpha: 0.7,
            request_timeout: "5s".to_string(),
            predictor_url: "http://traffic-server:5000".to_string(),
            metrics_listen: SocketAddr::from(([0, 0, 0, 0], 8000)),
        }
    }
}

impl AutoscaleConfig {
    pub fn poll_interval(&self) -> Duration {
        parse_duration(&self.poll_interval).unwrap_or(Duration::from_secs(10))
    }

    pub fn cooldown(&self) -> Duration {
        parse_duration(&self.cooldown).unwrap_or(Duration::from_secs(20))
    }

    pub fn request_timeout(&self) -> Duration {
        parse_duration(&self.request_timeout).unwrap_or(Duration::from_secs(5))
    }
}

impl TidalConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: TidalConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.autoscale;
        if a.max_replicas == 0 {
            return Err(ConfigError::Invalid("max_replicas must be at least 1".into()));
        }
        if a.min_replicas > a.max_replicas {
            return Err(ConfigError::Invalid(format!(
                "min_replicas ({}) exceeds max_replicas ({})",
                a.min_replicas, a.max_replicas
            )));
        }
        if !(a.capacity_per_replica.is_finite() && a.capacity_per_replica > 0.0) {
            return Err(ConfigError::Invalid(
                "capacity_per_replica must be a positive number".into(),
            ));
        }
        if !(0.0..=1.0).contains(&a.alpha) {
            return Err(ConfigError::Invalid("alpha must be within [0, 1]".into()));
        }
        for (name, value) in [
            ("poll_interval", &a.poll_interval),
            ("cooldown", &a.cooldown),
            ("request_timeout", &a.request_timeout),
        ] {
            if parse_duration(value).is_none() {
                return Err(ConfigError::Invalid(format!("{name}: bad duration {value:?}")));
            }
        }
        if a.workload.is_empty() || a.namespace.is_empty() {
            return Err(ConfigError::Invalid("workload and namespace are required".into()));
        }
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "1m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
