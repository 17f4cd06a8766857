//! Configuration loading and validation.
//!
//! All runtime configuration comes from the environment and CLI flags;
//! there is no config file. Absent an API key the service degrades to
//! simulation mode rather than refusing to start.

use crate::error::{OttoError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the language-model API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Environment variable holding an optional external task-management URL.
pub const TASK_ENDPOINT_ENV: &str = "OTTO_TASK_ENDPOINT";

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8009;

/// Runtime configuration for the service and the automation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// Language-model API key; `None` selects simulation mode.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL of the completion endpoint.
    pub api_base_url: String,
    /// Model identifier sent with completion requests.
    pub model: String,
    /// Optional external task-management endpoint (recorded, best-effort).
    pub task_endpoint: Option<String>,
    /// Project directory commands run in.
    pub project_dir: PathBuf,
    /// Directory log files are written to.
    pub log_dir: PathBuf,
    /// Directory containing a pre-built frontend bundle, served if present.
    pub static_dir: PathBuf,
    /// Sleep between automation cycles.
    #[serde(with = "duration_secs")]
    pub cycle_interval: Duration,
    /// Sleep after an unexpected error escaping a cycle.
    #[serde(with = "duration_secs")]
    pub error_backoff: Duration,
    /// Maximum test/fix attempts per cycle.
    pub max_fix_attempts: u32,
    /// Per-command subprocess timeout.
    #[serde(with = "duration_secs")]
    pub command_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            api_key: None,
            api_base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            task_endpoint: None,
            project_dir: PathBuf::from("."),
            log_dir: PathBuf::from("logs"),
            static_dir: PathBuf::from("build"),
            cycle_interval: Duration::from_secs(10),
            error_backoff: Duration::from_secs(30),
            max_fix_attempts: 5,
            command_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Build a configuration from the environment for the given project
    /// directory.
    #[must_use]
    pub fn from_env(project_dir: PathBuf) -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            task_endpoint: std::env::var(TASK_ENDPOINT_ENV)
                .ok()
                .filter(|u| !u.is_empty()),
            log_dir: project_dir.join("logs"),
            static_dir: project_dir.join("build"),
            project_dir,
            ..Self::default()
        }
    }

    /// Override the bind port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Force simulation mode by clearing the API key.
    #[must_use]
    pub fn with_simulation(mut self) -> Self {
        self.api_key = None;
        self
    }

    /// Whether external LLM calls are replaced with canned results.
    #[must_use]
    pub fn simulation_mode(&self) -> bool {
        self.api_key.is_none()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is out of range or malformed.
    pub fn validate(&self) -> Result<()> {
        if self.max_fix_attempts == 0 {
            return Err(OttoError::InvalidConfig {
                field: "max_fix_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.command_timeout.is_zero() {
            return Err(OttoError::InvalidConfig {
                field: "command_timeout".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        if !self.api_base_url.starts_with("http") {
            return Err(OttoError::InvalidConfig {
                field: "api_base_url".to_string(),
                reason: format!("not a URL: {}", self.api_base_url),
            });
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.max_fix_attempts, 5);
        assert_eq!(config.cycle_interval, Duration::from_secs(10));
        assert_eq!(config.error_backoff, Duration::from_secs(30));
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert!(config.simulation_mode());
    }

    #[test]
    fn test_with_port() {
        let config = Config::default().with_port(9000);
        assert_eq!(config.bind_addr.port(), 9000);
    }

    #[test]
    fn test_with_simulation_clears_key() {
        let mut config = Config::default();
        config.api_key = Some("sk-test".to_string());
        assert!(!config.simulation_mode());
        let config = config.with_simulation();
        assert!(config.simulation_mode());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.max_fix_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_fix_attempts"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.api_base_url = "not-a-url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_serialize_skips_api_key() {
        let mut config = Config::default();
        config.api_key = Some("sk-secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
