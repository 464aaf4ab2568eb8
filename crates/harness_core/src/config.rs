//! Configuration for a harness run directory.

use crate::error::{HarnessError, Result};
use crate::retry::RetryPolicy;
use crate::types::ChainIdentity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// File name of the configuration inside a run directory.
pub const CONFIG_FILE: &str = "session.toml";

/// Comprehensive configuration for a run directory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Network selection.
    #[serde(default)]
    pub network: NetworkSection,

    /// Users known to the session, in declaration order.
    #[serde(default)]
    pub users: Vec<UserConfig>,

    /// Default retry policy for ledger interactions.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Step runner behaviour.
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl Config {
    /// Load configuration from a run directory.
    ///
    /// A missing file yields the defaults.
    pub fn load(work_dir: &Path) -> Result<Self> {
        let path = work_dir.join(CONFIG_FILE);
        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| HarnessError::ConfigError(format!("failed to read config: {}", e)))?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| HarnessError::ConfigError(format!("failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to a run directory.
    pub fn save(&self, work_dir: &Path) -> Result<()> {
        let path = work_dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| HarnessError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| HarnessError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for user in &self.users {
            if !seen.insert(user.role.as_str()) {
                return Err(HarnessError::ConfigError(format!(
                    "duplicate role: {}",
                    user.role
                )));
            }
        }
        self.retry.policy().map(|_| ())
    }

    /// The configuration a fresh run directory starts with.
    pub fn template(network: &str) -> Self {
        let user = |role: &str| UserConfig {
            role: role.to_string(),
            address: String::new(),
            key: Some(format!("{}.pem", role)),
        };
        Self {
            network: NetworkSection {
                name: network.to_string(),
            },
            users: vec![user("whale"), user("firstUser"), user("secondUser")],
            retry: RetryConfig::default(),
            runner: RunnerConfig::default(),
        }
    }
}

/// Network selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSection {
    /// Network name (default: "devnet").
    pub name: String,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            name: "devnet".to_string(),
        }
    }
}

/// One user entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Logical role name.
    pub role: String,
    /// Ledger address.
    pub address: String,
    /// Key material reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl UserConfig {
    /// Chain identity of this user.
    pub fn identity(&self) -> ChainIdentity {
        ChainIdentity {
            address: self.address.clone(),
            key: self.key.clone(),
        }
    }
}

/// Retry policy defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per operation (default: 3).
    pub max_attempts: u32,
    /// Bound on a single attempt in seconds (default: 60).
    pub per_attempt_timeout_secs: u64,
    /// Bound on all attempts of one operation in seconds (default: 300).
    pub total_timeout_secs: u64,
    /// First backoff delay in milliseconds (default: 1000).
    pub backoff_ms: u64,
    /// Backoff ceiling in milliseconds (default: 30000).
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            per_attempt_timeout_secs: 60,
            total_timeout_secs: 5 * 60,
            backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Builds the policy these values describe.
    pub fn policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.per_attempt_timeout_secs),
            Duration::from_secs(self.total_timeout_secs),
        )
        .map(|p| {
            p.with_backoff(
                Duration::from_millis(self.backoff_ms),
                Duration::from_millis(self.max_backoff_ms),
            )
        })
    }
}

/// Step runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Abort remaining steps after the first failure (default: true).
    pub bail: bool,
    /// Timeout of a whole step in seconds (default: 300).
    pub step_timeout_secs: u64,
    /// Retries a step gets when it opts in without a count (default: 5).
    pub default_retries: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            bail: true,
            step_timeout_secs: 5 * 60,
            default_retries: 5,
        }
    }
}

impl RunnerConfig {
    /// Returns the step timeout as a Duration.
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }
}
