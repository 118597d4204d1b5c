//! Run configuration.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! command-line flags.

use crate::error::{ReplicationError, Result};
use crate::replication::{ReplicateOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplicatorConfig {
    pub batch_size: usize,
    pub num_workers: usize,
    pub delete_replicated_if_not_in_src: bool,
    pub delete_not_replicated_in_dst: bool,
    pub skip_name_patterns: Vec<String>,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            num_workers: 1,
            delete_replicated_if_not_in_src: false,
            delete_not_replicated_in_dst: false,
            skip_name_patterns: vec!["service_account_metrics".to_string()],
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl ReplicatorConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ReplicationError::Config(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.num_workers == 0 {
            return Err(ReplicationError::Config(
                "num_workers must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ReplicationError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    pub fn to_options(&self) -> ReplicateOptions {
        ReplicateOptions {
            batch_size: self.batch_size,
            num_workers: self.num_workers,
            delete_replicated_if_not_in_src: self.delete_replicated_if_not_in_src,
            delete_not_replicated_in_dst: self.delete_not_replicated_in_dst,
            retry: self.retry_policy(),
            skip_name_patterns: self.skip_name_patterns.clone(),
            run_timestamp: None,
        }
    }
}
