//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

use crate::queue::{Backoff, EnqueueOptions};
use crate::transform::TargetPlatform;

/// Worker pool settings (`[worker]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Jobs processed in parallel, one per worker task.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// How long an idle worker blocks on the queue before re-checking for
    /// shutdown (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Platform used when a submission does not name one.
    #[serde(default)]
    pub default_platform: TargetPlatform,
}

fn default_concurrency() -> usize {
    2
}

fn default_poll_interval() -> u64 {
    1000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval(),
            default_platform: TargetPlatform::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }
}

/// Automatic retry policy for transient failures (`[retry]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per job, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds). Doubles per failure.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound for the retry delay (milliseconds).
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    5000
}

fn default_max_delay() -> u64 {
    300_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// Retries immediately, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    pub fn enqueue_options(&self) -> EnqueueOptions {
        EnqueueOptions {
            attempts: self.max_attempts,
            backoff: Backoff::Exponential {
                delay_ms: self.initial_delay_ms,
                max_delay_ms: self.max_delay_ms,
            },
            priority: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.default_platform, TargetPlatform::Tiktok);

        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay_ms, 5000);
        assert_eq!(retry.max_delay_ms, 300_000);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: OrchestratorConfig = toml::from_str(
            r#"
            concurrency = 4
            default_platform = "instagram"
        "#,
        )
        .unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.default_platform, TargetPlatform::Instagram);
    }

    #[test]
    fn test_enqueue_options_follow_retry_policy() {
        let options = RetryConfig::default().enqueue_options();
        assert_eq!(options.attempts, 3);
        assert_eq!(options.backoff.delay_for(1), Duration::from_secs(5));
        assert_eq!(options.backoff.delay_for(2), Duration::from_secs(10));
        assert_eq!(options.backoff.delay_for(20), Duration::from_secs(300));
    }
}
