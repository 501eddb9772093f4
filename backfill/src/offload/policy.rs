//! Offload task policies and configuration.

use std::time::Duration;

/// Policy for handling task timeouts.
#[derive(Debug, Clone, Default)]
pub enum TimeoutPolicy {
    /// No timeout - task runs until completion.
    #[default]
    None,
    /// Cancel task after specified duration.
    Cancel(Duration),
    /// Log warning after duration but let task continue.
    Warn(Duration),
}

/// Configuration for the OffloadDispatcher.
#[derive(Debug, Clone, Default)]
pub struct OffloadConfig {
    /// Maximum number of concurrent refresh tasks.
    /// None means unlimited.
    pub max_concurrent_tasks: Option<usize>,
    /// Timeout policy for spawned tasks.
    pub timeout_policy: TimeoutPolicy,
    /// Skip a request when an identical one (same job, same arguments) is
    /// already in flight. Off by default.
    pub deduplicate: bool,
}

impl OffloadConfig {
    /// Create a new builder for OffloadConfig.
    pub fn builder() -> OffloadConfigBuilder {
        OffloadConfigBuilder::default()
    }
}

/// Builder for OffloadConfig.
#[derive(Debug, Clone, Default)]
pub struct OffloadConfigBuilder {
    config: OffloadConfig,
}

impl OffloadConfigBuilder {
    /// Set maximum concurrent tasks.
    pub fn max_concurrent_tasks(mut self, max: usize) -> Self {
        self.config.max_concurrent_tasks = Some(max);
        self
    }

    /// Set timeout policy.
    pub fn timeout_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.config.timeout_policy = policy;
        self
    }

    /// Set timeout with cancel policy.
    pub fn timeout(self, duration: Duration) -> Self {
        self.timeout_policy(TimeoutPolicy::Cancel(duration))
    }

    /// Enable or disable request deduplication.
    pub fn deduplicate(mut self, enabled: bool) -> Self {
        self.config.deduplicate = enabled;
        self
    }

    /// Build the OffloadConfig.
    pub fn build(self) -> OffloadConfig {
        self.config
    }
}
