//! Policy-wide configuration.
//!
//! Job types carry their own defaults through the [`Job`](crate::Job)
//! trait. A [`PolicyConfig`] sets the write ceiling shared by every job and
//! can override per-job settings by identity, without touching code:
//!
//! ```yaml
//! max_entry_lifetime: 30d
//! jobs:
//!   "app::jobs::Leaderboard":
//!     lifetime: 1m
//!     fetch_on_empty_miss: false
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use backfill_core::JobIdentity;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest retention ever requested from a store: 30 days.
pub const MAX_ENTRY_LIFETIME: Duration = Duration::from_secs(30 * 24 * 60 * 60);

fn default_max_entry_lifetime() -> Duration {
    MAX_ENTRY_LIFETIME
}

/// Per-job overrides. Unset fields fall back to the job's own defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JobOverrides {
    /// Freshness window (e.g. "10m", "1h").
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<Duration>,
    /// Whether a cold cache blocks on a synchronous fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_on_empty_miss: Option<bool>,
}

/// Configuration shared by all cached jobs.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// Retention ceiling passed to the store on every write.
    #[serde(default = "default_max_entry_lifetime", with = "humantime_serde")]
    pub max_entry_lifetime: Duration,
    /// Overrides keyed by job identity.
    #[serde(default)]
    pub jobs: BTreeMap<JobIdentity, JobOverrides>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            max_entry_lifetime: MAX_ENTRY_LIFETIME,
            jobs: BTreeMap::new(),
        }
    }
}

impl PolicyConfig {
    /// Create a new builder for PolicyConfig.
    pub fn builder() -> PolicyConfigBuilder {
        PolicyConfigBuilder::default()
    }

    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_saphyr::from_str(yaml).map_err(|err| ConfigError::Yaml(Box::new(err)))
    }

    /// Overrides registered for `job`, if any.
    pub fn overrides(&self, job: &JobIdentity) -> Option<&JobOverrides> {
        self.jobs.get(job)
    }
}

/// Builder for PolicyConfig.
#[derive(Debug, Clone, Default)]
pub struct PolicyConfigBuilder {
    config: PolicyConfig,
}

impl PolicyConfigBuilder {
    /// Set the retention ceiling.
    pub fn max_entry_lifetime(mut self, ceiling: Duration) -> Self {
        self.config.max_entry_lifetime = ceiling;
        self
    }

    /// Override the freshness window of `job`.
    pub fn lifetime(mut self, job: impl Into<JobIdentity>, lifetime: Duration) -> Self {
        self.config.jobs.entry(job.into()).or_default().lifetime = Some(lifetime);
        self
    }

    /// Override whether `job` fetches synchronously on a cold cache.
    pub fn fetch_on_empty_miss(mut self, job: impl Into<JobIdentity>, enabled: bool) -> Self {
        self.config
            .jobs
            .entry(job.into())
            .or_default()
            .fetch_on_empty_miss = Some(enabled);
        self
    }

    /// Build the PolicyConfig.
    pub fn build(self) -> PolicyConfig {
        self.config
    }
}
