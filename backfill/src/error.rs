use backfill_core::{JobIdentity, KeyError};
use thiserror::Error;

/// Error returned by [`CachedJob`](crate::CachedJob) operations.
///
/// Store and dispatcher failures never show up here: they are logged and
/// the lookup degrades. Only the job's own failures and key derivation
/// failures reach the caller.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    /// The job's `fetch` failed.
    #[error("job fetch failed: {0}")]
    Fetch(#[source] E),
    /// Call arguments could not be turned into a cache key.
    #[error(transparent)]
    Key(#[from] KeyError),
}

impl<E> CacheError<E> {
    /// Returns the fetch error, if that is what this is.
    pub fn into_fetch(self) -> Option<E> {
        match self {
            CacheError::Fetch(err) => Some(err),
            CacheError::Key(_) => None,
        }
    }
}

/// Error running a dispatched refresh.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// No job with this identity is registered.
    #[error("no job registered as `{0}`")]
    UnknownJob(JobIdentity),
    /// The request's arguments do not decode into the job's argument type.
    #[error("refresh arguments for `{job}` do not decode: {source}")]
    Args {
        /// Job the request was for.
        job: JobIdentity,
        /// Decoding failure.
        source: serde_json::Error,
    },
    /// The refresh itself failed.
    #[error("refresh of `{job}` failed: {source}")]
    Failed {
        /// Job the request was for.
        job: JobIdentity,
        /// Underlying failure.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Error loading a [`PolicyConfig`](crate::PolicyConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid YAML for this configuration.
    #[error("invalid policy configuration: {0}")]
    Yaml(Box<dyn std::error::Error + Send + Sync>),
}
