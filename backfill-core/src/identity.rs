//! Job identity type.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Fully-qualified name of a job type.
///
/// The identity namespaces every cache key a job derives and names the job
/// in refresh requests, so an out-of-band executor can find the job again.
/// Renaming a job makes its existing entries unreachable.
///
/// ```
/// use backfill_core::JobIdentity;
///
/// struct Leaderboard;
///
/// let identity = JobIdentity::of::<Leaderboard>();
/// assert!(identity.as_str().ends_with("Leaderboard"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobIdentity(SmolStr);

impl JobIdentity {
    /// Creates an identity from an explicit name.
    #[inline]
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self(name.into())
    }

    /// Identity derived from the type path of `T`.
    #[inline]
    pub fn of<T: ?Sized>() -> Self {
        Self(SmolStr::new_static(std::any::type_name::<T>()))
    }

    /// Returns the identity as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a reference to the inner `SmolStr`.
    #[inline]
    pub fn as_smol_str(&self) -> &SmolStr {
        &self.0
    }
}

impl fmt::Display for JobIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for JobIdentity {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for JobIdentity {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}
