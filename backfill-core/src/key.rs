//! Cache key types.
//!
//! - [`CacheKey`] - The complete cache key with prefix, version, and parts
//! - [`KeyPart`] - A single key-value component of a cache key
//!
//! ## Format
//!
//! When rendered as a string, keys follow this format:
//! `{prefix}:v{version}:key1=value1&key2=value2`
//!
//! - Prefix is omitted if empty
//! - Version is omitted if zero
//!
//! ```
//! use backfill_core::{CacheKey, KeyPart};
//!
//! let key = CacheKey::new("app::Users", 1, vec![KeyPart::new("0", Some("42"))]);
//! assert_eq!(key.to_string(), "app::Users:v1:0=42");
//!
//! let key = CacheKey::new("app::Users", 0, vec![]);
//! assert_eq!(key.to_string(), "app::Users");
//! ```
//!
//! Job caches never build keys by hand: [`CacheKey::derive`] turns a job
//! identity and its call arguments into a key, see [`crate::args`].

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
struct CacheKeyInner {
    prefix: SmolStr,
    version: u32,
    parts: Vec<KeyPart>,
}

/// A cache key identifying a cached entry.
///
/// Cache keys are composed of:
/// - A **prefix**, the identity of the job that owns the entry
/// - A **version** number for bulk invalidation of a job's entries
/// - A list of **parts** derived from the call arguments
///
/// `CacheKey` wraps its data in [`Arc`], so `clone()` only bumps a
/// reference count. Keys travel through logging, backend calls and
/// dispatch on every lookup.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "CacheKeyInner", from = "CacheKeyInner")]
pub struct CacheKey {
    inner: Arc<CacheKeyInner>,
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl From<CacheKeyInner> for CacheKey {
    fn from(inner: CacheKeyInner) -> Self {
        CacheKey {
            inner: Arc::new(inner),
        }
    }
}

impl From<CacheKey> for CacheKeyInner {
    fn from(key: CacheKey) -> Self {
        Arc::try_unwrap(key.inner).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sections = 0;
        if !self.inner.prefix.is_empty() {
            write!(f, "{}", self.inner.prefix)?;
            sections += 1;
        }
        if self.inner.version > 0 {
            if sections > 0 {
                write!(f, ":")?;
            }
            write!(f, "v{}", self.inner.version)?;
            sections += 1;
        }
        if !self.inner.parts.is_empty() && sections > 0 {
            write!(f, ":")?;
        }
        for (i, part) in self.inner.parts.iter().enumerate() {
            if i > 0 {
                write!(f, "&")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl CacheKey {
    /// Creates a new cache key with the given components.
    pub fn new(prefix: impl Into<SmolStr>, version: u32, parts: Vec<KeyPart>) -> Self {
        CacheKey {
            inner: Arc::new(CacheKeyInner {
                prefix: prefix.into(),
                version,
                parts,
            }),
        }
    }

    /// Returns an iterator over the key parts.
    pub fn parts(&self) -> impl Iterator<Item = &KeyPart> {
        self.inner.parts.iter()
    }

    /// Returns the cache key version number.
    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// Returns the cache key prefix.
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Returns the estimated memory usage of this cache key in bytes.
    ///
    /// Used by byte-bounded backends to weigh entries.
    pub fn memory_size(&self) -> usize {
        use std::mem::size_of;

        // SmolStr keeps strings up to 23 bytes inline.
        let heap = |len: usize| len.saturating_sub(23);
        let arc_overhead = 2 * size_of::<usize>() + size_of::<CacheKeyInner>();
        let parts = self.inner.parts.len() * size_of::<KeyPart>();
        let strings = heap(self.inner.prefix.len())
            + self
                .inner
                .parts
                .iter()
                .map(|p| heap(p.key().len()) + p.value().map_or(0, |v| heap(v.len())))
                .sum::<usize>();

        arc_overhead + parts + strings
    }
}

/// A single component of a cache key.
///
/// The value is optional: a part may be a bare flag.
///
/// ```
/// use backfill_core::KeyPart;
///
/// let name = KeyPart::new("name", Some("\"alan\""));
/// assert_eq!(name.to_string(), "name=\"alan\"");
///
/// let flag = KeyPart::new("all", None::<&str>);
/// assert_eq!(flag.to_string(), "all");
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct KeyPart {
    key: SmolStr,
    value: Option<SmolStr>,
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(ref value) = self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}

impl KeyPart {
    /// Creates a new key part.
    pub fn new<K: AsRef<str>, V: AsRef<str>>(key: K, value: Option<V>) -> Self {
        KeyPart {
            key: SmolStr::new(key),
            value: value.map(SmolStr::new),
        }
    }

    /// Returns the key name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the optional value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}
