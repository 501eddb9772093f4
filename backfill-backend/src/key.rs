//! Cache key serialization formats.
//!
//! Stores that address entries by bytes or strings (as opposed to in-process
//! maps keyed by [`CacheKey`] itself) use a [`CacheKeyFormat`] to encode keys.
//!
//! | Format | Size | Reversible | Use Case |
//! |--------|------|------------|----------|
//! | [`Bitcode`](CacheKeyFormat::Bitcode) | Compact | Yes | Default, most backends |
//! | [`UrlEncoded`](CacheKeyFormat::UrlEncoded) | Larger | Yes | Debugging, human-readable keys |

use std::{iter::once, str::from_utf8};

use backfill_core::{CacheKey, KeyPart};

use crate::format::FormatError;

const PREFIX_KEY: &str = "_job";
const VERSION_KEY: &str = "_version";

/// Cache key serialization format.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheKeyFormat {
    /// Compact binary format using bitcode.
    #[default]
    Bitcode,

    /// URL-encoded query string format.
    ///
    /// Produces keys like `_job=app%3A%3AUsers&_version=0&0=%2242%22`.
    UrlEncoded,
}

impl CacheKeyFormat {
    /// Serialize a cache key to bytes.
    pub fn serialize(&self, key: &CacheKey) -> Result<Vec<u8>, FormatError> {
        match self {
            CacheKeyFormat::Bitcode => {
                bitcode::serialize(key).map_err(|err| FormatError::Serialize(Box::new(err)))
            }
            CacheKeyFormat::UrlEncoded => {
                let pairs = once((PREFIX_KEY, key.prefix().to_string()))
                    .chain(once((VERSION_KEY, key.version().to_string())))
                    .chain(
                        key.parts()
                            .map(|p| (p.key(), p.value().unwrap_or_default().to_string())),
                    )
                    .collect::<Vec<_>>();

                serde_urlencoded::to_string(pairs)
                    .map(String::into_bytes)
                    .map_err(|err| FormatError::Serialize(Box::new(err)))
            }
        }
    }

    /// Deserialize bytes back to a cache key.
    pub fn deserialize(&self, data: &[u8]) -> Result<CacheKey, FormatError> {
        match self {
            CacheKeyFormat::Bitcode => {
                bitcode::deserialize(data).map_err(|err| FormatError::Deserialize(Box::new(err)))
            }
            CacheKeyFormat::UrlEncoded => {
                let input =
                    from_utf8(data).map_err(|err| FormatError::Deserialize(Box::new(err)))?;

                let pairs: Vec<(String, String)> = serde_urlencoded::from_str(input)
                    .map_err(|err| FormatError::Deserialize(Box::new(err)))?;

                let (mut prefix, mut version, mut parts) = (String::new(), 0u32, Vec::new());

                for (key, value) in pairs {
                    match key.as_str() {
                        PREFIX_KEY => prefix = value,
                        VERSION_KEY => {
                            version = value
                                .parse()
                                .map_err(|err| FormatError::Deserialize(Box::new(err)))?;
                        }
                        _ => {
                            let v = if value.is_empty() { None } else { Some(value) };
                            parts.push(KeyPart::new(key, v));
                        }
                    }
                }

                Ok(CacheKey::new(prefix, version, parts))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use backfill_core::JobIdentity;

    use super::*;

    fn key() -> CacheKey {
        CacheKey::derive(&JobIdentity::new("app::Users"), 2, &("alan", 7)).unwrap()
    }

    #[test]
    fn bitcode_round_trip() {
        let format = CacheKeyFormat::Bitcode;
        let bytes = format.serialize(&key()).unwrap();
        assert_eq!(format.deserialize(&bytes).unwrap(), key());
    }

    #[test]
    fn url_encoded_is_readable() {
        let format = CacheKeyFormat::UrlEncoded;
        let bytes = format.serialize(&key()).unwrap();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            "_job=app%3A%3AUsers&_version=2&0=%22alan%22&1=7"
        );
        assert_eq!(format.deserialize(&bytes).unwrap(), key());
    }

    #[test]
    fn url_encoded_rejects_bad_version() {
        let result = CacheKeyFormat::UrlEncoded.deserialize(b"_job=a&_version=x");
        assert!(matches!(result, Err(FormatError::Deserialize(_))));
    }
}
