//! Call arguments and cache key derivation.
//!
//! A job is called with arguments of any serde-serializable type. The
//! arguments are turned into [`KeyPart`]s with a single, deterministic rule:
//!
//! | arguments | parts |
//! |-----------|-------|
//! | `()` / unit / `None` | none, the key is the job identity alone |
//! | tuple or sequence (positional) | `0=…&1=…`, one per argument |
//! | single scalar | `0=…` |
//! | struct or map (named) | one per name, names sorted |
//!
//! Part values are canonical JSON: strings keep their quotes and nested
//! objects have their keys sorted, so neither `1` vs `"1"` nor map iteration
//! order can change which entry a call addresses.
//!
//! ```
//! use backfill_core::{CacheKey, JobIdentity};
//!
//! let job = JobIdentity::new("app::Greeting");
//! assert_eq!(CacheKey::derive(&job, 0, &()).unwrap().to_string(), "app::Greeting");
//! assert_eq!(
//!     CacheKey::derive(&job, 0, &("alan",)).unwrap().to_string(),
//!     "app::Greeting:0=\"alan\"",
//! );
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{CacheKey, JobIdentity, KeyPart};

/// Failure to turn call arguments into a cache key.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Arguments could not be represented as JSON (e.g. a map with non-string keys).
    #[error("call arguments are not representable as a cache key: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheKey {
    /// Derives the cache key for a call of job `identity` with `args`.
    pub fn derive<A>(identity: &JobIdentity, version: u32, args: &A) -> Result<Self, KeyError>
    where
        A: Serialize + ?Sized,
    {
        let value = serde_json::to_value(args)?;
        Ok(CacheKey::new(identity.as_smol_str().clone(), version, key_parts(value)))
    }
}

/// Splits an argument value into key parts following the module rules.
pub fn key_parts(args: Value) -> Vec<KeyPart> {
    match args {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| KeyPart::new(index.to_string(), Some(canonical_json(item))))
            .collect(),
        Value::Object(fields) => {
            let sorted: BTreeMap<_, _> = fields.iter().collect();
            sorted
                .into_iter()
                .map(|(name, item)| KeyPart::new(name, Some(canonical_json(item))))
                .collect()
        }
        scalar => vec![KeyPart::new("0", Some(canonical_json(&scalar)))],
    }
}

/// Renders `value` as JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(fields) => {
                let sorted: BTreeMap<_, _> = fields.iter().collect();
                Value::Object(
                    sorted
                        .into_iter()
                        .map(|(name, item)| (name.clone(), sort(item)))
                        .collect::<Map<_, _>>(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

/// Ordered positional plus named arguments, for callers whose argument
/// shape is only known at runtime.
///
/// Positional arguments become parts `0`, `1`, … and named arguments become
/// parts under their own name, so a `CallArgs` with only positional
/// arguments addresses the same entry as the equivalent tuple.
///
/// ```
/// use backfill_core::{CacheKey, CallArgs, JobIdentity};
///
/// let job = JobIdentity::new("app::Search");
/// let args = CallArgs::new().arg("rust")?.named("page", 2)?;
/// assert_eq!(
///     CacheKey::derive(&job, 0, &args)?.to_string(),
///     "app::Search:0=\"rust\"&page=2",
/// );
/// # Ok::<(), backfill_core::KeyError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub struct CallArgs {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl CallArgs {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    ///
    /// Fails when `value` has no JSON form, the same way
    /// [`CacheKey::derive`] does.
    pub fn arg(mut self, value: impl Serialize) -> Result<Self, KeyError> {
        self.positional.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Sets a named argument.
    pub fn named(
        mut self,
        name: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self, KeyError> {
        self.named.insert(name.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Positional arguments in call order.
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Named arguments.
    pub fn named_args(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    /// Returns `true` when no arguments were given.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}

impl From<CallArgs> for Value {
    fn from(args: CallArgs) -> Self {
        match (args.positional.is_empty(), args.named.is_empty()) {
            (true, true) => Value::Null,
            (false, true) => Value::Array(args.positional),
            _ => {
                let mut fields = Map::new();
                for (index, value) in args.positional.into_iter().enumerate() {
                    fields.insert(index.to_string(), value);
                }
                fields.extend(args.named);
                Value::Object(fields)
            }
        }
    }
}

impl TryFrom<Value> for CallArgs {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(CallArgs::default()),
            Value::Array(positional) => Ok(CallArgs {
                positional,
                named: BTreeMap::new(),
            }),
            Value::Object(fields) => {
                let mut indexed = BTreeMap::new();
                let mut named = BTreeMap::new();
                for (name, value) in fields {
                    match name.parse::<usize>() {
                        Ok(index) => {
                            indexed.insert(index, value);
                        }
                        Err(_) => {
                            named.insert(name, value);
                        }
                    }
                }
                if indexed.keys().copied().ne(0..indexed.len()) {
                    return Err("positional arguments must be numbered from 0 without gaps".into());
                }
                Ok(CallArgs {
                    positional: indexed.into_values().collect(),
                    named,
                })
            }
            scalar => Ok(CallArgs {
                positional: vec![scalar],
                named: BTreeMap::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn job() -> JobIdentity {
        JobIdentity::new("tests::Job")
    }

    fn key<A: Serialize>(args: &A) -> String {
        CacheKey::derive(&job(), 0, args).unwrap().to_string()
    }

    #[test]
    fn no_arguments_use_identity() {
        assert_eq!(key(&()), "tests::Job");
        assert_eq!(key(&None::<u32>), "tests::Job");
        assert_eq!(key(&CallArgs::new()), "tests::Job");
    }

    #[test]
    fn positional_arguments_are_indexed() {
        assert_eq!(key(&("alan",)), "tests::Job:0=\"alan\"");
        assert_eq!(key(&("alan", 3)), "tests::Job:0=\"alan\"&1=3");
        assert_eq!(key(&"alan"), "tests::Job:0=\"alan\"");
    }

    #[test]
    fn distinct_positional_arguments_never_collide() {
        assert_ne!(key(&("alan",)), key(&("barry",)));
        assert_ne!(key(&(1,)), key(&("1",)));
        assert_ne!(key(&("a", "b")), key(&("b", "a")));
    }

    #[test]
    fn named_arguments_are_sorted() {
        #[derive(Serialize)]
        struct Query {
            page: u32,
            name: &'static str,
        }

        assert_eq!(
            key(&Query { page: 2, name: "alan" }),
            "tests::Job:name=\"alan\"&page=2"
        );
    }

    #[test]
    fn map_order_does_not_change_key() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for (k, v) in [("a", 1), ("b", 2), ("c", 3), ("d", 4)] {
            first.insert(k, v);
        }
        for (k, v) in [("d", 4), ("c", 3), ("b", 2), ("a", 1)] {
            second.insert(k, v);
        }
        assert_eq!(key(&first), key(&second));
    }

    #[test]
    fn nested_objects_are_canonical() {
        let left = json!({"filter": {"b": 1, "a": [{"y": 2, "x": 1}]}});
        let right = json!({"filter": {"a": [{"x": 1, "y": 2}], "b": 1}});
        assert_eq!(key(&left), key(&right));
        assert_eq!(
            canonical_json(&left),
            r#"{"filter":{"a":[{"x":1,"y":2}],"b":1}}"#
        );
    }

    #[test]
    fn version_and_identity_namespace_keys() {
        let v0 = CacheKey::derive(&job(), 0, &("alan",)).unwrap();
        let v1 = CacheKey::derive(&job(), 1, &("alan",)).unwrap();
        let other = CacheKey::derive(&JobIdentity::new("tests::Other"), 0, &("alan",)).unwrap();
        assert_ne!(v0, v1);
        assert_ne!(v0, other);
    }

    #[test]
    fn non_string_map_keys_are_rejected() {
        let mut args = HashMap::new();
        args.insert((1, 2), "pair");
        let result = CacheKey::derive(&job(), 0, &args);
        assert!(matches!(result, Err(KeyError::Serialize(_))));
    }

    #[test]
    fn call_args_match_tuple_keys() {
        let positional = CallArgs::new().arg("alan").unwrap().arg(3).unwrap();
        assert_eq!(key(&positional), key(&("alan", 3)));
        let mixed = CallArgs::new()
            .arg("rust")
            .unwrap()
            .named("page", 2)
            .unwrap();
        assert_eq!(
            key(&mixed),
            "tests::Job:0=\"rust\"&page=2"
        );
    }

    #[test]
    fn call_args_reject_unserializable_values() {
        let mut pairs = HashMap::new();
        pairs.insert((1, 2), "alan");

        let positional = CallArgs::new().arg(&pairs);
        assert!(matches!(positional, Err(KeyError::Serialize(_))));

        let named = CallArgs::new().named("pairs", &pairs);
        assert!(matches!(named, Err(KeyError::Serialize(_))));
    }

    #[test]
    fn call_args_survive_transport() {
        let args = CallArgs::new()
            .arg("rust")
            .and_then(|args| args.arg(7))
            .and_then(|args| args.named("page", 2))
            .unwrap();
        let value = serde_json::to_value(&args).unwrap();
        let back: CallArgs = serde_json::from_value(value).unwrap();
        assert_eq!(back, args);
        assert_eq!(back.positional(), &[json!("rust"), json!(7)]);
        assert_eq!(back.named_args().get("page"), Some(&json!(2)));
    }

    #[test]
    fn call_args_reject_gaps_in_positions() {
        let result: Result<CallArgs, _> = serde_json::from_value(json!({"0": 1, "2": 3}));
        assert!(result.is_err());
    }
}
