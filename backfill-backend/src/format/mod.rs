//! Value formats: how cached payloads become bytes.
//!
//! [`Format`] is object-safe so backends can expose it as `&dyn Format`;
//! the generic `serialize`/`deserialize` entry points live on [`FormatExt`],
//! which every format gets through a blanket implementation.
//!
//! | format | self-describing | notes |
//! |--------|-----------------|-------|
//! | [`JsonFormat`] | yes | default, readable in any store browser |
//! | [`BincodeFormat`] | no | compact, payload types must not rely on `deserialize_any` |

use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use backfill_core::Raw;

mod bincode;
mod json;

pub use self::bincode::BincodeFormat;
pub use json::JsonFormat;

/// Serialization or deserialization failure.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Encoding a payload failed.
    #[error(transparent)]
    Serialize(Box<dyn std::error::Error + Send + Sync>),

    /// Decoding a payload failed.
    #[error(transparent)]
    Deserialize(Box<dyn std::error::Error + Send + Sync>),
}

/// Unique identifier for format types, used to compare format equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTypeId {
    /// [`JsonFormat`].
    Json,
    /// [`BincodeFormat`].
    Bincode,
    /// For user-defined formats. The string should be a unique identifier.
    Custom(&'static str),
}

/// Serializer handed to [`Format::with_serializer`] callbacks.
pub enum FormatSerializer<'a> {
    /// Any serde serializer, type-erased.
    Serde(&'a mut dyn erased_serde::Serializer),
    /// Bincode output buffer.
    Bincode(&'a mut Vec<u8>),
}

impl FormatSerializer<'_> {
    /// Serialize `value` with the wrapped serializer.
    pub fn serialize<T>(&mut self, value: &T) -> Result<(), FormatError>
    where
        T: Serialize,
    {
        match self {
            FormatSerializer::Serde(ser) => {
                let erased_value = value as &dyn erased_serde::Serialize;
                erased_value
                    .erased_serialize(*ser)
                    .map_err(|e| FormatError::Serialize(Box::new(e)))
            }
            FormatSerializer::Bincode(buf) => {
                let encoded = ::bincode::serde::encode_to_vec(value, ::bincode::config::standard())
                    .map_err(|e| FormatError::Serialize(Box::new(e)))?;
                buf.extend_from_slice(&encoded);
                Ok(())
            }
        }
    }
}

/// Deserializer handed to [`Format::with_deserializer`] callbacks.
pub enum FormatDeserializer<'a> {
    /// Any serde deserializer, type-erased.
    Serde(&'a mut dyn erased_serde::Deserializer<'a>),
    /// Bincode input.
    Bincode(&'a [u8]),
}

impl FormatDeserializer<'_> {
    /// Deserialize a value of type `T`.
    pub fn deserialize<T>(&mut self) -> Result<T, FormatError>
    where
        T: DeserializeOwned,
    {
        match self {
            FormatDeserializer::Serde(deser) => {
                erased_serde::deserialize(*deser).map_err(|e| FormatError::Deserialize(Box::new(e)))
            }
            FormatDeserializer::Bincode(data) => {
                ::bincode::serde::decode_from_slice(*data, ::bincode::config::standard())
                    .map(|(value, _read)| value)
                    .map_err(|e| FormatError::Deserialize(Box::new(e)))
            }
        }
    }
}

/// Object-safe format trait.
pub trait Format: std::fmt::Debug + Send + Sync {
    /// Provides access to a serializer via a callback to avoid lifetime issues.
    fn with_serializer(
        &self,
        f: &mut dyn FnMut(&mut FormatSerializer) -> Result<(), FormatError>,
    ) -> Result<Raw, FormatError>;

    /// Provides access to a deserializer via a callback to avoid lifetime issues.
    fn with_deserializer(
        &self,
        data: &[u8],
        f: &mut dyn FnMut(&mut FormatDeserializer) -> Result<(), FormatError>,
    ) -> Result<(), FormatError>;

    /// Clone this format into a box.
    fn clone_box(&self) -> Box<dyn Format>;

    /// Returns a unique identifier for this format type.
    fn format_type_id(&self) -> FormatTypeId;
}

/// Generic serialize/deserialize on top of any [`Format`].
pub trait FormatExt: Format {
    /// Encode `value`.
    fn serialize<T>(&self, value: &T) -> Result<Raw, FormatError>
    where
        T: Serialize,
    {
        self.with_serializer(&mut |serializer| serializer.serialize(value))
    }

    /// Decode a `T` from `data`.
    fn deserialize<T>(&self, data: &[u8]) -> Result<T, FormatError>
    where
        T: DeserializeOwned,
    {
        let mut result: Option<T> = None;
        self.with_deserializer(data, &mut |deserializer| {
            result = Some(deserializer.deserialize()?);
            Ok(())
        })?;

        result.ok_or_else(|| {
            FormatError::Deserialize(Box::new(std::io::Error::other(
                "deserialization produced no result",
            )))
        })
    }
}

impl<T: Format + ?Sized> FormatExt for T {}

impl Clone for Box<dyn Format> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl Format for Box<dyn Format> {
    fn with_serializer(
        &self,
        f: &mut dyn FnMut(&mut FormatSerializer) -> Result<(), FormatError>,
    ) -> Result<Raw, FormatError> {
        (**self).with_serializer(f)
    }

    fn with_deserializer(
        &self,
        data: &[u8],
        f: &mut dyn FnMut(&mut FormatDeserializer) -> Result<(), FormatError>,
    ) -> Result<(), FormatError> {
        (**self).with_deserializer(data, f)
    }

    fn clone_box(&self) -> Box<dyn Format> {
        (**self).clone_box()
    }

    fn format_type_id(&self) -> FormatTypeId {
        (**self).format_type_id()
    }
}

pub(crate) fn into_raw(buf: Vec<u8>) -> Raw {
    Bytes::from(buf)
}
