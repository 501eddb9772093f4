use backfill_core::Raw;

use super::{
    Format, FormatDeserializer, FormatError, FormatSerializer, FormatTypeId, into_raw,
};

/// Compact binary format using bincode's serde bridge.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeFormat;

impl Format for BincodeFormat {
    fn with_serializer(
        &self,
        f: &mut dyn FnMut(&mut FormatSerializer) -> Result<(), FormatError>,
    ) -> Result<Raw, FormatError> {
        let mut buf = Vec::new();
        f(&mut FormatSerializer::Bincode(&mut buf))?;
        Ok(into_raw(buf))
    }

    fn with_deserializer(
        &self,
        data: &[u8],
        f: &mut dyn FnMut(&mut FormatDeserializer) -> Result<(), FormatError>,
    ) -> Result<(), FormatError> {
        f(&mut FormatDeserializer::Bincode(data))
    }

    fn clone_box(&self) -> Box<dyn Format> {
        Box::new(*self)
    }

    fn format_type_id(&self) -> FormatTypeId {
        FormatTypeId::Bincode
    }
}
