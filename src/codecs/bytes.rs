use crate::error::{ZarrError, ZarrResult};
use crate::types::{bytes_to_zarr_vector, zarr_vector_to_bytes, DataType, Endian, ZarrVectorValue};
use serde::{Deserialize, Serialize};

/// Bytes codec: the terminal array→bytes stage. Serializes a typed chunk into
/// a flat row-major byte buffer with the declared byte order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BytesCodec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endian: Option<Endian>,
}

impl Default for BytesCodec {
    fn default() -> Self {
        Self {
            endian: Some(Endian::Little),
        }
    }
}

impl BytesCodec {
    pub fn new(endian: Endian) -> Self {
        Self {
            endian: Some(endian),
        }
    }

    /// Resolve the byte order for a data type. An omitted byte order is only
    /// valid for single-byte element types.
    pub fn resolve_endian(&self, dtype: DataType) -> ZarrResult<Endian> {
        match self.endian {
            Some(e) => Ok(e),
            None if dtype.byte_size() == 1 => Ok(Endian::Little),
            None => Err(ZarrError::Configuration(format!(
                "Bytes codec requires an explicit endian for multi-byte data type {dtype}"
            ))),
        }
    }

    pub fn encode(&self, value: &ZarrVectorValue) -> ZarrResult<Vec<u8>> {
        let endian = self.resolve_endian(value.data_type())?;
        zarr_vector_to_bytes(endian, value)
    }

    /// Decode a byte buffer that must hold exactly `element_count` elements.
    pub fn decode(
        &self,
        data: &[u8],
        dtype: DataType,
        element_count: usize,
    ) -> ZarrResult<ZarrVectorValue> {
        let endian = self.resolve_endian(dtype)?;
        let expected = element_count * dtype.byte_size();
        if data.len() != expected {
            return Err(ZarrError::Integrity(format!(
                "Truncated chunk: expected {expected} bytes for {element_count} x {dtype}, got {}",
                data.len()
            )));
        }
        bytes_to_zarr_vector(endian, dtype, data)
    }
}

// Custom serde for Endian so it works in JSON configs.
impl Serialize for Endian {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Endian::Little => serializer.serialize_str("little"),
            Endian::Big => serializer.serialize_str("big"),
        }
    }
}

impl<'de> Deserialize<'de> for Endian {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "little" => Ok(Endian::Little),
            "big" => Ok(Endian::Big),
            other => Err(serde::de::Error::custom(format!("Unknown endian: {other}"))),
        }
    }
}
