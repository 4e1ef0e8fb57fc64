use crate::error::{ZarrError, ZarrResult};
use serde::{Deserialize, Serialize};

pub const CHECKSUM_SIZE: usize = 4;

/// CRC-32C checksum codec. Encoding appends a 4-byte little-endian checksum;
/// decoding verifies and strips it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Crc32cCodec {}

impl Crc32cCodec {
    pub fn new() -> Self {
        Self {}
    }

    pub fn encode(&self, data: &[u8]) -> ZarrResult<Vec<u8>> {
        let checksum = crc32c::crc32c(data).to_le_bytes();
        let mut out = Vec::with_capacity(data.len() + CHECKSUM_SIZE);
        out.extend_from_slice(data);
        out.extend_from_slice(&checksum);
        Ok(out)
    }

    pub fn decode(&self, data: &[u8]) -> ZarrResult<Vec<u8>> {
        if data.len() < CHECKSUM_SIZE {
            return Err(ZarrError::Integrity(format!(
                "CRC32C: buffer of {} bytes is too short to carry a checksum",
                data.len()
            )));
        }
        let (payload, stored) = data.split_at(data.len() - CHECKSUM_SIZE);
        let computed = crc32c::crc32c(payload).to_le_bytes();
        if stored != computed {
            return Err(ZarrError::Integrity("CRC32C checksum mismatch".into()));
        }
        Ok(payload.to_vec())
    }
}
