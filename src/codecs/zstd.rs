use crate::error::{ZarrError, ZarrResult};
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZstdCodec {
    #[serde(default = "default_level")]
    pub level: i32,
    /// Embed a checksum in the zstd frame; verified by the decoder.
    #[serde(default)]
    pub checksum: bool,
}

fn default_level() -> i32 {
    5
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self {
            level: 5,
            checksum: false,
        }
    }
}

impl ZstdCodec {
    pub fn new(level: i32, checksum: bool) -> Self {
        Self { level, checksum }
    }

    pub fn decode(&self, data: &[u8]) -> ZarrResult<Vec<u8>> {
        zstd::stream::decode_all(data)
            .map_err(|e| ZarrError::Decompression(format!("Zstd decompress failed: {e}")))
    }

    pub fn encode(&self, data: &[u8]) -> ZarrResult<Vec<u8>> {
        let mut encoder = zstd::stream::Encoder::new(Vec::new(), self.level)
            .map_err(|e| ZarrError::Encode(format!("Zstd encoder init failed: {e}")))?;
        encoder
            .include_checksum(self.checksum)
            .map_err(|e| ZarrError::Encode(format!("Zstd checksum option failed: {e}")))?;
        encoder
            .write_all(data)
            .map_err(|e| ZarrError::Encode(format!("Zstd compress failed: {e}")))?;
        encoder
            .finish()
            .map_err(|e| ZarrError::Encode(format!("Zstd compress failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_and_without_checksum() {
        let data: Vec<u8> = (0..1024u32).flat_map(|x| x.to_le_bytes()).collect();
        for checksum in [false, true] {
            let codec = ZstdCodec::new(3, checksum);
            let encoded = codec.encode(&data).unwrap();
            assert_eq!(codec.decode(&encoded).unwrap(), data);
        }
    }

    #[test]
    fn corrupt_frame_is_decompression_error() {
        let codec = ZstdCodec::default();
        let mut encoded = codec.encode(b"zstd frame to corrupt").unwrap();
        let mid = encoded.len() / 2;
        encoded.truncate(mid);
        let err = codec.decode(&encoded).unwrap_err();
        assert!(matches!(err, ZarrError::Decompression(_)));
    }
}
