use crate::error::{ZarrError, ZarrResult};
use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZlibCodec {
    #[serde(default = "default_level")]
    pub level: u32,
}

fn default_level() -> u32 {
    1
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self { level: 1 }
    }
}

impl ZlibCodec {
    pub fn new(level: u32) -> Self {
        Self { level }
    }

    pub fn decode(&self, data: &[u8]) -> ZarrResult<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(data);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| ZarrError::Decompression(format!("Zlib decompress failed: {e}")))?;
        Ok(out)
    }

    pub fn encode(&self, data: &[u8]) -> ZarrResult<Vec<u8>> {
        let level = Compression::new(self.level.min(9));
        let mut encoder = ZlibEncoder::new(data, level);
        let mut out = Vec::new();
        encoder
            .read_to_end(&mut out)
            .map_err(|e| ZarrError::Encode(format!("Zlib compress failed: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let codec = ZlibCodec::new(6);
        let data: Vec<u8> = (0..=255).cycle().take(4096).collect();
        let encoded = codec.encode(&data).unwrap();
        assert_eq!(codec.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn truncated_input_is_decompression_error() {
        let codec = ZlibCodec::default();
        let encoded = codec.encode(b"some payload to truncate").unwrap();
        let err = codec.decode(&encoded[..encoded.len() / 2]).unwrap_err();
        assert!(matches!(err, ZarrError::Decompression(_)));
    }
}
