pub mod blosc;
pub mod bytes;
pub mod crc32c;
pub mod gzip;
pub mod lz4;
pub mod pipeline;
pub mod sharding;
pub mod transpose;
pub mod zlib;
pub mod zstd;

use crate::error::{ZarrError, ZarrResult};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CodecId / CodecKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    Transpose,
    Bytes,
    Sharding,
    Blosc,
    Gzip,
    Zlib,
    Zstd,
    Lz4,
    Crc32c,
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecId::Transpose => write!(f, "transpose"),
            CodecId::Bytes => write!(f, "bytes"),
            CodecId::Sharding => write!(f, "sharding_indexed"),
            CodecId::Blosc => write!(f, "blosc"),
            CodecId::Gzip => write!(f, "gzip"),
            CodecId::Zlib => write!(f, "zlib"),
            CodecId::Zstd => write!(f, "zstd"),
            CodecId::Lz4 => write!(f, "lz4"),
            CodecId::Crc32c => write!(f, "crc32c"),
        }
    }
}

/// The three codec capability kinds. A pipeline is array→array codecs,
/// then exactly one array→bytes codec, then bytes→bytes codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    ArrayToArray,
    ArrayToBytes,
    BytesToBytes,
}

// ---------------------------------------------------------------------------
// CodecConfig  (enum dispatch, no Box<dyn>)
// ---------------------------------------------------------------------------

/// One variant per supported codec, carrying that codec's parameters.
/// Immutable once attached to a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecConfig {
    Transpose(transpose::TransposeCodec),
    Bytes(bytes::BytesCodec),
    Sharding(sharding::ShardingConfig),
    Blosc(blosc::BloscCodec),
    Gzip(gzip::GzipCodec),
    Zlib(zlib::ZlibCodec),
    Zstd(zstd::ZstdCodec),
    Lz4(lz4::Lz4Codec),
    Crc32c(crc32c::Crc32cCodec),
}

impl CodecConfig {
    pub fn codec_id(&self) -> CodecId {
        match self {
            CodecConfig::Transpose(_) => CodecId::Transpose,
            CodecConfig::Bytes(_) => CodecId::Bytes,
            CodecConfig::Sharding(_) => CodecId::Sharding,
            CodecConfig::Blosc(_) => CodecId::Blosc,
            CodecConfig::Gzip(_) => CodecId::Gzip,
            CodecConfig::Zlib(_) => CodecId::Zlib,
            CodecConfig::Zstd(_) => CodecId::Zstd,
            CodecConfig::Lz4(_) => CodecId::Lz4,
            CodecConfig::Crc32c(_) => CodecId::Crc32c,
        }
    }

    pub fn kind(&self) -> CodecKind {
        match self {
            CodecConfig::Transpose(_) => CodecKind::ArrayToArray,
            CodecConfig::Bytes(_) | CodecConfig::Sharding(_) => CodecKind::ArrayToBytes,
            CodecConfig::Blosc(_)
            | CodecConfig::Gzip(_)
            | CodecConfig::Zlib(_)
            | CodecConfig::Zstd(_)
            | CodecConfig::Lz4(_)
            | CodecConfig::Crc32c(_) => CodecKind::BytesToBytes,
        }
    }

    /// Encode bytes through a bytes→bytes codec.
    pub async fn encode_bytes(&self, data: &[u8]) -> ZarrResult<Vec<u8>> {
        match self {
            CodecConfig::Blosc(c) => c.encode(data).await,
            CodecConfig::Gzip(c) => c.encode(data),
            CodecConfig::Zlib(c) => c.encode(data),
            CodecConfig::Zstd(c) => c.encode(data),
            CodecConfig::Lz4(c) => c.encode(data),
            CodecConfig::Crc32c(c) => c.encode(data),
            other => Err(ZarrError::Configuration(format!(
                "Codec {} is not a bytes-to-bytes codec",
                other.codec_id()
            ))),
        }
    }

    /// Decode bytes through a bytes→bytes codec.
    pub async fn decode_bytes(&self, data: &[u8]) -> ZarrResult<Vec<u8>> {
        match self {
            CodecConfig::Blosc(c) => c.decode(data).await,
            CodecConfig::Gzip(c) => c.decode(data),
            CodecConfig::Zlib(c) => c.decode(data),
            CodecConfig::Zstd(c) => c.decode(data),
            CodecConfig::Lz4(c) => c.decode(data),
            CodecConfig::Crc32c(c) => c.decode(data),
            other => Err(ZarrError::Configuration(format!(
                "Codec {} is not a bytes-to-bytes codec",
                other.codec_id()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON envelope  (V3 `{ "name": ..., "configuration": ... }` format)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize)]
struct CodecEnvelope {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    configuration: Option<serde_json::Value>,
}

/// Map a codec name string to its [`CodecId`].
pub fn lookup_codec_id(name: &str) -> Option<CodecId> {
    match name {
        "transpose" => Some(CodecId::Transpose),
        "bytes" => Some(CodecId::Bytes),
        "sharding_indexed" => Some(CodecId::Sharding),
        "blosc" => Some(CodecId::Blosc),
        "gzip" => Some(CodecId::Gzip),
        "zlib" => Some(CodecId::Zlib),
        "zstd" => Some(CodecId::Zstd),
        "lz4" => Some(CodecId::Lz4),
        "crc32c" => Some(CodecId::Crc32c),
        _ => None,
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    id: CodecId,
    config: serde_json::Value,
) -> ZarrResult<T> {
    serde_json::from_value(config)
        .map_err(|e| ZarrError::Configuration(format!("Invalid {id} configuration: {e}")))
}

/// Parse a single codec from a JSON value. Unknown names and malformed
/// parameter objects are configuration errors, not silent fallbacks.
pub fn parse_codec(value: &serde_json::Value) -> ZarrResult<CodecConfig> {
    let env: CodecEnvelope = serde_json::from_value(value.clone())
        .map_err(|e| ZarrError::Configuration(format!("Invalid codec envelope: {e}")))?;

    let config = env
        .configuration
        .unwrap_or(serde_json::Value::Object(Default::default()));

    match lookup_codec_id(&env.name) {
        Some(id @ CodecId::Transpose) => Ok(CodecConfig::Transpose(parse_params(id, config)?)),
        Some(id @ CodecId::Bytes) => Ok(CodecConfig::Bytes(parse_params(id, config)?)),
        Some(id @ CodecId::Sharding) => Ok(CodecConfig::Sharding(parse_params(id, config)?)),
        Some(id @ CodecId::Blosc) => Ok(CodecConfig::Blosc(parse_params(id, config)?)),
        Some(id @ CodecId::Gzip) => Ok(CodecConfig::Gzip(parse_params(id, config)?)),
        Some(id @ CodecId::Zlib) => Ok(CodecConfig::Zlib(parse_params(id, config)?)),
        Some(id @ CodecId::Zstd) => Ok(CodecConfig::Zstd(parse_params(id, config)?)),
        Some(id @ CodecId::Lz4) => Ok(CodecConfig::Lz4(parse_params(id, config)?)),
        Some(id @ CodecId::Crc32c) => Ok(CodecConfig::Crc32c(parse_params(id, config)?)),
        None => Err(ZarrError::Configuration(format!(
            "Unsupported codec: {}",
            env.name
        ))),
    }
}

/// Parse a list of codecs from JSON values.
pub fn parse_codecs(values: &[serde_json::Value]) -> ZarrResult<Vec<CodecConfig>> {
    values.iter().map(parse_codec).collect()
}

impl Serialize for CodecConfig {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as _;
        let configuration = match self {
            CodecConfig::Transpose(c) => serde_json::to_value(c),
            CodecConfig::Bytes(c) => serde_json::to_value(c),
            CodecConfig::Sharding(c) => serde_json::to_value(c),
            CodecConfig::Blosc(c) => serde_json::to_value(c),
            CodecConfig::Gzip(c) => serde_json::to_value(c),
            CodecConfig::Zlib(c) => serde_json::to_value(c),
            CodecConfig::Zstd(c) => serde_json::to_value(c),
            CodecConfig::Lz4(c) => serde_json::to_value(c),
            CodecConfig::Crc32c(c) => serde_json::to_value(c),
        }
        .map_err(S::Error::custom)?;
        let env = CodecEnvelope {
            name: self.codec_id().to_string(),
            configuration: Some(configuration),
        };
        env.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CodecConfig {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        parse_codec(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_codec_name_is_configuration_error() {
        let err = parse_codec(&json!({"name": "vlen-utf8"})).unwrap_err();
        assert!(matches!(err, ZarrError::Configuration(_)));
        assert!(err.to_string().contains("Unsupported codec"));
    }

    #[test]
    fn envelope_round_trip_preserves_parameters() {
        let value = json!({
            "name": "gzip",
            "configuration": {"level": 7}
        });
        let codec = parse_codec(&value).unwrap();
        assert_eq!(codec.codec_id(), CodecId::Gzip);
        let back = serde_json::to_value(&codec).unwrap();
        let again = parse_codec(&back).unwrap();
        assert_eq!(codec, again);
    }

    #[test]
    fn codec_kinds() {
        let transpose = parse_codec(&json!({"name": "transpose", "configuration": {"order": [0]}}))
            .unwrap();
        assert_eq!(transpose.kind(), CodecKind::ArrayToArray);
        let bytes = parse_codec(&json!({"name": "bytes"})).unwrap();
        assert_eq!(bytes.kind(), CodecKind::ArrayToBytes);
        let crc = parse_codec(&json!({"name": "crc32c"})).unwrap();
        assert_eq!(crc.kind(), CodecKind::BytesToBytes);
    }
}
