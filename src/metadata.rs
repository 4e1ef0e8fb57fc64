use serde::{Deserialize, Serialize};

use crate::codecs::{parse_codecs, CodecConfig};
use crate::error::{ZarrError, ZarrResult};
use crate::types::{DataType, FillValue, ZarrValue};
use half::f16;
use num_complex::Complex;

pub const ZARR_FORMAT: u32 = 3;

// ---------------------------------------------------------------------------
// ArrayMetadata
// ---------------------------------------------------------------------------

/// Typed array metadata. Created at array-creation time and read-only
/// thereafter. Two metadata values are equal iff every field matches,
/// including codec list order and parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayMetadata {
    pub shape: Vec<usize>,
    pub chunk_shape: Vec<usize>,
    pub data_type: DataType,
    pub fill_value: FillValue,
    pub chunk_key_separator: char,
    pub codecs: Vec<CodecConfig>,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub dimension_names: Option<Vec<Option<String>>>,
}

impl ArrayMetadata {
    /// Build metadata, checking the shape invariants up front.
    pub fn new(
        shape: Vec<usize>,
        chunk_shape: Vec<usize>,
        data_type: DataType,
        fill_value: FillValue,
        codecs: Vec<CodecConfig>,
    ) -> ZarrResult<Self> {
        if shape.is_empty() || shape.len() != chunk_shape.len() {
            return Err(ZarrError::Metadata(format!(
                "Shape {shape:?} and chunk shape {chunk_shape:?} must have the same rank >= 1"
            )));
        }
        if shape.iter().any(|&d| d == 0) || chunk_shape.iter().any(|&d| d == 0) {
            return Err(ZarrError::Metadata(
                "Array and chunk dimensions must be positive".into(),
            ));
        }
        if chunk_shape.iter().zip(shape.iter()).any(|(c, s)| c > s) {
            return Err(ZarrError::Metadata(format!(
                "Chunk shape {chunk_shape:?} exceeds array shape {shape:?}"
            )));
        }
        Ok(Self {
            shape,
            chunk_shape,
            data_type,
            fill_value,
            chunk_key_separator: '/',
            codecs,
            attributes: Default::default(),
            dimension_names: None,
        })
    }

    pub fn with_attributes(
        mut self,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        self.attributes = attributes;
        self
    }

    /// Number of chunks along each dimension: `ceil(shape / chunk_shape)`.
    pub fn chunk_grid_shape(&self) -> Vec<usize> {
        self.shape
            .iter()
            .zip(self.chunk_shape.iter())
            .map(|(s, c)| s.div_ceil(*c))
            .collect()
    }

    pub fn to_json_value(&self) -> ZarrResult<serde_json::Value> {
        let doc = ArrayMetadataDoc {
            zarr_format: ZARR_FORMAT,
            node_type: "array".to_string(),
            shape: self.shape.clone(),
            data_type: self.data_type.name().to_string(),
            chunk_grid: ChunkGridDoc {
                name: "regular".to_string(),
                configuration: ChunkGridConfig {
                    chunk_shape: self.chunk_shape.clone(),
                },
            },
            chunk_key_encoding: ChunkKeyEncodingDoc {
                name: "default".to_string(),
                configuration: ChunkKeyConfig {
                    separator: self.chunk_key_separator.to_string(),
                },
            },
            fill_value: fill_value_to_json(&self.fill_value),
            codecs: self
                .codecs
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?,
            attributes: if self.attributes.is_empty() {
                None
            } else {
                Some(self.attributes.clone())
            },
            dimension_names: self.dimension_names.clone(),
        };
        Ok(serde_json::to_value(&doc)?)
    }

    pub fn from_json_value(value: &serde_json::Value) -> ZarrResult<Self> {
        let doc: ArrayMetadataDoc = serde_json::from_value(value.clone())?;
        if doc.zarr_format != ZARR_FORMAT {
            return Err(ZarrError::Metadata(format!(
                "Unsupported zarr_format: {}",
                doc.zarr_format
            )));
        }
        if doc.node_type != "array" {
            return Err(ZarrError::Metadata(format!(
                "Expected node_type \"array\", got \"{}\"",
                doc.node_type
            )));
        }
        if doc.chunk_grid.name != "regular" {
            return Err(ZarrError::Metadata(format!(
                "Unsupported chunk grid: {}",
                doc.chunk_grid.name
            )));
        }
        if doc.chunk_key_encoding.name != "default" {
            return Err(ZarrError::Metadata(format!(
                "Unsupported chunk key encoding: {}",
                doc.chunk_key_encoding.name
            )));
        }
        let separator = match doc.chunk_key_encoding.configuration.separator.as_str() {
            "/" => '/',
            "." => '.',
            other => {
                return Err(ZarrError::Metadata(format!(
                    "Unsupported chunk key separator: {other}"
                )));
            }
        };
        let data_type = DataType::parse(&doc.data_type)?;
        let fill_value = parse_fill_value(data_type, &doc.fill_value)
            .map_err(ZarrError::Metadata)?;
        let codecs = parse_codecs(&doc.codecs)?;

        let mut metadata = ArrayMetadata::new(
            doc.shape,
            doc.chunk_grid.configuration.chunk_shape,
            data_type,
            fill_value,
            codecs,
        )?;
        metadata.chunk_key_separator = separator;
        metadata.attributes = doc.attributes.unwrap_or_default();
        metadata.dimension_names = doc.dimension_names;
        Ok(metadata)
    }

    pub fn to_bytes(&self) -> ZarrResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.to_json_value()?)?)
    }

    pub fn from_bytes(data: &[u8]) -> ZarrResult<Self> {
        let value: serde_json::Value = serde_json::from_slice(data)?;
        Self::from_json_value(&value)
    }
}

// ---------------------------------------------------------------------------
// Raw document shape (zarr.json)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct ArrayMetadataDoc {
    zarr_format: u32,
    node_type: String,
    shape: Vec<usize>,
    data_type: String,
    chunk_grid: ChunkGridDoc,
    chunk_key_encoding: ChunkKeyEncodingDoc,
    fill_value: serde_json::Value,
    codecs: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dimension_names: Option<Vec<Option<String>>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkGridDoc {
    name: String,
    configuration: ChunkGridConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkGridConfig {
    chunk_shape: Vec<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkKeyEncodingDoc {
    name: String,
    configuration: ChunkKeyConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkKeyConfig {
    separator: String,
}

// ---------------------------------------------------------------------------
// Fill value JSON round-trip
// ---------------------------------------------------------------------------

pub fn fill_value_to_json(fill: &FillValue) -> serde_json::Value {
    use serde_json::{json, Value};
    match fill {
        FillValue::NaN => json!("NaN"),
        FillValue::Infinity => json!("Infinity"),
        FillValue::NegativeInfinity => json!("-Infinity"),
        FillValue::Value(v) => match v {
            ZarrValue::Bool(b) => json!(b),
            ZarrValue::Int8(x) => json!(x),
            ZarrValue::Int16(x) => json!(x),
            ZarrValue::Int32(x) => json!(x),
            ZarrValue::Int64(x) => json!(x),
            ZarrValue::UInt8(x) => json!(x),
            ZarrValue::UInt16(x) => json!(x),
            ZarrValue::UInt32(x) => json!(x),
            ZarrValue::UInt64(x) => json!(x),
            ZarrValue::Float16(x) => float_to_json(x.to_f64()),
            ZarrValue::Float32(x) => float_to_json(*x as f64),
            ZarrValue::Float64(x) => float_to_json(*x),
            ZarrValue::Complex64(c) => Value::Array(vec![
                float_to_json(c.re as f64),
                float_to_json(c.im as f64),
            ]),
            ZarrValue::Complex128(c) => {
                Value::Array(vec![float_to_json(c.re), float_to_json(c.im)])
            }
        },
    }
}

fn float_to_json(f: f64) -> serde_json::Value {
    if f.is_nan() {
        serde_json::json!("NaN")
    } else if f == f64::INFINITY {
        serde_json::json!("Infinity")
    } else if f == f64::NEG_INFINITY {
        serde_json::json!("-Infinity")
    } else {
        serde_json::json!(f)
    }
}

/// Parse a fill value from a JSON value, given the target data type.
/// Handles special string values like "NaN", "Infinity", "-Infinity",
/// and normal numeric/bool values.
pub fn parse_fill_value(dtype: DataType, value: &serde_json::Value) -> Result<FillValue, String> {
    match value {
        serde_json::Value::String(s) => match s.as_str() {
            "NaN" => float_kind_only(dtype, FillValue::NaN),
            "Infinity" => float_kind_only(dtype, FillValue::Infinity),
            "-Infinity" => float_kind_only(dtype, FillValue::NegativeInfinity),
            other => Err(format!("Expected {dtype:?} value, got string: {other}")),
        },

        serde_json::Value::Bool(b) => match dtype {
            DataType::Bool => Ok(FillValue::Value(ZarrValue::Bool(*b))),
            _ => Err(format!("Expected {dtype:?}, got bool")),
        },

        serde_json::Value::Number(n) => parse_numeric_fill(dtype, n),

        serde_json::Value::Array(parts) => match dtype {
            DataType::Complex64 | DataType::Complex128 if parts.len() == 2 => {
                let re = parse_json_float(&parts[0])?;
                let im = parse_json_float(&parts[1])?;
                Ok(FillValue::Value(match dtype {
                    DataType::Complex64 => {
                        ZarrValue::Complex64(Complex::new(re as f32, im as f32))
                    }
                    _ => ZarrValue::Complex128(Complex::new(re, im)),
                }))
            }
            _ => Err(format!("Unexpected fill_value array for {dtype:?}")),
        },

        _ => Err(format!("Unexpected fill_value JSON: {value}")),
    }
}

fn float_kind_only(dtype: DataType, fill: FillValue) -> Result<FillValue, String> {
    match dtype {
        DataType::Float16
        | DataType::Float32
        | DataType::Float64
        | DataType::Complex64
        | DataType::Complex128 => Ok(fill),
        _ => Err(format!("{fill:?} not valid for {dtype:?}")),
    }
}

fn parse_json_float(value: &serde_json::Value) -> Result<f64, String> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("Expected float, got {n}")),
        serde_json::Value::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => Err(format!("Expected float, got string: {other}")),
        },
        other => Err(format!("Expected float, got: {other}")),
    }
}

fn parse_numeric_fill(dtype: DataType, n: &serde_json::Number) -> Result<FillValue, String> {
    match dtype {
        DataType::Int8 => {
            let i = n
                .as_i64()
                .ok_or_else(|| format!("Expected int for Int8, got {n}"))?;
            let v = i8::try_from(i).map_err(|_| format!("Value {i} out of range for Int8"))?;
            Ok(FillValue::Value(ZarrValue::Int8(v)))
        }
        DataType::Int16 => {
            let i = n
                .as_i64()
                .ok_or_else(|| format!("Expected int for Int16, got {n}"))?;
            let v = i16::try_from(i).map_err(|_| format!("Value {i} out of range for Int16"))?;
            Ok(FillValue::Value(ZarrValue::Int16(v)))
        }
        DataType::Int32 => {
            let i = n
                .as_i64()
                .ok_or_else(|| format!("Expected int for Int32, got {n}"))?;
            let v = i32::try_from(i).map_err(|_| format!("Value {i} out of range for Int32"))?;
            Ok(FillValue::Value(ZarrValue::Int32(v)))
        }
        DataType::Int64 => {
            let i = n
                .as_i64()
                .ok_or_else(|| format!("Expected int for Int64, got {n}"))?;
            Ok(FillValue::Value(ZarrValue::Int64(i)))
        }
        DataType::UInt8 => {
            let i = n
                .as_u64()
                .ok_or_else(|| format!("Expected uint for UInt8, got {n}"))?;
            let v = u8::try_from(i).map_err(|_| format!("Value {i} out of range for UInt8"))?;
            Ok(FillValue::Value(ZarrValue::UInt8(v)))
        }
        DataType::UInt16 => {
            let i = n
                .as_u64()
                .ok_or_else(|| format!("Expected uint for UInt16, got {n}"))?;
            let v = u16::try_from(i).map_err(|_| format!("Value {i} out of range for UInt16"))?;
            Ok(FillValue::Value(ZarrValue::UInt16(v)))
        }
        DataType::UInt32 => {
            let i = n
                .as_u64()
                .ok_or_else(|| format!("Expected uint for UInt32, got {n}"))?;
            let v = u32::try_from(i).map_err(|_| format!("Value {i} out of range for UInt32"))?;
            Ok(FillValue::Value(ZarrValue::UInt32(v)))
        }
        DataType::UInt64 => {
            let i = n
                .as_u64()
                .ok_or_else(|| format!("Expected uint for UInt64, got {n}"))?;
            Ok(FillValue::Value(ZarrValue::UInt64(i)))
        }
        DataType::Float16 => {
            let f = n
                .as_f64()
                .ok_or_else(|| format!("Expected float for Float16, got {n}"))?;
            Ok(FillValue::Value(ZarrValue::Float16(f16::from_f64(f))))
        }
        DataType::Float32 => {
            let f = n
                .as_f64()
                .ok_or_else(|| format!("Expected float for Float32, got {n}"))?;
            Ok(FillValue::Value(ZarrValue::Float32(f as f32)))
        }
        DataType::Float64 => {
            let f = n
                .as_f64()
                .ok_or_else(|| format!("Expected float for Float64, got {n}"))?;
            Ok(FillValue::Value(ZarrValue::Float64(f)))
        }
        DataType::Complex64 => {
            let f = n
                .as_f64()
                .ok_or_else(|| format!("Expected float for Complex64, got {n}"))?;
            Ok(FillValue::Value(ZarrValue::Complex64(Complex::new(
                f as f32, 0.0,
            ))))
        }
        DataType::Complex128 => {
            let f = n
                .as_f64()
                .ok_or_else(|| format!("Expected float for Complex128, got {n}"))?;
            Ok(FillValue::Value(ZarrValue::Complex128(Complex::new(f, 0.0))))
        }
        DataType::Bool => {
            let i = n
                .as_i64()
                .ok_or_else(|| format!("Expected int for Bool, got {n}"))?;
            Ok(FillValue::Value(ZarrValue::Bool(i != 0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::bytes::BytesCodec;
    use crate::types::Endian;
    use serde_json::json;

    fn sample() -> ArrayMetadata {
        ArrayMetadata::new(
            vec![16, 16],
            vec![4, 4],
            DataType::Int32,
            FillValue::Value(ZarrValue::Int32(7)),
            vec![CodecConfig::Bytes(BytesCodec::new(Endian::Little))],
        )
        .unwrap()
    }

    #[test]
    fn document_round_trip() {
        let metadata = sample();
        let value = metadata.to_json_value().unwrap();
        assert_eq!(value["zarr_format"], json!(3));
        assert_eq!(value["data_type"], json!("int32"));
        let back = ArrayMetadata::from_json_value(&value).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn identically_configured_arrays_have_equal_documents() {
        let a = sample().with_attributes(
            [("units".to_string(), json!("kelvin"))].into_iter().collect(),
        );
        let b = sample().with_attributes(
            [("units".to_string(), json!("kelvin"))].into_iter().collect(),
        );
        assert_eq!(a, b);
        assert_eq!(a.to_json_value().unwrap(), b.to_json_value().unwrap());

        let mut c = sample();
        c.codecs
            .push(CodecConfig::Crc32c(crate::codecs::crc32c::Crc32cCodec::new()));
        assert_ne!(sample(), c);
    }

    #[test]
    fn rank_mismatch_is_rejected() {
        let err = ArrayMetadata::new(
            vec![4, 4],
            vec![4],
            DataType::Int32,
            FillValue::Value(ZarrValue::Int32(0)),
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, ZarrError::Metadata(_)));
    }

    #[test]
    fn nan_fill_round_trips_for_floats_only() {
        assert_eq!(
            parse_fill_value(DataType::Float32, &json!("NaN")).unwrap(),
            FillValue::NaN
        );
        assert!(parse_fill_value(DataType::Int32, &json!("NaN")).is_err());
        assert_eq!(fill_value_to_json(&FillValue::NaN), json!("NaN"));
    }

    #[test]
    fn chunk_grid_shape_rounds_up() {
        let m = ArrayMetadata::new(
            vec![10, 7],
            vec![4, 4],
            DataType::UInt8,
            FillValue::Value(ZarrValue::UInt8(0)),
            vec![CodecConfig::Bytes(BytesCodec { endian: None })],
        )
        .unwrap();
        assert_eq!(m.chunk_grid_shape(), vec![3, 2]);
    }
}
