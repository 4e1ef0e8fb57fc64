use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use half::f16;
use num_complex::Complex;
use std::io::Cursor;

use crate::error::{ZarrError, ZarrResult};

// ---------------------------------------------------------------------------
// Endian
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

// ---------------------------------------------------------------------------
// DataType
// ---------------------------------------------------------------------------

/// Fixed-width element types. Every variant has a known byte width; there are
/// no variable-length kinds in this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl DataType {
    /// Number of bytes per element.
    pub fn byte_size(&self) -> usize {
        match self {
            DataType::Bool | DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 | DataType::Float16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 | DataType::Complex64 => 8,
            DataType::Complex128 => 16,
        }
    }

    /// Stable lowercase name used in metadata documents.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Float16 => "float16",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Complex64 => "complex64",
            DataType::Complex128 => "complex128",
        }
    }

    /// Parse a metadata name. Unknown names are a metadata error, never a
    /// silent fallback.
    pub fn parse(name: &str) -> ZarrResult<Self> {
        match name {
            "bool" => Ok(DataType::Bool),
            "int8" => Ok(DataType::Int8),
            "int16" => Ok(DataType::Int16),
            "int32" => Ok(DataType::Int32),
            "int64" => Ok(DataType::Int64),
            "uint8" => Ok(DataType::UInt8),
            "uint16" => Ok(DataType::UInt16),
            "uint32" => Ok(DataType::UInt32),
            "uint64" => Ok(DataType::UInt64),
            "float16" => Ok(DataType::Float16),
            "float32" => Ok(DataType::Float32),
            "float64" => Ok(DataType::Float64),
            "complex64" => Ok(DataType::Complex64),
            "complex128" => Ok(DataType::Complex128),
            other => Err(ZarrError::Metadata(format!("Unknown data type: {other}"))),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// ZarrValue  (scalar)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ZarrValue {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float16(f16),
    Float32(f32),
    Float64(f64),
    Complex64(Complex<f32>),
    Complex128(Complex<f64>),
}

impl ZarrValue {
    /// Return the [`DataType`] that this value belongs to.
    pub fn data_type(&self) -> DataType {
        match self {
            ZarrValue::Bool(_) => DataType::Bool,
            ZarrValue::Int8(_) => DataType::Int8,
            ZarrValue::Int16(_) => DataType::Int16,
            ZarrValue::Int32(_) => DataType::Int32,
            ZarrValue::Int64(_) => DataType::Int64,
            ZarrValue::UInt8(_) => DataType::UInt8,
            ZarrValue::UInt16(_) => DataType::UInt16,
            ZarrValue::UInt32(_) => DataType::UInt32,
            ZarrValue::UInt64(_) => DataType::UInt64,
            ZarrValue::Float16(_) => DataType::Float16,
            ZarrValue::Float32(_) => DataType::Float32,
            ZarrValue::Float64(_) => DataType::Float64,
            ZarrValue::Complex64(_) => DataType::Complex64,
            ZarrValue::Complex128(_) => DataType::Complex128,
        }
    }

    /// Lossily convert this scalar to `f64`.
    pub fn to_f64(&self) -> f64 {
        match self {
            ZarrValue::Bool(true) => 1.0,
            ZarrValue::Bool(false) => 0.0,
            ZarrValue::Int8(v) => *v as f64,
            ZarrValue::Int16(v) => *v as f64,
            ZarrValue::Int32(v) => *v as f64,
            ZarrValue::Int64(v) => *v as f64,
            ZarrValue::UInt8(v) => *v as f64,
            ZarrValue::UInt16(v) => *v as f64,
            ZarrValue::UInt32(v) => *v as f64,
            ZarrValue::UInt64(v) => *v as f64,
            ZarrValue::Float16(v) => v.to_f64(),
            ZarrValue::Float32(v) => *v as f64,
            ZarrValue::Float64(v) => *v,
            ZarrValue::Complex64(c) => c.re as f64,
            ZarrValue::Complex128(c) => c.re,
        }
    }
}

// ---------------------------------------------------------------------------
// FillValue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum FillValue {
    Value(ZarrValue),
    NaN,
    Infinity,
    NegativeInfinity,
}

impl FillValue {
    /// Return a concrete [`ZarrValue`] for the given dtype (used when filling
    /// chunks that are absent from storage).
    pub fn to_zarr_value(&self, dtype: DataType) -> ZarrValue {
        match self {
            FillValue::Value(v) if v.data_type() == dtype => v.clone(),
            FillValue::NaN => float_scalar(dtype, f64::NAN),
            FillValue::Infinity => float_scalar(dtype, f64::INFINITY),
            FillValue::NegativeInfinity => float_scalar(dtype, f64::NEG_INFINITY),
            FillValue::Value(_) => default_scalar(dtype),
        }
    }
}

fn float_scalar(dtype: DataType, f: f64) -> ZarrValue {
    match dtype {
        DataType::Float16 => ZarrValue::Float16(f16::from_f64(f)),
        DataType::Float32 => ZarrValue::Float32(f as f32),
        DataType::Float64 => ZarrValue::Float64(f),
        DataType::Complex64 => ZarrValue::Complex64(Complex::new(f as f32, 0.0)),
        DataType::Complex128 => ZarrValue::Complex128(Complex::new(f, 0.0)),
        _ => default_scalar(dtype),
    }
}

/// Default zero/false scalar for a data type.
pub fn default_scalar(dtype: DataType) -> ZarrValue {
    match dtype {
        DataType::Bool => ZarrValue::Bool(false),
        DataType::Int8 => ZarrValue::Int8(0),
        DataType::Int16 => ZarrValue::Int16(0),
        DataType::Int32 => ZarrValue::Int32(0),
        DataType::Int64 => ZarrValue::Int64(0),
        DataType::UInt8 => ZarrValue::UInt8(0),
        DataType::UInt16 => ZarrValue::UInt16(0),
        DataType::UInt32 => ZarrValue::UInt32(0),
        DataType::UInt64 => ZarrValue::UInt64(0),
        DataType::Float16 => ZarrValue::Float16(f16::ZERO),
        DataType::Float32 => ZarrValue::Float32(0.0),
        DataType::Float64 => ZarrValue::Float64(0.0),
        DataType::Complex64 => ZarrValue::Complex64(Complex::new(0.0f32, 0.0)),
        DataType::Complex128 => ZarrValue::Complex128(Complex::new(0.0f64, 0.0)),
    }
}

// ---------------------------------------------------------------------------
// ZarrVectorValue  (typed chunk data)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ZarrVectorValue {
    VBool(Vec<bool>),
    VInt8(Vec<i8>),
    VInt16(Vec<i16>),
    VInt32(Vec<i32>),
    VInt64(Vec<i64>),
    VUInt8(Vec<u8>),
    VUInt16(Vec<u16>),
    VUInt32(Vec<u32>),
    VUInt64(Vec<u64>),
    VFloat16(Vec<f16>),
    VFloat32(Vec<f32>),
    VFloat64(Vec<f64>),
    VComplex64(Vec<Complex<f32>>),
    VComplex128(Vec<Complex<f64>>),
}

/// Rewrap a typed vector after applying a generic `Vec<T> -> Vec<T>` body.
macro_rules! map_typed_vec {
    ($val:expr, |$v:ident| $body:expr) => {
        match $val {
            ZarrVectorValue::VBool($v) => ZarrVectorValue::VBool($body),
            ZarrVectorValue::VInt8($v) => ZarrVectorValue::VInt8($body),
            ZarrVectorValue::VInt16($v) => ZarrVectorValue::VInt16($body),
            ZarrVectorValue::VInt32($v) => ZarrVectorValue::VInt32($body),
            ZarrVectorValue::VInt64($v) => ZarrVectorValue::VInt64($body),
            ZarrVectorValue::VUInt8($v) => ZarrVectorValue::VUInt8($body),
            ZarrVectorValue::VUInt16($v) => ZarrVectorValue::VUInt16($body),
            ZarrVectorValue::VUInt32($v) => ZarrVectorValue::VUInt32($body),
            ZarrVectorValue::VUInt64($v) => ZarrVectorValue::VUInt64($body),
            ZarrVectorValue::VFloat16($v) => ZarrVectorValue::VFloat16($body),
            ZarrVectorValue::VFloat32($v) => ZarrVectorValue::VFloat32($body),
            ZarrVectorValue::VFloat64($v) => ZarrVectorValue::VFloat64($body),
            ZarrVectorValue::VComplex64($v) => ZarrVectorValue::VComplex64($body),
            ZarrVectorValue::VComplex128($v) => ZarrVectorValue::VComplex128($body),
        }
    };
}

impl ZarrVectorValue {
    /// Number of elements in the vector.
    pub fn len(&self) -> usize {
        match self {
            ZarrVectorValue::VBool(v) => v.len(),
            ZarrVectorValue::VInt8(v) => v.len(),
            ZarrVectorValue::VInt16(v) => v.len(),
            ZarrVectorValue::VInt32(v) => v.len(),
            ZarrVectorValue::VInt64(v) => v.len(),
            ZarrVectorValue::VUInt8(v) => v.len(),
            ZarrVectorValue::VUInt16(v) => v.len(),
            ZarrVectorValue::VUInt32(v) => v.len(),
            ZarrVectorValue::VUInt64(v) => v.len(),
            ZarrVectorValue::VFloat16(v) => v.len(),
            ZarrVectorValue::VFloat32(v) => v.len(),
            ZarrVectorValue::VFloat64(v) => v.len(),
            ZarrVectorValue::VComplex64(v) => v.len(),
            ZarrVectorValue::VComplex128(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the [`DataType`] of the elements.
    pub fn data_type(&self) -> DataType {
        match self {
            ZarrVectorValue::VBool(_) => DataType::Bool,
            ZarrVectorValue::VInt8(_) => DataType::Int8,
            ZarrVectorValue::VInt16(_) => DataType::Int16,
            ZarrVectorValue::VInt32(_) => DataType::Int32,
            ZarrVectorValue::VInt64(_) => DataType::Int64,
            ZarrVectorValue::VUInt8(_) => DataType::UInt8,
            ZarrVectorValue::VUInt16(_) => DataType::UInt16,
            ZarrVectorValue::VUInt32(_) => DataType::UInt32,
            ZarrVectorValue::VUInt64(_) => DataType::UInt64,
            ZarrVectorValue::VFloat16(_) => DataType::Float16,
            ZarrVectorValue::VFloat32(_) => DataType::Float32,
            ZarrVectorValue::VFloat64(_) => DataType::Float64,
            ZarrVectorValue::VComplex64(_) => DataType::Complex64,
            ZarrVectorValue::VComplex128(_) => DataType::Complex128,
        }
    }

    /// Lossily convert the entire vector to `Vec<f64>`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            ZarrVectorValue::VBool(v) => v.iter().map(|b| if *b { 1.0 } else { 0.0 }).collect(),
            ZarrVectorValue::VInt8(v) => v.iter().map(|x| *x as f64).collect(),
            ZarrVectorValue::VInt16(v) => v.iter().map(|x| *x as f64).collect(),
            ZarrVectorValue::VInt32(v) => v.iter().map(|x| *x as f64).collect(),
            ZarrVectorValue::VInt64(v) => v.iter().map(|x| *x as f64).collect(),
            ZarrVectorValue::VUInt8(v) => v.iter().map(|x| *x as f64).collect(),
            ZarrVectorValue::VUInt16(v) => v.iter().map(|x| *x as f64).collect(),
            ZarrVectorValue::VUInt32(v) => v.iter().map(|x| *x as f64).collect(),
            ZarrVectorValue::VUInt64(v) => v.iter().map(|x| *x as f64).collect(),
            ZarrVectorValue::VFloat16(v) => v.iter().map(|x| x.to_f64()).collect(),
            ZarrVectorValue::VFloat32(v) => v.iter().map(|x| *x as f64).collect(),
            ZarrVectorValue::VFloat64(v) => v.clone(),
            ZarrVectorValue::VComplex64(v) => v.iter().map(|c| c.re as f64).collect(),
            ZarrVectorValue::VComplex128(v) => v.iter().map(|c| c.re).collect(),
        }
    }

    /// Reorder elements into a new layout: `dest_index[i]` gives, for each
    /// element of the output, the index of the source element to place there.
    pub(crate) fn gather(&self, dest_index: &[usize]) -> ZarrVectorValue {
        map_typed_vec!(self, |v| dest_index.iter().map(|&i| v[i]).collect())
    }

    /// Copy a rectangular block out of this row-major vector.
    /// `shape` is the full shape, `start`/`block_shape` the block placement.
    pub(crate) fn extract_block(
        &self,
        shape: &[usize],
        start: &[usize],
        block_shape: &[usize],
    ) -> ZarrVectorValue {
        let index = block_linear_indices(shape, start, block_shape);
        self.gather(&index)
    }

    /// Write a rectangular block into this row-major vector. The block must
    /// have the same data type as the destination.
    pub(crate) fn write_block(
        &mut self,
        shape: &[usize],
        start: &[usize],
        block_shape: &[usize],
        block: &ZarrVectorValue,
    ) -> ZarrResult<()> {
        let index = block_linear_indices(shape, start, block_shape);
        macro_rules! scatter {
            ($dst:expr, $src:expr) => {{
                for (src_pos, &dst_pos) in index.iter().enumerate() {
                    $dst[dst_pos] = $src[src_pos];
                }
                Ok(())
            }};
        }
        match (self, block) {
            (ZarrVectorValue::VBool(d), ZarrVectorValue::VBool(s)) => scatter!(d, s),
            (ZarrVectorValue::VInt8(d), ZarrVectorValue::VInt8(s)) => scatter!(d, s),
            (ZarrVectorValue::VInt16(d), ZarrVectorValue::VInt16(s)) => scatter!(d, s),
            (ZarrVectorValue::VInt32(d), ZarrVectorValue::VInt32(s)) => scatter!(d, s),
            (ZarrVectorValue::VInt64(d), ZarrVectorValue::VInt64(s)) => scatter!(d, s),
            (ZarrVectorValue::VUInt8(d), ZarrVectorValue::VUInt8(s)) => scatter!(d, s),
            (ZarrVectorValue::VUInt16(d), ZarrVectorValue::VUInt16(s)) => scatter!(d, s),
            (ZarrVectorValue::VUInt32(d), ZarrVectorValue::VUInt32(s)) => scatter!(d, s),
            (ZarrVectorValue::VUInt64(d), ZarrVectorValue::VUInt64(s)) => scatter!(d, s),
            (ZarrVectorValue::VFloat16(d), ZarrVectorValue::VFloat16(s)) => scatter!(d, s),
            (ZarrVectorValue::VFloat32(d), ZarrVectorValue::VFloat32(s)) => scatter!(d, s),
            (ZarrVectorValue::VFloat64(d), ZarrVectorValue::VFloat64(s)) => scatter!(d, s),
            (ZarrVectorValue::VComplex64(d), ZarrVectorValue::VComplex64(s)) => scatter!(d, s),
            (ZarrVectorValue::VComplex128(d), ZarrVectorValue::VComplex128(s)) => scatter!(d, s),
            (dst, _) => Err(ZarrError::TypeConversion(format!(
                "Cannot write {:?} block into {:?} chunk",
                block.data_type(),
                dst.data_type()
            ))),
        }
    }

    /// True if every element equals the given scalar. Floats compare bitwise
    /// so a NaN fill value still matches a NaN-filled chunk.
    pub fn all_equal(&self, scalar: &ZarrValue) -> bool {
        match (self, scalar) {
            (ZarrVectorValue::VBool(v), ZarrValue::Bool(s)) => v.iter().all(|x| x == s),
            (ZarrVectorValue::VInt8(v), ZarrValue::Int8(s)) => v.iter().all(|x| x == s),
            (ZarrVectorValue::VInt16(v), ZarrValue::Int16(s)) => v.iter().all(|x| x == s),
            (ZarrVectorValue::VInt32(v), ZarrValue::Int32(s)) => v.iter().all(|x| x == s),
            (ZarrVectorValue::VInt64(v), ZarrValue::Int64(s)) => v.iter().all(|x| x == s),
            (ZarrVectorValue::VUInt8(v), ZarrValue::UInt8(s)) => v.iter().all(|x| x == s),
            (ZarrVectorValue::VUInt16(v), ZarrValue::UInt16(s)) => v.iter().all(|x| x == s),
            (ZarrVectorValue::VUInt32(v), ZarrValue::UInt32(s)) => v.iter().all(|x| x == s),
            (ZarrVectorValue::VUInt64(v), ZarrValue::UInt64(s)) => v.iter().all(|x| x == s),
            (ZarrVectorValue::VFloat16(v), ZarrValue::Float16(s)) => {
                v.iter().all(|x| x.to_bits() == s.to_bits())
            }
            (ZarrVectorValue::VFloat32(v), ZarrValue::Float32(s)) => {
                v.iter().all(|x| x.to_bits() == s.to_bits())
            }
            (ZarrVectorValue::VFloat64(v), ZarrValue::Float64(s)) => {
                v.iter().all(|x| x.to_bits() == s.to_bits())
            }
            (ZarrVectorValue::VComplex64(v), ZarrValue::Complex64(s)) => v
                .iter()
                .all(|x| x.re.to_bits() == s.re.to_bits() && x.im.to_bits() == s.im.to_bits()),
            (ZarrVectorValue::VComplex128(v), ZarrValue::Complex128(s)) => v
                .iter()
                .all(|x| x.re.to_bits() == s.re.to_bits() && x.im.to_bits() == s.im.to_bits()),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Index math
// ---------------------------------------------------------------------------

/// Row-major strides for an N-dimensional shape (last dimension varies
/// fastest).
pub fn strides(shape: &[usize]) -> Vec<usize> {
    let mut s: Vec<usize> = shape
        .iter()
        .rev()
        .scan(1usize, |state, &dim| {
            let stride = *state;
            *state *= dim;
            Some(stride)
        })
        .collect();
    s.reverse();
    s
}

/// Convert multi-dimensional indices to a flat row-major linear index.
pub fn linear_index(shape: &[usize], indices: &[usize]) -> usize {
    let s = strides(shape);
    indices.iter().zip(s.iter()).map(|(i, s)| i * s).sum()
}

/// Generate all multi-dimensional index tuples within the given shape, in
/// row-major order.
pub fn cartesian_indices(shape: &[usize]) -> Vec<Vec<usize>> {
    if shape.is_empty() {
        return vec![vec![]];
    }
    let first = shape[0];
    let rest = cartesian_indices(&shape[1..]);
    let mut result = Vec::new();
    for i in 0..first {
        for r in &rest {
            let mut v = vec![i];
            v.extend_from_slice(r);
            result.push(v);
        }
    }
    result
}

/// Flat linear indices (into a `shape`-shaped row-major vector) of every
/// element of the block at `start` with shape `block_shape`, in the block's
/// own row-major order.
fn block_linear_indices(shape: &[usize], start: &[usize], block_shape: &[usize]) -> Vec<usize> {
    let outer_strides = strides(shape);
    cartesian_indices(block_shape)
        .into_iter()
        .map(|local| {
            local
                .iter()
                .zip(start.iter())
                .zip(outer_strides.iter())
                .map(|((l, s), stride)| (l + s) * stride)
                .sum()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Raw bytes <-> typed vector
// ---------------------------------------------------------------------------

/// Interpret raw bytes as a typed vector according to `endian` and `dtype`.
/// The buffer length must be an exact multiple of the element width.
pub fn bytes_to_zarr_vector(
    endian: Endian,
    dtype: DataType,
    data: &[u8],
) -> ZarrResult<ZarrVectorValue> {
    let width = dtype.byte_size();
    if data.len() % width != 0 {
        return Err(ZarrError::Integrity(format!(
            "Truncated chunk: {} bytes is not a multiple of element width {width}",
            data.len()
        )));
    }
    match dtype {
        DataType::Bool => Ok(ZarrVectorValue::VBool(
            data.iter().map(|b| *b != 0).collect(),
        )),
        DataType::Int8 => Ok(ZarrVectorValue::VInt8(
            data.iter().map(|b| *b as i8).collect(),
        )),
        DataType::UInt8 => Ok(ZarrVectorValue::VUInt8(data.to_vec())),

        DataType::Int16 => read_vec_typed(
            endian,
            data,
            |c| c.read_i16::<LittleEndian>(),
            |c| c.read_i16::<BigEndian>(),
            ZarrVectorValue::VInt16,
        ),
        DataType::Int32 => read_vec_typed(
            endian,
            data,
            |c| c.read_i32::<LittleEndian>(),
            |c| c.read_i32::<BigEndian>(),
            ZarrVectorValue::VInt32,
        ),
        DataType::Int64 => read_vec_typed(
            endian,
            data,
            |c| c.read_i64::<LittleEndian>(),
            |c| c.read_i64::<BigEndian>(),
            ZarrVectorValue::VInt64,
        ),
        DataType::UInt16 => read_vec_typed(
            endian,
            data,
            |c| c.read_u16::<LittleEndian>(),
            |c| c.read_u16::<BigEndian>(),
            ZarrVectorValue::VUInt16,
        ),
        DataType::UInt32 => read_vec_typed(
            endian,
            data,
            |c| c.read_u32::<LittleEndian>(),
            |c| c.read_u32::<BigEndian>(),
            ZarrVectorValue::VUInt32,
        ),
        DataType::UInt64 => read_vec_typed(
            endian,
            data,
            |c| c.read_u64::<LittleEndian>(),
            |c| c.read_u64::<BigEndian>(),
            ZarrVectorValue::VUInt64,
        ),

        DataType::Float16 => {
            let out = read_u16_vec(endian, data)?;
            Ok(ZarrVectorValue::VFloat16(
                out.into_iter().map(f16::from_bits).collect(),
            ))
        }
        DataType::Float32 => read_vec_typed(
            endian,
            data,
            |c| c.read_f32::<LittleEndian>(),
            |c| c.read_f32::<BigEndian>(),
            ZarrVectorValue::VFloat32,
        ),
        DataType::Float64 => read_vec_typed(
            endian,
            data,
            |c| c.read_f64::<LittleEndian>(),
            |c| c.read_f64::<BigEndian>(),
            ZarrVectorValue::VFloat64,
        ),

        DataType::Complex64 => {
            let parts = match read_vec_typed(
                endian,
                data,
                |c| c.read_f32::<LittleEndian>(),
                |c| c.read_f32::<BigEndian>(),
                ZarrVectorValue::VFloat32,
            )? {
                ZarrVectorValue::VFloat32(p) => p,
                _ => unreachable!(),
            };
            Ok(ZarrVectorValue::VComplex64(
                parts.chunks_exact(2).map(|p| Complex::new(p[0], p[1])).collect(),
            ))
        }
        DataType::Complex128 => {
            let parts = match read_vec_typed(
                endian,
                data,
                |c| c.read_f64::<LittleEndian>(),
                |c| c.read_f64::<BigEndian>(),
                ZarrVectorValue::VFloat64,
            )? {
                ZarrVectorValue::VFloat64(p) => p,
                _ => unreachable!(),
            };
            Ok(ZarrVectorValue::VComplex128(
                parts.chunks_exact(2).map(|p| Complex::new(p[0], p[1])).collect(),
            ))
        }
    }
}

fn read_u16_vec(endian: Endian, data: &[u8]) -> ZarrResult<Vec<u16>> {
    let count = data.len() / 2;
    let mut out = Vec::with_capacity(count);
    let mut cursor = Cursor::new(data);
    for _ in 0..count {
        let bits = match endian {
            Endian::Little => cursor.read_u16::<LittleEndian>(),
            Endian::Big => cursor.read_u16::<BigEndian>(),
        }
        .map_err(|e| ZarrError::Integrity(format!("Failed to read u16: {e}")))?;
        out.push(bits);
    }
    Ok(out)
}

/// Helper: read a vector of a fixed-size numeric type.
fn read_vec_typed<T: Clone, F1, F2>(
    endian: Endian,
    data: &[u8],
    read_le: F1,
    read_be: F2,
    wrap: fn(Vec<T>) -> ZarrVectorValue,
) -> ZarrResult<ZarrVectorValue>
where
    F1: Fn(&mut Cursor<&[u8]>) -> std::io::Result<T>,
    F2: Fn(&mut Cursor<&[u8]>) -> std::io::Result<T>,
{
    let elem_size = std::mem::size_of::<T>();
    let count = data.len() / elem_size;
    let mut out = Vec::with_capacity(count);
    let mut cursor = Cursor::new(data);
    for _ in 0..count {
        let val = match endian {
            Endian::Little => (read_le)(&mut cursor),
            Endian::Big => (read_be)(&mut cursor),
        }
        .map_err(|e| ZarrError::Integrity(format!("Failed to read value: {e}")))?;
        out.push(val);
    }
    Ok(wrap(out))
}

/// Serialize a typed vector into a flat byte buffer with the given byte
/// order. Exact inverse of [`bytes_to_zarr_vector`].
pub fn zarr_vector_to_bytes(endian: Endian, value: &ZarrVectorValue) -> ZarrResult<Vec<u8>> {
    let mut out = Vec::with_capacity(value.len() * value.data_type().byte_size());
    macro_rules! write_all {
        ($vec:expr, $write:ident, $conv:expr) => {{
            for x in $vec {
                match endian {
                    Endian::Little => out.$write::<LittleEndian>($conv(x)),
                    Endian::Big => out.$write::<BigEndian>($conv(x)),
                }
                .map_err(|e| ZarrError::Encode(format!("Failed to write value: {e}")))?;
            }
        }};
    }
    match value {
        ZarrVectorValue::VBool(v) => out.extend(v.iter().map(|b| *b as u8)),
        ZarrVectorValue::VInt8(v) => out.extend(v.iter().map(|x| *x as u8)),
        ZarrVectorValue::VUInt8(v) => out.extend_from_slice(v),
        ZarrVectorValue::VInt16(v) => write_all!(v, write_i16, |x: &i16| *x),
        ZarrVectorValue::VInt32(v) => write_all!(v, write_i32, |x: &i32| *x),
        ZarrVectorValue::VInt64(v) => write_all!(v, write_i64, |x: &i64| *x),
        ZarrVectorValue::VUInt16(v) => write_all!(v, write_u16, |x: &u16| *x),
        ZarrVectorValue::VUInt32(v) => write_all!(v, write_u32, |x: &u32| *x),
        ZarrVectorValue::VUInt64(v) => write_all!(v, write_u64, |x: &u64| *x),
        ZarrVectorValue::VFloat16(v) => write_all!(v, write_u16, |x: &f16| x.to_bits()),
        ZarrVectorValue::VFloat32(v) => write_all!(v, write_f32, |x: &f32| *x),
        ZarrVectorValue::VFloat64(v) => write_all!(v, write_f64, |x: &f64| *x),
        ZarrVectorValue::VComplex64(v) => {
            for c in v {
                for part in [c.re, c.im] {
                    match endian {
                        Endian::Little => out.write_f32::<LittleEndian>(part),
                        Endian::Big => out.write_f32::<BigEndian>(part),
                    }
                    .map_err(|e| ZarrError::Encode(format!("Failed to write value: {e}")))?;
                }
            }
        }
        ZarrVectorValue::VComplex128(v) => {
            for c in v {
                for part in [c.re, c.im] {
                    match endian {
                        Endian::Little => out.write_f64::<LittleEndian>(part),
                        Endian::Big => out.write_f64::<BigEndian>(part),
                    }
                    .map_err(|e| ZarrError::Encode(format!("Failed to write value: {e}")))?;
                }
            }
        }
    }
    Ok(out)
}

/// Create a filled chunk vector by replicating a scalar value.
pub fn fill_chunk(value: &ZarrValue, chunk_shape: &[usize]) -> ZarrVectorValue {
    let total: usize = chunk_shape.iter().product();
    match value {
        ZarrValue::Bool(b) => ZarrVectorValue::VBool(vec![*b; total]),
        ZarrValue::Int8(v) => ZarrVectorValue::VInt8(vec![*v; total]),
        ZarrValue::Int16(v) => ZarrVectorValue::VInt16(vec![*v; total]),
        ZarrValue::Int32(v) => ZarrVectorValue::VInt32(vec![*v; total]),
        ZarrValue::Int64(v) => ZarrVectorValue::VInt64(vec![*v; total]),
        ZarrValue::UInt8(v) => ZarrVectorValue::VUInt8(vec![*v; total]),
        ZarrValue::UInt16(v) => ZarrVectorValue::VUInt16(vec![*v; total]),
        ZarrValue::UInt32(v) => ZarrVectorValue::VUInt32(vec![*v; total]),
        ZarrValue::UInt64(v) => ZarrVectorValue::VUInt64(vec![*v; total]),
        ZarrValue::Float16(v) => ZarrVectorValue::VFloat16(vec![*v; total]),
        ZarrValue::Float32(v) => ZarrVectorValue::VFloat32(vec![*v; total]),
        ZarrValue::Float64(v) => ZarrVectorValue::VFloat64(vec![*v; total]),
        ZarrValue::Complex64(v) => ZarrVectorValue::VComplex64(vec![*v; total]),
        ZarrValue::Complex128(v) => ZarrVectorValue::VComplex128(vec![*v; total]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_typed_bytes() {
        let v = ZarrVectorValue::VInt32(vec![1, -2, 300, -40000]);
        for endian in [Endian::Little, Endian::Big] {
            let raw = zarr_vector_to_bytes(endian, &v).unwrap();
            assert_eq!(raw.len(), 16);
            let back = bytes_to_zarr_vector(endian, DataType::Int32, &raw).unwrap();
            assert_eq!(back, v);
        }
    }

    #[test]
    fn truncated_buffer_is_integrity_error() {
        let err = bytes_to_zarr_vector(Endian::Little, DataType::Int32, &[0u8; 7]).unwrap_err();
        assert!(err.is_integrity());
    }

    #[test]
    fn block_extract_and_write_round_trip() {
        // 4x4 chunk, 2x2 block at (1, 2).
        let chunk = ZarrVectorValue::VInt32((0..16).collect());
        let block = chunk.extract_block(&[4, 4], &[1, 2], &[2, 2]);
        assert_eq!(block, ZarrVectorValue::VInt32(vec![6, 7, 10, 11]));

        let mut dst = fill_chunk(&ZarrValue::Int32(0), &[4, 4]);
        dst.write_block(&[4, 4], &[1, 2], &[2, 2], &block).unwrap();
        let got = dst.extract_block(&[4, 4], &[1, 2], &[2, 2]);
        assert_eq!(got, block);
    }

    #[test]
    fn all_equal_matches_nan_fill() {
        let v = ZarrVectorValue::VFloat32(vec![f32::NAN; 4]);
        assert!(v.all_equal(&ZarrValue::Float32(f32::NAN)));
        assert!(!v.all_equal(&ZarrValue::Float32(0.0)));
    }
}
