use futures::future::BoxFuture;

use crate::codecs::bytes::BytesCodec;
use crate::codecs::sharding::ShardingPipeline;
use crate::codecs::transpose::TransposeCodec;
use crate::codecs::{CodecConfig, CodecKind};
use crate::error::{ZarrError, ZarrResult};
use crate::store::StorageBackend;
use crate::types::{fill_chunk, DataType, ZarrValue, ZarrVectorValue};

// ---------------------------------------------------------------------------
// ChunkRepresentation
// ---------------------------------------------------------------------------

/// Shape, element type and fill value of the chunk a pipeline operates on.
/// Fixed at pipeline construction; the declared shape evolves through
/// array→array stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRepresentation {
    pub shape: Vec<usize>,
    pub data_type: DataType,
    pub fill: ZarrValue,
}

impl ChunkRepresentation {
    pub fn new(shape: Vec<usize>, data_type: DataType, fill: ZarrValue) -> ZarrResult<Self> {
        if shape.is_empty() || shape.iter().any(|&d| d == 0) {
            return Err(ZarrError::Configuration(format!(
                "Chunk shape {shape:?} must have rank >= 1 with positive dimensions"
            )));
        }
        if fill.data_type() != data_type {
            return Err(ZarrError::Configuration(format!(
                "Fill value {fill:?} does not match data type {data_type}"
            )));
        }
        Ok(Self {
            shape,
            data_type,
            fill,
        })
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

// ---------------------------------------------------------------------------
// CodecPipeline
// ---------------------------------------------------------------------------

/// The single array→bytes stage of a pipeline. The sharding variant is
/// itself a nested chunk store wrapping another pipeline.
#[derive(Debug, Clone)]
pub enum ArrayToBytesStage {
    Bytes(BytesCodec),
    Sharding(ShardingPipeline),
}

/// A validated, executable codec pipeline for one chunk shape/dtype:
/// array→array codecs in listed order, one array→bytes codec, then
/// bytes→bytes codecs in listed order. Decode is the exact inverse in
/// reverse order.
#[derive(Debug, Clone)]
pub struct CodecPipeline {
    transposes: Vec<TransposeCodec>,
    stage: ArrayToBytesStage,
    post: Vec<CodecConfig>,
    repr: ChunkRepresentation,
}

impl CodecPipeline {
    /// Validate an ordered codec list against a chunk representation and
    /// build the executable pipeline. All composition errors are raised
    /// here, never at I/O time.
    pub fn from_configs(
        configs: &[CodecConfig],
        repr: ChunkRepresentation,
    ) -> ZarrResult<CodecPipeline> {
        let rank = repr.shape.len();
        let mut transposes: Vec<TransposeCodec> = Vec::new();
        let mut stage: Option<ArrayToBytesStage> = None;
        let mut post: Vec<CodecConfig> = Vec::new();
        let mut shape = repr.shape.clone();

        for config in configs {
            match config.kind() {
                CodecKind::ArrayToArray => {
                    if stage.is_some() {
                        return Err(ZarrError::Configuration(format!(
                            "Array-to-array codec {} placed after the array-to-bytes codec",
                            config.codec_id()
                        )));
                    }
                    let CodecConfig::Transpose(t) = config else {
                        unreachable!("transpose is the only array-to-array codec");
                    };
                    t.validate(rank)?;
                    shape = t.permuted_shape(&shape);
                    transposes.push(t.clone());
                }
                CodecKind::ArrayToBytes => {
                    if stage.is_some() {
                        return Err(ZarrError::Configuration(format!(
                            "Multiple array-to-bytes codecs in one pipeline ({})",
                            config.codec_id()
                        )));
                    }
                    stage = Some(match config {
                        CodecConfig::Bytes(b) => {
                            b.resolve_endian(repr.data_type)?;
                            ArrayToBytesStage::Bytes(b.clone())
                        }
                        CodecConfig::Sharding(cfg) => {
                            let staged_repr = ChunkRepresentation::new(
                                shape.clone(),
                                repr.data_type,
                                repr.fill.clone(),
                            )?;
                            ArrayToBytesStage::Sharding(ShardingPipeline::new(cfg, staged_repr)?)
                        }
                        _ => unreachable!("bytes and sharding are the array-to-bytes codecs"),
                    });
                }
                CodecKind::BytesToBytes => {
                    if stage.is_none() {
                        return Err(ZarrError::Configuration(format!(
                            "Bytes-to-bytes codec {} placed before the array-to-bytes codec",
                            config.codec_id()
                        )));
                    }
                    post.push(config.clone());
                }
            }
        }

        let stage = stage.ok_or_else(|| {
            ZarrError::Configuration("Incomplete pipeline: no array-to-bytes codec".into())
        })?;

        Ok(CodecPipeline {
            transposes,
            stage,
            post,
            repr,
        })
    }

    /// True when random access into sub-chunks can skip a full decode: the
    /// array→bytes stage is a sharding codec with no bytes→bytes codec after
    /// it and no axis reordering in front of it.
    pub fn supports_partial_decode(&self) -> bool {
        matches!(self.stage, ArrayToBytesStage::Sharding(_))
            && self.post.is_empty()
            && self.transposes.is_empty()
    }

    fn check_input(&self, chunk: &ZarrVectorValue) -> ZarrResult<()> {
        if chunk.data_type() != self.repr.data_type {
            return Err(ZarrError::TypeConversion(format!(
                "Chunk of {} given to a {} pipeline",
                chunk.data_type(),
                self.repr.data_type
            )));
        }
        if chunk.len() != self.repr.element_count() {
            return Err(ZarrError::Encode(format!(
                "Chunk has {} elements, expected {} for shape {:?}",
                chunk.len(),
                self.repr.element_count(),
                self.repr.shape
            )));
        }
        Ok(())
    }

    /// Encode one typed chunk into its stored byte form.
    ///
    /// Boxed future so a sharding stage can recursively drive inner
    /// pipelines.
    pub fn encode<'a>(&'a self, chunk: ZarrVectorValue) -> BoxFuture<'a, ZarrResult<Vec<u8>>> {
        Box::pin(async move {
            self.check_input(&chunk)?;
            let mut value = chunk;
            let mut shape = self.repr.shape.clone();
            for t in &self.transposes {
                value = t.encode(&value, &shape);
                shape = t.permuted_shape(&shape);
            }
            let mut buf = match &self.stage {
                ArrayToBytesStage::Bytes(b) => b.encode(&value)?,
                ArrayToBytesStage::Sharding(sp) => sp.encode(&value).await?,
            };
            for codec in &self.post {
                buf = codec.encode_bytes(&buf).await?;
            }
            Ok(buf)
        })
    }

    /// Decode stored bytes back into the typed chunk.
    pub fn decode<'a>(&'a self, data: Vec<u8>) -> BoxFuture<'a, ZarrResult<ZarrVectorValue>> {
        Box::pin(async move {
            let mut buf = data;
            for codec in self.post.iter().rev() {
                buf = codec.decode_bytes(&buf).await?;
            }
            let mut value = match &self.stage {
                ArrayToBytesStage::Bytes(b) => {
                    b.decode(&buf, self.repr.data_type, self.repr.element_count())?
                }
                ArrayToBytesStage::Sharding(sp) => sp.decode(&buf).await?,
            };
            // Undo transposes in reverse, tracking the shape each stage saw.
            let mut shapes = vec![self.repr.shape.clone()];
            for t in &self.transposes {
                let last = shapes.last().cloned().unwrap_or_default();
                shapes.push(t.permuted_shape(&last));
            }
            for (t, shape) in self.transposes.iter().zip(shapes.iter()).rev() {
                value = t.decode(&value, shape);
            }
            Ok(value)
        })
    }

    /// Decode the sub-chunks at `coords` of a stored shard, reading only the
    /// shard index and the requested entries where the layout permits.
    ///
    /// Falls back to fetching the whole object and a full decode when the
    /// pipeline cannot do less-than-whole-chunk I/O; the results are
    /// identical. Errors if the pipeline has no sharding stage.
    pub async fn decode_inner_chunks(
        &self,
        store: &dyn StorageBackend,
        key: &str,
        coords: &[Vec<usize>],
    ) -> ZarrResult<Vec<ZarrVectorValue>> {
        let ArrayToBytesStage::Sharding(sp) = &self.stage else {
            return Err(ZarrError::Configuration(
                "Partial decode requested on a pipeline without a sharding codec".into(),
            ));
        };

        if self.supports_partial_decode() {
            return sp.decode_partial(store, key, coords).await;
        }

        // Fallback: whole-object read, then slice the requested sub-chunks
        // out of the decoded shard (still in the staged axis order).
        match store.get(key).await? {
            None => Ok(coords.iter().map(|_| sp.fill_sub_chunk()).collect()),
            Some(bytes) => {
                let mut buf = bytes.to_vec();
                for codec in self.post.iter().rev() {
                    buf = codec.decode_bytes(&buf).await?;
                }
                let shard = sp.decode(&buf).await?;
                sp.extract_sub_chunks(&shard, coords)
            }
        }
    }

    /// All-fill chunk used when the stored object is absent.
    pub fn fill_chunk_value(&self) -> ZarrVectorValue {
        fill_chunk(&self.repr.fill, &self.repr.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::crc32c::Crc32cCodec;
    use crate::codecs::gzip::GzipCodec;
    use crate::types::Endian;

    fn repr(shape: &[usize]) -> ChunkRepresentation {
        ChunkRepresentation::new(shape.to_vec(), DataType::Int32, ZarrValue::Int32(0)).unwrap()
    }

    fn bytes_le() -> CodecConfig {
        CodecConfig::Bytes(BytesCodec::new(Endian::Little))
    }

    #[test]
    fn rejects_pipeline_without_array_to_bytes() {
        let err = CodecPipeline::from_configs(
            &[CodecConfig::Gzip(GzipCodec::default())],
            repr(&[2, 2]),
        )
        .unwrap_err();
        assert!(matches!(err, ZarrError::Configuration(_)));
    }

    #[test]
    fn rejects_two_array_to_bytes_codecs() {
        let err = CodecPipeline::from_configs(&[bytes_le(), bytes_le()], repr(&[2, 2]))
            .unwrap_err();
        assert!(err.to_string().contains("Multiple array-to-bytes"));
    }

    #[test]
    fn rejects_array_to_array_after_array_to_bytes() {
        let err = CodecPipeline::from_configs(
            &[
                bytes_le(),
                CodecConfig::Transpose(TransposeCodec::new(vec![1, 0])),
            ],
            repr(&[2, 2]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("after the array-to-bytes"));
    }

    #[test]
    fn rejects_bytes_to_bytes_before_array_to_bytes() {
        let err = CodecPipeline::from_configs(
            &[CodecConfig::Gzip(GzipCodec::default()), bytes_le()],
            repr(&[2, 2]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("before the array-to-bytes"));
    }

    #[test]
    fn rejects_bad_permutation() {
        let err = CodecPipeline::from_configs(
            &[
                CodecConfig::Transpose(TransposeCodec::new(vec![0, 0])),
                bytes_le(),
            ],
            repr(&[2, 2]),
        )
        .unwrap_err();
        assert!(matches!(err, ZarrError::Configuration(_)));
    }

    #[test]
    fn rejects_omitted_endian_for_multibyte_type() {
        let err = CodecPipeline::from_configs(
            &[CodecConfig::Bytes(BytesCodec { endian: None })],
            repr(&[2, 2]),
        )
        .unwrap_err();
        assert!(matches!(err, ZarrError::Configuration(_)));
    }

    #[tokio::test]
    async fn round_trip_transpose_bytes_gzip_crc32c() {
        let pipeline = CodecPipeline::from_configs(
            &[
                CodecConfig::Transpose(TransposeCodec::new(vec![1, 0])),
                bytes_le(),
                CodecConfig::Gzip(GzipCodec::default()),
                CodecConfig::Crc32c(Crc32cCodec::new()),
            ],
            repr(&[4, 6]),
        )
        .unwrap();
        let chunk = ZarrVectorValue::VInt32((0..24).collect());
        let encoded = pipeline.encode(chunk.clone()).await.unwrap();
        let decoded = pipeline.decode(encoded).await.unwrap();
        assert_eq!(decoded, chunk);
    }

    #[tokio::test]
    async fn decode_rejects_truncated_buffer() {
        let pipeline = CodecPipeline::from_configs(&[bytes_le()], repr(&[2, 2])).unwrap();
        let err = pipeline.decode(vec![0u8; 10]).await.unwrap_err();
        assert!(err.is_integrity());
    }
}
