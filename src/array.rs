use std::sync::Arc;

use crate::codecs::pipeline::{ChunkRepresentation, CodecPipeline};
use crate::error::{ZarrError, ZarrResult};
use crate::metadata::ArrayMetadata;
use crate::store::StorageBackend;
use crate::types::{cartesian_indices, fill_chunk, strides, ZarrVectorValue};
use bytes::Bytes;

pub const METADATA_KEY: &str = "zarr.json";

// ---------------------------------------------------------------------------
// ZarrArray
// ---------------------------------------------------------------------------

/// Handle to one stored array: metadata, its validated codec pipeline, and
/// the key derivation that maps chunk coordinates onto the backing store.
#[derive(Clone)]
pub struct ZarrArray {
    store: Arc<dyn StorageBackend>,
    path: String,
    metadata: ArrayMetadata,
    pipeline: Arc<CodecPipeline>,
}

impl std::fmt::Debug for ZarrArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZarrArray")
            .field("path", &self.path)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl ZarrArray {
    fn build(
        store: Arc<dyn StorageBackend>,
        path: String,
        metadata: ArrayMetadata,
    ) -> ZarrResult<Self> {
        let repr = ChunkRepresentation::new(
            metadata.chunk_shape.clone(),
            metadata.data_type,
            metadata.fill_value.to_zarr_value(metadata.data_type),
        )?;
        let pipeline = Arc::new(CodecPipeline::from_configs(&metadata.codecs, repr)?);
        Ok(Self {
            store,
            path,
            metadata,
            pipeline,
        })
    }

    /// Create a new array: validate the metadata and codec pipeline (fail
    /// fast, before any chunk I/O), then persist the metadata document.
    pub async fn create(
        store: Arc<dyn StorageBackend>,
        path: impl Into<String>,
        metadata: ArrayMetadata,
    ) -> ZarrResult<Self> {
        let path = path.into();
        let array = Self::build(store, path, metadata)?;
        let key = array.store.join(&array.path, METADATA_KEY);
        let doc = array.metadata.to_bytes()?;
        array.store.put(&key, Bytes::from(doc)).await?;
        Ok(array)
    }

    /// Open an existing array from its stored metadata document.
    pub async fn open(
        store: Arc<dyn StorageBackend>,
        path: impl Into<String>,
    ) -> ZarrResult<Self> {
        let path = path.into();
        let key = store.join(&path, METADATA_KEY);
        let raw = store
            .get(&key)
            .await?
            .ok_or_else(|| ZarrError::NotFound(format!("No array metadata at {key}")))?;
        let metadata = ArrayMetadata::from_bytes(&raw)?;
        Self::build(store, path, metadata)
    }

    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    pub fn pipeline(&self) -> &CodecPipeline {
        &self.pipeline
    }

    fn check_chunk_coord(&self, coord: &[usize]) -> ZarrResult<()> {
        let grid = self.metadata.chunk_grid_shape();
        if coord.len() != grid.len() || coord.iter().zip(grid.iter()).any(|(c, g)| c >= g) {
            return Err(ZarrError::Configuration(format!(
                "Chunk coordinate {coord:?} outside chunk grid {grid:?}"
            )));
        }
        Ok(())
    }

    /// Store key for a chunk coordinate, using the default V3 encoding:
    /// `<path>/c<sep><i0><sep><i1>...`. Deterministic and collision-free
    /// across distinct coordinates of the same array.
    pub fn chunk_key(&self, coord: &[usize]) -> ZarrResult<String> {
        self.check_chunk_coord(coord)?;
        let sep = self.metadata.chunk_key_separator;
        let mut name = String::from("c");
        for index in coord {
            name.push(sep);
            name.push_str(&index.to_string());
        }
        Ok(self.store.join(&self.path, &name))
    }

    /// Read one chunk. An absent key is not an error: it decodes to an
    /// all-fill-value chunk without invoking any codec.
    pub async fn read_chunk(&self, coord: &[usize]) -> ZarrResult<ZarrVectorValue> {
        let key = self.chunk_key(coord)?;
        match self.store.get(&key).await? {
            None => Ok(self.pipeline.fill_chunk_value()),
            Some(raw) => self
                .pipeline
                .decode(raw.to_vec())
                .await
                .map_err(|e| chunk_context(e, coord)),
        }
    }

    /// Write one chunk wholesale. A chunk entirely equal to the fill value
    /// erases the key instead, so unwritten and fill-only chunks are
    /// indistinguishable (both read back as fill).
    pub async fn write_chunk(&self, coord: &[usize], chunk: ZarrVectorValue) -> ZarrResult<()> {
        let key = self.chunk_key(coord)?;
        let fill = self
            .metadata
            .fill_value
            .to_zarr_value(self.metadata.data_type);
        if chunk.all_equal(&fill) {
            return self.store.delete(&key).await;
        }
        let encoded = self
            .pipeline
            .encode(chunk)
            .await
            .map_err(|e| chunk_context(e, coord))?;
        self.store.put(&key, Bytes::from(encoded)).await
    }

    /// Read a single sub-chunk of a sharded chunk; see
    /// [`Self::read_inner_chunks`].
    pub async fn read_inner_chunk(
        &self,
        coord: &[usize],
        inner: &[usize],
    ) -> ZarrResult<ZarrVectorValue> {
        let mut chunks = self.read_inner_chunks(coord, &[inner.to_vec()]).await?;
        chunks
            .pop()
            .ok_or_else(|| ZarrError::Other("Empty partial decode result".into()))
    }

    /// Random access into a sharded chunk: decode only the requested
    /// sub-chunks, using byte-range reads against the shard index when the
    /// codec stack permits. Errors if the array is not sharded.
    pub async fn read_inner_chunks(
        &self,
        coord: &[usize],
        inner: &[Vec<usize>],
    ) -> ZarrResult<Vec<ZarrVectorValue>> {
        let key = self.chunk_key(coord)?;
        self.pipeline
            .decode_inner_chunks(self.store.as_ref(), &key, inner)
            .await
            .map_err(|e| chunk_context(e, coord))
    }

    /// Partition a whole-array value into chunks and write them all,
    /// one concurrent task per chunk.
    pub async fn store_array(&self, data: &ZarrVectorValue) -> ZarrResult<()> {
        let total: usize = self.metadata.shape.iter().product();
        if data.len() != total {
            return Err(ZarrError::Encode(format!(
                "Array data has {} elements, expected {total} for shape {:?}",
                data.len(),
                self.metadata.shape
            )));
        }

        let handles: Vec<_> = cartesian_indices(&self.metadata.chunk_grid_shape())
            .into_iter()
            .map(|coord| {
                let array = self.clone();
                let chunk = match self.chunk_at(data, &coord) {
                    Ok(chunk) => chunk,
                    Err(e) => return tokio::spawn(async move { Err(e) }),
                };
                tokio::spawn(async move { array.write_chunk(&coord, chunk).await })
            })
            .collect();

        join_all_chunks(handles).await
    }

    /// Load the full array into a flat row-major `Vec<f64>`, fetching all
    /// chunks concurrently.
    pub async fn load(&self) -> ZarrResult<Vec<f64>> {
        let handles: Vec<_> = cartesian_indices(&self.metadata.chunk_grid_shape())
            .into_iter()
            .map(|coord| {
                let array = self.clone();
                tokio::spawn(async move {
                    let chunk = array.read_chunk(&coord).await?;
                    Ok::<_, ZarrError>((coord, chunk))
                })
            })
            .collect();

        let fill = self
            .metadata
            .fill_value
            .to_zarr_value(self.metadata.data_type)
            .to_f64();
        let total: usize = self.metadata.shape.iter().product();
        let mut result = vec![fill; total];
        let arr_strides = strides(&self.metadata.shape);

        for handle in handles {
            let (coord, chunk) = handle
                .await
                .map_err(|e| ZarrError::Other(format!("Task join error: {e}")))??;
            let chunk_data = chunk.to_f64_vec();
            for (local_idx, local_pos) in
                cartesian_indices(&self.metadata.chunk_shape).iter().enumerate()
            {
                let global: Vec<usize> = local_pos
                    .iter()
                    .zip(coord.iter())
                    .zip(self.metadata.chunk_shape.iter())
                    .map(|((lp, ci), cs)| ci * cs + lp)
                    .collect();
                let in_bounds = global
                    .iter()
                    .zip(self.metadata.shape.iter())
                    .all(|(g, s)| *g < *s);
                if in_bounds {
                    let flat: usize =
                        global.iter().zip(arr_strides.iter()).map(|(g, s)| g * s).sum();
                    result[flat] = chunk_data[local_idx];
                }
            }
        }
        Ok(result)
    }

    /// Cut the chunk at `coord` out of a whole-array value, padding edge
    /// chunks with the fill value.
    fn chunk_at(&self, data: &ZarrVectorValue, coord: &[usize]) -> ZarrResult<ZarrVectorValue> {
        let shape = &self.metadata.shape;
        let chunk_shape = &self.metadata.chunk_shape;
        let origin: Vec<usize> = coord
            .iter()
            .zip(chunk_shape.iter())
            .map(|(c, s)| c * s)
            .collect();
        let overlap: Vec<usize> = origin
            .iter()
            .zip(chunk_shape.iter())
            .zip(shape.iter())
            .map(|((o, c), s)| (*c).min(s - o))
            .collect();

        let block = data.extract_block(shape, &origin, &overlap);
        if overlap == *chunk_shape {
            return Ok(block);
        }
        let fill = self
            .metadata
            .fill_value
            .to_zarr_value(self.metadata.data_type);
        let mut chunk = fill_chunk(&fill, chunk_shape);
        chunk.write_block(chunk_shape, &vec![0; chunk_shape.len()], &overlap, &block)?;
        Ok(chunk)
    }
}

/// Attach the chunk coordinate to pipeline errors so failures localize.
fn chunk_context(e: ZarrError, coord: &[usize]) -> ZarrError {
    match e {
        ZarrError::Integrity(msg) => {
            ZarrError::Integrity(format!("Chunk {coord:?}: {msg}"))
        }
        ZarrError::Decompression(msg) => {
            ZarrError::Decompression(format!("Chunk {coord:?}: {msg}"))
        }
        other => other,
    }
}

async fn join_all_chunks(handles: Vec<tokio::task::JoinHandle<ZarrResult<()>>>) -> ZarrResult<()> {
    for handle in handles {
        handle
            .await
            .map_err(|e| ZarrError::Other(format!("Task join error: {e}")))??;
    }
    Ok(())
}
