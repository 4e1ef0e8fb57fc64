use byteorder::{LittleEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::codecs::crc32c::{Crc32cCodec, CHECKSUM_SIZE};
use crate::codecs::pipeline::{ChunkRepresentation, CodecPipeline};
use crate::codecs::CodecConfig;
use crate::error::{ZarrError, ZarrResult};
use crate::store::{ByteRange, StorageBackend};
use crate::types::{cartesian_indices, fill_chunk, ZarrVectorValue};

/// Index entry value marking a sub-chunk that was never written. Distinct
/// from a present zero-length entry.
pub const ABSENT_SENTINEL: u64 = u64::MAX;

const INDEX_ENTRY_SIZE: usize = 16;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Where the shard index lives relative to the sub-chunk payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexLocation {
    Start,
    #[default]
    End,
}

/// Sharding codec configuration: an inner sub-chunk shape, the codec list
/// applied to every sub-chunk (possibly another sharding codec, recursively),
/// and the index placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShardingConfig {
    pub chunk_shape: Vec<usize>,
    pub codecs: Vec<CodecConfig>,
    #[serde(default)]
    pub index_location: IndexLocation,
}

// ---------------------------------------------------------------------------
// Shard index
// ---------------------------------------------------------------------------

/// Offset/length table for one shard, in row-major sub-chunk grid order.
/// Serialized as u64 little-endian pairs guarded by a trailing CRC-32C.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardIndex {
    entries: Vec<(u64, u64)>,
}

impl ShardIndex {
    fn absent(grid_len: usize) -> Self {
        Self {
            entries: vec![(ABSENT_SENTINEL, ABSENT_SENTINEL); grid_len],
        }
    }

    /// Serialized index size in bytes for a grid of `grid_len` sub-chunks.
    pub fn size_bytes(grid_len: usize) -> usize {
        grid_len * INDEX_ENTRY_SIZE + CHECKSUM_SIZE
    }

    pub fn entry(&self, slot: usize) -> Option<(u64, u64)> {
        match self.entries.get(slot) {
            Some(&(ABSENT_SENTINEL, ABSENT_SENTINEL)) | None => None,
            Some(&entry) => Some(entry),
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::size_bytes(self.entries.len()));
        for (offset, length) in &self.entries {
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&length.to_le_bytes());
        }
        out.extend_from_slice(&crc32c::crc32c(&out).to_le_bytes());
        out
    }

    fn parse(data: &[u8], grid_len: usize) -> ZarrResult<ShardIndex> {
        if data.len() != Self::size_bytes(grid_len) {
            return Err(ZarrError::Integrity(format!(
                "Corrupt shard index: {} bytes, expected {}",
                data.len(),
                Self::size_bytes(grid_len)
            )));
        }
        let payload = Crc32cCodec::new()
            .decode(data)
            .map_err(|e| ZarrError::Integrity(format!("Corrupt shard index: {e}")))?;
        let mut cursor = Cursor::new(payload.as_slice());
        let mut entries = Vec::with_capacity(grid_len);
        for _ in 0..grid_len {
            let offset = cursor
                .read_u64::<LittleEndian>()
                .map_err(|e| ZarrError::Integrity(format!("Corrupt shard index: {e}")))?;
            let length = cursor
                .read_u64::<LittleEndian>()
                .map_err(|e| ZarrError::Integrity(format!("Corrupt shard index: {e}")))?;
            entries.push((offset, length));
        }
        Ok(ShardIndex { entries })
    }
}

// ---------------------------------------------------------------------------
// ShardingPipeline
// ---------------------------------------------------------------------------

/// Executable sharding stage: stores a grid of independently encoded
/// sub-chunks as one outer chunk's payload, with an index enabling random
/// access to any sub-chunk.
#[derive(Debug, Clone)]
pub struct ShardingPipeline {
    sub_chunk_shape: Vec<usize>,
    grid_shape: Vec<usize>,
    index_location: IndexLocation,
    inner: Box<CodecPipeline>,
    repr: ChunkRepresentation,
}

impl ShardingPipeline {
    /// Validate the sub-chunk grid against the outer chunk shape and build
    /// the inner pipeline (recursively; the inner codec list may itself
    /// contain a sharding codec).
    pub fn new(config: &ShardingConfig, repr: ChunkRepresentation) -> ZarrResult<Self> {
        let outer = &repr.shape;
        let sub = &config.chunk_shape;
        if sub.len() != outer.len()
            || sub.iter().any(|&d| d == 0)
            || sub.iter().zip(outer.iter()).any(|(s, o)| o % s != 0)
        {
            return Err(ZarrError::Configuration(format!(
                "Incompatible shard shape: sub-chunks {sub:?} do not evenly partition chunk {outer:?}"
            )));
        }
        let grid_shape: Vec<usize> = outer.iter().zip(sub.iter()).map(|(o, s)| o / s).collect();
        let inner_repr =
            ChunkRepresentation::new(sub.clone(), repr.data_type, repr.fill.clone())?;
        let inner = Box::new(CodecPipeline::from_configs(&config.codecs, inner_repr)?);
        Ok(Self {
            sub_chunk_shape: sub.clone(),
            grid_shape,
            index_location: config.index_location,
            inner,
            repr,
        })
    }

    fn grid_len(&self) -> usize {
        self.grid_shape.iter().product()
    }

    fn index_size(&self) -> usize {
        ShardIndex::size_bytes(self.grid_len())
    }

    /// All-fill sub-chunk for absent entries.
    pub fn fill_sub_chunk(&self) -> ZarrVectorValue {
        fill_chunk(&self.repr.fill, &self.sub_chunk_shape)
    }

    fn check_coord(&self, coord: &[usize]) -> ZarrResult<usize> {
        if coord.len() != self.grid_shape.len()
            || coord.iter().zip(self.grid_shape.iter()).any(|(c, g)| c >= g)
        {
            return Err(ZarrError::Configuration(format!(
                "Sub-chunk coordinate {coord:?} outside shard grid {:?}",
                self.grid_shape
            )));
        }
        Ok(crate::types::linear_index(&self.grid_shape, coord))
    }

    fn origin_of(&self, coord: &[usize]) -> Vec<usize> {
        coord
            .iter()
            .zip(self.sub_chunk_shape.iter())
            .map(|(c, s)| c * s)
            .collect()
    }

    /// Encode a full outer chunk: every sub-chunk not entirely equal to the
    /// fill value goes through the inner pipeline and into the payload; the
    /// rest get the absent sentinel. The index is rebuilt in full on every
    /// encode and placed per the configured location.
    pub async fn encode(&self, chunk: &ZarrVectorValue) -> ZarrResult<Vec<u8>> {
        let grid_len = self.grid_len();
        let index_size = self.index_size();
        let mut index = ShardIndex::absent(grid_len);
        let mut payload: Vec<u8> = Vec::new();
        // Offsets are absolute within the stored shard object, so they are
        // directly usable as store byte ranges.
        let payload_base = match self.index_location {
            IndexLocation::Start => index_size,
            IndexLocation::End => 0,
        };

        for (slot, coord) in cartesian_indices(&self.grid_shape).into_iter().enumerate() {
            let origin = self.origin_of(&coord);
            let sub = chunk.extract_block(&self.repr.shape, &origin, &self.sub_chunk_shape);
            if sub.all_equal(&self.repr.fill) {
                continue;
            }
            let encoded = self.inner.encode(sub).await?;
            index.entries[slot] = ((payload_base + payload.len()) as u64, encoded.len() as u64);
            payload.extend_from_slice(&encoded);
        }

        let index_bytes = index.encode();
        let mut out = Vec::with_capacity(index_size + payload.len());
        match self.index_location {
            IndexLocation::Start => {
                out.extend_from_slice(&index_bytes);
                out.extend_from_slice(&payload);
            }
            IndexLocation::End => {
                out.extend_from_slice(&payload);
                out.extend_from_slice(&index_bytes);
            }
        }
        Ok(out)
    }

    fn index_slice<'a>(&self, data: &'a [u8]) -> ZarrResult<&'a [u8]> {
        let index_size = self.index_size();
        if data.len() < index_size {
            return Err(ZarrError::Integrity(format!(
                "Corrupt shard index: shard of {} bytes cannot hold a {index_size}-byte index",
                data.len()
            )));
        }
        Ok(match self.index_location {
            IndexLocation::Start => &data[..index_size],
            IndexLocation::End => &data[data.len() - index_size..],
        })
    }

    /// Decode a complete shard: parse and verify the index, decode every
    /// present sub-chunk, fill absent slots with the fill value.
    pub async fn decode(&self, data: &[u8]) -> ZarrResult<ZarrVectorValue> {
        let index = ShardIndex::parse(self.index_slice(data)?, self.grid_len())?;
        let mut out = fill_chunk(&self.repr.fill, &self.repr.shape);

        for (slot, coord) in cartesian_indices(&self.grid_shape).into_iter().enumerate() {
            let Some((offset, length)) = index.entry(slot) else {
                continue;
            };
            let sub = self.decode_entry(data, offset, length, &coord).await?;
            out.write_block(
                &self.repr.shape,
                &self.origin_of(&coord),
                &self.sub_chunk_shape,
                &sub,
            )?;
        }
        Ok(out)
    }

    async fn decode_entry(
        &self,
        data: &[u8],
        offset: u64,
        length: u64,
        coord: &[usize],
    ) -> ZarrResult<ZarrVectorValue> {
        let start = usize::try_from(offset)
            .map_err(|_| ZarrError::Integrity("Corrupt shard index: offset overflow".into()))?;
        let end = start
            .checked_add(length as usize)
            .filter(|&e| e <= data.len())
            .ok_or_else(|| {
                ZarrError::Integrity(format!(
                    "Corrupt shard index: entry {offset}+{length} exceeds shard of {} bytes",
                    data.len()
                ))
            })?;
        self.inner
            .decode(data[start..end].to_vec())
            .await
            .map_err(|e| ZarrError::Integrity(format!("Corrupt sub-chunk at {coord:?}: {e}")))
    }

    /// Random access: read only the index and the requested entries via
    /// byte-range reads. Absent entries resolve to the fill value without
    /// touching the store; present entries are fetched concurrently, one
    /// range read per sub-chunk.
    pub async fn decode_partial(
        &self,
        store: &dyn StorageBackend,
        key: &str,
        coords: &[Vec<usize>],
    ) -> ZarrResult<Vec<ZarrVectorValue>> {
        let slots: Vec<usize> = coords
            .iter()
            .map(|c| self.check_coord(c))
            .collect::<ZarrResult<_>>()?;

        let index_range = match self.index_location {
            IndexLocation::Start => ByteRange::Bounded {
                offset: 0,
                length: self.index_size() as u64,
            },
            IndexLocation::End => ByteRange::Suffix {
                length: self.index_size() as u64,
            },
        };
        let Some(index_bytes) = store.get_range(key, index_range).await? else {
            // Whole chunk absent from the store.
            return Ok(coords.iter().map(|_| self.fill_sub_chunk()).collect());
        };
        let index = ShardIndex::parse(&index_bytes, self.grid_len())?;

        let fetches = slots.iter().zip(coords.iter()).map(|(&slot, coord)| {
            let entry = index.entry(slot);
            async move {
                let Some((offset, length)) = entry else {
                    return Ok(self.fill_sub_chunk());
                };
                let range = ByteRange::Bounded { offset, length };
                let bytes = store.get_range(key, range).await?.ok_or_else(|| {
                    ZarrError::Integrity(format!(
                        "Corrupt sub-chunk at {coord:?}: payload range missing from store"
                    ))
                })?;
                self.inner.decode(bytes.to_vec()).await.map_err(|e| {
                    ZarrError::Integrity(format!("Corrupt sub-chunk at {coord:?}: {e}"))
                })
            }
        });
        futures::future::try_join_all(fetches).await
    }

    /// Slice the requested sub-chunks out of an already decoded shard (used
    /// by the whole-chunk fallback path).
    pub fn extract_sub_chunks(
        &self,
        shard: &ZarrVectorValue,
        coords: &[Vec<usize>],
    ) -> ZarrResult<Vec<ZarrVectorValue>> {
        coords
            .iter()
            .map(|coord| {
                self.check_coord(coord)?;
                Ok(shard.extract_block(
                    &self.repr.shape,
                    &self.origin_of(coord),
                    &self.sub_chunk_shape,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::bytes::BytesCodec;
    use crate::types::{DataType, Endian, ZarrValue};

    fn sharding(outer: &[usize], sub: &[usize], location: IndexLocation) -> ShardingPipeline {
        let config = ShardingConfig {
            chunk_shape: sub.to_vec(),
            codecs: vec![CodecConfig::Bytes(BytesCodec::new(Endian::Little))],
            index_location: location,
        };
        let repr = ChunkRepresentation::new(outer.to_vec(), DataType::Int32, ZarrValue::Int32(-1))
            .unwrap();
        ShardingPipeline::new(&config, repr).unwrap()
    }

    #[test]
    fn uneven_sub_chunks_are_rejected() {
        let config = ShardingConfig {
            chunk_shape: vec![3, 2],
            codecs: vec![CodecConfig::Bytes(BytesCodec::new(Endian::Little))],
            index_location: IndexLocation::End,
        };
        let repr =
            ChunkRepresentation::new(vec![4, 4], DataType::Int32, ZarrValue::Int32(0)).unwrap();
        let err = ShardingPipeline::new(&config, repr).unwrap_err();
        assert!(err.to_string().contains("Incompatible shard shape"));
    }

    #[test]
    fn index_round_trip_and_corruption() {
        let index = ShardIndex {
            entries: vec![(0, 10), (ABSENT_SENTINEL, ABSENT_SENTINEL), (10, 4)],
        };
        let raw = index.encode();
        assert_eq!(raw.len(), ShardIndex::size_bytes(3));
        assert_eq!(ShardIndex::parse(&raw, 3).unwrap(), index);

        let mut corrupted = raw.clone();
        corrupted[3] ^= 0x80;
        let err = ShardIndex::parse(&corrupted, 3).unwrap_err();
        assert!(err.to_string().contains("Corrupt shard index"));
    }

    #[tokio::test]
    async fn shard_round_trip_both_locations() {
        let chunk = ZarrVectorValue::VInt32((0..16).collect());
        let mut encodings = Vec::new();
        for location in [IndexLocation::Start, IndexLocation::End] {
            let sp = sharding(&[4, 4], &[2, 2], location);
            let encoded = sp.encode(&chunk).await.unwrap();
            let decoded = sp.decode(&encoded).await.unwrap();
            assert_eq!(decoded, chunk);
            encodings.push(encoded);
        }
        // Same payload content, different placement.
        assert_eq!(encodings[0].len(), encodings[1].len());
    }

    #[tokio::test]
    async fn fill_value_sub_chunks_are_elided() {
        // Upper half all fill (-1): those sub-chunks must be absent.
        let mut values = vec![-1i32; 8];
        values.extend(8..16);
        let chunk = ZarrVectorValue::VInt32(values);
        let sp = sharding(&[4, 4], &[2, 2], IndexLocation::End);
        let encoded = sp.encode(&chunk).await.unwrap();

        let index = ShardIndex::parse(sp.index_slice(&encoded).unwrap(), 4).unwrap();
        assert!(index.entry(0).is_none());
        assert!(index.entry(1).is_none());
        assert!(index.entry(2).is_some());
        assert!(index.entry(3).is_some());

        assert_eq!(sp.decode(&encoded).await.unwrap(), chunk);
    }

    #[tokio::test]
    async fn truncated_payload_fails_index_bounds_check() {
        let chunk = ZarrVectorValue::VInt32((0..16).collect());
        let sp = sharding(&[4, 4], &[2, 2], IndexLocation::Start);
        let mut encoded = sp.encode(&chunk).await.unwrap();
        // Truncate the final sub-chunk's payload; its index entry now points
        // past the end of the shard.
        encoded.truncate(encoded.len() - 4);
        let err = sp.decode(&encoded).await.unwrap_err();
        assert!(err.to_string().contains("exceeds shard"));
    }

    #[tokio::test]
    async fn corrupt_sub_chunk_is_localized_to_its_coordinate() {
        use crate::store::ObjectStoreBackend;

        let config = ShardingConfig {
            chunk_shape: vec![2, 2],
            codecs: vec![
                CodecConfig::Bytes(BytesCodec::new(Endian::Little)),
                CodecConfig::Crc32c(Crc32cCodec::new()),
            ],
            index_location: IndexLocation::Start,
        };
        let repr =
            ChunkRepresentation::new(vec![4, 4], DataType::Int32, ZarrValue::Int32(-1)).unwrap();
        let sp = ShardingPipeline::new(&config, repr).unwrap();

        let chunk = ZarrVectorValue::VInt32((0..16).collect());
        let mut encoded = sp.encode(&chunk).await.unwrap();
        // Index at the start: the first payload byte belongs to sub-chunk
        // (0, 0). Flip it so the inner crc32c check fails there.
        let index_size = ShardIndex::size_bytes(4);
        encoded[index_size] ^= 0xFF;

        let err = sp.decode(&encoded).await.unwrap_err();
        assert!(err.to_string().contains("Corrupt sub-chunk at [0, 0]"));

        // Siblings are unaffected: partial reads of the other sub-chunks
        // still decode, only (0, 0) reports the corruption.
        let store = ObjectStoreBackend::new(Box::new(object_store::memory::InMemory::new()), "");
        store
            .put("shard", bytes::Bytes::from(encoded))
            .await
            .unwrap();
        let ok = sp
            .decode_partial(&store, "shard", &[vec![1, 1]])
            .await
            .unwrap();
        assert_eq!(ok, vec![ZarrVectorValue::VInt32(vec![10, 11, 14, 15])]);
        let err = sp
            .decode_partial(&store, "shard", &[vec![0, 0]])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Corrupt sub-chunk at [0, 0]"));
    }
}
