use std::sync::Arc;

use microzarr::codecs::bytes::BytesCodec;
use microzarr::codecs::crc32c::Crc32cCodec;
use microzarr::codecs::gzip::GzipCodec;
use microzarr::codecs::sharding::{IndexLocation, ShardingConfig};
use microzarr::codecs::transpose::TransposeCodec;
use microzarr::store::ObjectStoreBackend;
use microzarr::{
    ArrayMetadata, CodecConfig, DataType, Endian, FillValue, StorageBackend, ZarrArray,
    ZarrValue, ZarrVectorValue,
};

fn memory_store() -> Arc<dyn StorageBackend> {
    Arc::new(ObjectStoreBackend::new(
        Box::new(object_store::memory::InMemory::new()),
        "",
    ))
}

fn bytes_le() -> CodecConfig {
    CodecConfig::Bytes(BytesCodec::new(Endian::Little))
}

fn sharding(
    sub_chunk_shape: Vec<usize>,
    codecs: Vec<CodecConfig>,
    index_location: IndexLocation,
) -> CodecConfig {
    CodecConfig::Sharding(ShardingConfig {
        chunk_shape: sub_chunk_shape,
        codecs,
        index_location,
    })
}

#[tokio::test]
async fn transpose_bytes_write_read_cycle() {
    // 16x16x16 int32 array, chunk shape 2x4x8, fill 0,
    // codecs [transpose(1,0,2), bytes(little)].
    let metadata = ArrayMetadata::new(
        vec![16, 16, 16],
        vec![2, 4, 8],
        DataType::Int32,
        FillValue::Value(ZarrValue::Int32(0)),
        vec![
            CodecConfig::Transpose(TransposeCodec::new(vec![1, 0, 2])),
            bytes_le(),
        ],
    )
    .unwrap();
    let array = ZarrArray::create(memory_store(), "cube", metadata)
        .await
        .unwrap();

    let data = ZarrVectorValue::VInt32((0..16 * 16 * 16).collect());
    array.store_array(&data).await.unwrap();

    let loaded = array.load().await.unwrap();
    let expected: Vec<f64> = (0..16 * 16 * 16).map(|x| x as f64).collect();
    assert_eq!(loaded, expected);
}

#[tokio::test]
async fn shard_index_location_is_semantically_interchangeable() {
    // Outer chunk 2x2x4, inner pipeline [bytes(little)]; start and end index
    // layouts must reproduce identical data.
    let data = ZarrVectorValue::VInt32((0..4 * 4 * 8).collect());
    let mut loads = Vec::new();
    for location in [IndexLocation::Start, IndexLocation::End] {
        let metadata = ArrayMetadata::new(
            vec![4, 4, 8],
            vec![2, 2, 4],
            DataType::Int32,
            FillValue::Value(ZarrValue::Int32(0)),
            vec![sharding(vec![1, 2, 2], vec![bytes_le()], location)],
        )
        .unwrap();
        let array = ZarrArray::create(memory_store(), "sharded", metadata)
            .await
            .unwrap();
        array.store_array(&data).await.unwrap();
        loads.push(array.load().await.unwrap());
    }
    assert_eq!(loads[0], loads[1]);
    assert_eq!(loads[0], data.to_f64_vec());
}

#[tokio::test]
async fn partial_decode_matches_full_decode() {
    let metadata = ArrayMetadata::new(
        vec![4, 4],
        vec![4, 4],
        DataType::UInt16,
        FillValue::Value(ZarrValue::UInt16(0)),
        vec![sharding(
            vec![2, 2],
            vec![bytes_le()],
            IndexLocation::End,
        )],
    )
    .unwrap();
    let array = ZarrArray::create(memory_store(), "partial", metadata)
        .await
        .unwrap();
    let chunk = ZarrVectorValue::VUInt16((0..16).collect());
    array.write_chunk(&[0, 0], chunk.clone()).await.unwrap();

    let full = array.read_chunk(&[0, 0]).await.unwrap();
    assert_eq!(full, chunk);

    // Every sub-chunk read individually must match the full decode
    // restricted to that sub-chunk.
    for (coord, expected) in [
        ([0, 0], vec![0u16, 1, 4, 5]),
        ([0, 1], vec![2, 3, 6, 7]),
        ([1, 0], vec![8, 9, 12, 13]),
        ([1, 1], vec![10, 11, 14, 15]),
    ] {
        let sub = array.read_inner_chunk(&[0, 0], &coord).await.unwrap();
        assert_eq!(sub, ZarrVectorValue::VUInt16(expected));
    }
}

#[tokio::test]
async fn absent_sub_chunks_resolve_to_fill_value() {
    // Fill is 7: sub-chunks written as all-7 are elided, and reads (full or
    // partial) must reproduce 7s. A zero-written sub-chunk stays stored and
    // is distinguishable from the fill.
    let metadata = ArrayMetadata::new(
        vec![4, 4],
        vec![4, 4],
        DataType::Int32,
        FillValue::Value(ZarrValue::Int32(7)),
        vec![sharding(
            vec![2, 2],
            vec![bytes_le()],
            IndexLocation::Start,
        )],
    )
    .unwrap();
    let array = ZarrArray::create(memory_store(), "absent", metadata)
        .await
        .unwrap();

    // Row-major 4x4: sub-chunk (0,0) all fill, (0,1) all zeros, bottom half
    // counts upward.
    let values = vec![
        7, 7, 0, 0, //
        7, 7, 0, 0, //
        1, 2, 5, 6, //
        3, 4, 7, 8,
    ];
    array
        .write_chunk(&[0, 0], ZarrVectorValue::VInt32(values.clone()))
        .await
        .unwrap();

    let fill_sub = array.read_inner_chunk(&[0, 0], &[0, 0]).await.unwrap();
    assert_eq!(fill_sub, ZarrVectorValue::VInt32(vec![7; 4]));

    let zero_sub = array.read_inner_chunk(&[0, 0], &[0, 1]).await.unwrap();
    assert_eq!(zero_sub, ZarrVectorValue::VInt32(vec![0; 4]));

    let full = array.read_chunk(&[0, 0]).await.unwrap();
    assert_eq!(full, ZarrVectorValue::VInt32(values));
}

#[tokio::test]
async fn unwritten_chunk_reads_as_fill() {
    let metadata = ArrayMetadata::new(
        vec![8, 8],
        vec![4, 4],
        DataType::Float32,
        FillValue::NaN,
        vec![bytes_le()],
    )
    .unwrap();
    let array = ZarrArray::create(memory_store(), "nanfill", metadata)
        .await
        .unwrap();
    let chunk = array.read_chunk(&[1, 1]).await.unwrap();
    match chunk {
        ZarrVectorValue::VFloat32(v) => {
            assert_eq!(v.len(), 16);
            assert!(v.iter().all(|x| x.is_nan()));
        }
        other => panic!("Expected float32 chunk, got {other:?}"),
    }
}

#[tokio::test]
async fn nested_sharding_round_trip() {
    // A sharding codec whose inner pipeline is itself a sharding codec.
    let inner = sharding(vec![1, 2], vec![bytes_le()], IndexLocation::End);
    let outer = sharding(vec![2, 4], vec![inner], IndexLocation::Start);
    let metadata = ArrayMetadata::new(
        vec![4, 8],
        vec![4, 8],
        DataType::Int64,
        FillValue::Value(ZarrValue::Int64(-1)),
        vec![outer],
    )
    .unwrap();
    let array = ZarrArray::create(memory_store(), "nested", metadata)
        .await
        .unwrap();

    let chunk = ZarrVectorValue::VInt64((0..32).collect());
    array.write_chunk(&[0, 0], chunk.clone()).await.unwrap();
    assert_eq!(array.read_chunk(&[0, 0]).await.unwrap(), chunk);

    // Sub-chunk (1, 1): rows 2-3, cols 4-7 of the 4x8 chunk.
    let sub = array.read_inner_chunk(&[0, 0], &[1, 1]).await.unwrap();
    assert_eq!(
        sub,
        ZarrVectorValue::VInt64(vec![20, 21, 22, 23, 28, 29, 30, 31])
    );
}

#[tokio::test]
async fn compressed_shard_falls_back_to_full_decode() {
    // A bytes->bytes codec after the sharding codec forbids range reads;
    // partial reads must still return the same values via full decode.
    let metadata = ArrayMetadata::new(
        vec![4, 4],
        vec![4, 4],
        DataType::Int32,
        FillValue::Value(ZarrValue::Int32(0)),
        vec![
            sharding(vec![2, 2], vec![bytes_le()], IndexLocation::End),
            CodecConfig::Gzip(GzipCodec::default()),
            CodecConfig::Crc32c(Crc32cCodec::new()),
        ],
    )
    .unwrap();
    let array = ZarrArray::create(memory_store(), "wrapped", metadata)
        .await
        .unwrap();
    assert!(!array.pipeline().supports_partial_decode());

    let chunk = ZarrVectorValue::VInt32((100..116).collect());
    array.write_chunk(&[0, 0], chunk).await.unwrap();
    let sub = array.read_inner_chunk(&[0, 0], &[1, 0]).await.unwrap();
    assert_eq!(sub, ZarrVectorValue::VInt32(vec![108, 109, 112, 113]));
}

#[tokio::test]
async fn metadata_documents_round_trip_and_compare_equal() {
    let make = || {
        ArrayMetadata::new(
            vec![16, 16],
            vec![8, 8],
            DataType::Float64,
            FillValue::Value(ZarrValue::Float64(1.5)),
            vec![
                bytes_le(),
                CodecConfig::Gzip(GzipCodec::new(3)),
                CodecConfig::Crc32c(Crc32cCodec::new()),
            ],
        )
        .unwrap()
        .with_attributes(
            [("origin".to_string(), serde_json::json!("sensor-7"))]
                .into_iter()
                .collect(),
        )
    };

    let store = memory_store();
    let a = ZarrArray::create(store.clone(), "a", make()).await.unwrap();
    let b = ZarrArray::create(store.clone(), "b", make()).await.unwrap();
    assert_eq!(a.metadata(), b.metadata());

    // Reopening from the stored document preserves every field, including
    // codec order and parameters.
    let reopened = ZarrArray::open(store, "a").await.unwrap();
    assert_eq!(reopened.metadata(), a.metadata());
}

#[tokio::test]
async fn corrupted_chunk_fails_only_that_chunk() {
    let metadata = ArrayMetadata::new(
        vec![4, 8],
        vec![4, 4],
        DataType::Int32,
        FillValue::Value(ZarrValue::Int32(0)),
        vec![bytes_le(), CodecConfig::Crc32c(Crc32cCodec::new())],
    )
    .unwrap();
    let store = memory_store();
    let array = ZarrArray::create(store.clone(), "corrupt", metadata)
        .await
        .unwrap();
    array
        .write_chunk(&[0, 0], ZarrVectorValue::VInt32((0..16).collect()))
        .await
        .unwrap();
    array
        .write_chunk(&[0, 1], ZarrVectorValue::VInt32((16..32).collect()))
        .await
        .unwrap();

    // Flip a byte in the first chunk's stored object.
    let key = array.chunk_key(&[0, 0]).unwrap();
    let mut raw = store.get(&key).await.unwrap().unwrap().to_vec();
    raw[0] ^= 0xFF;
    store.put(&key, raw.into()).await.unwrap();

    let err = array.read_chunk(&[0, 0]).await.unwrap_err();
    assert!(err.is_integrity());
    // Sibling chunk is unaffected.
    assert_eq!(
        array.read_chunk(&[0, 1]).await.unwrap(),
        ZarrVectorValue::VInt32((16..32).collect())
    );
}
