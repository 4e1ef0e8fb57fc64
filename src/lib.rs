pub mod array;
pub mod codecs;
pub mod error;
pub mod metadata;
pub mod store;
pub mod types;

// Re-export key types at crate root for convenience.
pub use array::ZarrArray;
pub use codecs::pipeline::{ChunkRepresentation, CodecPipeline};
pub use codecs::sharding::IndexLocation;
pub use codecs::{CodecConfig, CodecId, CodecKind};
pub use error::{ZarrError, ZarrResult};
pub use metadata::ArrayMetadata;
pub use store::{ByteRange, LocalBackend, ObjectStoreBackend, StorageBackend};
pub use types::{DataType, Endian, FillValue, ZarrValue, ZarrVectorValue};
