use thiserror::Error;

pub type ZarrResult<T> = Result<T, ZarrError>;

#[derive(Error, Debug)]
pub enum ZarrError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Invalid pipeline composition, bad permutation, incompatible shard
    /// shape, unknown codec. Raised at pipeline construction, never at I/O
    /// time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Checksum mismatch, corrupt shard index, truncated chunk. Fatal for the
    /// affected chunk only.
    #[error("Data integrity error: {0}")]
    Integrity(String),

    /// Corrupt or truncated compressed input. A subtype of integrity failure.
    #[error("Decompression failed: {0}")]
    Decompression(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// Propagated unchanged from the backing store; no automatic retry.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl ZarrError {
    /// True for errors that mean the affected chunk's stored bytes are
    /// unrecoverable (sibling chunks are unaffected).
    pub fn is_integrity(&self) -> bool {
        matches!(self, ZarrError::Integrity(_) | ZarrError::Decompression(_))
    }
}
