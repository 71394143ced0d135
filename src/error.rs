//! # Errors
//!
//! Every fallible operation in the library returns [`VectError`]. The variants fall into
//! three groups:
//!
//! - **validation**: the caller handed us something of the wrong shape
//!   ([`VectError::DimensionMismatch`], [`VectError::BatchLengthMismatch`],
//!   [`VectError::InvalidChunker`]);
//! - **I/O**: the filesystem refused an open/read/write/flush ([`VectError::Io`]);
//! - **corruption**: what is on disk does not line up with the configured layout
//!   ([`VectError::MisalignedVectorFile`], [`VectError::MalformedRecord`],
//!   [`VectError::PositionMismatch`], [`VectError::TruncatedVectorFile`],
//!   [`VectError::UnrecordedVectors`]).
//!
//! Batch operations wrap whatever stopped them in [`VectError::PartialBatch`] so the
//! caller learns how much was stored.
//!
//! Nothing is retried. Corruption is never auto-repaired beyond the startup repair
//! described in [`crate::vector_store::VectorStore::recover`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Batch length mismatch: {vectors} vectors for {texts} texts")]
    BatchLengthMismatch { vectors: usize, texts: usize },

    #[error("Invalid chunker: {0}")]
    InvalidChunker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Vector file length {len} is not a multiple of the record size {record_size}")]
    MisalignedVectorFile { len: u64, record_size: u64 },

    #[error("Vector file is {len} bytes but the metadata log records {recorded}")]
    TruncatedVectorFile { len: u64, recorded: u64 },

    #[error(
        "Vector file is {len} bytes but the metadata log only records {recorded}; \
         more than one interrupted append, or the wrong metadata log"
    )]
    UnrecordedVectors { len: u64, recorded: u64 },

    #[error("Malformed metadata record on line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store holds {vectors} vectors but {records} metadata records")]
    PositionMismatch { vectors: usize, records: usize },

    #[error("Stopped after storing {stored} entries: {source}")]
    PartialBatch {
        stored: usize,
        #[source]
        source: Box<VectError>,
    },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl VectError {
    /// `true` for errors caused by bytes on disk that do not match the expected layout.
    pub fn is_corruption(&self) -> bool {
        match self {
            VectError::PartialBatch { source, .. } => source.is_corruption(),
            _ => matches!(
                self,
                VectError::MisalignedVectorFile { .. }
                    | VectError::TruncatedVectorFile { .. }
                    | VectError::UnrecordedVectors { .. }
                    | VectError::MalformedRecord { .. }
                    | VectError::PositionMismatch { .. }
            ),
        }
    }

    /// How many entries a batch operation stored before this error stopped it.
    pub fn stored(&self) -> usize {
        match self {
            VectError::PartialBatch { stored, .. } => *stored,
            _ => 0,
        }
    }
}

pub type Result<T> = std::result::Result<T, VectError>;
