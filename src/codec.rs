//! Fixed-width little-endian encoding of embedding vectors.
//!
//! ```text
//! Offset   Size    Type        Description
//! ─────────────────────────────────────────────
//! 0x00     D*4     [f32]       Vector 0 (Little Endian)
//! D*4      D*4     [f32]       Vector 1
//! ...
//! ```
//!
//! There is no header, magic number or per-record length prefix: the record size is
//! implied by the store-wide dimension `D`.

use crate::error::{Result, VectError};

/// Bytes per encoded component.
pub const F32_BYTES: usize = std::mem::size_of::<f32>();

/// Size in bytes of one encoded vector of `dimension` components.
#[inline(always)]
pub fn record_size(dimension: usize) -> usize {
    dimension * F32_BYTES
}

/// Encode a vector as `len * 4` little-endian bytes.
pub fn encode(vector: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(record_size(vector.len()));
    for value in vector {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Decode exactly one vector of `dimension` components.
pub fn decode(bytes: &[u8], dimension: usize) -> Result<Vec<f32>> {
    let expected = record_size(dimension);
    if bytes.len() != expected {
        return Err(VectError::MisalignedVectorFile {
            len: bytes.len() as u64,
            record_size: expected as u64,
        });
    }
    Ok(bytes
        .chunks_exact(F32_BYTES)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Decode a concatenation of vectors, in order.
///
/// Fails if `bytes.len()` is not a multiple of the record size, which means either a torn
/// write or a store opened with the wrong dimension.
pub fn decode_all(bytes: &[u8], dimension: usize) -> Result<Vec<Vec<f32>>> {
    let size = record_size(dimension);
    if size == 0 || bytes.len() % size != 0 {
        return Err(VectError::MisalignedVectorFile {
            len: bytes.len() as u64,
            record_size: size as u64,
        });
    }
    bytes
        .chunks_exact(size)
        .map(|chunk| decode(chunk, dimension))
        .collect()
}
