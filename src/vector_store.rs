//! # VectorStore
//!
//! Persistent embedding storage backed by two co-located files:
//!
//! - a **vector file**: raw concatenation of `D * 4`-byte little-endian `f32` vectors
//!   (see [`crate::codec`]), no header;
//! - a **metadata log**: one `{"Offset":…,"Text":…}` line per vector
//!   (see [`crate::metadata`]).
//!
//! Line `i` of the log describes vector `i` of the vector file. Both files are created
//! lazily on first append; [`VectorStore::clear`] truncates them; nothing is ever updated
//! in place or deleted individually.
//!
//! ## Append protocol
//! [`VectorStore::store_embedding`] normalizes the vector, computes the new offset from
//! the log tail, remembers both file sizes, then writes and syncs the vector bytes
//! followed by the metadata line. A failed vector write truncates the vector file back;
//! a failed metadata write truncates both files back. The original error is returned.
//!
//! ## Crash recovery
//! A crash between the two writes leaves at most one vector without a record. The last
//! record's offset is the last confirmed length of the vector file, so
//! [`VectorStore::open`] runs [`VectorStore::recover`], which truncates an unconfirmed
//! tail of up to one record. A larger gap is reported, never truncated: it means the log
//! does not belong to this vector file. An interrupted [`VectorStore::clear`] shows up
//! the same way and is finished by clearing again through [`VectorStore::new`].
//!
//! ## Quick Example
//! ```no_run
//! use vect::vector_store::{StoreConfig, VectorStore};
//!
//! # fn main() -> vect::error::Result<()> {
//! let mut vs = VectorStore::open(StoreConfig::in_dir("data", 384))?;
//! let mut v = vec![0.0; 384];
//! v[0] = 1.0;
//! vs.store_embedding(v.clone(), "Rust is great!")?;
//! let hits = vs.search(v, 1)?;
//! println!("Top match: {}", hits[0].text);
//! # Ok(()) }
//! ```

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::chunking::Chunker;
use crate::codec;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, VectError};
use crate::metadata::{MetadataLog, MetadataRecord, TailRepair};
use crate::similarity::{normalize, top_k};
use crate::{ensure_parent_dir, file_len, truncate_file};

/// Where the store lives and how wide its vectors are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Vector dimensionality `D`, fixed for the life of the files.
    pub dimension: usize,
    pub vector_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl StoreConfig {
    pub fn new(
        dimension: usize,
        vector_path: impl Into<PathBuf>,
        metadata_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            dimension,
            vector_path: vector_path.into(),
            metadata_path: metadata_path.into(),
        }
    }

    /// `<dir>/vectors.bin` and `<dir>/metadata.jsonl`.
    pub fn in_dir(dir: impl AsRef<Path>, dimension: usize) -> Self {
        let dir = dir.as_ref();
        Self::new(
            dimension,
            dir.join("vectors.bin"),
            dir.join("metadata.jsonl"),
        )
    }
}

/// A search result resolved to its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub score: f32,
    /// Zero-based position in the store.
    pub position: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub vectors: usize,
    pub records: usize,
    pub vector_bytes: u64,
}

/// Append-only store of normalized vectors and their source text.
///
/// Mutating operations take `&mut self`; the store assumes it is the only writer of its
/// files.
#[derive(Debug)]
pub struct VectorStore {
    dimension: usize,
    vector_path: PathBuf,
    metadata: MetadataLog,
    #[cfg(test)]
    fail_vector_append: bool,
    #[cfg(test)]
    fail_metadata_append: bool,
}

/// Chunks embedded and stored per step of [`VectorStore::ingest_with`].
pub const INGEST_BATCH: usize = 32;

impl VectorStore {
    /// Open (without creating) the store described by `config` and recover from any
    /// interrupted append.
    ///
    /// # Errors
    /// - [`VectError::Config`] if `dimension` is zero.
    /// - I/O or corruption errors raised by [`recover`](Self::recover).
    pub fn open(config: StoreConfig) -> Result<Self> {
        let store = Self::new(config)?;
        store.recover()?;
        info!(
            dimension = store.dimension,
            vectors = %store.vector_path.display(),
            metadata = %store.metadata.path().display(),
            "Opened vector store"
        );
        Ok(store)
    }

    /// A handle on the files without looking at them. Only [`clear`](Self::clear) is
    /// meaningful before [`recover`](Self::recover) has succeeded.
    ///
    /// # Errors
    /// [`VectError::Config`] if `dimension` is zero.
    pub fn new(config: StoreConfig) -> Result<Self> {
        if config.dimension == 0 {
            return Err(VectError::Config(
                "vector dimension must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            dimension: config.dimension,
            vector_path: config.vector_path,
            metadata: MetadataLog::new(config.metadata_path),
            #[cfg(test)]
            fail_vector_append: false,
            #[cfg(test)]
            fail_metadata_append: false,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Bytes per stored vector, `D * 4`.
    pub fn record_size(&self) -> u64 {
        codec::record_size(self.dimension) as u64
    }

    pub fn vector_path(&self) -> &Path {
        &self.vector_path
    }

    pub fn metadata(&self) -> &MetadataLog {
        &self.metadata
    }

    /// Bring the two files back in line after an interrupted append.
    ///
    /// 1. A last metadata line missing its newline is completed if it parses, dropped if
    ///    it does not.
    /// 2. Up to one record's worth of vector bytes past the last recorded offset is
    ///    truncated.
    ///
    /// Returns the number of vector bytes removed.
    ///
    /// # Errors
    /// - [`VectError::UnrecordedVectors`] if more than one record's worth of bytes lies
    ///   past the recorded offset. Nothing is truncated.
    /// - [`VectError::TruncatedVectorFile`] if the vector file is *shorter* than the log
    ///   claims.
    pub fn recover(&self) -> Result<u64> {
        match self.metadata.repair_tail()? {
            TailRepair::Intact => {}
            TailRepair::Terminated => warn!("Completed metadata record missing its newline"),
            TailRepair::Dropped(bytes) => warn!(bytes, "Dropped torn metadata record"),
        }

        let confirmed = self.metadata.last_offset()?;
        let len = file_len(&self.vector_path)?;
        if len > confirmed {
            if len - confirmed > self.record_size() {
                return Err(VectError::UnrecordedVectors {
                    len,
                    recorded: confirmed,
                });
            }
            warn!(
                confirmed,
                len, "Vector file has an unrecorded append, truncating to last recorded offset"
            );
            truncate_file(&self.vector_path, confirmed)?;
            return Ok(len - confirmed);
        }
        if len < confirmed {
            return Err(VectError::TruncatedVectorFile {
                len,
                recorded: confirmed,
            });
        }
        Ok(0)
    }

    /// Normalize `vector`, append it with `text`, and return the new end offset.
    ///
    /// The vector is taken by value: what gets persisted is its unit-length form.
    ///
    /// # Errors
    /// - [`VectError::DimensionMismatch`] if `vector.len() != dimension` (nothing written).
    /// - I/O errors from either write, after both files are rolled back.
    pub fn store_embedding(&mut self, mut vector: Vec<f32>, text: &str) -> Result<u64> {
        normalize(&mut vector);
        self.check_dimension(&vector)?;

        let offset = self.metadata.last_offset()? + self.record_size();
        let vector_len = file_len(&self.vector_path)?;
        let metadata_len = self.metadata.len()?;

        if let Err(e) = self.append_vector(&codec::encode(&vector)) {
            self.rollback(vector_len, None);
            return Err(e);
        }
        if let Err(e) = self.append_metadata(text, offset) {
            self.rollback(vector_len, Some(metadata_len));
            return Err(e);
        }

        debug!(offset, "Stored embedding");
        Ok(offset)
    }

    /// Store `vectors[i]` with `texts[i]` for every `i`, in order. Returns how many
    /// pairs were written.
    ///
    /// # Errors
    /// - [`VectError::BatchLengthMismatch`] before anything is written.
    /// - [`VectError::PartialBatch`] wrapping the first failure, with the number of pairs
    ///   stored before it. Those pairs stay stored.
    pub fn store_batch<S: AsRef<str>>(&mut self, vectors: Vec<Vec<f32>>, texts: &[S]) -> Result<usize> {
        if vectors.len() != texts.len() {
            return Err(VectError::BatchLengthMismatch {
                vectors: vectors.len(),
                texts: texts.len(),
            });
        }
        let mut stored = 0;
        for (vector, text) in vectors.into_iter().zip(texts) {
            if let Err(e) = self.store_embedding(vector, text.as_ref()) {
                return Err(VectError::PartialBatch {
                    stored,
                    source: Box::new(e),
                });
            }
            stored += 1;
        }
        Ok(stored)
    }

    /// Chunk `text`, embed the chunks and store them. Returns the number stored.
    pub fn ingest<P, C>(&mut self, provider: &P, chunker: &C, text: &str) -> Result<usize>
    where
        P: EmbeddingProvider + ?Sized,
        C: Chunker + ?Sized,
    {
        self.ingest_with(provider, chunker, text, |_, _| {})
    }

    /// [`ingest`](Self::ingest), embedding [`INGEST_BATCH`] chunks at a time and calling
    /// `progress(stored, total)` after each batch.
    ///
    /// # Errors
    /// [`VectError::PartialBatch`] with the number of chunks stored before the failing
    /// embed or append.
    pub fn ingest_with<P, C, F>(
        &mut self,
        provider: &P,
        chunker: &C,
        text: &str,
        mut progress: F,
    ) -> Result<usize>
    where
        P: EmbeddingProvider + ?Sized,
        C: Chunker + ?Sized,
        F: FnMut(usize, usize),
    {
        let chunks = chunker.chunk(text);
        let total = chunks.len();
        let mut stored = 0;
        for batch in chunks.chunks(INGEST_BATCH) {
            let result = provider
                .embed_batch(batch)
                .and_then(|vectors| self.store_batch(vectors, batch));
            match result {
                Ok(n) => stored += n,
                Err(e) => {
                    let (done, source) = match e {
                        VectError::PartialBatch { stored: n, source } => (n, source),
                        other => (0, Box::new(other)),
                    };
                    return Err(VectError::PartialBatch {
                        stored: stored + done,
                        source,
                    });
                }
            }
            progress(stored, total);
        }
        debug!(stored, "Ingested text");
        Ok(stored)
    }

    /// Every stored vector in file order. An absent file yields none.
    ///
    /// # Errors
    /// [`VectError::MisalignedVectorFile`] if the file length is not a multiple of
    /// [`record_size`](Self::record_size).
    pub fn read_all_vectors(&self) -> Result<Vec<Vec<f32>>> {
        let bytes = match fs::read(&self.vector_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        codec::decode_all(&bytes, self.dimension)
    }

    /// Every metadata record in log order.
    pub fn read_metadata(&self) -> Result<Vec<MetadataRecord>> {
        self.metadata.read_all()
    }

    /// The `k` stored entries most similar to `query`, best first.
    ///
    /// `query` is normalized before scoring. Vectors and metadata are read once per call.
    ///
    /// # Errors
    /// - [`VectError::DimensionMismatch`] for a query of the wrong length.
    /// - [`VectError::PositionMismatch`] if the files disagree on the number of entries.
    /// - Any corruption error from reading either file.
    pub fn search(&self, mut query: Vec<f32>, k: usize) -> Result<Vec<SearchHit>> {
        normalize(&mut query);
        self.check_dimension(&query)?;

        let vectors = self.read_all_vectors()?;
        let records = self.read_metadata()?;
        if vectors.len() != records.len() {
            return Err(VectError::PositionMismatch {
                vectors: vectors.len(),
                records: records.len(),
            });
        }

        let hits = top_k(&query, &vectors, k)?
            .into_iter()
            .map(|r| SearchHit {
                score: r.score,
                position: r.position,
                text: records[r.position].text.clone(),
            })
            .collect::<Vec<_>>();
        debug!(k, corpus = vectors.len(), hits = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Embed `query` with `provider` and [`search`](Self::search).
    pub fn search_text<P>(&self, provider: &P, query: &str, k: usize) -> Result<Vec<SearchHit>>
    where
        P: EmbeddingProvider + ?Sized,
    {
        let vector = provider.embed(query)?;
        self.search(vector, k)
    }

    /// Truncate both files to zero length. Safe to call repeatedly.
    pub fn clear(&mut self) -> Result<()> {
        // Log first: an interruption then leaves only unrecorded vector bytes, which
        // `open` reports and a second clear removes.
        self.metadata.truncate(0)?;
        truncate_file(&self.vector_path, 0)?;
        info!("Cleared vector store");
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let vector_bytes = file_len(&self.vector_path)?;
        Ok(StoreStats {
            vectors: (vector_bytes / self.record_size()) as usize,
            records: self.metadata.read_all()?.len(),
            vector_bytes,
        })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VectError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    fn append_vector(&self, bytes: &[u8]) -> Result<()> {
        ensure_parent_dir(&self.vector_path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.vector_path)?;
        #[cfg(test)]
        {
            if self.fail_vector_append {
                // Half a record lands before the failure.
                file.write_all(&bytes[..bytes.len() / 2])?;
                return Err(io::Error::other("injected vector failure").into());
            }
        }
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }

    fn append_metadata(&self, text: &str, offset: u64) -> Result<()> {
        #[cfg(test)]
        {
            if self.fail_metadata_append {
                return Err(io::Error::other("injected metadata failure").into());
            }
        }
        self.metadata.append(text, offset)
    }

    /// Best effort: failures are logged, the caller's error is what gets reported.
    fn rollback(&self, vector_len: u64, metadata_len: Option<u64>) {
        if let Err(e) = truncate_file(&self.vector_path, vector_len) {
            warn!(error = %e, len = vector_len, "Failed to roll back vector file");
        }
        if let Some(len) = metadata_len {
            if let Err(e) = self.metadata.truncate(len) {
                warn!(error = %e, len, "Failed to roll back metadata log");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::FixedChunker;
    use tempfile::TempDir;

    const DIM: usize = 384;

    fn open_in(dir: &TempDir) -> VectorStore {
        VectorStore::open(StoreConfig::in_dir(dir.path(), DIM)).unwrap()
    }

    fn basis(idx: usize, value: f32) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[idx] = value;
        v
    }

    #[test]
    fn test_store_embedding_writes_normalized_data_and_metadata() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        let mut v = vec![0.0; DIM];
        v[0] = 3.0;
        v[1] = 4.0;

        assert_eq!(store.store_embedding(v.clone(), "first").unwrap(), 1536);
        assert_eq!(store.store_embedding(v, "second").unwrap(), 3072);

        let data = fs::read(store.vector_path()).unwrap();
        assert_eq!(data.len(), DIM * 4 * 2);
        let first = f32::from_le_bytes(data[0..4].try_into().unwrap());
        let second = f32::from_le_bytes(data[4..8].try_into().unwrap());
        assert!((first - 0.6).abs() < 1e-5);
        assert!((second - 0.8).abs() < 1e-5);

        let records = store.read_metadata().unwrap();
        assert_eq!(
            records,
            vec![
                MetadataRecord {
                    offset: 1536,
                    text: "first".into()
                },
                MetadataRecord {
                    offset: 3072,
                    text: "second".into()
                },
            ]
        );
    }

    #[test]
    fn test_offsets_grow_by_record_size() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        for i in 0..5 {
            store.store_embedding(basis(i, 1.0), &format!("doc-{i}")).unwrap();
        }
        let records = store.read_metadata().unwrap();
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.offset, ((i + 1) * DIM * 4) as u64);
        }
        assert_eq!(store.metadata().last_offset().unwrap(), (5 * DIM * 4) as u64);
    }

    #[test]
    fn test_offset_continues_from_existing_log() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(3, dir.path().join("v.bin"), dir.path().join("m.jsonl"));
        fs::write(&config.vector_path, vec![0u8; 12]).unwrap();
        fs::write(&config.metadata_path, "{\"Offset\":12,\"Text\":\"existing\"}\n").unwrap();

        let mut store = VectorStore::open(config).unwrap();
        assert_eq!(store.store_embedding(vec![1.0, 2.0, 3.0], "new").unwrap(), 24);
    }

    #[test]
    fn test_rejects_wrong_dimension_without_writing() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        let err = store.store_embedding(vec![1.0, 0.0, 0.0], "short").unwrap_err();
        assert!(matches!(
            err,
            VectError::DimensionMismatch {
                expected: DIM,
                actual: 3
            }
        ));
        assert!(!store.vector_path().exists());
        assert!(!store.metadata().path().exists());
    }

    #[test]
    fn test_open_rejects_zero_dimension() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            VectorStore::open(StoreConfig::in_dir(dir.path(), 0)),
            Err(VectError::Config(_))
        ));
    }

    #[test]
    fn test_metadata_failure_rolls_back_vector_file() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        store.store_embedding(basis(0, 1.0), "kept").unwrap();
        let vector_len = fs::metadata(store.vector_path()).unwrap().len();
        let metadata_len = store.metadata().len().unwrap();

        store.fail_metadata_append = true;
        let err = store.store_embedding(basis(1, 1.0), "lost").unwrap_err();
        assert!(matches!(err, VectError::Io(_)));

        assert_eq!(fs::metadata(store.vector_path()).unwrap().len(), vector_len);
        assert_eq!(store.metadata().len().unwrap(), metadata_len);

        store.fail_metadata_append = false;
        assert_eq!(
            store.store_embedding(basis(1, 1.0), "next").unwrap(),
            (2 * DIM * 4) as u64
        );
        assert_eq!(store.read_all_vectors().unwrap().len(), 2);
    }

    #[test]
    fn test_metadata_failure_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        store.fail_metadata_append = true;
        assert!(store.store_embedding(basis(0, 1.0), "lost").is_err());
        assert_eq!(file_len(store.vector_path()).unwrap(), 0);
    }

    #[test]
    fn test_read_all_vectors_detects_misalignment() {
        let dir = TempDir::new().unwrap();
        let store = open_in(&dir);
        fs::write(store.vector_path(), vec![0u8; DIM * 4 + 3]).unwrap();
        assert!(matches!(
            store.read_all_vectors(),
            Err(VectError::MisalignedVectorFile { .. })
        ));
    }

    #[test]
    fn test_read_all_vectors_absent_file() {
        let dir = TempDir::new().unwrap();
        assert!(open_in(&dir).read_all_vectors().unwrap().is_empty());
    }

    #[test]
    fn test_recover_truncates_unrecorded_vector() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(dir.path(), DIM);
        {
            let mut store = VectorStore::open(config.clone()).unwrap();
            store.store_embedding(basis(0, 1.0), "confirmed").unwrap();
            // Simulate a crash after the vector write but before the metadata write.
            store.append_vector(&codec::encode(&basis(1, 1.0))).unwrap();
        }
        assert_eq!(file_len(&config.vector_path).unwrap(), (2 * DIM * 4) as u64);

        let store = VectorStore::open(config).unwrap();
        assert_eq!(file_len(store.vector_path()).unwrap(), (DIM * 4) as u64);
        assert_eq!(store.read_all_vectors().unwrap().len(), 1);
        assert_eq!(store.read_metadata().unwrap().len(), 1);
    }

    #[test]
    fn test_recover_drops_torn_metadata_and_its_vector() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(dir.path(), DIM);
        {
            let mut store = VectorStore::open(config.clone()).unwrap();
            store.store_embedding(basis(0, 1.0), "confirmed").unwrap();
            store.append_vector(&codec::encode(&basis(1, 1.0))).unwrap();
        }
        let mut log = OpenOptions::new()
            .append(true)
            .open(&config.metadata_path)
            .unwrap();
        log.write_all(b"{\"Offset\":30").unwrap();

        let store = VectorStore::open(config).unwrap();
        assert_eq!(store.read_metadata().unwrap().len(), 1);
        assert_eq!(store.read_all_vectors().unwrap().len(), 1);
    }

    #[test]
    fn test_open_reports_short_vector_file() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(dir.path(), 3);
        fs::write(&config.metadata_path, "{\"Offset\":24,\"Text\":\"a\"}\n").unwrap();
        fs::write(&config.vector_path, vec![0u8; 12]).unwrap();
        assert!(matches!(
            VectorStore::open(config),
            Err(VectError::TruncatedVectorFile {
                len: 12,
                recorded: 24
            })
        ));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        store.store_embedding(basis(0, 1.0), "a").unwrap();

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(file_len(store.vector_path()).unwrap(), 0);
        assert_eq!(store.metadata().len().unwrap(), 0);
        assert!(store.vector_path().exists());
        assert_eq!(store.store_embedding(basis(0, 1.0), "b").unwrap(), (DIM * 4) as u64);
    }

    #[test]
    fn test_search_resolves_text() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        store.store_embedding(basis(0, 1.0), "doc-one").unwrap();
        store.store_embedding(basis(1, 1.0), "doc-two").unwrap();
        store.store_embedding(basis(2, 1.0), "doc-three").unwrap();

        let mut query = basis(1, 1.0);
        query[0] = 0.5;
        let hits = store.search(query, 2).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["doc-two", "doc-one"]);
        assert_eq!(hits[0].position, 1);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_search_rejects_position_mismatch() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        store.store_embedding(basis(0, 1.0), "a").unwrap();
        store.append_vector(&codec::encode(&basis(1, 1.0))).unwrap();

        assert!(matches!(
            store.search(basis(0, 1.0), 1),
            Err(VectError::PositionMismatch {
                vectors: 2,
                records: 1
            })
        ));
    }

    #[test]
    fn test_store_batch_length_mismatch() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        let err = store
            .store_batch(vec![basis(0, 1.0)], &["a", "b"])
            .unwrap_err();
        assert!(matches!(
            err,
            VectError::BatchLengthMismatch {
                vectors: 1,
                texts: 2
            }
        ));
    }

    struct CharCodes;

    impl EmbeddingProvider for CharCodes {
        fn dimension(&self) -> usize {
            DIM
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let idx = text.chars().next().map_or(0, |c| c as usize % DIM);
            Ok(basis(idx, 1.0))
        }
    }

    #[test]
    fn test_ingest_and_search_text() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        let stored = store
            .ingest(&CharCodes, &FixedChunker::new(3), "abcdefghi")
            .unwrap();
        assert_eq!(stored, 3);

        let hits = store.search_text(&CharCodes, "d", 1).unwrap();
        assert_eq!(hits[0].text, "def");

        let stats = store.stats().unwrap();
        assert_eq!(
            stats,
            StoreStats {
                vectors: 3,
                records: 3,
                vector_bytes: (3 * DIM * 4) as u64
            }
        );
    }

    #[test]
    fn test_vector_failure_rolls_back_partial_write() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        store.store_embedding(basis(0, 1.0), "kept").unwrap();
        let vector_len = file_len(store.vector_path()).unwrap();
        let metadata_len = store.metadata().len().unwrap();

        store.fail_vector_append = true;
        let err = store.store_embedding(basis(1, 1.0), "lost").unwrap_err();
        assert!(matches!(err, VectError::Io(_)));

        assert_eq!(file_len(store.vector_path()).unwrap(), vector_len);
        assert_eq!(store.metadata().len().unwrap(), metadata_len);

        store.fail_vector_append = false;
        assert_eq!(
            store.store_embedding(basis(1, 1.0), "next").unwrap(),
            (2 * DIM * 4) as u64
        );
        let texts: Vec<String> = store
            .read_metadata()
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(texts, vec!["kept", "next"]);
    }

    #[test]
    fn test_reopen_after_record_lost_its_newline() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(dir.path(), 3);
        {
            let mut store = VectorStore::open(config.clone()).unwrap();
            store.store_embedding(vec![1.0, 0.0, 0.0], "a").unwrap();
        }
        let raw = fs::read_to_string(&config.metadata_path).unwrap();
        fs::write(&config.metadata_path, raw.trim_end_matches('\n')).unwrap();

        let mut store = VectorStore::open(config.clone()).unwrap();
        assert_eq!(store.store_embedding(vec![0.0, 1.0, 0.0], "b").unwrap(), 24);

        let records = store.read_metadata().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "a");
        assert_eq!(records[1].offset, 24);

        let store = VectorStore::open(config).unwrap();
        assert_eq!(store.read_all_vectors().unwrap().len(), 2);
    }

    #[test]
    fn test_open_with_foreign_log_keeps_vectors() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(dir.path(), 3);
        {
            let mut store = VectorStore::open(config.clone()).unwrap();
            for i in 0..3 {
                let mut v = vec![0.0; 3];
                v[i] = 1.0;
                store.store_embedding(v, "x").unwrap();
            }
        }
        let elsewhere = StoreConfig::new(3, &config.vector_path, dir.path().join("other.jsonl"));

        assert!(matches!(
            VectorStore::open(elsewhere.clone()),
            Err(VectError::UnrecordedVectors {
                len: 36,
                recorded: 0
            })
        ));
        assert_eq!(file_len(&config.vector_path).unwrap(), 36);
        assert_eq!(VectorStore::open(config).unwrap().read_all_vectors().unwrap().len(), 3);

        // An explicit clear is still possible.
        VectorStore::new(elsewhere.clone()).unwrap().clear().unwrap();
        assert_eq!(file_len(&elsewhere.vector_path).unwrap(), 0);
        assert!(VectorStore::open(elsewhere).is_ok());
    }

    #[test]
    fn test_recover_truncates_partial_vector_write() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::in_dir(dir.path(), 3);
        {
            let mut store = VectorStore::open(config.clone()).unwrap();
            store.store_embedding(vec![1.0, 0.0, 0.0], "a").unwrap();
        }
        let mut file = OpenOptions::new()
            .append(true)
            .open(&config.vector_path)
            .unwrap();
        file.write_all(&[0u8; 5]).unwrap();

        let store = VectorStore::open(config).unwrap();
        assert_eq!(file_len(store.vector_path()).unwrap(), 12);
    }

    #[test]
    fn test_store_batch_reports_partial_progress() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        let err = store
            .store_batch(
                vec![basis(0, 1.0), basis(1, 1.0), vec![1.0; 3], basis(2, 1.0)],
                &["a", "b", "short", "d"],
            )
            .unwrap_err();

        match err {
            VectError::PartialBatch { stored, source } => {
                assert_eq!(stored, 2);
                assert!(matches!(*source, VectError::DimensionMismatch { .. }));
            }
            other => panic!("expected partial batch, got {other:?}"),
        }
        assert_eq!(store.read_metadata().unwrap().len(), 2);
        assert_eq!(store.read_all_vectors().unwrap().len(), 2);
    }

    /// Fails on any text starting with `!`.
    struct Picky;

    impl EmbeddingProvider for Picky {
        fn dimension(&self) -> usize {
            DIM
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.starts_with('!') {
                return Err(VectError::Embedding(format!("cannot embed {text:?}")));
            }
            CharCodes.embed(text)
        }
    }

    #[test]
    fn test_ingest_with_reports_progress_per_batch() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        let text = "a".repeat(INGEST_BATCH + 5);

        let mut calls = Vec::new();
        let stored = store
            .ingest_with(&CharCodes, &FixedChunker::new(1), &text, |done, total| {
                calls.push((done, total))
            })
            .unwrap();

        assert_eq!(stored, INGEST_BATCH + 5);
        assert_eq!(
            calls,
            vec![(INGEST_BATCH, INGEST_BATCH + 5), (INGEST_BATCH + 5, INGEST_BATCH + 5)]
        );
    }

    #[test]
    fn test_ingest_counts_chunks_stored_before_failure() {
        let dir = TempDir::new().unwrap();
        let mut store = open_in(&dir);
        let mut text = "a".repeat(INGEST_BATCH);
        text.push('!');

        let err = store
            .ingest(&Picky, &FixedChunker::new(1), &text)
            .unwrap_err();
        assert_eq!(err.stored(), INGEST_BATCH);
        assert!(matches!(
            err,
            VectError::PartialBatch { ref source, .. } if matches!(**source, VectError::Embedding(_))
        ));
        assert_eq!(store.stats().unwrap().records, INGEST_BATCH);
    }
}
