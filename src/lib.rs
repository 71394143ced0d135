//! # vect (library root)
//!
//! A small local vector store: fixed-length `f32` embeddings are appended to a flat
//! binary file, their source text to a JSON-lines log, and queries are answered by an
//! exhaustive cosine-similarity scan that keeps the top K matches.
//!
//! - [`codec`]: fixed-width little-endian vector encoding.
//! - [`metadata`]: the append-only `{Offset, Text}` log.
//! - [`vector_store`]: the paired files, append with rollback, read-back, search.
//! - [`similarity`]: cosine similarity and bounded top-K selection.
//! - [`embedding`] / [`chunking`]: the text-side collaborators, behind traits.
//! - [`config`] / [`commands`]: YAML configuration and the `vect` CLI surface.
//!
//! ## Quick example
//! ```no_run
//! use vect::vector_store::{StoreConfig, VectorStore};
//!
//! # fn main() -> vect::error::Result<()> {
//! let mut store = VectorStore::open(StoreConfig::in_dir("/tmp/vect", 3))?;
//! store.store_embedding(vec![1.0, 0.0, 0.0], "x axis")?;
//! store.store_embedding(vec![0.0, 1.0, 0.0], "y axis")?;
//!
//! for hit in store.search(vec![0.9, 0.1, 0.0], 1)? {
//!     println!("{:.3} {}", hit.score, hit.text);
//! }
//! # Ok(()) }
//! ```
//!
//! ## Concurrency
//! Everything is synchronous and single-threaded. The files carry no locks; sharing a
//! store between threads or processes needs an external single-writer lock held for the
//! whole of an append or clear, and readers excluded while it is held.

use directories::ProjectDirs;
use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

pub mod chunking;
pub mod codec;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod error;
pub mod metadata;
pub mod similarity;
pub mod vector_store;

use crate::error::{Result, VectError};

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "vect", "vect")
        .ok_or_else(|| VectError::Config("Unable to determine config directory".to_string()))
}

/// Return the per-platform configuration directory used by `vect`.
///
/// The directory is **not** created by this function.
///
/// # Errors
/// Returns [`VectError::Config`] if no home directory can be determined.
pub fn config_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().to_path_buf())
}

/// Return the per-platform data directory where the store files live by default.
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

// --- File helpers shared by the vector file and the metadata log ---------------------

pub(crate) fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Size of `path` in bytes, `0` when it does not exist.
pub(crate) fn file_len(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Set the length of `path` to `len` bytes and sync, creating the file if needed.
pub(crate) fn truncate_file(path: &Path, len: u64) -> Result<()> {
    ensure_parent_dir(path)?;
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.set_len(len)?;
    file.sync_all()?;
    Ok(())
}
