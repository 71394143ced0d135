//! # Metadata log
//!
//! Append-only, newline-delimited JSON records pairing each stored vector with its source
//! text:
//!
//! ```text
//! {"Offset":1536,"Text":"first chunk"}
//! {"Offset":3072,"Text":"second chunk"}
//! ```
//!
//! `Offset` is the size of the vector file *after* the matching vector was appended, so
//! the final record doubles as the last confirmed length of the vector file. Line `i`
//! belongs to vector `i`; there is no other key.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, VectError};
use crate::{ensure_parent_dir, file_len, truncate_file};

// Bytes read per step when scanning backwards for the last line.
const TAIL_BLOCK: u64 = 4096;

/// One line of the metadata log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Exclusive end offset of this record's vector in the vector file.
    #[serde(rename = "Offset")]
    pub offset: u64,
    /// Source text the vector was computed from.
    #[serde(rename = "Text")]
    pub text: String,
}

/// What [`MetadataLog::repair_tail`] did to the end of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailRepair {
    /// Absent, empty or newline-terminated: nothing to do.
    Intact,
    /// The last record was complete but lacked its newline, which was appended.
    Terminated,
    /// An incomplete last line of this many bytes was removed.
    Dropped(u64),
}

/// The final line of the log, found by reading backwards from the end.
struct TailLine {
    start: u64,
    bytes: Vec<u8>,
    terminated: bool,
}

/// Handle to a metadata log on disk.
///
/// The handle only stores the path; every operation opens, uses and closes the file.
#[derive(Debug, Clone)]
pub struct MetadataLog {
    path: PathBuf,
}

impl MetadataLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `{offset, text}` as a single line and sync it to disk.
    ///
    /// # Errors
    /// Any failure opening, writing or syncing the log. A failed write may leave a partial
    /// line behind; callers that need to undo it should record [`len`](Self::len) first and
    /// [`truncate`](Self::truncate) back.
    pub fn append(&self, text: &str, offset: u64) -> Result<()> {
        let record = MetadataRecord {
            offset,
            text: text.to_string(),
        };
        let mut line = serde_json::to_vec(&record).map_err(io::Error::from)?;
        line.push(b'\n');

        ensure_parent_dir(&self.path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.sync_all()?;

        debug!(offset, bytes = line.len(), "Appended metadata record");
        Ok(())
    }

    /// Read every record in log order.
    ///
    /// A missing log is created empty and yields no records. A single trailing newline is
    /// tolerated; any line that fails to parse fails the whole read.
    pub fn read_all(&self) -> Result<Vec<MetadataRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                ensure_parent_dir(&self.path)?;
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                debug!(path = %self.path.display(), "Created empty metadata log");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        parse_records(&content)
    }

    /// Offset stored in the final record, or `0` when the log is empty or absent.
    ///
    /// Only the end of the file is read, so the cost does not grow with the log.
    pub fn last_offset(&self) -> Result<u64> {
        let Some(tail) = self.read_tail()? else {
            return Ok(0);
        };
        if tail.start == 0 && tail.bytes.is_empty() {
            return Ok(0);
        }
        match serde_json::from_slice::<MetadataRecord>(&tail.bytes) {
            Ok(record) => Ok(record.offset),
            Err(source) => Err(VectError::MalformedRecord {
                line: self.line_at(tail.start)?,
                source,
            }),
        }
    }

    /// Current size of the log in bytes (`0` if absent).
    pub fn len(&self) -> Result<u64> {
        file_len(&self.path)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Cut the log back to `len` bytes, creating it if absent.
    pub fn truncate(&self, len: u64) -> Result<()> {
        truncate_file(&self.path, len)
    }

    /// Make the last line safe to append after.
    ///
    /// A last line without its newline is either a complete record whose newline never
    /// reached the disk (the newline is appended) or a partial write (the line is
    /// removed).
    pub fn repair_tail(&self) -> Result<TailRepair> {
        let Some(tail) = self.read_tail()? else {
            return Ok(TailRepair::Intact);
        };
        if tail.terminated {
            return Ok(TailRepair::Intact);
        }
        if serde_json::from_slice::<MetadataRecord>(&tail.bytes).is_ok() {
            let mut file = OpenOptions::new().append(true).open(&self.path)?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            return Ok(TailRepair::Terminated);
        }
        self.truncate(tail.start)?;
        Ok(TailRepair::Dropped(tail.bytes.len() as u64))
    }

    fn read_tail(&self) -> Result<Option<TailLine>> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();
        if len == 0 {
            return Ok(None);
        }

        let mut buf: Vec<u8> = Vec::new();
        let mut pos = len;
        loop {
            let step = TAIL_BLOCK.min(pos);
            pos -= step;
            let mut block = vec![0u8; step as usize];
            file.seek(SeekFrom::Start(pos))?;
            file.read_exact(&mut block)?;
            block.extend_from_slice(&buf);
            buf = block;

            let terminated = buf.last() == Some(&b'\n');
            let body = if terminated { &buf[..buf.len() - 1] } else { &buf[..] };
            if let Some(i) = body.iter().rposition(|&b| b == b'\n') {
                return Ok(Some(TailLine {
                    start: pos + i as u64 + 1,
                    bytes: body[i + 1..].to_vec(),
                    terminated,
                }));
            }
            if pos == 0 {
                return Ok(Some(TailLine {
                    start: 0,
                    bytes: body.to_vec(),
                    terminated,
                }));
            }
        }
    }

    // 1-based line number of the line starting at byte `start`. Only used for errors.
    fn line_at(&self, start: u64) -> Result<usize> {
        let content = fs::read(&self.path)?;
        let end = (start as usize).min(content.len());
        Ok(content[..end].iter().filter(|&&b| b == b'\n').count() + 1)
    }
}

fn parse_records(content: &str) -> Result<Vec<MetadataRecord>> {
    let mut lines: Vec<&str> = content.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| VectError::MalformedRecord {
                line: i + 1,
                source,
            })
        })
        .collect()
}
