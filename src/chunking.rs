//! Splitting input text into embeddable units.

use std::str::FromStr;

use crate::error::VectError;

pub trait Chunker {
    fn chunk(&self, text: &str) -> Vec<String>;
}

/// Fixed-size pieces of `chunk_size` characters (Unicode scalar values, not bytes).
///
/// A `chunk_size` of zero disables splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedChunker {
    pub chunk_size: usize,
}

impl FixedChunker {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }
}

impl Chunker for FixedChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if self.chunk_size == 0 {
            return vec![text.to_string()];
        }
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.chunk_size)
            .map(|piece| piece.iter().collect())
            .collect()
    }
}

/// Split on a single delimiter character, dropping pieces that are blank after trimming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimiterChunker {
    pub delimiter: char,
}

impl DelimiterChunker {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }
}

impl FromStr for DelimiterChunker {
    type Err = VectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(delimiter), None) => Ok(Self { delimiter }),
            _ => Err(VectError::InvalidChunker(format!(
                "delimiter must be a single character, got {s:?}"
            ))),
        }
    }
}

impl Chunker for DelimiterChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        text.split(self.delimiter)
            .map(str::trim)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    }
}
