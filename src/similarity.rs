//! # Similarity engine
//!
//! Cosine similarity plus exhaustive top-K selection.
//!
//! [`top_k`] scans the whole corpus once and keeps the `k` best scores in a
//! [`BoundedMinHeap`]: the worst retained score sits at the root, so each new candidate is
//! compared against a single value and, when better, replaces it in `O(log k)`. The whole
//! query costs `O(N · D + N · log k)`.
//!
//! ## Ties
//! A candidate must score *strictly* higher than the current minimum to get in, so among
//! equal scores the earliest position wins a contested slot. The relative order of equal
//! scores in the output is unspecified.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{Result, VectError};

/// A scored corpus position produced by [`top_k`]. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityResult {
    pub score: f32,
    /// Zero-based index into the corpus (and the metadata log).
    pub position: usize,
}

/// Sum of element-wise products.
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(VectError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

/// Euclidean (L2) norm.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length in place. A zero vector is left untouched.
pub fn normalize(v: &mut [f32]) {
    let mag = magnitude(v);
    if mag == 0.0 {
        return;
    }
    for x in v.iter_mut() {
        *x /= mag;
    }
}

/// `dot(a, b) / (|a| · |b|)`, in `[-1, 1]` for finite input.
///
/// Returns `0.0` when either vector has zero magnitude.
///
/// # Errors
/// [`VectError::DimensionMismatch`] if the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let d = dot(a, b)?;
    let denom = magnitude(a) * magnitude(b);
    if denom == 0.0 {
        return Ok(0.0);
    }
    Ok(d / denom)
}

// NaN ranks below everything so it can never evict a real score.
#[inline]
fn rank(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

/// Heap entry ordered so that `BinaryHeap` (a max-heap) keeps the *lowest* score on top.
#[derive(Debug, Clone, Copy)]
struct MinEntry(SimilarityResult);

impl PartialEq for MinEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MinEntry {}

impl PartialOrd for MinEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MinEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        rank(other.0.score).total_cmp(&rank(self.0.score))
    }
}

/// Fixed-capacity min-heap retaining the `capacity` highest-scoring results seen so far.
///
/// The heap is consumed by [`into_sorted`](Self::into_sorted); build a new one per query.
#[derive(Debug)]
pub struct BoundedMinHeap {
    capacity: usize,
    heap: BinaryHeap<MinEntry>,
}

impl BoundedMinHeap {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Lowest retained score.
    pub fn min_score(&self) -> Option<f32> {
        self.heap.peek().map(|e| e.0.score)
    }

    /// Offer a candidate. Returns `true` if it was retained.
    ///
    /// Below capacity every candidate is kept; at capacity it must beat the current
    /// minimum strictly, which it then evicts.
    pub fn push(&mut self, result: SimilarityResult) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(MinEntry(result));
            return true;
        }
        match self.heap.peek() {
            Some(min) if rank(result.score) > rank(min.0.score) => {
                self.heap.pop();
                self.heap.push(MinEntry(result));
                true
            }
            _ => false,
        }
    }

    /// Drain into a vector sorted by descending score.
    pub fn into_sorted(self) -> Vec<SimilarityResult> {
        // Ascending in `MinEntry` order is descending in score.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| e.0)
            .collect()
    }
}

/// Score every corpus vector against `query` and return the `k` best, highest first.
///
/// `k == 0` or an empty corpus yield no results; `k` larger than the corpus yields the
/// whole corpus in descending order.
///
/// # Errors
/// [`VectError::DimensionMismatch`] if any corpus vector differs in length from `query`.
pub fn top_k<V: AsRef<[f32]>>(
    query: &[f32],
    corpus: &[V],
    k: usize,
) -> Result<Vec<SimilarityResult>> {
    let mut heap = BoundedMinHeap::new(k.min(corpus.len()));
    for (position, vector) in corpus.iter().enumerate() {
        let score = cosine_similarity(vector.as_ref(), query)?;
        heap.push(SimilarityResult { score, position });
    }
    Ok(heap.into_sorted())
}
