//! Embedding generation.
//!
//! The embedding provider is a consumed capability: the engine depends on
//! the [`Embedder`] trait only. [`HashEmbedder`] ships as the in-process
//! default — a deterministic, content-hash-based pseudo-embedding suitable
//! for tests and for hosts without a semantic model. [`CachingEmbedder`]
//! wraps any embedder with an LRU cache keyed by content hash, since
//! embedding is the dominant cost on the indexing path.

// Allow cast precision loss for hash-based embedding calculations.
#![allow(clippy::cast_precision_loss)]
// Allow cast possible truncation for hash index calculations on 32-bit platforms.
#![allow(clippy::cast_possible_truncation)]

use crate::{Error, Result};
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Trait for embedding generators.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Default embedding dimensionality.
const DEFAULT_DIMENSIONS: usize = 256;

/// Word-iteration cap to bound computation on very long texts.
const MAX_WORDS: usize = 1000;

/// Deterministic hash-based embedder.
///
/// Generates a normalized vector from per-word content hashes. The output
/// is stable across processes and platforms, which keeps the indexer's
/// idempotency checks meaningful; it does NOT provide semantic similarity
/// beyond lexical overlap.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Creates a hash embedder with the default dimensionality.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    /// Creates a hash embedder with explicit dimensionality.
    #[must_use]
    pub const fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Distributes a word hash across embedding dimensions.
    fn distribute_hash(embedding: &mut [f32], hash: u64, word_idx: usize, dimensions: usize) {
        for j in 0..8 {
            let idx = ((hash >> (j * 8)) as usize + word_idx) % dimensions;
            let value = ((hash >> (j * 4)) & 0xFF) as f32 / 255.0 - 0.5;
            embedding[idx] += value;
        }
    }

    /// Normalizes an embedding vector in-place.
    fn normalize(embedding: &mut [f32]) {
        let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
        if norm_sq <= 0.0 {
            return;
        }
        let inv_norm = norm_sq.sqrt().recip();
        for v in embedding.iter_mut() {
            *v *= inv_norm;
        }
    }

    /// Stable 64-bit hash of a word, derived from sha256.
    fn word_hash(word: &str) -> u64 {
        let digest = Sha256::digest(word.as_bytes());
        u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ])
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::InvalidInput("Cannot embed empty text".to_string()));
        }

        let mut embedding = vec![0.0f32; self.dimensions];
        for (i, word) in text.split_whitespace().take(MAX_WORDS).enumerate() {
            let hash = Self::word_hash(&word.to_lowercase());
            Self::distribute_hash(&mut embedding, hash, i, self.dimensions);
        }

        Self::normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Embedder wrapper that caches results by content hash.
pub struct CachingEmbedder<E: Embedder> {
    inner: E,
    cache: Mutex<LruCache<[u8; 32], Vec<f32>>>,
}

impl<E: Embedder> CachingEmbedder<E> {
    /// Wraps an embedder with a cache of the given capacity.
    ///
    /// A zero capacity is treated as 1.
    #[must_use]
    pub fn new(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn content_hash(text: &str) -> [u8; 32] {
        Sha256::digest(text.as_bytes()).into()
    }
}

impl<E: Embedder> Embedder for CachingEmbedder<E> {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::content_hash(text);

        if let Ok(mut cache) = self.cache.lock()
            && let Some(hit) = cache.get(&key)
        {
            return Ok(hit.clone());
        }

        let embedding = self.inner.embed(text)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, embedding.clone());
        }
        Ok(embedding)
    }
}
