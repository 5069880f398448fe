//! Chunk index and per-chunk row cache.
//!
//! The index answers "which byte range holds row N" in O(log chunks); the cache
//! turns one chunk's bytes into row text on demand.

pub mod cache;
pub mod chunk;

pub use cache::ChunkRowCache;
pub use chunk::{Chunk, ChunkIndex, ParsedChunks};
