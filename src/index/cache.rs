//! Decoded rows of exactly one chunk.
//!
//! The cache is rebuilt whenever a requested row falls outside the chunk it holds.
//! A sequential scan keeps hitting the same chunk; random access pays one chunk
//! decode per miss.

use crate::error::Result;
use crate::format::{FormatAdapter, RowFormat};
use crate::index::Chunk;
use std::io::{Read, Seek};

#[derive(Debug, Default, Clone)]
pub struct ChunkRowCache {
    chunk: Option<Chunk>,
    /// `rows[i]` is the raw text of row `chunk.first_row() + i`
    rows: Vec<String>,
}

impl ChunkRowCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(&self) -> Option<&Chunk> {
        self.chunk.as_ref()
    }

    /// Whether the cache currently holds exactly this chunk
    pub fn holds(&self, chunk: &Chunk) -> bool {
        self.chunk.as_ref() == Some(chunk)
    }

    pub fn contains(&self, row: u64) -> bool {
        self.get(row).is_some()
    }

    pub fn get(&self, row: u64) -> Option<&str> {
        let chunk = self.chunk.as_ref()?;
        if !chunk.contains_row(row) {
            return None;
        }
        self.rows
            .get((row - chunk.first_row()) as usize)
            .map(String::as_str)
    }

    /// Rows from `row` to the end of the cached chunk, with their absolute numbers
    pub fn rows_from(&self, row: u64) -> impl Iterator<Item = (u64, &str)> {
        let first = self.chunk.map_or(0, |c| c.first_row());
        let skip = row.saturating_sub(first) as usize;
        self.rows
            .iter()
            .enumerate()
            .skip(skip)
            .map(move |(i, text)| (first + i as u64, text.as_str()))
    }

    /// Install decoded rows for `chunk`.
    ///
    /// A row count that disagrees with the chunk descriptor means the bytes on disk
    /// no longer match the index; it is logged and the rows are kept best-effort.
    pub fn fill(&mut self, chunk: Chunk, mut rows: Vec<String>) {
        let expected = chunk.row_count() as usize;
        if rows.len() != expected {
            log::error!(
                "Chunk rows {}..={} decoded to {} rows, expected {}",
                chunk.first_row(),
                chunk.last_row(),
                rows.len(),
                expected
            );
            rows.truncate(expected);
        }
        self.chunk = Some(chunk);
        self.rows = rows;
    }

    /// Decode `chunk` from `reader` through the format adapter, unless already cached
    pub fn load<R: Read + Seek>(
        &mut self,
        format: &FormatAdapter,
        reader: &mut R,
        chunk: Chunk,
    ) -> Result<()> {
        if self.holds(&chunk) {
            return Ok(());
        }
        let rows = format.load_chunk_rows(reader, &chunk)?;
        self.fill(chunk, rows);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.chunk = None;
        self.rows.clear();
    }
}
