//! Chunk descriptors and the ordered chunk index.
//!
//! A chunk maps a contiguous byte range of the file to a contiguous range of rows.
//! Chunks are appended in file order and never change afterwards; the only way to
//! drop them is to clear the whole index when the file is recreated.

/// Immutable byte-range to row-range descriptor. Both ranges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk {
    byte_start: u64,
    byte_end: u64,
    first_row: u64,
    last_row: u64,
}

impl Chunk {
    pub fn new(byte_start: u64, byte_end: u64, first_row: u64, last_row: u64) -> Self {
        debug_assert!(byte_start <= byte_end, "chunk byte range is inverted");
        debug_assert!(first_row <= last_row, "chunk row range is inverted");
        Self {
            byte_start,
            byte_end,
            first_row,
            last_row,
        }
    }

    pub fn byte_start(&self) -> u64 {
        self.byte_start
    }

    pub fn byte_end(&self) -> u64 {
        self.byte_end
    }

    pub fn first_row(&self) -> u64 {
        self.first_row
    }

    pub fn last_row(&self) -> u64 {
        self.last_row
    }

    pub fn row_count(&self) -> u64 {
        self.last_row - self.first_row + 1
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_end - self.byte_start + 1
    }

    pub fn contains_row(&self, row: u64) -> bool {
        row >= self.first_row && row <= self.last_row
    }
}

/// Result of one `parse_chunks` call over newly appeared bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedChunks {
    /// Chunks made only of complete rows, in file order
    pub chunks: Vec<Chunk>,
    /// Trailing row that is visible but may still grow (text without final newline)
    pub pending: Option<Chunk>,
    /// Where the next growth step resumes; always a row boundary
    pub last_parsed_pos: u64,
    /// How far the bytes were examined
    pub scanned_to: u64,
}

impl ParsedChunks {
    /// A result that consumed nothing, resuming where it started
    pub fn empty_at(pos: u64) -> Self {
        Self {
            chunks: Vec::new(),
            pending: None,
            last_parsed_pos: pos,
            scanned_to: pos,
        }
    }

    pub fn row_count(&self) -> u64 {
        self.chunks.iter().map(Chunk::row_count).sum::<u64>()
            + self.pending.map_or(0, |p| p.row_count())
    }
}

/// Growing, ordered list of chunks plus the parse cursor.
#[derive(Debug, Default, Clone)]
pub struct ChunkIndex {
    chunks: Vec<Chunk>,
    pending: Option<Chunk>,
    last_parsed_pos: u64,
    scanned_to: u64,
}

impl ChunkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the chunk holding `row`, or `None` when the row is not indexed yet.
    ///
    /// Binary search on `last_row`, O(log chunks).
    pub fn lookup_row_chunk(&self, row: u64) -> Option<Chunk> {
        let idx = self.chunks.partition_point(|c| c.last_row() < row);
        match self.chunks.get(idx) {
            Some(chunk) if chunk.contains_row(row) => Some(*chunk),
            _ => self.pending.filter(|p| p.contains_row(row)),
        }
    }

    /// Whether `chunk` is the provisional trailing row
    pub fn is_provisional(&self, chunk: &Chunk) -> bool {
        self.pending.as_ref() == Some(chunk)
    }

    /// Append the result of a parse step.
    ///
    /// Returns false and leaves the index untouched when the batch does not continue
    /// the current row and byte sequence.
    pub fn grow_by(&mut self, batch: ParsedChunks) -> bool {
        let mut next_row = self.complete_row_count();
        let mut next_byte = self.last_parsed_pos;

        for chunk in batch.chunks.iter().chain(batch.pending.iter()) {
            if chunk.first_row() != next_row || chunk.byte_start() < next_byte {
                log::error!(
                    "Rejecting chunk {:?}: expected first row {} at or after byte {}",
                    chunk,
                    next_row,
                    next_byte
                );
                return false;
            }
            next_row = chunk.last_row() + 1;
            next_byte = chunk.byte_end() + 1;
        }

        self.chunks.extend(batch.chunks);
        self.pending = batch.pending;
        self.last_parsed_pos = self.last_parsed_pos.max(batch.last_parsed_pos);
        self.scanned_to = self.scanned_to.max(batch.scanned_to);
        true
    }

    /// Total visible rows, provisional trailing row included
    pub fn row_count(&self) -> u64 {
        match self.pending {
            Some(pending) => pending.last_row() + 1,
            None => self.complete_row_count(),
        }
    }

    /// Rows that are final; the next parse step numbers its rows from here
    pub fn complete_row_count(&self) -> u64 {
        self.chunks.last().map_or(0, |c| c.last_row() + 1)
    }

    pub fn last_parsed_pos(&self) -> u64 {
        self.last_parsed_pos
    }

    pub fn scanned_to(&self) -> u64 {
        self.scanned_to
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn pending(&self) -> Option<&Chunk> {
        self.pending.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.pending.is_none()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.pending = None;
        self.last_parsed_pos = 0;
        self.scanned_to = 0;
    }
}
