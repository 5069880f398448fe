//! Row formats: how raw bytes split into rows and rows into fields.
//!
//! A format is picked once from `FileConf::format` and then drives three things:
//! column discovery (`configure`), incremental chunking of newly appeared bytes
//! (`parse_chunks`), and decoding (`load_chunk_rows` for a chunk's raw rows,
//! `parse_row` for one row's fields).

pub mod json;
pub mod text;

pub use json::JsonFormat;
pub use text::TextFormat;

use crate::config::{Column, EngineSettings, FileConf, FileFormat};
use crate::error::Result;
use crate::index::{Chunk, ParsedChunks};
use std::io::{Read, Seek};

/// Decoded fields of one row, positioned by `Column::index`
pub type RowData = Vec<String>;

/// Capability set every row format provides.
pub trait RowFormat {
    /// Accept the declared columns or derive them from `initial` (a prefix of the
    /// file). Returns false when no usable column set can be established.
    fn configure(&mut self, conf: &mut FileConf, initial: &[u8]) -> bool;

    /// Chunk the bytes in `from_pos..file_size`, numbering rows from `next_row`.
    ///
    /// `from_pos` must be a row boundary. Chunk ends always fall on row boundaries,
    /// and one call produces a bounded number of chunks.
    fn parse_chunks<R: Read + Seek>(
        &self,
        reader: &mut R,
        from_pos: u64,
        next_row: u64,
        file_size: u64,
    ) -> Result<ParsedChunks>;

    /// Raw text of every row in `chunk`, in row order
    fn load_chunk_rows<R: Read + Seek>(&self, reader: &mut R, chunk: &Chunk)
        -> Result<Vec<String>>;

    /// Split one row's raw text into fields
    fn parse_row(&self, raw: &str) -> Result<RowData>;
}

/// The configured row format of one engine
#[derive(Debug, Clone)]
pub enum FormatAdapter {
    Text(TextFormat),
    Json(JsonFormat),
}

impl FormatAdapter {
    /// Unconfigured adapter for `conf.format`; call `configure` before use
    pub fn for_conf(conf: &FileConf, settings: &EngineSettings) -> Self {
        match conf.format {
            FileFormat::Text => Self::Text(TextFormat::new(settings)),
            FileFormat::Json => Self::Json(JsonFormat::new(settings)),
        }
    }

    pub fn format(&self) -> FileFormat {
        match self {
            Self::Text(_) => FileFormat::Text,
            Self::Json(_) => FileFormat::Json,
        }
    }
}

impl RowFormat for FormatAdapter {
    fn configure(&mut self, conf: &mut FileConf, initial: &[u8]) -> bool {
        match self {
            Self::Text(format) => format.configure(conf, initial),
            Self::Json(format) => format.configure(conf, initial),
        }
    }

    fn parse_chunks<R: Read + Seek>(
        &self,
        reader: &mut R,
        from_pos: u64,
        next_row: u64,
        file_size: u64,
    ) -> Result<ParsedChunks> {
        match self {
            Self::Text(format) => format.parse_chunks(reader, from_pos, next_row, file_size),
            Self::Json(format) => format.parse_chunks(reader, from_pos, next_row, file_size),
        }
    }

    fn load_chunk_rows<R: Read + Seek>(
        &self,
        reader: &mut R,
        chunk: &Chunk,
    ) -> Result<Vec<String>> {
        match self {
            Self::Text(format) => format.load_chunk_rows(reader, chunk),
            Self::Json(format) => format.load_chunk_rows(reader, chunk),
        }
    }

    fn parse_row(&self, raw: &str) -> Result<RowData> {
        match self {
            Self::Text(format) => format.parse_row(raw),
            Self::Json(format) => format.parse_row(raw),
        }
    }
}

/// Width of a row for `columns`: one slot per column index
pub(crate) fn row_width(columns: &[Column]) -> usize {
    columns.iter().map(|c| c.index + 1).max().unwrap_or(0)
}
