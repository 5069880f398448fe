//! # tailscan - Incremental Log Indexing, Tailing and Search
//!
//! An engine for viewing large, growing log files without loading them: rows are
//! located by a sparse chunk index, read back on demand, and searched by a
//! background thread that keeps up with the file as it grows.
//!
//! ## Features
//!
//! - **Incremental Indexing**: Only newly appended bytes are scanned
//! - **Tailing**: Growth, truncation and recreation are detected by polling
//! - **Formats**: Plain text lines, regex-split text, concatenated JSON records
//! - **Background Search**: Substring, regex and typed range matching per column
//! - **Projections**: Filtered, nestable views over the file's rows
//!
//! ## Architecture
//!
//! - [`config`] - File configuration, columns and engine tuning
//! - [`format`] - Row boundary detection and field extraction per file format
//! - [`index`] - Chunk index and the single-chunk row cache
//! - [`watch`] - The poll-based watcher thread
//! - [`matcher`] - Field and row matchers
//! - [`search`] - The background search thread
//! - [`projection`] - Filtered row views
//! - [`engine`] - Ties the above together behind [`LogEngine`]
//! - [`source`] - Low-level file access and validation
//! - [`error`] - Centralized error types

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod index;
pub mod matcher;
pub mod projection;
pub mod search;
pub mod source;
pub mod watch;

// Re-export commonly used types for convenience
pub use error::{Result, TailscanError};

pub use config::{Column, ColumnType, EngineSettings, FileConf, FileFormat};
pub use engine::{EngineEvent, EngineEvents, EngineReader, LogEngine, SearchId};
pub use format::{FormatAdapter, RowData, RowFormat};
pub use index::{Chunk, ChunkIndex, ChunkRowCache};
pub use matcher::{Combinator, FilterParam, HighlighterParam, MatchKind, RowMatcher, SearchParam};
pub use projection::{ResultProjection, RowSource};
pub use source::validate_file_path;
pub use watch::{WatchOutcome, WatchState};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
