//! Engine tuning constants and the file configuration value object.
//!
//! `EngineSettings` holds every interval and size the background loops use.
//! `FileConf` is what the surrounding application hands to an engine: the path,
//! the row format, the optional row-split pattern and the column list. The engine
//! fills in derived columns on its own copy and never writes it back to disk.
//!
//! With the `config` feature enabled, `FileConf` can also be read from a TOML
//! template.

use crate::matcher::{FilterParam, HighlighterParam};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timing and sizing knobs for the watcher, the format adapters and the search loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// How often the watcher checks the file for growth, truncation or removal
    pub poll_interval: Duration,
    /// Upper bound on how long matched rows are held before being sent to the consumer
    pub search_flush_interval: Duration,
    /// Pause before a search that caught up with the indexed rows looks for more
    pub search_resume_interval: Duration,
    /// Target chunk size for line-oriented files
    pub text_chunk_size: usize,
    /// Max chunks produced by one growth step of a line-oriented file
    pub max_text_chunks_per_parse: usize,
    /// Target chunk size for record-oriented files
    pub record_chunk_size: usize,
    /// Max chunks produced by one growth step of a record-oriented file
    pub max_record_chunks_per_parse: usize,
    /// How many leading bytes are handed to the adapter for column discovery
    pub configure_probe_bytes: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            search_flush_interval: Duration::from_secs(1),
            search_resume_interval: Duration::from_millis(500),
            text_chunk_size: 1024 * 1024,
            max_text_chunks_per_parse: 500,
            record_chunk_size: 2 * 1024 * 1024,
            max_record_chunks_per_parse: 50,
            configure_probe_bytes: 1024 * 1024,
        }
    }
}

impl EngineSettings {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_search_flush_interval(mut self, interval: Duration) -> Self {
        self.search_flush_interval = interval;
        self
    }

    pub fn with_search_resume_interval(mut self, interval: Duration) -> Self {
        self.search_resume_interval = interval;
        self
    }

    /// Override the chunk size used for both row formats
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.text_chunk_size = bytes.max(1);
        self.record_chunk_size = bytes.max(1);
        self
    }

    pub fn with_max_chunks_per_parse(mut self, text: usize, record: usize) -> Self {
        self.max_text_chunks_per_parse = text.max(1);
        self.max_record_chunks_per_parse = record.max(1);
        self
    }
}

/// Row layout of the underlying file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum FileFormat {
    /// One row per line, optionally split into columns by a capture-group pattern
    #[default]
    Text,
    /// A stream of self-delimiting JSON documents, one row per document
    Json,
}

impl FileFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Declared value type of a column, used by range matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum ColumnType {
    #[default]
    Str,
    SignedInt,
    UnsignedInt,
    Float,
    Boolean,
    Timestamp,
}

/// One column of the row layout
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct Column {
    /// Position of the field in every decoded row
    pub index: usize,
    /// Where the front end shows the column (may differ from `index`)
    pub display_position: i32,
    /// Capture group (number or name) for text rows, member name for JSON rows
    pub key: String,
    pub name: String,
    pub value_type: ColumnType,
    /// Parsing hint for typed values, e.g. a chrono format string for timestamps
    pub format_hint: String,
    /// Preferred width in characters, -1 when unset
    pub display_width: i32,
}

impl Default for Column {
    fn default() -> Self {
        Self {
            index: 0,
            display_position: -1,
            key: String::new(),
            name: String::new(),
            value_type: ColumnType::Str,
            format_hint: String::new(),
            display_width: -1,
        }
    }
}

impl Column {
    pub fn new(index: usize, key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            display_position: index as i32,
            key: key.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_type(mut self, value_type: ColumnType) -> Self {
        self.value_type = value_type;
        self
    }

    pub fn with_format_hint(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = hint.into();
        self
    }
}

/// Configuration handed to an engine for one file.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct FileConf {
    pub file_path: PathBuf,
    pub format: FileFormat,
    /// Capture-group pattern splitting text rows into columns
    pub row_pattern: Option<String>,
    pub columns: Vec<Column>,
    /// Column receiving the whole line when a text row does not match `row_pattern`
    pub no_match_column: usize,
    pub filters: Vec<FilterParam>,
    pub highlighters: Vec<HighlighterParam>,
}

impl FileConf {
    pub fn new(file_path: impl AsRef<Path>, format: FileFormat) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            format,
            ..Self::default()
        }
    }

    pub fn with_row_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.row_pattern = Some(pattern.into());
        self
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_no_match_column(mut self, column: usize) -> Self {
        self.no_match_column = column;
        self
    }

    /// The row pattern, treating an empty string as no pattern
    pub fn row_pattern(&self) -> Option<&str> {
        self.row_pattern.as_deref().filter(|p| !p.is_empty())
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    pub fn clear_columns(&mut self) {
        self.columns.clear();
    }

    pub fn has_column(&self, index: usize) -> bool {
        index < self.columns.len()
    }
}

#[cfg(feature = "config")]
impl FileConf {
    /// Parse a template from TOML text
    pub fn from_toml_str(text: &str) -> crate::Result<Self> {
        toml::from_str(text).map_err(|e| crate::TailscanError::config(e.to_string()))
    }

    /// Load a template from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            crate::TailscanError::file_error(
                format!("Failed to read template: {}", path.display()),
                e,
            )
        })?;
        Self::from_toml_str(&text)
    }
}

/// Directory where file templates are looked up by default
#[cfg(feature = "config")]
pub fn templates_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tailscan").join("templates"))
}
