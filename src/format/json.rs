//! Streams of self-delimiting JSON documents, one row per document.
//!
//! Documents may be separated by any whitespace (newline-delimited JSON is the
//! common case, but pretty-printed multi-line documents work too). Row boundaries
//! come from serde_json's streaming deserializer, which reports the byte offset
//! after every complete document.

use super::{row_width, RowData, RowFormat};
use crate::config::{Column, ColumnType, EngineSettings, FileConf};
use crate::error::{Result, TailscanError};
use crate::index::{Chunk, ParsedChunks};
use crate::source::read_span;
use bstr::ByteSlice;
use serde::de::{self, Deserialize, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::{Deserializer, Value};
use std::fmt;
use std::io::{Read, Seek};

#[derive(Debug, Clone)]
pub struct JsonFormat {
    chunk_size: u64,
    max_chunks: usize,
    /// `(row slot, member key)` for every configured column
    fields: Vec<(usize, String)>,
    width: usize,
}

/// A top-level document. Only objects become rows; arrays and scalars are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Document {
    Object,
    Other,
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = Document;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a JSON document")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Document, A::Error> {
                while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
                Ok(Document::Object)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Document, A::Error> {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(Document::Other)
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<Document, E> {
                Ok(Document::Other)
            }

            fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<Document, E> {
                Ok(Document::Other)
            }

            fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<Document, E> {
                Ok(Document::Other)
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<Document, E> {
                Ok(Document::Other)
            }

            fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<Document, E> {
                Ok(Document::Other)
            }

            fn visit_unit<E: de::Error>(self) -> std::result::Result<Document, E> {
                Ok(Document::Other)
            }
        }

        deserializer.deserialize_any(DocumentVisitor)
    }
}

/// Outcome of scanning one window of bytes for whole documents
struct WindowScan {
    /// Object documents, the ones that become rows
    rows: u64,
    /// Offset just past the last complete document of any kind
    consumed: usize,
    failure: Option<serde_json::Error>,
}

fn scan_window(buffer: &[u8]) -> WindowScan {
    let mut stream = Deserializer::from_slice(buffer).into_iter::<Document>();
    let mut scan = WindowScan {
        rows: 0,
        consumed: 0,
        failure: None,
    };

    loop {
        match stream.next() {
            Some(Ok(document)) => {
                if document == Document::Object {
                    scan.rows += 1;
                }
                scan.consumed = stream.byte_offset();
            }
            Some(Err(e)) => {
                scan.failure = Some(e);
                break;
            }
            None => break,
        }
    }
    scan
}

fn column_type_of(value: &Value) -> ColumnType {
    match value {
        Value::Bool(_) => ColumnType::Boolean,
        Value::Number(n) if n.is_u64() => ColumnType::UnsignedInt,
        Value::Number(n) if n.is_i64() => ColumnType::SignedInt,
        Value::Number(_) => ColumnType::Float,
        _ => ColumnType::Str,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

impl JsonFormat {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            chunk_size: settings.record_chunk_size.max(1) as u64,
            max_chunks: settings.max_record_chunks_per_parse.max(1),
            fields: Vec::new(),
            width: 0,
        }
    }
}

impl RowFormat for JsonFormat {
    fn configure(&mut self, conf: &mut FileConf, initial: &[u8]) -> bool {
        if conf.columns.is_empty() {
            let first_object = Deserializer::from_slice(initial)
                .into_iter::<Value>()
                .find_map(|document| match document {
                    Ok(Value::Object(members)) => Some(Ok(members)),
                    Ok(_) => None,
                    Err(e) => Some(Err(e)),
                });
            match first_object {
                Some(Ok(members)) => {
                    for (index, (key, value)) in members.iter().enumerate() {
                        conf.add_column(
                            Column::new(index, key.clone(), key.clone())
                                .with_type(column_type_of(value)),
                        );
                    }
                }
                Some(Err(e)) => log::warn!("Cannot derive columns from first document: {}", e),
                None => log::debug!("No object document available yet to derive columns from"),
            }
        }

        self.fields = conf
            .columns
            .iter()
            .map(|column| (column.index, column.key.clone()))
            .collect();
        self.width = row_width(&conf.columns);
        !conf.columns.is_empty()
    }

    fn parse_chunks<R: Read + Seek>(
        &self,
        reader: &mut R,
        from_pos: u64,
        next_row: u64,
        file_size: u64,
    ) -> Result<ParsedChunks> {
        let mut chunks = Vec::new();
        let mut pos = from_pos;
        let mut row = next_row;
        let mut end = file_size;
        let mut window = self.chunk_size;

        while pos < end && chunks.len() < self.max_chunks {
            let want = window.min(end - pos);
            let buffer = read_span(reader, pos, want)?;
            if (buffer.len() as u64) < want {
                end = pos + buffer.len() as u64;
            }
            if buffer.is_empty() {
                break;
            }
            let at_end = pos + buffer.len() as u64 >= end;

            let scan = scan_window(&buffer);
            if scan.consumed > 0 {
                if scan.rows > 0 {
                    let last = pos + scan.consumed as u64 - 1;
                    chunks.push(Chunk::new(pos, last, row, row + scan.rows - 1));
                    row += scan.rows;
                }
                pos += scan.consumed as u64;
                window = self.chunk_size;
            }

            match scan.failure {
                None if scan.consumed == 0 => {
                    // Only whitespace left in this window
                    pos += buffer.len() as u64;
                }
                None => {}
                Some(e) if e.is_eof() => {
                    if at_end {
                        // Document still being written; it is parsed on a later step.
                        break;
                    }
                    if scan.consumed == 0 {
                        window = window.saturating_mul(2);
                    }
                }
                Some(e) => {
                    log::error!(
                        "Malformed document near byte {}: {}; skipping to byte {}",
                        pos,
                        e,
                        end
                    );
                    let resume = pos.max(end);
                    return Ok(ParsedChunks {
                        chunks,
                        pending: None,
                        last_parsed_pos: resume,
                        scanned_to: resume,
                    });
                }
            }
        }

        let scanned_to = if chunks.len() < self.max_chunks {
            end
        } else {
            pos
        };
        log::debug!(
            "Parsed {} document chunks ({} rows) from byte {} to {}",
            chunks.len(),
            row - next_row,
            from_pos,
            pos
        );

        Ok(ParsedChunks {
            chunks,
            pending: None,
            last_parsed_pos: pos,
            scanned_to: scanned_to.max(pos),
        })
    }

    fn load_chunk_rows<R: Read + Seek>(
        &self,
        reader: &mut R,
        chunk: &Chunk,
    ) -> Result<Vec<String>> {
        let bytes = read_span(reader, chunk.byte_start(), chunk.byte_count())?;
        let mut rows = Vec::with_capacity(chunk.row_count() as usize);
        let mut stream = Deserializer::from_slice(&bytes).into_iter::<Document>();
        let mut start = 0;

        while let Some(item) = stream.next() {
            match item {
                Ok(document) => {
                    let offset = stream.byte_offset();
                    if document == Document::Object {
                        rows.push(bytes[start..offset].trim().to_str_lossy().into_owned());
                    }
                    start = offset;
                }
                Err(e) => {
                    log::error!(
                        "Document in chunk at byte {} failed to decode: {}",
                        chunk.byte_start(),
                        e
                    );
                    break;
                }
            }
        }

        Ok(rows)
    }

    fn parse_row(&self, raw: &str) -> Result<RowData> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| TailscanError::decode(format!("Invalid document: {}", e)))?;
        let Value::Object(members) = value else {
            return Err(TailscanError::decode("Document is not an object"));
        };

        let mut row = vec![String::new(); self.width];
        for (slot, key) in &self.fields {
            if let (Some(value), Some(field)) = (members.get(key), row.get_mut(*slot)) {
                *field = render(value);
            }
        }
        Ok(row)
    }
}
