//! Line-oriented rows, optionally split into columns by a capture-group pattern.

use super::{row_width, RowData, RowFormat};
use crate::config::{Column, EngineSettings, FileConf};
use crate::error::Result;
use crate::index::{Chunk, ParsedChunks};
use crate::source::{decode_line, read_span};
use memchr::{memchr, memchr_iter, memrchr};
use regex::Regex;
use std::io::{Read, Seek};

/// Where a column's value comes from in a pattern match
#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupRef {
    Index(usize),
    Name(String),
    Missing,
}

#[derive(Debug, Clone)]
pub struct TextFormat {
    chunk_size: u64,
    max_chunks: usize,
    pattern: Option<Regex>,
    /// `(row slot, capture group)` for every configured column
    fields: Vec<(usize, GroupRef)>,
    width: usize,
    no_match_column: usize,
}

impl TextFormat {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            chunk_size: settings.text_chunk_size.max(1) as u64,
            max_chunks: settings.max_text_chunks_per_parse.max(1),
            pattern: None,
            fields: Vec::new(),
            width: 1,
            no_match_column: 0,
        }
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    /// Find the end of the row starting at `pos`, reading past the chunk size when a
    /// single line is longer than one chunk. Returns the buffer read so far and the
    /// offset of the last newline in it, if any.
    fn read_chunk<R: Read + Seek>(
        &self,
        reader: &mut R,
        pos: u64,
        end: &mut u64,
    ) -> Result<(Vec<u8>, Option<usize>)> {
        let want = self.chunk_size.min(*end - pos);
        let mut buffer = read_span(reader, pos, want)?;
        if (buffer.len() as u64) < want {
            // Shrunk while reading; the watcher notices on its next poll.
            *end = pos + buffer.len() as u64;
        }

        let mut last_newline = memrchr(b'\n', &buffer);
        while last_newline.is_none() && pos + (buffer.len() as u64) < *end {
            let scanned = buffer.len();
            let next = pos + scanned as u64;
            let more = read_span(reader, next, self.chunk_size.min(*end - next))?;
            if more.is_empty() {
                *end = next;
                break;
            }
            buffer.extend_from_slice(&more);
            last_newline = memchr(b'\n', &buffer[scanned..]).map(|i| scanned + i);
        }

        Ok((buffer, last_newline))
    }
}

fn resolve_group(regex: &Regex, key: &str) -> GroupRef {
    if let Ok(index) = key.parse::<usize>() {
        if index < regex.captures_len() {
            return GroupRef::Index(index);
        }
    } else if regex.capture_names().flatten().any(|name| name == key) {
        return GroupRef::Name(key.to_string());
    }

    log::error!(
        "Column key '{}' is not a capture group of '{}'",
        key,
        regex.as_str()
    );
    GroupRef::Missing
}

impl RowFormat for TextFormat {
    fn configure(&mut self, conf: &mut FileConf, _initial: &[u8]) -> bool {
        self.pattern = None;
        self.fields.clear();

        match conf.row_pattern().map(str::to_string) {
            None => {
                if conf.columns.is_empty() {
                    conf.add_column(Column::new(0, "0", "text"));
                }
            }
            Some(source) => {
                let regex = match Regex::new(&source) {
                    Ok(regex) => regex,
                    Err(e) => {
                        log::error!("Invalid row pattern '{}': {}", source, e);
                        return false;
                    }
                };

                if conf.columns.is_empty() {
                    for (group, name) in regex.capture_names().enumerate().skip(1) {
                        let key = group.to_string();
                        let name = name.map_or_else(|| key.clone(), str::to_string);
                        conf.add_column(Column::new(group - 1, key, name));
                    }
                }

                self.fields = conf
                    .columns
                    .iter()
                    .map(|column| (column.index, resolve_group(&regex, &column.key)))
                    .collect();
                self.pattern = Some(regex);
            }
        }

        self.width = row_width(&conf.columns).max(1);
        self.no_match_column = conf.no_match_column.min(self.width - 1);
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
        let mut pending = None;
        let mut pos = from_pos;
        let mut row = next_row;
        let mut end = file_size;

        while pos < end && chunks.len() < self.max_chunks {
            let (buffer, last_newline) = self.read_chunk(reader, pos, &mut end)?;
            if buffer.is_empty() {
                break;
            }

            match last_newline {
                Some(idx) => {
                    let rows = memchr_iter(b'\n', &buffer[..=idx]).count() as u64;
                    chunks.push(Chunk::new(pos, pos + idx as u64, row, row + rows - 1));
                    row += rows;
                    pos += idx as u64 + 1;
                }
                None => {
                    // Unterminated last line: visible now, re-parsed once it grows.
                    let last = pos + buffer.len() as u64 - 1;
                    pending = Some(Chunk::new(pos, last, row, row));
                    break;
                }
            }
        }

        let scanned_to = if pending.is_some() { end } else { pos };
        log::debug!(
            "Parsed {} text chunks ({} complete rows) from byte {} to {}",
            chunks.len(),
            row - next_row,
            from_pos,
            pos
        );

        Ok(ParsedChunks {
            chunks,
            pending,
            last_parsed_pos: pos,
            scanned_to,
        })
    }

    fn load_chunk_rows<R: Read + Seek>(
        &self,
        reader: &mut R,
        chunk: &Chunk,
    ) -> Result<Vec<String>> {
        let bytes = read_span(reader, chunk.byte_start(), chunk.byte_count())?;
        let mut rows = Vec::with_capacity(chunk.row_count() as usize);

        let mut start = 0;
        for newline in memchr_iter(b'\n', &bytes) {
            rows.push(decode_line(&bytes[start..newline]));
            start = newline + 1;
        }
        if start < bytes.len() {
            rows.push(decode_line(&bytes[start..]));
        }

        Ok(rows)
    }

    fn parse_row(&self, raw: &str) -> Result<RowData> {
        let Some(regex) = &self.pattern else {
            return Ok(vec![raw.to_string()]);
        };

        let mut row = vec![String::new(); self.width];
        match regex.captures(raw) {
            Some(captures) => {
                for (slot, group) in &self.fields {
                    let value = match group {
                        GroupRef::Index(index) => captures.get(*index),
                        GroupRef::Name(name) => captures.name(name),
                        GroupRef::Missing => None,
                    };
                    if let (Some(value), Some(field)) = (value, row.get_mut(*slot)) {
                        *field = value.as_str().to_string();
                    }
                }
            }
            None => row[self.no_match_column] = raw.to_string(),
        }

        Ok(row)
    }
}
