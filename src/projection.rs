//! Filtered views over another row source.
//!
//! A `ResultProjection` is a sorted set of row numbers of its source. Row `i` of the
//! projection is source row `rows[i]`; row content is never copied, it is fetched
//! from the source on demand. Search hits and bookmarks are both projections, and
//! since a projection is itself a `RowSource`, projections nest.

use crate::config::Column;
use crate::format::RowData;
use crate::matcher::RowMatcher;
use std::sync::Arc;

/// Anything rows can be read from by number
pub trait RowSource: Send + Sync {
    /// Fields of `row`, together with the row's number in the underlying file
    fn get_row(&self, row: u64) -> Option<(u64, RowData)>;

    fn row_count(&self) -> u64;

    fn column_count(&self) -> usize;

    fn columns(&self) -> Vec<Column>;

    /// Number in the underlying file of this source's row `row`
    fn source_row(&self, row: u64) -> Option<u64>;
}

impl<T: RowSource + ?Sized> RowSource for Arc<T> {
    fn get_row(&self, row: u64) -> Option<(u64, RowData)> {
        (**self).get_row(row)
    }

    fn row_count(&self) -> u64 {
        (**self).row_count()
    }

    fn column_count(&self) -> usize {
        (**self).column_count()
    }

    fn columns(&self) -> Vec<Column> {
        (**self).columns()
    }

    fn source_row(&self, row: u64) -> Option<u64> {
        (**self).source_row(row)
    }
}

pub struct ResultProjection {
    source: Arc<dyn RowSource>,
    /// Source row numbers, strictly increasing
    rows: Vec<u64>,
}

impl ResultProjection {
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        Self {
            source,
            rows: Vec::new(),
        }
    }

    pub fn source(&self) -> &Arc<dyn RowSource> {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The projected source row numbers, ascending
    pub fn source_rows(&self) -> &[u64] {
        &self.rows
    }

    /// Insert one source row. Returns false if it was already present.
    pub fn add_source_row(&mut self, source_row: u64) -> bool {
        match self.rows.binary_search(&source_row) {
            Ok(_) => false,
            Err(pos) => {
                self.rows.insert(pos, source_row);
                true
            }
        }
    }

    /// Insert a batch of source rows, ignoring ones already present.
    ///
    /// Search batches arrive in ascending order past the current end, which is a
    /// plain append; anything else is merged.
    pub fn add_source_rows(&mut self, source_rows: &[u64]) {
        let mut incoming = source_rows.to_vec();
        incoming.sort_unstable();
        incoming.dedup();

        match (self.rows.last(), incoming.first()) {
            (_, None) => {}
            (None, Some(_)) => self.rows = incoming,
            (Some(last), Some(first)) if first > last => self.rows.extend(incoming),
            _ => {
                let mut merged = Vec::with_capacity(self.rows.len() + incoming.len());
                let (mut a, mut b) = (self.rows.iter().peekable(), incoming.iter().peekable());
                while let (Some(&&x), Some(&&y)) = (a.peek(), b.peek()) {
                    if x < y {
                        merged.push(x);
                        a.next();
                    } else if y < x {
                        merged.push(y);
                        b.next();
                    } else {
                        merged.push(x);
                        a.next();
                        b.next();
                    }
                }
                merged.extend(a);
                merged.extend(b);
                self.rows = merged;
            }
        }
    }

    /// Remove one source row. Returns false if it was not present.
    pub fn remove_source_row(&mut self, source_row: u64) -> bool {
        match self.rows.binary_search(&source_row) {
            Ok(pos) => {
                self.rows.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains_source_row(&self, source_row: u64) -> bool {
        self.rows.binary_search(&source_row).is_ok()
    }

    /// Projection row showing `source_row`, if it is part of the projection
    pub fn find_source_row(&self, source_row: u64) -> Option<u64> {
        self.rows.binary_search(&source_row).ok().map(|pos| pos as u64)
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Projection rows whose content matches `matcher`
    pub fn find_matching(&self, matcher: &RowMatcher) -> Vec<u64> {
        (0..self.rows.len() as u64)
            .filter(|&row| {
                self.get_row(row)
                    .map_or(false, |(_, fields)| matcher.matches_row(&fields))
            })
            .collect()
    }
}

impl RowSource for ResultProjection {
    fn get_row(&self, row: u64) -> Option<(u64, RowData)> {
        let source_row = *self.rows.get(row as usize)?;
        self.source.get_row(source_row)
    }

    fn row_count(&self) -> u64 {
        self.rows.len() as u64
    }

    fn column_count(&self) -> usize {
        self.source.column_count()
    }

    fn columns(&self) -> Vec<Column> {
        self.source.columns()
    }

    fn source_row(&self, row: u64) -> Option<u64> {
        let source_row = *self.rows.get(row as usize)?;
        self.source.source_row(source_row)
    }
}
