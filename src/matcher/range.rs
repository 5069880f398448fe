//! Inclusive range matching over typed column values.
//!
//! Patterns look like `from -> to`. Either side may be left out (`5 ->`, `-> 10`),
//! and a pattern without an arrow is a lower bound only. The text is split on the
//! first arrow, so a bound cannot itself contain `->`.

use super::value::TypedValue;
use crate::config::{Column, ColumnType};
use crate::error::{Result, TailscanError};

#[derive(Debug, Clone)]
pub struct RangeMatcher {
    value_type: ColumnType,
    format_hint: String,
    from: Option<TypedValue>,
    to: Option<TypedValue>,
}

impl RangeMatcher {
    pub fn new(pattern: &str, column: &Column) -> Result<Self> {
        if pattern.trim().is_empty() {
            return Err(TailscanError::pattern(pattern, "range pattern is empty"));
        }

        let (from, to) = split_bounds(pattern);
        let parse_bound = |bound: Option<&str>| -> Result<Option<TypedValue>> {
            match bound {
                None => Ok(None),
                Some(text) => TypedValue::parse(column.value_type, &column.format_hint, text)
                    .map(Some)
                    .ok_or_else(|| {
                        TailscanError::pattern(
                            pattern,
                            format!(
                                "'{}' is not a valid {:?} value for column '{}'",
                                text, column.value_type, column.name
                            ),
                        )
                    }),
            }
        };

        let from = parse_bound(from)?;
        let to = parse_bound(to)?;
        if from.is_none() && to.is_none() {
            return Err(TailscanError::pattern(pattern, "range has no bounds"));
        }

        Ok(Self {
            value_type: column.value_type,
            format_hint: column.format_hint.clone(),
            from,
            to,
        })
    }

    pub fn from(&self) -> Option<&TypedValue> {
        self.from.as_ref()
    }

    pub fn to(&self) -> Option<&TypedValue> {
        self.to.as_ref()
    }

    /// Empty fields and fields that do not parse as the column type never match.
    pub fn is_match(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let Some(value) = TypedValue::parse(self.value_type, &self.format_hint, text) else {
            return false;
        };

        self.from.as_ref().map_or(true, |from| &value >= from)
            && self.to.as_ref().map_or(true, |to| &value <= to)
    }
}

/// Split `from -> to` on the first arrow, trimming both sides. Empty sides are `None`.
fn split_bounds(pattern: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(s: &str) -> Option<&str> {
        let s = s.trim();
        (!s.is_empty()).then_some(s)
    }

    match pattern.split_once("->") {
        Some((from, to)) => (non_empty(from), non_empty(to)),
        None => (non_empty(pattern), None),
    }
}
