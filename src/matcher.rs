//! Row matching: leaf matchers over one field and their AND/OR combination.
//!
//! A `SearchParam` describes one predicate as the user configured it. `RowMatcher`
//! compiles a list of them against the file's columns once, then tests decoded rows.
//! Construction rejects anything that would otherwise silently match everything or
//! nothing (bad regex, range without a column, unparseable range bounds).

pub mod pattern;
pub mod range;
pub mod substring;
pub mod value;

pub use pattern::PatternMatcher;
pub use range::RangeMatcher;
pub use substring::SubstringMatcher;
pub use value::TypedValue;

use crate::config::Column;
use crate::error::{Result, TailscanError};

/// Which leaf matcher a parameter builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "lowercase"))]
pub enum MatchKind {
    #[default]
    Substring,
    Regex,
    Range,
}

/// One search predicate. Matching is case-sensitive unless turned off.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct SearchParam {
    pub kind: MatchKind,
    pub pattern: String,
    pub case_sensitive: bool,
    /// The whole field must match instead of a part of it
    pub whole_text: bool,
    /// Invert this predicate before combining it with the others
    pub not_operator: bool,
    /// Restrict the predicate to one column; `None` tests every column
    pub column: Option<usize>,
}

impl Default for SearchParam {
    fn default() -> Self {
        Self {
            kind: MatchKind::Substring,
            pattern: String::new(),
            case_sensitive: true,
            whole_text: false,
            not_operator: false,
            column: None,
        }
    }
}

impl SearchParam {
    pub fn substring(pattern: impl Into<String>) -> Self {
        Self {
            kind: MatchKind::Substring,
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            kind: MatchKind::Regex,
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn range(pattern: impl Into<String>, column: usize) -> Self {
        Self {
            kind: MatchKind::Range,
            pattern: pattern.into(),
            column: Some(column),
            ..Self::default()
        }
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_whole_text(mut self, whole_text: bool) -> Self {
        self.whole_text = whole_text;
        self
    }

    pub fn with_not(mut self, not_operator: bool) -> Self {
        self.not_operator = not_operator;
        self
    }

    pub fn in_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }
}

/// A saved, named filter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct FilterParam {
    pub name: String,
    pub param: SearchParam,
}

/// A predicate plus the colors a front end paints matching rows with
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct HighlighterParam {
    pub param: SearchParam,
    pub text_color: Option<String>,
    pub back_color: Option<String>,
}

/// How the per-parameter results of one row are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    /// Every predicate must hold
    #[default]
    And,
    /// Any predicate suffices
    Or,
}

/// A compiled leaf matcher
#[derive(Debug, Clone)]
pub enum FieldMatcher {
    Substring(SubstringMatcher),
    Regex(PatternMatcher),
    Range(RangeMatcher),
}

impl FieldMatcher {
    /// Build the leaf matcher described by `param`, resolving range columns in `columns`
    pub fn from_param(param: &SearchParam, columns: &[Column]) -> Result<Self> {
        match param.kind {
            MatchKind::Substring => Ok(Self::Substring(SubstringMatcher::new(
                &param.pattern,
                param.case_sensitive,
                param.whole_text,
            ))),
            MatchKind::Regex => PatternMatcher::new(
                &param.pattern,
                param.case_sensitive,
                param.whole_text,
            )
            .map(Self::Regex),
            MatchKind::Range => {
                let index = param.column.ok_or_else(|| {
                    TailscanError::config(format!(
                        "range matcher '{}' needs a column",
                        param.pattern
                    ))
                })?;
                let column = columns.iter().find(|c| c.index == index).ok_or_else(|| {
                    TailscanError::config(format!(
                        "range matcher column {} does not exist ({} columns)",
                        index,
                        columns.len()
                    ))
                })?;
                RangeMatcher::new(&param.pattern, column).map(Self::Range)
            }
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Substring(m) => m.is_match(text),
            Self::Regex(m) => m.is_match(text),
            Self::Range(m) => m.is_match(text),
        }
    }
}

#[derive(Debug, Clone)]
struct ParamMatcher {
    field: FieldMatcher,
    column: Option<usize>,
    negate: bool,
}

/// A list of compiled predicates and the rule that combines them.
///
/// An empty list matches nothing.
#[derive(Debug, Clone)]
pub struct RowMatcher {
    matchers: Vec<ParamMatcher>,
    combinator: Combinator,
}

impl RowMatcher {
    pub fn new(params: &[SearchParam], combinator: Combinator, columns: &[Column]) -> Result<Self> {
        let matchers = params
            .iter()
            .map(|param| {
                Ok(ParamMatcher {
                    field: FieldMatcher::from_param(param, columns)?,
                    column: param.column,
                    negate: param.not_operator,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            matchers,
            combinator,
        })
    }

    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Test a decoded row.
    ///
    /// A column-scoped predicate only looks at its column; an unscoped one holds if
    /// any field matches. A predicate whose column is beyond the row's fields is
    /// logged and counts as not holding, whatever its NOT flag.
    pub fn matches_row(&self, row: &[String]) -> bool {
        self.combine(|m| match m.column {
            Some(index) => match row.get(index) {
                Some(field) => Some(m.field.is_match(field)),
                None => {
                    log::error!(
                        "Matcher column {} is beyond the row's {} fields",
                        index,
                        row.len()
                    );
                    None
                }
            },
            None => Some(row.iter().any(|field| m.field.is_match(field))),
        })
    }

    /// Test one string with every predicate, ignoring column scopes.
    pub fn matches_text(&self, text: &str) -> bool {
        self.combine(|m| Some(m.field.is_match(text)))
    }

    fn combine<F>(&self, mut test: F) -> bool
    where
        F: FnMut(&ParamMatcher) -> Option<bool>,
    {
        let mut held = 0;
        for matcher in &self.matchers {
            let Some(matched) = test(matcher) else {
                continue;
            };
            if matched != matcher.negate {
                held += 1;
                if self.combinator == Combinator::Or || held == self.matchers.len() {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnType;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::new(0, "1", "level"),
            Column::new(1, "2", "count").with_type(ColumnType::SignedInt),
            Column::new(2, "3", "message"),
        ]
    }

    #[test]
    fn test_and_requires_every_param() {
        let matcher = RowMatcher::new(
            &[
                SearchParam::substring("ERROR").in_column(0),
                SearchParam::substring("disk"),
            ],
            Combinator::And,
            &columns(),
        )
        .unwrap();

        assert!(matcher.matches_row(&row(&["ERROR", "3", "disk full"])));
        assert!(!matcher.matches_row(&row(&["ERROR", "3", "net down"])));
        assert!(!matcher.matches_row(&row(&["INFO", "3", "disk full"])));
    }

    #[test]
    fn test_or_takes_any_param() {
        let matcher = RowMatcher::new(
            &[
                SearchParam::substring("warn")
                    .in_column(0)
                    .with_case_sensitive(false),
                SearchParam::range("10 ->", 1),
            ],
            Combinator::Or,
            &columns(),
        )
        .unwrap();

        assert!(matcher.matches_row(&row(&["WARN", "1", ""])));
        assert!(matcher.matches_row(&row(&["INFO", "12", ""])));
        assert!(!matcher.matches_row(&row(&["INFO", "2", ""])));
    }

    #[test]
    fn test_not_inverts_single_param() {
        let matcher = RowMatcher::new(
            &[
                SearchParam::substring("DEBUG").with_not(true),
                SearchParam::substring("cache"),
            ],
            Combinator::And,
            &columns(),
        )
        .unwrap();

        assert!(matcher.matches_row(&row(&["INFO", "1", "cache miss"])));
        assert!(!matcher.matches_row(&row(&["DEBUG", "1", "cache miss"])));
    }

    #[test]
    fn test_out_of_range_column_never_holds() {
        let matcher = RowMatcher::new(
            &[SearchParam::substring("x").in_column(7).with_not(true)],
            Combinator::Or,
            &columns(),
        )
        .unwrap();
        assert!(!matcher.matches_row(&row(&["a", "b"])));
    }

    #[test]
    fn test_default_param_is_case_sensitive() {
        assert!(SearchParam::default().case_sensitive);
        let matcher = RowMatcher::new(
            &[SearchParam::substring("apple")],
            Combinator::And,
            &columns(),
        )
        .unwrap();
        assert!(matcher.matches_text("apple pie"));
        assert!(!matcher.matches_text("APPLE"));
    }

    #[test]
    fn test_range_column_found_by_index_not_position() {
        let columns = vec![
            Column::new(1, "2", "count").with_type(ColumnType::SignedInt),
            Column::new(0, "1", "level"),
        ];
        let matcher = RowMatcher::new(
            &[SearchParam::range("5 -> 10", 1)],
            Combinator::And,
            &columns,
        )
        .unwrap();
        assert!(matcher.matches_row(&row(&["INFO", "7"])));
        assert!(!matcher.matches_row(&row(&["INFO", "70"])));
    }

    #[test]
    fn test_empty_matcher_matches_nothing() {
        let matcher = RowMatcher::new(&[], Combinator::Or, &columns()).unwrap();
        assert!(matcher.is_empty());
        assert!(!matcher.matches_row(&row(&["anything"])));
        assert!(!matcher.matches_text("anything"));
    }

    #[test]
    fn test_matches_text() {
        let matcher = RowMatcher::new(
            &[
                SearchParam::regex(r"^\d{3}$"),
                SearchParam::substring("5"),
            ],
            Combinator::And,
            &[],
        )
        .unwrap();
        assert!(matcher.matches_text("456"));
        assert!(!matcher.matches_text("123"));
        assert!(!matcher.matches_text("4567"));
    }

    #[test]
    fn test_configuration_errors() {
        let no_column = SearchParam {
            kind: MatchKind::Range,
            pattern: "1 -> 2".into(),
            ..SearchParam::default()
        };
        let err = RowMatcher::new(&[no_column], Combinator::And, &columns()).unwrap_err();
        assert!(err.is_config());

        let missing_column = SearchParam::range("1 -> 2", 9);
        assert!(RowMatcher::new(&[missing_column], Combinator::And, &columns()).is_err());

        let bad_regex = SearchParam::regex("[unterminated");
        assert!(RowMatcher::new(&[bad_regex], Combinator::And, &columns()).is_err());
    }
}
