//! Catalog queries: field filters, match modes and fuzzy scoring.

use std::fmt;

use regex::{Regex, RegexBuilder};

use super::entry::CatalogEntry;
use crate::error::Result;

/// Default minimum fuzzy score (0-100).
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 70;

/// How a filter value is compared with an entry field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Match {
    #[default]
    Exact,
    Contains,
    Regex,
    /// Normalized edit-distance similarity at or above the threshold.
    Fuzzy,
}

/// Entry fields a query can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogField {
    Path,
    Channel,
    Namespace,
    Version,
    Dataset,
    Table,
    Title,
}

impl CatalogField {
    pub fn name(&self) -> &'static str {
        match self {
            CatalogField::Path => "path",
            CatalogField::Channel => "channel",
            CatalogField::Namespace => "namespace",
            CatalogField::Version => "version",
            CatalogField::Dataset => "dataset",
            CatalogField::Table => "table",
            CatalogField::Title => "title",
        }
    }

    pub fn value<'a>(&self, entry: &'a CatalogEntry) -> Option<&'a str> {
        match self {
            CatalogField::Path => Some(&entry.path),
            CatalogField::Channel => Some(&entry.channel),
            CatalogField::Namespace => Some(&entry.namespace),
            CatalogField::Version => Some(&entry.version),
            CatalogField::Dataset => Some(&entry.dataset),
            CatalogField::Table => Some(&entry.table),
            CatalogField::Title => entry.title.as_deref(),
        }
    }
}

/// A set of field filters, all of which must match.
#[derive(Debug, Clone)]
pub struct Query {
    filters: Vec<(CatalogField, String)>,
    mode: Match,
    case_sensitive: bool,
    threshold: u8,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            mode: Match::default(),
            case_sensitive: false,
            threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: CatalogField, value: impl Into<String>) -> Self {
        self.filters.push((field, value.into()));
        self
    }

    pub fn path(self, value: impl Into<String>) -> Self {
        self.filter(CatalogField::Path, value)
    }

    pub fn channel(self, value: impl Into<String>) -> Self {
        self.filter(CatalogField::Channel, value)
    }

    pub fn namespace(self, value: impl Into<String>) -> Self {
        self.filter(CatalogField::Namespace, value)
    }

    pub fn version(self, value: impl Into<String>) -> Self {
        self.filter(CatalogField::Version, value)
    }

    pub fn dataset(self, value: impl Into<String>) -> Self {
        self.filter(CatalogField::Dataset, value)
    }

    pub fn table(self, value: impl Into<String>) -> Self {
        self.filter(CatalogField::Table, value)
    }

    pub fn title(self, value: impl Into<String>) -> Self {
        self.filter(CatalogField::Title, value)
    }

    pub fn mode(mut self, mode: Match) -> Self {
        self.mode = mode;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold.min(100);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub(crate) fn compile(&self) -> Result<CompiledQuery<'_>> {
        let regexes = match self.mode {
            Match::Regex => self
                .filters
                .iter()
                .map(|(_, pattern)| {
                    RegexBuilder::new(pattern)
                        .case_insensitive(!self.case_sensitive)
                        .build()
                })
                .collect::<std::result::Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };
        Ok(CompiledQuery {
            query: self,
            regexes,
        })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .filters
            .iter()
            .map(|(field, value)| format!("{}={}", field.name(), value))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// A query with its regexes built once.
pub(crate) struct CompiledQuery<'q> {
    query: &'q Query,
    regexes: Vec<Regex>,
}

/// Outcome of matching one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Score {
    pub value: u8,
    /// Every filter equals its field (modulo case).
    pub exact: bool,
}

impl CompiledQuery<'_> {
    pub fn score(&self, entry: &CatalogEntry) -> Option<Score> {
        let query = self.query;
        let mut score = Score {
            value: 100,
            exact: true,
        };
        for (i, (field, pattern)) in query.filters.iter().enumerate() {
            let value = field.value(entry)?;
            let (value, pattern) = if query.case_sensitive {
                (value.to_string(), pattern.clone())
            } else {
                (value.to_lowercase(), pattern.to_lowercase())
            };
            let exact = value == pattern;
            let field_score = match query.mode {
                Match::Exact => exact.then_some(100),
                Match::Contains => value.contains(&pattern).then_some(100),
                Match::Regex => self.regexes[i].is_match(&value).then_some(100),
                Match::Fuzzy => {
                    let s = similarity(&pattern, &value);
                    (s >= query.threshold).then_some(s)
                }
            }?;
            score.value = score.value.min(field_score);
            score.exact &= exact;
        }
        Some(score)
    }

    pub fn is_fuzzy(&self) -> bool {
        self.query.mode == Match::Fuzzy
    }
}

/// Similarity in `0..=100` from the Levenshtein distance, normalized by the
/// longer string.
pub fn similarity(a: &str, b: &str) -> u8 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100;
    }
    let distance = levenshtein(a, b);
    (100 - (distance * 100).div_ceil(longest)) as u8
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];
    for (i, ca) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b_chars.len()]
}
