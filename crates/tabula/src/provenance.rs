//! Provenance records attached to variables and datasets.
//!
//! [`Source`], [`Origin`] and [`License`] are plain value types compared by
//! structural equality. Lists of them behave as ordered sets: duplicates are
//! dropped and first-seen order is kept, see [`ordered_union`].

use std::hash::Hash;

use chrono::NaiveDate;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Where a variable's data was obtained from (legacy provenance record).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub published_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    pub date_accessed: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Source {
    pub fn new(
        name: impl Into<String>,
        published_by: impl Into<String>,
        date_accessed: NaiveDate,
    ) -> Self {
        Self {
            name: name.into(),
            published_by: published_by.into(),
            publisher_source: None,
            publication_year: None,
            date_accessed,
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_publication_year(mut self, year: i32) -> Self {
        self.publication_year = Some(year);
        self
    }
}

/// The producer and upstream dataset a variable comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub producer: String,
    pub dataset_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

impl Origin {
    pub fn new(producer: impl Into<String>, dataset_title: impl Into<String>) -> Self {
        Self {
            producer: producer.into(),
            dataset_title: dataset_title.into(),
            dataset_version: None,
            date_published: None,
            url: None,
            license: None,
        }
    }

    pub fn with_license(mut self, license: License) -> Self {
        self.license = Some(license);
        self
    }

    pub fn with_date_published(mut self, date: NaiveDate) -> Self {
        self.date_published = Some(date);
        self
    }
}

/// Terms under which data may be reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl License {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// How much a variable has been transformed since ingestion.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingLevel {
    #[default]
    Raw,
    Minor,
    Major,
}

impl std::fmt::Display for ProcessingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProcessingLevel {
    /// Level of a variable derived from inputs at the given levels.
    ///
    /// Any combination is itself a processing step, so the result is at
    /// least `Minor`.
    pub fn escalate(levels: impl IntoIterator<Item = ProcessingLevel>) -> ProcessingLevel {
        levels
            .into_iter()
            .fold(ProcessingLevel::Minor, |acc, level| acc.max(level))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingLevel::Raw => "raw",
            ProcessingLevel::Minor => "minor",
            ProcessingLevel::Major => "major",
        }
    }
}

/// A record that can be deduplicated inside an ordered provenance list.
pub trait Provenance: Clone + Eq + Hash {}

impl Provenance for Source {}
impl Provenance for Origin {}
impl Provenance for License {}
impl Provenance for String {}

/// Stable ordered-set union: first list verbatim, then every unseen entry of
/// each following list in its own order.
pub fn ordered_union<'a, T, I>(lists: I) -> Vec<T>
where
    T: Provenance + 'a,
    I: IntoIterator<Item = &'a [T]>,
{
    let mut seen: IndexSet<T> = IndexSet::new();
    for list in lists {
        for item in list {
            if !seen.contains(item) {
                seen.insert(item.clone());
            }
        }
    }
    seen.into_iter().collect()
}

/// Push `item` unless an equal record is already present.
pub fn push_unique<T: Provenance>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_processing_level_order() {
        assert!(ProcessingLevel::Raw < ProcessingLevel::Minor);
        assert!(ProcessingLevel::Minor < ProcessingLevel::Major);
    }

    #[test]
    fn test_escalate() {
        assert_eq!(
            ProcessingLevel::escalate([ProcessingLevel::Raw]),
            ProcessingLevel::Minor
        );
        assert_eq!(
            ProcessingLevel::escalate([ProcessingLevel::Raw, ProcessingLevel::Major]),
            ProcessingLevel::Major
        );
        assert_eq!(ProcessingLevel::escalate([]), ProcessingLevel::Minor);
    }

    #[test]
    fn test_ordered_union_keeps_first_seen_order() {
        let s1 = Source::new("S1", "Pub", date(2023, 1, 1));
        let s2 = Source::new("S2", "Pub", date(2023, 1, 1));
        let s3 = Source::new("S3", "Pub", date(2023, 1, 1));

        let a = vec![s2.clone(), s1.clone()];
        let b = vec![s2.clone(), s3.clone()];

        assert_eq!(
            ordered_union([a.as_slice(), b.as_slice()]),
            vec![s2.clone(), s1.clone(), s3.clone()]
        );
        assert_eq!(
            ordered_union([b.as_slice(), a.as_slice()]),
            vec![s2, s3, s1]
        );
    }

    #[test]
    fn test_structural_equality() {
        let a = Origin::new("WHO", "Mortality").with_license(License::new("CC BY 4.0"));
        let b = Origin::new("WHO", "Mortality").with_license(License::new("CC BY 4.0"));
        let c = Origin::new("WHO", "Mortality");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_push_unique() {
        let mut licenses = vec![License::new("CC BY 4.0")];
        push_unique(&mut licenses, License::new("CC BY 4.0"));
        push_unique(&mut licenses, License::new("MIT"));
        assert_eq!(licenses.len(), 2);
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let license = License::new("CC BY 4.0");
        let json = serde_json::to_string(&license).unwrap();
        assert_eq!(json, r#"{"name":"CC BY 4.0"}"#);
        assert_eq!(
            serde_json::to_string(&ProcessingLevel::Major).unwrap(),
            r#""major""#
        );
    }
}
