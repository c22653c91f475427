//! Metadata records for variables, tables and datasets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::provenance::{License, Origin, ProcessingLevel, Source, ordered_union, push_unique};

/// How a variable should be presented to readers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariablePresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_public: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribution_short: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topic_tags: Vec<String>,
}

/// Metadata attached to a single column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Key facts about the variable, one per entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub description_key: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_processing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_unit: Option<String>,
    /// Free-form display hints (keys sorted for stable serialization).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<BTreeMap<String, JsonValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<VariablePresentation>,
    #[serde(default)]
    pub processing_level: ProcessingLevel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origins: Vec<Origin>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,
}

impl VariableMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>, short_unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self.short_unit = Some(short_unit.into());
        self
    }

    pub fn with_processing_level(mut self, level: ProcessingLevel) -> Self {
        self.processing_level = level;
        self
    }

    pub fn with_display(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.display
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }

    pub fn with_presentation(mut self, presentation: VariablePresentation) -> Self {
        self.presentation = Some(presentation);
        self
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.add_source(source);
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.add_origin(origin);
        self
    }

    pub fn with_license(mut self, license: License) -> Self {
        self.add_license(license);
        self
    }

    pub fn with_description_key(mut self, key: impl Into<String>) -> Self {
        push_unique(&mut self.description_key, key.into());
        self
    }

    pub fn add_source(&mut self, source: Source) {
        push_unique(&mut self.sources, source);
    }

    pub fn add_origin(&mut self, origin: Origin) {
        push_unique(&mut self.origins, origin);
    }

    pub fn add_license(&mut self, license: License) {
        push_unique(&mut self.licenses, license);
    }

    /// Drop duplicate entries from every ordered-set field, keeping first-seen order.
    pub fn normalize(&mut self) {
        self.description_key = ordered_union([self.description_key.as_slice()]);
        self.sources = ordered_union([self.sources.as_slice()]);
        self.origins = ordered_union([self.origins.as_slice()]);
        self.licenses = ordered_union([self.licenses.as_slice()]);
    }

    /// True when nothing beyond the default processing level is set.
    pub fn is_empty(&self) -> bool {
        *self == VariableMetadata::default()
    }
}

/// Metadata describing a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Metadata of the dataset this table was last added to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<DatasetMetadata>,
}

impl TableMetadata {
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            short_name: Some(short_name.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

fn default_true() -> bool {
    true
}

/// Metadata describing a dataset, stored in its `index.json` sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,
    /// Content checksum fixed by the last save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_checksum: Option<String>,
}

impl DatasetMetadata {
    pub fn new(short_name: impl Into<String>) -> Self {
        Self {
            channel: None,
            namespace: None,
            version: None,
            short_name: short_name.into(),
            title: None,
            description: None,
            is_public: true,
            sources: Vec::new(),
            licenses: Vec::new(),
            source_checksum: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    /// `channel/namespace/version/short_name`, skipping unset parts.
    pub fn uri(&self) -> String {
        [
            self.channel.as_deref(),
            self.namespace.as_deref(),
            self.version.as_deref(),
            Some(self.short_name.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_empty_metadata_serializes_to_processing_level_only() {
        let meta = VariableMetadata::new();
        assert!(meta.is_empty());
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"processing_level":"raw"}"#);

        let parsed: VariableMetadata = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_normalize_drops_duplicates() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let s1 = Source::new("S1", "Pub", date);
        let s2 = Source::new("S2", "Pub", date);
        let mut meta = VariableMetadata::new();
        meta.sources = vec![s2.clone(), s1.clone(), s2.clone()];
        meta.description_key = vec!["a".into(), "b".into(), "a".into()];

        meta.normalize();

        assert_eq!(meta.sources, vec![s2, s1]);
        assert_eq!(meta.description_key, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_dataset_metadata_defaults_public() {
        let parsed: DatasetMetadata = serde_json::from_str(r#"{"short_name":"wdi"}"#).unwrap();
        assert!(parsed.is_public);
        assert_eq!(parsed.uri(), "wdi");

        let meta = DatasetMetadata::new("wdi")
            .with_namespace("worldbank")
            .with_version("2024-01-01");
        assert_eq!(meta.uri(), "worldbank/2024-01-01/wdi");
    }
}
