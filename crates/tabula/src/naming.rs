//! Identifier rules shared by tables, columns and datasets.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, TabulaError};

static SNAKE_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid snake_case regex"));

/// Check whether a name is a lower snake_case identifier.
pub fn is_snake_case(name: &str) -> bool {
    SNAKE_CASE.is_match(name)
}

/// Validate a name, reporting `kind` ("column", "table", ...) on failure.
pub fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    if is_snake_case(name) {
        Ok(())
    } else {
        Err(TabulaError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

/// Pipeline stages recognised as the top level of a dataset path.
pub const KNOWN_CHANNELS: &[&str] = &[
    "snapshot",
    "meadow",
    "garden",
    "grapher",
    "explorers",
    "external",
    "backport",
    "examples",
];

/// The `<channel>/<namespace>/<version>/<short_name>` parts of a dataset path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetUri {
    pub channel: String,
    pub namespace: String,
    pub version: String,
    pub short_name: String,
}

impl DatasetUri {
    /// Locate the last known channel segment followed by exactly three parts.
    pub fn from_path(path: &Path) -> Option<Self> {
        let parts: Vec<&str> = path
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect();
        if parts.len() < 4 {
            return None;
        }
        let i = parts.len() - 4;
        if !KNOWN_CHANNELS.contains(&parts[i]) {
            return None;
        }
        Some(Self {
            channel: parts[i].to_string(),
            namespace: parts[i + 1].to_string(),
            version: parts[i + 2].to_string(),
            short_name: parts[i + 3].to_string(),
        })
    }

    pub fn path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.channel, self.namespace, self.version, self.short_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_snake_case() {
        assert!(is_snake_case("gdp_per_capita"));
        assert!(is_snake_case("_private"));
        assert!(is_snake_case("pop2020"));
        assert!(!is_snake_case("GDP"));
        assert!(!is_snake_case("gdp per capita"));
        assert!(!is_snake_case("2020_pop"));
        assert!(!is_snake_case("gdp-per-capita"));
        assert!(!is_snake_case(""));
    }

    #[test]
    fn test_validate_name_reports_kind() {
        let err = validate_name("column", "Bad Name").unwrap_err();
        assert!(matches!(
            err,
            TabulaError::InvalidName { kind: "column", .. }
        ));
    }

    #[test]
    fn test_dataset_uri_from_path() {
        let uri = DatasetUri::from_path(Path::new("/data/garden/who/2024-01-01/ghe")).unwrap();
        assert_eq!(uri.channel, "garden");
        assert_eq!(uri.namespace, "who");
        assert_eq!(uri.version, "2024-01-01");
        assert_eq!(uri.short_name, "ghe");
        assert_eq!(uri.path(), "garden/who/2024-01-01/ghe");

        assert!(DatasetUri::from_path(Path::new("/tmp/scratch/who/2024/ghe")).is_none());
        assert!(DatasetUri::from_path(Path::new("garden/who/ghe")).is_none());
    }
}
