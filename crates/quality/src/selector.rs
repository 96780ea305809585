//! Test selection.

use geoqc_core::{Specification, TestSpecifications};

/// Checks enabled for a run: configured entries with a truthy specification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnabledTests {
    tests: TestSpecifications,
}

impl EnabledTests {
    /// Whether a check is enabled.
    pub fn contains(&self, name: &str) -> bool {
        self.tests.contains_key(name)
    }

    /// Specification of an enabled check.
    pub fn get(&self, name: &str) -> Option<&Specification> {
        self.tests.get(name)
    }

    /// Enabled check names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    /// Number of enabled entries.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Whether nothing is enabled.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Keep the entries whose specification is truthy.
///
/// Omitting a check or giving it `false`, `null`, `""`, `[]` or `{}` is the
/// normal way to disable it, so pruned entries are only logged at debug level.
pub fn select(all: &TestSpecifications) -> EnabledTests {
    let tests = all
        .iter()
        .filter(|(name, spec)| {
            let keep = spec.is_truthy();
            if !keep {
                tracing::debug!(check = %name, "Check disabled by configuration");
            }
            keep
        })
        .map(|(name, spec)| (name.clone(), spec.clone()))
        .collect();
    EnabledTests { tests }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specs(value: serde_json::Value) -> TestSpecifications {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_falsy_entries_pruned() {
        let enabled = select(&specs(json!({
            "crs": "EPSG:4326",
            "extent": [],
            "attributes": "",
            "nodata": null,
            "cog": false,
            "aux_files": {},
            "bands": 0,
            "overviews": true,
        })));

        assert_eq!(enabled.names().collect::<Vec<_>>(), vec!["bands", "crs", "overviews"]);
        assert!(!enabled.contains("extent"));
        assert_eq!(enabled.get("crs").and_then(|s| s.as_str()), Some("EPSG:4326"));
    }

    #[test]
    fn test_empty_configuration() {
        assert!(select(&TestSpecifications::new()).is_empty());
    }
}
