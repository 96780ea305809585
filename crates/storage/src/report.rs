//! Report entries projected from the result ledger.

use geoqc_core::{CheckResult, Outcome, ResultLedger};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One check as it appears in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// `Passed`, `Failed` or `Not completed`
    #[serde(rename = "Test Result")]
    pub test_result: String,

    /// Specification the dataset was compared against
    #[serde(rename = "Specifications")]
    pub specifications: String,

    /// Property found in the tested file
    #[serde(rename = "Tested file")]
    pub tested_file: String,

    /// Extra diagnostics; `null` when there are none
    #[serde(rename = "Info")]
    pub info: Option<Vec<String>>,
}

impl ReportEntry {
    /// Whether the entry records a pass.
    pub fn is_passed(&self) -> bool {
        self.test_result == Outcome::Passed.label()
    }
}

impl From<&CheckResult> for ReportEntry {
    fn from(result: &CheckResult) -> Self {
        Self {
            test_result: result.outcome.label().to_string(),
            specifications: result.specification.clone(),
            tested_file: result.tested.clone(),
            info: if result.info.is_empty() {
                None
            } else {
                Some(result.info.clone())
            },
        }
    }
}

/// Report entries in the order the checks ran.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportEntries(Vec<(String, ReportEntry)>);

impl ReportEntries {
    /// No entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Project a ledger.
    pub fn from_ledger(ledger: &ResultLedger) -> Self {
        Self(
            ledger
                .iter()
                .map(|entry| (entry.name.clone(), ReportEntry::from(&entry.result)))
                .collect(),
        )
    }

    /// Append an entry.
    pub fn push(&mut self, name: impl Into<String>, entry: ReportEntry) {
        self.0.push((name.into(), entry));
    }

    /// Entry by check name.
    pub fn get(&self, name: &str) -> Option<&ReportEntry> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }

    /// Iterate in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReportEntry)> {
        self.0.iter().map(|(n, e)| (n.as_str(), e))
    }

    /// Check names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of passed entries.
    pub fn passed(&self) -> usize {
        self.0.iter().filter(|(_, e)| e.is_passed()).count()
    }
}

impl Serialize for ReportEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, entry) in &self.0 {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ReportEntries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = ReportEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of check name to report entry")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, entry)) = access.next_entry::<String, ReportEntry>()? {
                    entries.push((name, entry));
                }
                Ok(ReportEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ledger() -> ResultLedger {
        let mut ledger = ResultLedger::new();
        ledger.record("Extent", CheckResult::passed("[0, 0, 10, 10]", "[0, 0, 10, 10]"));
        ledger.record(
            "Coordinate reference system",
            CheckResult::failed("EPSG:3035", "EPSG:4326").with_info("CRS differs"),
        );
        ledger.record_not_completed("valid_COG");
        ledger
    }

    #[test]
    fn test_projection() {
        let entries = ReportEntries::from_ledger(&ledger());
        assert_eq!(entries.len(), 3);
        assert_eq!(entries.passed(), 1);

        let crs = entries.get("Coordinate reference system").unwrap();
        assert_eq!(crs.test_result, "Failed");
        assert_eq!(crs.specifications, "EPSG:3035");
        assert_eq!(crs.tested_file, "EPSG:4326");
        assert_eq!(crs.info, Some(vec!["CRS differs".to_string()]));

        assert_eq!(entries.get("valid_COG").unwrap().test_result, "Not completed");
        assert_eq!(entries.get("Extent").unwrap().info, None);
    }

    #[test]
    fn test_json_shape_keeps_order() {
        let entries = ReportEntries::from_ledger(&ledger());
        let text = serde_json::to_string(&entries).unwrap();
        assert!(text.find("Extent").unwrap() < text.find("Coordinate").unwrap());
        assert!(text.find("Coordinate").unwrap() < text.find("valid_COG").unwrap());

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value["Extent"],
            json!({
                "Test Result": "Passed",
                "Specifications": "[0, 0, 10, 10]",
                "Tested file": "[0, 0, 10, 10]",
                "Info": null
            })
        );

        let back: ReportEntries = serde_json::from_str(&text).unwrap();
        assert_eq!(back.names().collect::<Vec<_>>(), vec!["Extent", "Coordinate reference system", "valid_COG"]);
    }

    #[test]
    fn test_message_projection_is_lossless() {
        let result = CheckResult::failed("uint8", "int16").with_info_lines(["first", "second"]);
        let parsed = CheckResult::parse_message(&result.message()).unwrap();
        assert_eq!(ReportEntry::from(&parsed), ReportEntry::from(&result));
    }
}
