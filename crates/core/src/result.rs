//! Check results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message recorded for checks that could not produce a result.
pub const NOT_COMPLETED: &str = "Not completed.";

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The dataset meets the specification
    Passed,
    /// The dataset does not meet the specification
    Failed,
    /// The check raised, returned garbage, or had no implementation
    NotCompleted,
}

impl Outcome {
    /// Label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::NotCompleted => "Not completed",
        }
    }
}

/// Structured result of one check.
///
/// The classic multi-line message (`Passed.` / `Specifications: ...` /
/// `Tested file: ...` / `Info: ...`) is rendered from these fields rather
/// than being the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Outcome
    pub outcome: Outcome,

    /// Rendered specification the dataset was compared against
    #[serde(default)]
    pub specification: String,

    /// Rendered property found in the tested dataset
    #[serde(default)]
    pub tested: String,

    /// Additional diagnostic lines
    #[serde(default)]
    pub info: Vec<String>,
}

impl CheckResult {
    /// A passed result.
    pub fn passed(specification: impl Into<String>, tested: impl Into<String>) -> Self {
        Self::with_outcome(true, specification, tested)
    }

    /// A failed result.
    pub fn failed(specification: impl Into<String>, tested: impl Into<String>) -> Self {
        Self::with_outcome(false, specification, tested)
    }

    /// A passed or failed result.
    pub fn with_outcome(
        passed: bool,
        specification: impl Into<String>,
        tested: impl Into<String>,
    ) -> Self {
        Self {
            outcome: if passed { Outcome::Passed } else { Outcome::Failed },
            specification: specification.into(),
            tested: tested.into(),
            info: Vec::new(),
        }
    }

    /// The `(false, "Not completed.")` fallback.
    pub fn not_completed() -> Self {
        Self {
            outcome: Outcome::NotCompleted,
            specification: String::new(),
            tested: String::new(),
            info: Vec::new(),
        }
    }

    /// Append an info line.
    pub fn with_info(mut self, line: impl Into<String>) -> Self {
        self.info.push(line.into());
        self
    }

    /// Append several info lines.
    pub fn with_info_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Whether the check passed.
    pub fn is_passed(&self) -> bool {
        self.outcome == Outcome::Passed
    }

    /// Render the multi-line report message.
    pub fn message(&self) -> String {
        if self.outcome == Outcome::NotCompleted {
            return NOT_COMPLETED.to_string();
        }
        let mut message = format!(
            "{}.\nSpecifications: '{}'\nTested file: '{}'",
            self.outcome.label(),
            self.specification,
            self.tested
        );
        for (i, line) in self.info.iter().enumerate() {
            if i == 0 {
                message.push_str("\nInfo: ");
            } else {
                message.push('\n');
            }
            message.push_str(line);
        }
        message
    }

    /// Reconstruct a result from a rendered message.
    ///
    /// Returns `None` when the first three fixed lines are missing.
    pub fn parse_message(message: &str) -> Option<Self> {
        if message.trim() == NOT_COMPLETED {
            return Some(Self::not_completed());
        }
        // `lines()` would drop a trailing empty info line.
        let mut lines = message.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
        let outcome = match lines.next()?.trim().trim_end_matches('.') {
            "Passed" => Outcome::Passed,
            "Failed" => Outcome::Failed,
            _ => return None,
        };
        let specification = strip_field(lines.next()?, "Specifications:")?;
        let tested = strip_field(lines.next()?, "Tested file:")?;
        let mut info = Vec::new();
        let rest: Vec<&str> = lines.collect();
        if let Some((first, more)) = rest.split_first() {
            // A bare trailing newline after the fixed lines carries no info.
            if !(first.is_empty() && more.is_empty()) {
                let first = first.strip_prefix("Info:").unwrap_or(first);
                info.push(first.trim_start().to_string());
                info.extend(more.iter().map(|l| l.to_string()));
            }
        }
        Some(Self {
            outcome,
            specification,
            tested,
            info,
        })
    }

    /// Interpret a value returned by an external check.
    ///
    /// Accepted shapes: `[passed, message]`, `{"passed": .., "message": ..}`
    /// or the structured fields of this type.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) if items.len() == 2 => {
                Self::from_pair(items[0].as_bool()?, items[1].as_str()?)
            }
            Value::Object(map) if map.contains_key("outcome") => {
                serde_json::from_value(value.clone()).ok()
            }
            Value::Object(map) => {
                Self::from_pair(map.get("passed")?.as_bool()?, map.get("message")?.as_str()?)
            }
            _ => None,
        }
    }

    fn from_pair(passed: bool, message: &str) -> Option<Self> {
        match Self::parse_message(message) {
            Some(mut parsed) => {
                // The boolean is authoritative over the message's first line.
                if parsed.outcome != Outcome::NotCompleted {
                    parsed.outcome = if passed { Outcome::Passed } else { Outcome::Failed };
                }
                Some(parsed)
            }
            None => Some(Self::with_outcome(passed, "", "").with_info(message.trim())),
        }
    }
}

fn strip_field(line: &str, prefix: &str) -> Option<String> {
    let rest = line.strip_prefix(prefix)?.trim();
    let rest = rest
        .strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .unwrap_or(rest);
    Some(rest.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_layout() {
        let result = CheckResult::passed("GTiff", "GTiff");
        assert_eq!(
            result.message(),
            "Passed.\nSpecifications: 'GTiff'\nTested file: 'GTiff'"
        );
    }

    #[test]
    fn test_message_with_info() {
        let result = CheckResult::failed("== 3", "2")
            .with_info("band 3 missing")
            .with_info("see log");
        let message = result.message();
        let lines: Vec<&str> = message.lines().collect();
        assert_eq!(lines[0], "Failed.");
        assert_eq!(lines[1], "Specifications: '== 3'");
        assert_eq!(lines[2], "Tested file: '2'");
        assert_eq!(lines[3], "Info: band 3 missing");
        assert_eq!(lines[4], "see log");
    }

    #[test]
    fn test_message_reconstructs_fields() {
        let result = CheckResult::failed("EPSG:3035", "EPSG:4326")
            .with_info_lines(["first", "second"]);
        let parsed = CheckResult::parse_message(&result.message()).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_message_keeps_empty_info_lines() {
        let result = CheckResult::passed("a", "a").with_info_lines(["first", ""]);
        assert_eq!(CheckResult::parse_message(&result.message()).unwrap(), result);

        let blank = CheckResult::failed("a", "b").with_info("");
        assert_eq!(CheckResult::parse_message(&blank.message()).unwrap(), blank);

        let trailing = CheckResult::parse_message("Passed.\nSpecifications: 'a'\nTested file: 'a'\n").unwrap();
        assert!(trailing.info.is_empty());
    }

    #[test]
    fn test_not_completed_message() {
        let result = CheckResult::not_completed();
        assert!(!result.is_passed());
        assert_eq!(result.message(), NOT_COMPLETED);
        assert_eq!(CheckResult::parse_message(NOT_COMPLETED), Some(result));
    }

    #[test]
    fn test_parse_rejects_short_message() {
        assert!(CheckResult::parse_message("Passed.").is_none());
        assert!(CheckResult::parse_message("Maybe.\nSpecifications: ''\nTested file: ''").is_none());
    }

    #[test]
    fn test_from_value_pair() {
        let value = json!([true, "Passed.\nSpecifications: 'x'\nTested file: 'x'"]);
        let result = CheckResult::from_value(&value).unwrap();
        assert!(result.is_passed());
        assert_eq!(result.specification, "x");
    }

    #[test]
    fn test_from_value_free_text_message() {
        let value = json!({"passed": false, "message": "border touches nodata"});
        let result = CheckResult::from_value(&value).unwrap();
        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.info, vec!["border touches nodata"]);
    }

    #[test]
    fn test_from_value_malformed() {
        assert!(CheckResult::from_value(&json!("ok")).is_none());
        assert!(CheckResult::from_value(&json!([true])).is_none());
        assert!(CheckResult::from_value(&json!(["yes", "msg"])).is_none());
        assert!(CheckResult::from_value(&json!({"passed": true})).is_none());
    }
}
