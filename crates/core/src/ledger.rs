//! Ordered record of check outcomes for one dataset run.

use serde_json::Value;

use crate::result::CheckResult;

/// One recorded check.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// Check name or report header
    pub name: String,

    /// Recorded result
    pub result: CheckResult,
}

/// Insertion-ordered mapping from check name to result.
///
/// A name is assigned at most once per run; later records for the same name
/// are refused.
#[derive(Debug, Clone, Default)]
pub struct ResultLedger {
    entries: Vec<LedgerEntry>,
}

impl ResultLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. Returns `false` if the name already has one.
    pub fn record(&mut self, name: impl Into<String>, result: CheckResult) -> bool {
        let name = name.into();
        if self.contains(&name) {
            tracing::warn!(check = %name, "Result already recorded, keeping the first one");
            return false;
        }
        self.entries.push(LedgerEntry { name, result });
        true
    }

    /// Record a value returned by a check, falling back to
    /// `(false, "Not completed.")` when it is not a check result.
    pub fn record_value(&mut self, name: impl Into<String>, value: &Value) -> bool {
        let name = name.into();
        let result = CheckResult::from_value(value).unwrap_or_else(|| {
            tracing::warn!(check = %name, returned = %value, "Check returned a malformed result");
            CheckResult::not_completed()
        });
        self.record(name, result)
    }

    /// Record the not-completed marker.
    pub fn record_not_completed(&mut self, name: impl Into<String>) -> bool {
        self.record(name, CheckResult::not_completed())
    }

    /// Whether a result exists for the name.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Result recorded for the name.
    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.result)
    }

    /// Entries in execution order.
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Iterate over entries in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter()
    }

    /// Number of recorded checks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of passed checks.
    pub fn passed(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_passed()).count()
    }

    /// Whether every recorded check passed.
    pub fn all_passed(&self) -> bool {
        self.passed() == self.len()
    }
}
