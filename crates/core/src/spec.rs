//! Check specifications loaded from configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The expected value or rule a check validates a dataset against.
///
/// Specifications come straight from the `Tests` section of the
/// configuration and may be any YAML value: a string, a number, a list or a
/// nested mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Specification(Value);

impl Specification {
    /// Wrap a raw value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The null specification.
    pub fn null() -> Self {
        Self(Value::Null)
    }

    /// Whether this specification enables a check.
    ///
    /// `null`, `false`, the empty string, the empty list and the empty
    /// mapping are falsy. Numbers are always truthy so that `nodata: 0`
    /// still enables the check.
    pub fn is_truthy(&self) -> bool {
        match &self.0 {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(_) => true,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    /// Borrow the raw value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Consume into the raw value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// String value, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_str()
    }

    /// Boolean value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        self.0.as_bool()
    }

    /// Numeric value; numeric strings are accepted too.
    pub fn as_f64(&self) -> Option<f64> {
        match &self.0 {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// List items, if this is a list.
    pub fn as_list(&self) -> Option<&Vec<Value>> {
        self.0.as_array()
    }

    /// Numeric list items. Fails if any item is not a number.
    pub fn as_f64_list(&self) -> Option<Vec<f64>> {
        self.0.as_array()?.iter().map(Value::as_f64).collect()
    }

    /// String items of a list, or the comma-separated parts of a string.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match &self.0 {
            Value::String(s) => Some(
                s.split(',')
                    .map(|part| part.trim().to_string())
                    .filter(|part| !part.is_empty())
                    .collect(),
            ),
            Value::Array(items) => Some(items.iter().map(display_value).collect()),
            _ => None,
        }
    }

    /// Whether this is a mapping.
    pub fn is_mapping(&self) -> bool {
        self.0.is_object()
    }

    /// Look up a key of a mapping specification.
    pub fn get(&self, key: &str) -> Option<Specification> {
        self.0.get(key).cloned().map(Specification)
    }

    /// Entries of a mapping specification, in key order.
    pub fn entries(&self) -> Vec<(String, Specification)> {
        match &self.0 {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), Specification(v.clone())))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Human-readable rendering used in check messages.
    pub fn display(&self) -> String {
        display_value(&self.0)
    }
}

impl From<Value> for Specification {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for Specification {
    fn from(value: &str) -> Self {
        Self(Value::String(value.to_string()))
    }
}

impl From<String> for Specification {
    fn from(value: String) -> Self {
        Self(Value::String(value))
    }
}

impl From<bool> for Specification {
    fn from(value: bool) -> Self {
        Self(Value::Bool(value))
    }
}

impl From<f64> for Specification {
    fn from(value: f64) -> Self {
        Self(serde_json::json!(value))
    }
}

/// Strings render bare, everything else as compact JSON.
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Specification::null().is_truthy());
        assert!(!Specification::from(false).is_truthy());
        assert!(!Specification::from("").is_truthy());
        assert!(!Specification::new(json!([])).is_truthy());
        assert!(!Specification::new(json!({})).is_truthy());

        assert!(Specification::from(true).is_truthy());
        assert!(Specification::from("EPSG:4326").is_truthy());
        assert!(Specification::new(json!(0)).is_truthy());
        assert!(Specification::new(json!([1, 2])).is_truthy());
        assert!(Specification::new(json!({"a": 1})).is_truthy());
    }

    #[test]
    fn test_string_list_from_comma_string() {
        let spec = Specification::from("Value, Count ,Class");
        assert_eq!(
            spec.as_string_list().unwrap(),
            vec!["Value", "Count", "Class"]
        );
    }

    #[test]
    fn test_string_list_from_list() {
        let spec = Specification::new(json!(["a", 2]));
        assert_eq!(spec.as_string_list().unwrap(), vec!["a", "2"]);
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(Specification::from("10").as_f64(), Some(10.0));
        assert_eq!(
            Specification::new(json!([10, 20.5])).as_f64_list(),
            Some(vec![10.0, 20.5])
        );
        assert_eq!(Specification::new(json!([10, "x"])).as_f64_list(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Specification::from("GTiff").display(), "GTiff");
        assert_eq!(Specification::new(json!([256, 256])).display(), "[256,256]");
    }
}
