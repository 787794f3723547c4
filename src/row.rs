//! Row access for result sets
//!
//! The CRM query layer hands rows to the engine through [`ResultRow`].
//! [`RecordRow`] is the in-memory implementation used by the CLI and tests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

/// Parse a raw CRM value as a number. Empty or malformed text is 0.
pub fn parse_number(raw: &str) -> f64 {
    let value = raw.trim().parse::<f64>().unwrap_or(0.0);
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

/// Result of a lookup performed by an external collaborator, polled until
/// it reports completion
pub trait ResultDelegate: Send + Sync + fmt::Debug {
    fn result(&self) -> f64;

    fn text_result(&self) -> String;

    fn is_text_result(&self) -> bool;

    /// Number of records behind the result. Informational only: a
    /// completed lookup contributes one value to aggregation.
    fn count(&self) -> usize;

    fn is_complete(&self) -> bool;
}

/// One row of a CRM query result
pub trait ResultRow {
    /// Raw (unformatted) value of the result column at `index`
    fn raw_value_at_index(&self, index: usize) -> String;

    /// Display value of the result column at `index`
    fn value_at_index(&self, index: usize) -> String;

    /// Record identification of the joined table at `table_index`
    fn record_identification_at_index(&self, table_index: usize) -> String;

    /// Pending lookup for the column at `index`, if the value is fetched
    /// asynchronously
    fn linked_result(&self, _index: usize) -> Option<Arc<dyn ResultDelegate>> {
        None
    }

    fn number_at_index(&self, index: usize) -> f64 {
        parse_number(&self.raw_value_at_index(index))
    }
}

/// In-memory result row
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordRow {
    /// Raw values by result column index
    #[serde(default, deserialize_with = "scalar_strings")]
    pub values: Vec<String>,
    /// Display values; falls back to the raw value when absent
    #[serde(default, deserialize_with = "scalar_strings")]
    pub display: Vec<String>,
    /// Record identifications by table index
    #[serde(default, deserialize_with = "scalar_strings")]
    pub records: Vec<String>,
    #[serde(skip)]
    pub linked: HashMap<usize, Arc<dyn ResultDelegate>>,
}

/// Row files may hold numbers, booleans or nulls; rows only carry text
fn scalar_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_yaml::Value>::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|value| match value {
            serde_yaml::Value::String(s) => Ok(s),
            serde_yaml::Value::Number(n) => Ok(n.to_string()),
            serde_yaml::Value::Bool(b) => Ok(b.to_string()),
            serde_yaml::Value::Null => Ok(String::new()),
            other => Err(serde::de::Error::custom(format!(
                "expected a scalar row value, found {:?}",
                other
            ))),
        })
        .collect()
}

impl RecordRow {
    pub fn new(values: Vec<String>) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    pub fn with_display(mut self, display: Vec<String>) -> Self {
        self.display = display;
        self
    }

    pub fn with_records(mut self, records: Vec<String>) -> Self {
        self.records = records;
        self
    }

    pub fn with_linked(mut self, index: usize, delegate: Arc<dyn ResultDelegate>) -> Self {
        self.linked.insert(index, delegate);
        self
    }
}

impl ResultRow for RecordRow {
    fn raw_value_at_index(&self, index: usize) -> String {
        self.values.get(index).cloned().unwrap_or_default()
    }

    fn value_at_index(&self, index: usize) -> String {
        self.display
            .get(index)
            .or_else(|| self.values.get(index))
            .cloned()
            .unwrap_or_default()
    }

    fn record_identification_at_index(&self, table_index: usize) -> String {
        self.records.get(table_index).cloned().unwrap_or_default()
    }

    fn linked_result(&self, index: usize) -> Option<Arc<dyn ResultDelegate>> {
        self.linked.get(&index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("3.5"), 3.5);
        assert_eq!(parse_number(" 42 "), 42.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("n/a"), 0.0);
        assert_eq!(parse_number("NaN"), 0.0);
    }

    #[test]
    fn test_record_row_accessors() {
        let row = RecordRow::new(vec!["1200".to_string(), "DE".to_string()])
            .with_display(vec!["1,200.00".to_string()])
            .with_records(vec!["FI.1".to_string()]);

        assert_eq!(row.number_at_index(0), 1200.0);
        assert_eq!(row.value_at_index(0), "1,200.00");
        assert_eq!(row.value_at_index(1), "DE");
        assert_eq!(row.value_at_index(7), "");
        assert_eq!(row.number_at_index(1), 0.0);
        assert_eq!(row.record_identification_at_index(0), "FI.1");
        assert_eq!(row.record_identification_at_index(1), "");
        assert!(row.linked_result(0).is_none());
    }

    #[test]
    fn test_deserialize_scalars_as_text() {
        let row: RecordRow =
            serde_yaml::from_str("values: [1200, 3.5, true, null, DE]").unwrap();
        assert_eq!(row.values, vec!["1200", "3.5", "true", "", "DE"]);
        assert!(row.records.is_empty());
    }
}
