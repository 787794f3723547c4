//! Analysis configuration
//!
//! YAML definition of an analysis: the joined tables of the query, the
//! result fields, the computed values and the columns shown in a report.
//!
//! ```yaml
//! name: Opportunities
//! tables:
//!   - { key: OPP, info_area: PR, index: 0 }
//! fields:
//!   - { key: Revenue, column: 0, table: 0 }
//! values:
//!   - key: Doubled
//!     formula: "JS[(r) => r * 2](N[Revenue])"
//! columns:
//!   - { value: Doubled }
//! ```

use crate::error::{AnalysisError, AnalysisResult};
use crate::row::RecordRow;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub values: Vec<ValueConfig>,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    /// Field key whose display value groups rows into categories
    #[serde(default)]
    pub category: Option<String>,
    /// Field key for the second (cross-tab) dimension
    #[serde(default)]
    pub x_category: Option<String>,
}

/// A joined table (info area) of the analysis query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    pub key: String,
    pub info_area: String,
    pub index: usize,
    #[serde(default)]
    pub label: Option<String>,
}

/// A data-source field of the analysis query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Result column index in the query rows
    pub column: usize,
    /// Table index the field is read from
    #[serde(default)]
    pub table: usize,
    #[serde(default)]
    pub percent: bool,
    #[serde(default)]
    pub fraction_digits: Option<usize>,
    /// Field key weighting this field's aggregation
    #[serde(default)]
    pub weight: Option<String>,
    /// Field key holding the currency of this field
    #[serde(default)]
    pub currency: Option<String>,
}

/// A computed value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueConfig {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    pub formula: String,
    #[serde(default)]
    pub options: ValueOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueOptions {
    /// Display template, `#` is replaced by the number
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub fraction_digits: Option<usize>,
    /// Delimiter for concatenated text values
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Aggregation type the user cannot change
    #[serde(default)]
    pub aggregation: Option<String>,
    #[serde(default)]
    pub percent: bool,
}

/// A report column: exactly one of `field`, `table` or `value`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub aggregation: Option<String>,
}

/// Load an analysis definition from a YAML file
pub fn load_config(path: &Path) -> AnalysisResult<AnalysisConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> AnalysisResult<AnalysisConfig> {
    let config: AnalysisConfig = serde_yaml::from_str(content)?;
    if config.name.trim().is_empty() {
        return Err(AnalysisError::Config("analysis name must not be empty".to_string()));
    }
    Ok(config)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RowsDocument {
    List(Vec<RecordRow>),
    Wrapped { rows: Vec<RecordRow> },
}

/// Load result rows from a YAML file (a list, or a mapping with `rows`)
pub fn load_rows(path: &Path) -> AnalysisResult<Vec<RecordRow>> {
    let content = std::fs::read_to_string(path)?;
    parse_rows(&content)
}

pub fn parse_rows(content: &str) -> AnalysisResult<Vec<RecordRow>> {
    let rows = match serde_yaml::from_str::<RowsDocument>(content)? {
        RowsDocument::List(rows) | RowsDocument::Wrapped { rows } => rows,
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::ResultRow;

    #[test]
    fn test_parse_config_minimal() {
        let config = parse_config("name: Sales\n").unwrap();
        assert_eq!(config.name, "Sales");
        assert!(config.fields.is_empty());
        assert!(config.category.is_none());
    }

    #[test]
    fn test_parse_config_full() {
        let yaml = r##"
name: Opportunities
category: Country
tables:
  - { key: OPP, info_area: PR, index: 0 }
fields:
  - { key: Revenue, column: 0, fraction_digits: 0 }
  - { key: Country, column: 1, table: 1 }
values:
  - key: Half
    formula: "JS[(r) => r / 2](N[Revenue])"
    options: { format: "# EUR", aggregation: avg }
columns:
  - { field: Revenue, aggregation: max }
  - { value: Half }
"##;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.tables[0].info_area, "PR");
        assert_eq!(config.fields[1].table, 1);
        assert_eq!(config.values[0].options.format.as_deref(), Some("# EUR"));
        assert_eq!(config.values[0].options.aggregation.as_deref(), Some("avg"));
        assert_eq!(config.columns[0].aggregation.as_deref(), Some("max"));
        assert_eq!(config.category.as_deref(), Some("Country"));
    }

    #[test]
    fn test_parse_config_rejects_empty_name() {
        assert!(matches!(
            parse_config("name: ''\n"),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    fn test_parse_rows_both_layouts() {
        let list = parse_rows("- values: ['1', 'DE']\n  records: ['FI.1']\n").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].record_identification_at_index(0), "FI.1");

        let wrapped = parse_rows("rows:\n  - values: ['2']\n  - values: ['3']\n").unwrap();
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[1].number_at_index(0), 3.0);
    }
}
