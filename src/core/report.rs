//! Report computation over result rows
//!
//! One pass evaluates every column for every row, steps pending results
//! until they complete (or the step budget runs out) and feeds complete
//! results into per-category aggregators. Aggregators live for this pass
//! only.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::aggregation::ValueAggregator;
use super::analysis::Analysis;
use super::column::ResultColumn;
use super::value::IntermediateResult;
use crate::row::ResultRow;

pub const DEFAULT_MAX_STEPS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Stepping rounds before pending results are given up
    pub max_steps: usize,
    /// Render for export: no `%` suffixes
    pub report_mode: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            report_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportColumn {
    pub key: String,
    pub label: String,
    pub aggregation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportValue {
    pub display: String,
    pub value: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportXCategory {
    pub key: String,
    pub values: Vec<ReportValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCategory {
    pub key: String,
    pub values: Vec<ReportValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub x_categories: Vec<ReportXCategory>,
}

impl ReportCategory {
    pub fn value(&self, column: usize) -> Option<&ReportValue> {
        self.values.get(column)
    }

    pub fn x_category(&self, key: &str) -> Option<&ReportXCategory> {
        self.x_categories.iter().find(|x| x.key == key)
    }
}

/// Result of one report pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub analysis: String,
    pub columns: Vec<ReportColumn>,
    pub categories: Vec<ReportCategory>,
    pub total: ReportCategory,
    pub rows: usize,
    /// Stepping rounds that were needed
    pub steps: usize,
    /// Results still pending when the step budget ran out
    pub pending_dropped: usize,
}

impl Report {
    pub fn category(&self, key: &str) -> Option<&ReportCategory> {
        self.categories.iter().find(|c| c.key == key)
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.key == key)
    }
}

/// Aggregators of one category (or x-category cell)
#[derive(Debug)]
struct Bucket {
    aggregators: Vec<ValueAggregator>,
    records: HashSet<(usize, String)>,
}

impl Bucket {
    fn new(prototypes: &[ValueAggregator]) -> Self {
        Self {
            aggregators: prototypes.iter().map(ValueAggregator::create_instance).collect(),
            records: HashSet::new(),
        }
    }

    fn add(&mut self, index: usize, column: &ResultColumn, result: &IntermediateResult) {
        // a linked record counts once per category
        if matches!(column, ResultColumn::Table(_))
            && !self.records.insert((index, result.text_result()))
        {
            return;
        }
        column.accumulate(&mut self.aggregators[index], result);
    }

    fn values(&self, columns: &[Arc<ResultColumn>], report_mode: bool) -> Vec<ReportValue> {
        columns
            .iter()
            .zip(&self.aggregators)
            .map(|(column, aggregator)| ReportValue {
                display: column.display_value(aggregator, report_mode),
                value: aggregator.result_value(),
                count: aggregator.count(),
            })
            .collect()
    }
}

#[derive(Debug)]
struct Pending {
    category: Option<String>,
    column: usize,
    result: IntermediateResult,
}

struct Accumulation<'c> {
    columns: &'c [Arc<ResultColumn>],
    prototypes: Vec<ValueAggregator>,
    total: Bucket,
    x_totals: BTreeMap<String, Bucket>,
    categories: BTreeMap<String, Bucket>,
    cells: BTreeMap<(String, String), Bucket>,
}

impl<'c> Accumulation<'c> {
    fn new(columns: &'c [Arc<ResultColumn>]) -> Self {
        let prototypes: Vec<ValueAggregator> = columns.iter().map(|c| c.create_aggregator()).collect();
        Self {
            columns,
            total: Bucket::new(&prototypes),
            prototypes,
            x_totals: BTreeMap::new(),
            categories: BTreeMap::new(),
            cells: BTreeMap::new(),
        }
    }

    fn add(&mut self, category: Option<&str>, index: usize, result: &IntermediateResult) {
        let column = &self.columns[index];
        let prototypes = &self.prototypes;
        let x = result.x_category_key();

        self.total.add(index, column, result);
        if let Some(x) = x {
            self.x_totals
                .entry(x.to_string())
                .or_insert_with(|| Bucket::new(prototypes))
                .add(index, column, result);
        }
        if let Some(category) = category {
            self.categories
                .entry(category.to_string())
                .or_insert_with(|| Bucket::new(prototypes))
                .add(index, column, result);
            if let Some(x) = x {
                self.cells
                    .entry((category.to_string(), x.to_string()))
                    .or_insert_with(|| Bucket::new(prototypes))
                    .add(index, column, result);
            }
        }
    }

    fn category(&self, key: &str, bucket: &Bucket, report_mode: bool) -> ReportCategory {
        let x_categories = self
            .cells
            .range((key.to_string(), String::new())..)
            .take_while(|((category, _), _)| category == key)
            .map(|((_, x), cell)| ReportXCategory {
                key: x.clone(),
                values: cell.values(self.columns, report_mode),
            })
            .collect();

        ReportCategory {
            key: key.to_string(),
            values: bucket.values(self.columns, report_mode),
            x_categories,
        }
    }
}

/// A report pass over an analysis
pub struct AnalysisReport<'a> {
    analysis: &'a Analysis,
    columns: Vec<Arc<ResultColumn>>,
    options: ReportOptions,
}

impl<'a> AnalysisReport<'a> {
    pub fn new(analysis: &'a Analysis) -> Self {
        Self {
            analysis,
            columns: analysis.result_columns().to_vec(),
            options: ReportOptions::default(),
        }
    }

    /// Report over other columns than the analysis defaults
    pub fn with_columns(mut self, columns: Vec<Arc<ResultColumn>>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_options(mut self, options: ReportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn columns(&self) -> &[Arc<ResultColumn>] {
        &self.columns
    }

    pub fn compute<R: ResultRow>(&self, rows: &[R]) -> Report {
        self.compute_with(rows, |_| {})
    }

    /// Compute, calling `between_steps` with the round number before each
    /// stepping round so external lookups can make progress
    pub fn compute_with<R, F>(&self, rows: &[R], mut between_steps: F) -> Report
    where
        R: ResultRow,
        F: FnMut(usize),
    {
        let mut accumulation = Accumulation::new(&self.columns);
        let mut pending = Vec::new();

        for row in rows {
            let category = self.category_key(row);
            let x_category = self.x_category_key(row);

            for (index, column) in self.columns.iter().enumerate() {
                let Some(mut result) = column.result_for_row(row) else {
                    continue;
                };
                if let Some(x) = &x_category {
                    result = result.with_x_category_key(x.clone());
                }

                if result.is_complete() {
                    accumulation.add(category.as_deref(), index, &result);
                } else {
                    pending.push(Pending {
                        category: category.clone(),
                        column: index,
                        result,
                    });
                }
            }
        }

        let mut steps = 0;
        while !pending.is_empty() && steps < self.options.max_steps {
            between_steps(steps);
            steps += 1;

            let mut still_pending = Vec::with_capacity(pending.len());
            for item in pending {
                let result = item.result.execute_step();
                if result.is_complete() {
                    accumulation.add(item.category.as_deref(), item.column, &result);
                } else {
                    still_pending.push(Pending { result, ..item });
                }
            }
            debug!(step = steps, pending = still_pending.len(), "stepped pending results");
            pending = still_pending;
        }

        if !pending.is_empty() {
            warn!(
                pending = pending.len(),
                steps, "pending results did not complete and were dropped"
            );
        }

        self.build(accumulation, rows.len(), steps, pending.len())
    }

    fn category_key(&self, row: &dyn ResultRow) -> Option<String> {
        self.analysis
            .category_field()
            .map(|field| row.value_at_index(field.position.column_index))
    }

    fn x_category_key(&self, row: &dyn ResultRow) -> Option<String> {
        self.analysis
            .x_category_field()
            .map(|field| row.value_at_index(field.position.column_index))
    }

    fn build(&self, accumulation: Accumulation<'_>, rows: usize, steps: usize, dropped: usize) -> Report {
        let report_mode = self.options.report_mode;

        let categories = accumulation
            .categories
            .iter()
            .map(|(key, bucket)| accumulation.category(key, bucket, report_mode))
            .collect();

        let total = ReportCategory {
            key: String::new(),
            values: accumulation.total.values(&self.columns, report_mode),
            x_categories: accumulation
                .x_totals
                .iter()
                .map(|(key, bucket)| ReportXCategory {
                    key: key.clone(),
                    values: bucket.values(&self.columns, report_mode),
                })
                .collect(),
        };

        Report {
            analysis: self.analysis.name().to_string(),
            columns: self
                .columns
                .iter()
                .map(|column| ReportColumn {
                    key: column.key().to_string(),
                    label: column.label().to_string(),
                    aggregation: column.aggregation_type().name().to_string(),
                })
                .collect(),
            categories,
            total,
            rows,
            steps,
            pending_dropped: dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::row::RecordRow;
    use pretty_assertions::assert_eq;

    fn analysis() -> Analysis {
        let config = parse_config(
            r#"
name: Sales
category: Country
tables:
  - { key: COMP, info_area: FI, index: 0 }
fields:
  - { key: Revenue, column: 0 }
  - { key: Country, column: 1 }
values:
  - { key: Names, formula: "T[Country]", options: { delimiter: "|" } }
columns:
  - { field: Revenue }
  - { table: COMP }
"#,
        )
        .unwrap();
        Analysis::new(&config).unwrap()
    }

    fn row(revenue: &str, country: &str, company: &str) -> RecordRow {
        RecordRow::new(vec![revenue.to_string(), country.to_string()])
            .with_records(vec![company.to_string()])
    }

    #[test]
    fn test_categories_and_total() {
        let analysis = analysis();
        let rows = vec![
            row("100", "DE", "FI.1"),
            row("50", "AT", "FI.2"),
            row("25", "DE", "FI.1"),
        ];
        let report = AnalysisReport::new(&analysis).compute(&rows);

        assert_eq!(report.rows, 3);
        assert_eq!(report.steps, 0);
        let keys: Vec<&str> = report.categories.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["AT", "DE"]);

        let de = report.category("DE").unwrap();
        assert_eq!(de.value(0).unwrap().value, 125.0);
        assert_eq!(de.value(0).unwrap().display, "125.00");
        // FI.1 appears twice in DE but is one company
        assert_eq!(de.value(1).unwrap().display, "1");

        assert_eq!(report.total.value(0).unwrap().value, 175.0);
        assert_eq!(report.total.value(1).unwrap().count, 2);
    }

    #[test]
    fn test_text_value_concatenates() {
        let analysis = analysis();
        let column = analysis.value_column("Names").unwrap();
        let rows = vec![row("1", "DE", "FI.1"), row("2", "AT", "FI.2")];
        let report = AnalysisReport::new(&analysis)
            .with_columns(vec![column])
            .compute(&rows);
        assert_eq!(report.total.value(0).unwrap().display, "DE|AT");
    }

    #[test]
    fn test_empty_rows() {
        let analysis = analysis();
        let report = AnalysisReport::new(&analysis).compute::<RecordRow>(&[]);
        assert!(report.categories.is_empty());
        assert_eq!(report.total.value(0).unwrap().display, "0.00");
        assert_eq!(report.pending_dropped, 0);
    }
}
