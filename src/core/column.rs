//! Result columns of an analysis report
//!
//! A column binds a value source to an aggregation type and knows how to
//! render the aggregated value. Columns are immutable: changing the
//! aggregation type yields a new column.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::aggregation::{AggregationKind, AggregationType, AggregatorKind, ValueAggregator};
use super::analysis::{AnalysisField, AnalysisTable, AnalysisValue};
use super::value::{IntermediateResult, ResultValue};
use crate::row::ResultRow;

const DEFAULT_FRACTION_DIGITS: usize = 2;

/// Column aggregating a plain data-source field
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFieldResultColumn {
    field: Arc<AnalysisField>,
    aggregation_type: &'static AggregationType,
}

impl SourceFieldResultColumn {
    pub fn new(field: Arc<AnalysisField>) -> Self {
        Self {
            field,
            aggregation_type: AggregationType::sum(),
        }
    }

    pub fn field(&self) -> &AnalysisField {
        &self.field
    }

    /// Field weighting this one; applying the weight is up to the caller
    pub fn weight_field(&self) -> Option<&str> {
        self.field.weight_field.as_deref()
    }

    pub fn currency_field(&self) -> Option<&str> {
        self.field.currency_field.as_deref()
    }
}

/// Column counting records of a joined table
#[derive(Debug, Clone, PartialEq)]
pub struct TableResultColumn {
    table: AnalysisTable,
}

impl TableResultColumn {
    pub fn new(table: AnalysisTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AnalysisTable {
        &self.table
    }
}

/// Column aggregating a computed value
#[derive(Debug, Clone)]
pub struct ValueResultColumn {
    value: Arc<AnalysisValue>,
    aggregation_type: &'static AggregationType,
}

impl ValueResultColumn {
    pub fn new(value: Arc<AnalysisValue>) -> Self {
        let aggregation_type = value
            .fixed_aggregation_type()
            .unwrap_or_else(AggregationType::sum);
        Self {
            value,
            aggregation_type,
        }
    }

    pub fn value(&self) -> &AnalysisValue {
        &self.value
    }

    pub fn fixed_aggregation_type(&self) -> Option<&'static AggregationType> {
        self.value.fixed_aggregation_type()
    }

    /// Apply the value's template: `#` becomes the number, then `%` for
    /// percentage values outside report mode
    pub fn format_number(&self, number: f64, report_mode: bool) -> String {
        let options = &self.value.options;
        let digits = options.fraction_digits.unwrap_or(DEFAULT_FRACTION_DIGITS);
        let rendered = format!("{:.*}", digits, number);
        let mut text = match options.format.as_deref() {
            Some(template) if template.contains('#') => template.replace('#', &rendered),
            _ => rendered,
        };
        if options.percent && !report_mode {
            text.push('%');
        }
        text
    }
}

#[derive(Debug, Clone)]
pub enum ResultColumn {
    SourceField(SourceFieldResultColumn),
    Table(TableResultColumn),
    Value(ValueResultColumn),
}

impl ResultColumn {
    pub fn key(&self) -> &str {
        match self {
            ResultColumn::SourceField(column) => &column.field.key,
            ResultColumn::Table(column) => &column.table.key,
            ResultColumn::Value(column) => &column.value.key,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ResultColumn::SourceField(column) => &column.field.label,
            ResultColumn::Table(column) => &column.table.label,
            ResultColumn::Value(column) => &column.value.label,
        }
    }

    pub fn aggregation_type(&self) -> &'static AggregationType {
        match self {
            ResultColumn::SourceField(column) => column.aggregation_type,
            ResultColumn::Table(_) => AggregationType::count(),
            ResultColumn::Value(column) => column.aggregation_type,
        }
    }

    /// Types a user may pick for this column
    pub fn available_aggregation_types(&self) -> Vec<&'static AggregationType> {
        match self {
            ResultColumn::SourceField(_) => AggregationType::available_types().to_vec(),
            ResultColumn::Table(_) => vec![AggregationType::count()],
            ResultColumn::Value(column) => match column.fixed_aggregation_type() {
                Some(fixed) => vec![fixed],
                None => AggregationType::available_types().to_vec(),
            },
        }
    }

    /// This column with another aggregation type; the same column when
    /// nothing changes
    pub fn with_aggregation_type(self: &Arc<Self>, name: &str) -> Arc<Self> {
        match &**self {
            ResultColumn::Table(_) => Arc::clone(self),
            ResultColumn::SourceField(column) => {
                let aggregation_type = AggregationType::for_name(name);
                if std::ptr::eq(aggregation_type, column.aggregation_type) {
                    return Arc::clone(self);
                }
                Arc::new(ResultColumn::SourceField(SourceFieldResultColumn {
                    field: Arc::clone(&column.field),
                    aggregation_type,
                }))
            }
            ResultColumn::Value(column) => {
                // "static" never changes a value column
                if name == "static" || column.fixed_aggregation_type().is_some() {
                    return Arc::clone(self);
                }
                let aggregation_type = AggregationType::for_name(name);
                if std::ptr::eq(aggregation_type, column.aggregation_type) {
                    return Arc::clone(self);
                }
                Arc::new(ResultColumn::Value(ValueResultColumn {
                    value: Arc::clone(&column.value),
                    aggregation_type,
                }))
            }
        }
    }

    /// Tables of the query this column reads from
    pub fn significant_query_result_table_indices(&self) -> BTreeSet<usize> {
        match self {
            ResultColumn::SourceField(column) => {
                BTreeSet::from([column.field.position.table_index])
            }
            ResultColumn::Table(column) => BTreeSet::from([column.table.index]),
            ResultColumn::Value(column) => column
                .value
                .function
                .as_ref()
                .map(|f| f.significant_query_result_table_indices())
                .unwrap_or_default(),
        }
    }

    /// Fresh aggregator for one category of this column
    pub fn create_aggregator(&self) -> ValueAggregator {
        match self {
            ResultColumn::Value(column) if column.value.is_text() && !column.aggregation_type.is_static() => {
                ValueAggregator::concatenate(column.value.options.delimiter.as_deref())
            }
            _ => self.aggregation_type().create_value_aggregator(),
        }
    }

    /// Contribution of a row, `None` when the row does not contribute
    pub fn result_for_row(&self, row: &dyn ResultRow) -> Option<IntermediateResult> {
        match self {
            ResultColumn::SourceField(column) => Some(IntermediateResult::number(
                row.number_at_index(column.field.position.column_index),
            )),
            ResultColumn::Table(column) => {
                let record = row.record_identification_at_index(column.table.index);
                (!record.is_empty()).then(|| IntermediateResult::text(record))
            }
            ResultColumn::Value(column) => column
                .value
                .function
                .as_ref()
                .map(|function| function.result_for_row(row)),
        }
    }

    /// Feed a complete result into an aggregator. Pending and error
    /// results are refused.
    pub fn accumulate(&self, aggregator: &mut ValueAggregator, result: &IntermediateResult) -> bool {
        let Some(value) = result.value() else {
            return false;
        };

        match value {
            ResultValue::Error(_) => return false,
            ResultValue::Text(text) => {
                self.adopt_text_aggregator(aggregator);
                aggregator.add_string_value(text)
            }
            ResultValue::Number(number) => aggregator.add_double_value(*number),
            ResultValue::Object(_) => match aggregator.kind() {
                AggregatorKind::Concatenate { .. } => aggregator.add_string_value(&result.text_result()),
                _ => aggregator.add_double_value(result.number_result()),
            },
        }
        true
    }

    /// Script values have no declared type; the first result an
    /// aggregator sees decides. Text switches a still empty numeric
    /// aggregator to concatenation, later text into a numeric one is parsed.
    fn adopt_text_aggregator(&self, aggregator: &mut ValueAggregator) {
        let ResultColumn::Value(column) = self else {
            return;
        };
        let script_value = column
            .value
            .function
            .as_ref()
            .is_some_and(|function| function.returns_object());
        let numeric = matches!(
            aggregator.kind(),
            AggregatorKind::Sum | AggregatorKind::Avg | AggregatorKind::Min | AggregatorKind::Max
        );
        if script_value && numeric && aggregator.count() == 0 {
            *aggregator = ValueAggregator::concatenate(column.value.options.delimiter.as_deref());
        }
    }

    /// Render an aggregated value
    pub fn display_value(&self, aggregator: &ValueAggregator, report_mode: bool) -> String {
        if aggregator.is_text() {
            return aggregator.string_value().unwrap_or_default().to_string();
        }
        if self.aggregation_type().kind() == AggregationKind::Count || matches!(self, ResultColumn::Table(_)) {
            return aggregator.count().to_string();
        }
        self.display_string_from_number(aggregator.result_value(), report_mode)
    }

    pub fn display_string_from_number(&self, number: f64, report_mode: bool) -> String {
        match self {
            ResultColumn::SourceField(column) => {
                let digits = column.field.fraction_digits.unwrap_or(DEFAULT_FRACTION_DIGITS);
                let mut text = format!("{:.*}", digits, number);
                if column.field.percent && !report_mode {
                    text.push('%');
                }
                text
            }
            ResultColumn::Table(_) => format!("{}", number as i64),
            ResultColumn::Value(column) => column.format_number(number, report_mode),
        }
    }
}
