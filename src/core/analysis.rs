//! Analysis definition resolved for evaluation
//!
//! [`Analysis`] turns an [`AnalysisConfig`] into parsed value functions and
//! result columns. Value formulas are parsed in configuration order, so a
//! value may reuse the tree of any value defined before it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use super::aggregation::AggregationType;
use super::column::{ResultColumn, SourceFieldResultColumn, TableResultColumn, ValueResultColumn};
use super::script::ScriptCache;
use super::value::{FieldRef, ValueFunction, ValueParser};
use crate::config::{AnalysisConfig, ColumnConfig, FieldConfig, TableConfig, ValueConfig, ValueOptions};
use crate::error::{AnalysisError, AnalysisResult};

/// A data-source field of the analysis query
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisField {
    pub key: String,
    pub label: String,
    pub position: FieldRef,
    pub percent: bool,
    pub fraction_digits: Option<usize>,
    pub weight_field: Option<String>,
    pub currency_field: Option<String>,
}

impl AnalysisField {
    pub fn from_config(config: &FieldConfig) -> Self {
        Self {
            key: config.key.clone(),
            label: config.label.clone().unwrap_or_else(|| config.key.clone()),
            position: FieldRef::new(config.column, config.table),
            percent: config.percent,
            fraction_digits: config.fraction_digits,
            weight_field: config.weight.clone(),
            currency_field: config.currency.clone(),
        }
    }
}

/// A joined table of the analysis query
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisTable {
    pub key: String,
    pub info_area: String,
    pub index: usize,
    pub label: String,
}

impl AnalysisTable {
    pub fn from_config(config: &TableConfig) -> Self {
        Self {
            key: config.key.clone(),
            info_area: config.info_area.clone(),
            index: config.index,
            label: config.label.clone().unwrap_or_else(|| config.info_area.clone()),
        }
    }
}

/// A computed value and its parsed function, if the formula was valid
#[derive(Debug, Clone)]
pub struct AnalysisValue {
    pub key: String,
    pub label: String,
    pub formula: String,
    pub options: ValueOptions,
    pub function: Option<Arc<ValueFunction>>,
}

impl AnalysisValue {
    pub fn is_text(&self) -> bool {
        self.function.as_ref().is_some_and(|f| f.returns_text())
    }

    pub fn fixed_aggregation_type(&self) -> Option<&'static AggregationType> {
        self.options
            .aggregation
            .as_deref()
            .map(AggregationType::for_name)
    }
}

/// Name resolution for value formulas
#[derive(Debug, Default)]
pub struct AnalysisContext {
    fields: HashMap<String, Arc<AnalysisField>>,
    tables: Vec<AnalysisTable>,
    values: HashMap<String, Arc<ValueFunction>>,
    scripts: ScriptCache,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, config: &FieldConfig) -> Arc<AnalysisField> {
        let field = Arc::new(AnalysisField::from_config(config));
        self.fields.insert(field.key.clone(), Arc::clone(&field));
        field
    }

    pub fn add_table(&mut self, config: &TableConfig) -> AnalysisTable {
        let table = AnalysisTable::from_config(config);
        self.tables.push(table.clone());
        table
    }

    pub fn add_value_function(&mut self, key: &str, function: Arc<ValueFunction>) {
        self.values.insert(key.to_string(), function);
    }

    pub fn field(&self, key: &str) -> Option<&Arc<AnalysisField>> {
        self.fields.get(key)
    }

    pub fn table(&self, key: &str) -> Option<&AnalysisTable> {
        self.tables
            .iter()
            .find(|t| t.key == key)
            .or_else(|| self.tables.iter().find(|t| t.info_area == key))
    }

    /// Field key, or a literal result column index
    pub fn resolve_field(&self, reference: &str) -> Option<FieldRef> {
        if let Some(field) = self.fields.get(reference) {
            return Some(field.position);
        }

        let column_index = reference.parse::<usize>().ok()?;
        let table_index = self
            .fields
            .values()
            .find(|f| f.position.column_index == column_index)
            .map_or(0, |f| f.position.table_index);
        Some(FieldRef::new(column_index, table_index))
    }

    /// Table key, info area id, or a literal table index
    pub fn resolve_table(&self, reference: &str) -> Option<usize> {
        self.table(reference)
            .map(|t| t.index)
            .or_else(|| reference.parse().ok())
    }

    pub fn value_function(&self, key: &str) -> Option<Arc<ValueFunction>> {
        self.values.get(key).cloned()
    }

    pub fn scripts(&self) -> &ScriptCache {
        &self.scripts
    }
}

/// A loaded analysis: context, values and default result columns
#[derive(Debug)]
pub struct Analysis {
    name: String,
    context: AnalysisContext,
    values: Vec<Arc<AnalysisValue>>,
    columns: Vec<Arc<ResultColumn>>,
    category: Option<Arc<AnalysisField>>,
    x_category: Option<Arc<AnalysisField>>,
}

impl Analysis {
    /// Resolve a configuration. Invalid value formulas leave the value
    /// without a function; unknown names in columns and categories fail.
    pub fn new(config: &AnalysisConfig) -> AnalysisResult<Self> {
        let mut context = AnalysisContext::new();

        for table in &config.tables {
            if context.table(&table.key).is_some_and(|t| t.key == table.key) {
                return Err(AnalysisError::Config(format!("duplicate table key '{}'", table.key)));
            }
            context.add_table(table);
        }

        for field in &config.fields {
            if context.field(&field.key).is_some() {
                return Err(AnalysisError::Config(format!("duplicate field key '{}'", field.key)));
            }
            context.add_field(field);
        }

        let mut values = Vec::with_capacity(config.values.len());
        for value in &config.values {
            if values.iter().any(|v: &Arc<AnalysisValue>| v.key == value.key) {
                return Err(AnalysisError::Config(format!("duplicate value key '{}'", value.key)));
            }
            let parsed = Self::parse_value(&mut context, value);
            values.push(Arc::new(parsed));
        }

        let category = Self::resolve_category(&context, config.category.as_deref(), "category")?;
        let x_category = Self::resolve_category(&context, config.x_category.as_deref(), "x_category")?;

        let mut analysis = Self {
            name: config.name.clone(),
            context,
            values,
            columns: Vec::new(),
            category,
            x_category,
        };

        let columns = config
            .columns
            .iter()
            .map(|column| analysis.column_from_config(column))
            .collect::<AnalysisResult<Vec<_>>>()?;
        analysis.columns = columns;

        debug!(
            analysis = %analysis.name,
            values = analysis.values.len(),
            columns = analysis.columns.len(),
            "analysis loaded"
        );
        Ok(analysis)
    }

    fn parse_value(context: &mut AnalysisContext, config: &ValueConfig) -> AnalysisValue {
        let function = ValueParser::parse(&config.formula, context);
        match &function {
            Some(function) => context.add_value_function(&config.key, Arc::clone(function)),
            None => warn!(value = %config.key, "value has no function"),
        }

        AnalysisValue {
            key: config.key.clone(),
            label: config.label.clone().unwrap_or_else(|| config.key.clone()),
            formula: config.formula.clone(),
            options: config.options.clone(),
            function,
        }
    }

    fn resolve_category(
        context: &AnalysisContext,
        key: Option<&str>,
        what: &str,
    ) -> AnalysisResult<Option<Arc<AnalysisField>>> {
        key.map(|key| {
            context
                .field(key)
                .cloned()
                .ok_or_else(|| AnalysisError::Config(format!("unknown {} field '{}'", what, key)))
        })
        .transpose()
    }

    fn column_from_config(&self, config: &ColumnConfig) -> AnalysisResult<Arc<ResultColumn>> {
        let column = match (&config.field, &config.table, &config.value) {
            (Some(key), None, None) => self.field_column(key)?,
            (None, Some(key), None) => self.table_column(key)?,
            (None, None, Some(key)) => self.value_column(key)?,
            _ => {
                return Err(AnalysisError::Config(
                    "a column needs exactly one of field, table or value".to_string(),
                ))
            }
        };

        Ok(match &config.aggregation {
            Some(name) => column.with_aggregation_type(name),
            None => column,
        })
    }

    /// Sum column over a source field
    pub fn field_column(&self, key: &str) -> AnalysisResult<Arc<ResultColumn>> {
        let field = self
            .context
            .field(key)
            .cloned()
            .ok_or_else(|| AnalysisError::Config(format!("unknown field '{}'", key)))?;
        Ok(Arc::new(ResultColumn::SourceField(SourceFieldResultColumn::new(field))))
    }

    /// Record count column over a joined table
    pub fn table_column(&self, key: &str) -> AnalysisResult<Arc<ResultColumn>> {
        let table = self
            .context
            .table(key)
            .cloned()
            .ok_or_else(|| AnalysisError::Config(format!("unknown table '{}'", key)))?;
        Ok(Arc::new(ResultColumn::Table(TableResultColumn::new(table))))
    }

    /// Column over a computed value
    pub fn value_column(&self, key: &str) -> AnalysisResult<Arc<ResultColumn>> {
        let value = self
            .value(key)
            .cloned()
            .ok_or_else(|| AnalysisError::Config(format!("unknown value '{}'", key)))?;
        Ok(Arc::new(ResultColumn::Value(ValueResultColumn::new(value))))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &AnalysisContext {
        &self.context
    }

    pub fn values(&self) -> &[Arc<AnalysisValue>] {
        &self.values
    }

    pub fn value(&self, key: &str) -> Option<&Arc<AnalysisValue>> {
        self.values.iter().find(|v| v.key == key)
    }

    pub fn result_columns(&self) -> &[Arc<ResultColumn>] {
        &self.columns
    }

    pub fn category_field(&self) -> Option<&Arc<AnalysisField>> {
        self.category.as_ref()
    }

    pub fn x_category_field(&self) -> Option<&Arc<AnalysisField>> {
        self.x_category.as_ref()
    }

    /// Tables the query must join to compute every column and category
    pub fn significant_query_result_table_indices(&self) -> BTreeSet<usize> {
        let mut indices: BTreeSet<usize> = self
            .columns
            .iter()
            .flat_map(|column| column.significant_query_result_table_indices())
            .collect();
        for field in self.category.iter().chain(self.x_category.iter()) {
            indices.insert(field.position.table_index);
        }
        indices
    }

    /// Problems a user should fix: values whose formula was rejected
    pub fn validate(&self) -> Vec<String> {
        self.values
            .iter()
            .filter(|value| value.function.is_none())
            .map(|value| {
                let reason = ValueParser::try_parse(&value.formula, &self.context)
                    .err()
                    .map(|err| err.to_string())
                    .unwrap_or_else(|| "formula was rejected".to_string());
                format!("value '{}': {}", value.key, reason)
            })
            .collect()
    }
}
