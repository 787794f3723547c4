//! Value-function expression trees

use std::collections::BTreeSet;
use std::sync::Arc;

use super::intermediate::IntermediateResult;
use super::user_function::AnalysisFunction;
use crate::core::script::CompiledScript;
use crate::row::ResultRow;

/// Position of a field in the query result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef {
    /// Result column index within a row
    pub column_index: usize,
    /// Index of the joined table the field belongs to
    pub table_index: usize,
}

impl FieldRef {
    pub fn new(column_index: usize, table_index: usize) -> Self {
        Self {
            column_index,
            table_index,
        }
    }
}

/// A node of a parsed value formula. Children are shared, never mutated.
#[derive(Debug, Clone)]
pub enum ValueFunction {
    /// Raw value of a field parsed as a number
    SimpleNumberField(FieldRef),
    /// Display value of a field
    SimpleTextField(FieldRef),
    /// Record identification of a joined table, used for drill-through
    InfoAreaField { table_index: usize },
    /// Field whose value may arrive later through a row delegate
    LinkedField(FieldRef),
    /// Single-argument transform of a child result
    Func {
        function: AnalysisFunction,
        argument: Arc<ValueFunction>,
    },
    /// Script called with the results of all argument functions
    Formula {
        script: Arc<CompiledScript>,
        arguments: Vec<Arc<ValueFunction>>,
    },
}

impl ValueFunction {
    pub fn returns_number(&self) -> bool {
        match self {
            ValueFunction::SimpleNumberField(_) | ValueFunction::LinkedField(_) => true,
            ValueFunction::Func { function, .. } => function.returns_number(),
            _ => false,
        }
    }

    pub fn returns_text(&self) -> bool {
        match self {
            ValueFunction::SimpleTextField(_) | ValueFunction::InfoAreaField { .. } => true,
            ValueFunction::Func { function, .. } => function.returns_text(),
            _ => false,
        }
    }

    /// Script results may be of any type
    pub fn returns_object(&self) -> bool {
        matches!(self, ValueFunction::Formula { .. })
    }

    /// Evaluate against a row. Never fails; the result may be pending.
    pub fn result_for_row(&self, row: &dyn ResultRow) -> IntermediateResult {
        match self {
            ValueFunction::SimpleNumberField(field) => {
                IntermediateResult::number(row.number_at_index(field.column_index))
            }
            ValueFunction::SimpleTextField(field) => {
                IntermediateResult::text(row.value_at_index(field.column_index))
            }
            ValueFunction::InfoAreaField { table_index } => {
                IntermediateResult::text(row.record_identification_at_index(*table_index))
            }
            ValueFunction::LinkedField(field) => match row.linked_result(field.column_index) {
                Some(delegate) => IntermediateResult::delayed(delegate),
                None => IntermediateResult::number(row.number_at_index(field.column_index)),
            },
            ValueFunction::Func { function, argument } => {
                IntermediateResult::with_function(*function, argument.result_for_row(row))
            }
            ValueFunction::Formula { script, arguments } => {
                let results = arguments
                    .iter()
                    .map(|argument| argument.result_for_row(row))
                    .collect();
                IntermediateResult::with_formula(Arc::clone(script), results)
            }
        }
    }

    /// Evaluate and require an answer now; pending results render the
    /// placeholder error
    pub fn immediate_result_for_row(&self, row: &dyn ResultRow) -> IntermediateResult {
        self.result_for_row(row).into_immediate()
    }

    /// Tables of the query this subtree reads from
    pub fn significant_query_result_table_indices(&self) -> BTreeSet<usize> {
        let mut indices = BTreeSet::new();
        self.collect_table_indices(&mut indices);
        indices
    }

    fn collect_table_indices(&self, indices: &mut BTreeSet<usize>) {
        match self {
            ValueFunction::SimpleNumberField(field)
            | ValueFunction::SimpleTextField(field)
            | ValueFunction::LinkedField(field) => {
                indices.insert(field.table_index);
            }
            ValueFunction::InfoAreaField { table_index } => {
                indices.insert(*table_index);
            }
            ValueFunction::Func { argument, .. } => argument.collect_table_indices(indices),
            ValueFunction::Formula { arguments, .. } => {
                for argument in arguments {
                    argument.collect_table_indices(indices);
                }
            }
        }
    }
}
