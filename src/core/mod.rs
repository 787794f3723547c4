//! Analysis evaluation engine

pub mod aggregation;
pub mod analysis;
pub mod column;
pub mod report;
pub mod script;
pub mod value;

pub use aggregation::{AggregationKind, AggregationType, AggregatorKind, ValueAggregator};
pub use analysis::{Analysis, AnalysisContext, AnalysisField, AnalysisTable, AnalysisValue};
pub use column::ResultColumn;
pub use report::{AnalysisReport, Report, ReportOptions};
pub use value::{IntermediateResult, ValueFunction, ValueParser};
