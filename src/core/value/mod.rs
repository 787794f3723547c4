//! Value functions: parsing, evaluation and resumable results

pub mod function;
pub mod intermediate;
pub mod parser;
pub mod user_function;

pub use function::{FieldRef, ValueFunction};
pub use intermediate::{IntermediateResult, ResultValue, INCOMPLETE_PLACEHOLDER};
pub use parser::{ValueParseError, ValueParser, ValueTokenizer};
pub use user_function::AnalysisFunction;
