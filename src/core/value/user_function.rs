//! Single-argument analysis functions used by `Func` value nodes

use chrono::{Datelike, NaiveDate};

use super::intermediate::{IntermediateResult, ResultValue};
use crate::core::script::evaluator::format_plain;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisFunction {
    Abs,
    Neg,
    Round,
    Floor,
    Ceil,
    Sqrt,
    Upper,
    Lower,
    Trim,
    Len,
    Year,
    Month,
    Quarter,
    Day,
    /// Coerce to number
    Num,
    /// Coerce to text
    Text,
}

impl AnalysisFunction {
    /// Function for a formula word (`ABS`, `YEAR`, ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "ABS" => AnalysisFunction::Abs,
            "NEG" => AnalysisFunction::Neg,
            "ROUND" => AnalysisFunction::Round,
            "FLOOR" => AnalysisFunction::Floor,
            "CEIL" => AnalysisFunction::Ceil,
            "SQRT" => AnalysisFunction::Sqrt,
            "UPPER" => AnalysisFunction::Upper,
            "LOWER" => AnalysisFunction::Lower,
            "TRIM" => AnalysisFunction::Trim,
            "LEN" => AnalysisFunction::Len,
            "YEAR" => AnalysisFunction::Year,
            "MONTH" => AnalysisFunction::Month,
            "QUARTER" => AnalysisFunction::Quarter,
            "DAY" => AnalysisFunction::Day,
            "NUM" => AnalysisFunction::Num,
            "TEXT" => AnalysisFunction::Text,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(self) -> &'static str {
        match self {
            AnalysisFunction::Abs => "ABS",
            AnalysisFunction::Neg => "NEG",
            AnalysisFunction::Round => "ROUND",
            AnalysisFunction::Floor => "FLOOR",
            AnalysisFunction::Ceil => "CEIL",
            AnalysisFunction::Sqrt => "SQRT",
            AnalysisFunction::Upper => "UPPER",
            AnalysisFunction::Lower => "LOWER",
            AnalysisFunction::Trim => "TRIM",
            AnalysisFunction::Len => "LEN",
            AnalysisFunction::Year => "YEAR",
            AnalysisFunction::Month => "MONTH",
            AnalysisFunction::Quarter => "QUARTER",
            AnalysisFunction::Day => "DAY",
            AnalysisFunction::Num => "NUM",
            AnalysisFunction::Text => "TEXT",
        }
    }

    pub fn returns_text(self) -> bool {
        matches!(
            self,
            AnalysisFunction::Upper
                | AnalysisFunction::Lower
                | AnalysisFunction::Trim
                | AnalysisFunction::Text
        )
    }

    pub fn returns_number(self) -> bool {
        !self.returns_text()
    }

    /// Apply to a complete argument. Errors pass through unchanged.
    pub fn apply(self, argument: &IntermediateResult) -> IntermediateResult {
        if argument.is_error() || !argument.is_complete() {
            return argument.clone().into_immediate();
        }

        let result = match self {
            AnalysisFunction::Abs => IntermediateResult::number(argument.number_result().abs()),
            AnalysisFunction::Neg => IntermediateResult::number(-argument.number_result()),
            AnalysisFunction::Round => IntermediateResult::number(argument.number_result().round()),
            AnalysisFunction::Floor => IntermediateResult::number(argument.number_result().floor()),
            AnalysisFunction::Ceil => IntermediateResult::number(argument.number_result().ceil()),
            AnalysisFunction::Sqrt => IntermediateResult::number(argument.number_result().sqrt()),
            AnalysisFunction::Upper => IntermediateResult::text(argument.text_result().to_uppercase()),
            AnalysisFunction::Lower => IntermediateResult::text(argument.text_result().to_lowercase()),
            AnalysisFunction::Trim => IntermediateResult::text(argument.text_result().trim().to_string()),
            AnalysisFunction::Len => {
                IntermediateResult::number(argument.text_result().chars().count() as f64)
            }
            AnalysisFunction::Year => date_part(argument, |d| d.year() as f64),
            AnalysisFunction::Month => date_part(argument, |d| d.month() as f64),
            AnalysisFunction::Quarter => date_part(argument, |d| (d.month0() / 3 + 1) as f64),
            AnalysisFunction::Day => date_part(argument, |d| d.day() as f64),
            AnalysisFunction::Num => IntermediateResult::number(argument.number_result()),
            AnalysisFunction::Text => match argument.value() {
                Some(ResultValue::Number(n)) => IntermediateResult::text(format_plain(*n)),
                _ => IntermediateResult::text(argument.text_result()),
            },
        };

        match argument.x_category_key() {
            Some(key) => result.with_x_category_key(key),
            None => result,
        }
    }
}

/// CRM raw dates are `YYYYMMDD`; display dates are ISO
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}

/// Raw dates read through `N[...]` arrive as numbers like 20240815
fn date_part(argument: &IntermediateResult, part: impl Fn(NaiveDate) -> f64) -> IntermediateResult {
    let text = match argument.value() {
        Some(ResultValue::Number(n)) => format_plain(*n),
        _ => argument.text_result(),
    };
    let value = parse_date(&text).map_or(0.0, part);
    IntermediateResult::number(value)
}
