//! Value function tests
//!
//! Parsing value formulas against an analysis context and evaluating the
//! resulting trees, including results that complete over several steps.

use crm_analysis::config::parse_config;
use crm_analysis::core::value::{ResultValue, ValueFunction, ValueParser, INCOMPLETE_PLACEHOLDER};
use crm_analysis::core::Analysis;
use crm_analysis::{RecordRow, ResultDelegate, ResultRow};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const CONFIG: &str = r#"
name: Opportunities
tables:
  - { key: OPP, info_area: PR, index: 0 }
  - { key: PERS, info_area: KP, index: 2 }
  - { key: COMP, info_area: FI, index: 3 }
fields:
  - { key: Revenue, column: 0, table: 0 }
  - { key: Name, column: 1, table: 2 }
  - { key: Volume, column: 2, table: 3 }
  - { key: Rate, column: 3, table: 3 }
"#;

fn analysis() -> Analysis {
    Analysis::new(&parse_config(CONFIG).unwrap()).unwrap()
}

fn parse(analysis: &Analysis, formula: &str) -> Arc<ValueFunction> {
    ValueParser::try_parse(formula, analysis.context())
        .unwrap_or_else(|e| panic!("'{}' should parse: {}", formula, e))
}

fn row(values: &[&str]) -> RecordRow {
    RecordRow::new(values.iter().map(|v| v.to_string()).collect())
}

/// Lookup that completes on its `polls`-th completion check
#[derive(Debug)]
struct Countdown {
    remaining: AtomicUsize,
    value: f64,
}

impl Countdown {
    fn new(polls: usize, value: f64) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(polls),
            value,
        })
    }
}

impl ResultDelegate for Countdown {
    fn result(&self) -> f64 {
        self.value
    }

    fn text_result(&self) -> String {
        self.value.to_string()
    }

    fn is_text_result(&self) -> bool {
        false
    }

    fn count(&self) -> usize {
        1
    }

    fn is_complete(&self) -> bool {
        let _ = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.remaining.load(Ordering::SeqCst) == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_parse_field_references() {
    let analysis = analysis();
    assert!(matches!(
        *parse(&analysis, "N[Revenue]"),
        ValueFunction::SimpleNumberField(_)
    ));
    assert!(matches!(
        *parse(&analysis, "T[Name]"),
        ValueFunction::SimpleTextField(_)
    ));
    assert!(matches!(
        *parse(&analysis, "X[COMP]"),
        ValueFunction::InfoAreaField { table_index: 3 }
    ));
    assert!(matches!(
        *parse(&analysis, "L[Revenue]"),
        ValueFunction::LinkedField(_)
    ));
}

#[test]
fn test_parse_consumes_whole_formula() {
    let analysis = analysis();
    for formula in [
        "N[Revenue]",
        "  N[Revenue]  ",
        "ROUND(N[Rate])",
        "JS[(a, b) => a * b](N[Volume], N[Rate])",
        "UPPER(T[Name])",
    ] {
        assert!(
            ValueParser::try_parse(formula, analysis.context()).is_ok(),
            "{}",
            formula
        );
    }
}

#[test]
fn test_parse_rejects_trailing_text() {
    let analysis = analysis();
    let err = ValueParser::try_parse("N[Revenue] extra", analysis.context()).unwrap_err();
    assert!(err.to_string().contains("Unparsed text"));
}

#[test]
fn test_parse_rejects_malformed_formulas() {
    let analysis = analysis();
    for formula in [
        "",
        "N[Revenue",
        "N[Unknown]",
        "Q[Revenue]",
        "JS[(a) => a](N[Revenue]",
        "JS[(a) => ](N[Revenue])",
        "NOPE(N[Revenue])",
        "V[Missing]",
    ] {
        assert!(
            ValueParser::parse(formula, analysis.context()).is_none(),
            "'{}' should be rejected",
            formula
        );
    }
}

#[test]
fn test_value_reuse_requires_earlier_definition() {
    let config = parse_config(
        r#"
name: Reuse
fields:
  - { key: Revenue, column: 0 }
values:
  - { key: Later, formula: "V[Net]" }
  - { key: Net, formula: "JS[(r) => r / 2](N[Revenue])" }
  - { key: Double, formula: "JS[(n) => n * 2](V[Net])" }
"#,
    )
    .unwrap();
    let analysis = Analysis::new(&config).unwrap();

    assert!(analysis.value("Later").unwrap().function.is_none());
    let double = analysis.value("Double").unwrap().function.clone().unwrap();
    let result = double.result_for_row(&row(&["50"]));
    assert_eq!(result.number_result(), 50.0);
}

#[test]
fn test_significant_table_indices() {
    let analysis = analysis();
    let function = parse(&analysis, "JS[(a, b, c) => a + b](N[Revenue], T[Name], N[Volume])");
    let indices: Vec<usize> = function
        .significant_query_result_table_indices()
        .into_iter()
        .collect();
    assert_eq!(indices, vec![0, 2, 3]);
}

// ═══════════════════════════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_numeric_coercion() {
    let analysis = analysis();
    let function = parse(&analysis, "N[Revenue]");
    for (raw, expected) in [("42.5", 42.5), ("", 0.0), ("abc", 0.0), ("NaN", 0.0), (" 7 ", 7.0)] {
        let result = function.result_for_row(&row(&[raw]));
        assert_eq!(result.number_result(), expected, "raw value '{}'", raw);
    }
}

#[test]
fn test_formula_and_function_results() {
    let analysis = analysis();
    let r = row(&["100", "smith", "4", "2.5"]);

    let product = parse(&analysis, "JS[(a, b) => a * b](N[Volume], N[Rate])");
    assert_eq!(product.result_for_row(&r).number_result(), 10.0);

    let upper = parse(&analysis, "UPPER(T[Name])");
    let result = upper.result_for_row(&r);
    assert!(result.is_text_result());
    assert_eq!(result.text_result(), "SMITH");

    let rounded = parse(&analysis, "ROUND(JS[(a) => a / 3](N[Revenue]))");
    assert_eq!(rounded.result_for_row(&r).number_result(), 33.0);
}

#[test]
fn test_date_functions_read_numeric_fields() {
    let analysis = analysis();
    let r = row(&["20240815", "20240815"]);

    let from_number = parse(&analysis, "YEAR(N[Revenue])");
    assert_eq!(from_number.result_for_row(&r).number_result(), 2024.0);

    let from_text = parse(&analysis, "QUARTER(T[Name])");
    assert_eq!(from_text.result_for_row(&r).number_result(), 3.0);
}

#[test]
fn test_script_arity_mismatch_is_error_result() {
    let analysis = analysis();
    let function = parse(&analysis, "JS[(a, b) => a + b](N[Revenue])");
    let result = function.result_for_row(&row(&["1"]));
    assert!(result.is_complete());
    assert!(result.is_error());
    assert_eq!(result.number_result(), 0.0);
}

#[test]
fn test_evaluation_is_idempotent() {
    let analysis = analysis();
    let function = parse(&analysis, "JS[(a, b) => a > b ? 'big' : 'small'](N[Volume], N[Rate])");
    let r = row(&["0", "", "9", "3"]);
    let first = function.result_for_row(&r);
    let second = function.result_for_row(&r);
    assert_eq!(first.text_result(), "big");
    assert_eq!(first.text_result(), second.text_result());
    assert_eq!(first.value(), second.value());
}

// ═══════════════════════════════════════════════════════════════════════════
// STEPPING
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_linked_field_without_lookup_is_immediate() {
    let analysis = analysis();
    let function = parse(&analysis, "L[Revenue]");
    let result = function.result_for_row(&row(&["12"]));
    assert!(result.is_complete());
    assert_eq!(result.number_result(), 12.0);
}

#[test]
fn test_trampoline_converges() {
    let analysis = analysis();
    let function = parse(&analysis, "JS[(a, b) => a + b](L[Revenue], L[Volume])");
    let r = row(&[])
        .with_linked(0, Countdown::new(3, 40.0))
        .with_linked(2, Countdown::new(5, 2.0));

    let mut result = function.result_for_row(&r);
    let mut steps = 0;
    while !result.is_complete() {
        assert_eq!(result.text_result(), INCOMPLETE_PLACEHOLDER);
        result = result.execute_step();
        steps += 1;
        assert!(steps <= 10, "result never completed");
    }

    assert_eq!(steps, 4);
    assert_eq!(result.value(), Some(&ResultValue::Number(42.0)));
}

#[test]
fn test_execute_step_leaves_pending_result_unchanged() {
    let analysis = analysis();
    let function = parse(&analysis, "ROUND(L[Revenue])");
    let r = row(&[]).with_linked(0, Countdown::new(2, 9.6));

    let pending = function.result_for_row(&r);
    assert!(!pending.is_complete());
    let done = pending.execute_step();
    assert!(done.is_complete());
    assert!(!pending.is_complete());
    assert_eq!(done.number_result(), 10.0);
}

#[test]
fn test_immediate_result_renders_placeholder() {
    let analysis = analysis();
    let function = parse(&analysis, "L[Revenue]");
    let r = row(&[]).with_linked(0, Countdown::new(100, 1.0));

    let result = function.immediate_result_for_row(&r);
    assert!(result.is_error());
    assert_eq!(result.text_result(), INCOMPLETE_PLACEHOLDER);
    assert_eq!(r.number_at_index(0), 0.0);
}

#[test]
fn test_immediate_function_over_pending_argument_renders_placeholder() {
    let analysis = analysis();
    let function = parse(&analysis, "ROUND(L[Revenue])");
    assert!(matches!(*function, ValueFunction::Func { .. }));
    let r = row(&[]).with_linked(0, Countdown::new(100, 1.4));

    let result = function.immediate_result_for_row(&r);
    assert!(result.is_complete());
    assert!(result.is_error());
    assert_eq!(result.text_result(), INCOMPLETE_PLACEHOLDER);
    assert_eq!(result.number_result(), 0.0);
}

#[test]
fn test_x_category_key_survives_stepping() {
    let analysis = analysis();
    let function = parse(&analysis, "L[Revenue]");
    let r = row(&[]).with_linked(0, Countdown::new(2, 5.0));

    let pending = function.result_for_row(&r).with_x_category_key("Q1");
    let done = pending.execute_step();
    assert!(done.is_complete());
    assert_eq!(done.x_category_key(), Some("Q1"));
}
