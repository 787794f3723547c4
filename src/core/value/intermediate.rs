//! Intermediate results of value-function evaluation
//!
//! A result is either complete or pending. Pending results keep a snapshot
//! of their unfinished inputs and are advanced with
//! [`IntermediateResult::execute_step`], which returns a new result and
//! never mutates the old one. The driving loop keeps stepping until the
//! result is complete or it gives up.

use std::sync::Arc;

use tracing::debug;

use super::user_function::AnalysisFunction;
use crate::core::script::{CompiledScript, Value};
use crate::row::{parse_number, ResultDelegate};

/// Rendering of a result that has no usable value
pub const INCOMPLETE_PLACEHOLDER: &str = "configError: incomplete";

/// Final value of a complete result
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValue {
    Number(f64),
    Text(String),
    /// Script return that is neither number nor text
    Object(Value),
    /// Script failure; never aggregated
    Error(String),
}

#[derive(Debug, Clone)]
enum ResultState {
    Complete(ResultValue),
    Delayed(Arc<dyn ResultDelegate>),
    WithFunction {
        function: AnalysisFunction,
        argument: Box<IntermediateResult>,
    },
    WithFormula {
        script: Arc<CompiledScript>,
        arguments: Vec<IntermediateResult>,
    },
}

#[derive(Debug, Clone)]
pub struct IntermediateResult {
    state: ResultState,
    x_category_key: Option<String>,
}

impl IntermediateResult {
    fn from_state(state: ResultState) -> Self {
        Self {
            state,
            x_category_key: None,
        }
    }

    /// Complete numeric result; NaN becomes 0
    pub fn number(value: f64) -> Self {
        let value = if value.is_nan() { 0.0 } else { value };
        Self::from_state(ResultState::Complete(ResultValue::Number(value)))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::from_state(ResultState::Complete(ResultValue::Text(value.into())))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::from_state(ResultState::Complete(ResultValue::Error(message.into())))
    }

    /// Wrap a script return value
    pub fn from_script_value(value: Value) -> Self {
        match value {
            Value::Number(n) => Self::number(n),
            Value::Text(s) => Self::text(s),
            other => Self::from_state(ResultState::Complete(ResultValue::Object(other))),
        }
    }

    /// Result of an external lookup; complete once the delegate finishes
    pub fn delayed(delegate: Arc<dyn ResultDelegate>) -> Self {
        Self::from_state(ResultState::Delayed(delegate)).execute_step()
    }

    /// Apply `function` once `argument` completes
    pub fn with_function(function: AnalysisFunction, argument: IntermediateResult) -> Self {
        if argument.is_complete() {
            return function.apply(&argument);
        }
        let x_category_key = argument.x_category_key.clone();
        Self {
            state: ResultState::WithFunction {
                function,
                argument: Box::new(argument),
            },
            x_category_key,
        }
    }

    /// Call `script` once all `arguments` complete
    pub fn with_formula(script: Arc<CompiledScript>, arguments: Vec<IntermediateResult>) -> Self {
        if arguments.iter().all(IntermediateResult::is_complete) {
            return call_script(&script, &arguments);
        }
        Self::from_state(ResultState::WithFormula { script, arguments })
    }

    pub fn with_x_category_key(mut self, key: impl Into<String>) -> Self {
        self.x_category_key = Some(key.into());
        self
    }

    pub fn x_category_key(&self) -> Option<&str> {
        self.x_category_key.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, ResultState::Complete(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self.state, ResultState::Complete(ResultValue::Error(_)))
    }

    pub fn is_text_result(&self) -> bool {
        matches!(self.state, ResultState::Complete(ResultValue::Text(_)))
    }

    /// Final value, `None` while pending
    pub fn value(&self) -> Option<&ResultValue> {
        match &self.state {
            ResultState::Complete(value) => Some(value),
            _ => None,
        }
    }

    /// Numeric view: text is parsed, pending and error results are 0
    pub fn number_result(&self) -> f64 {
        match &self.state {
            ResultState::Complete(ResultValue::Number(n)) => *n,
            ResultState::Complete(ResultValue::Text(s)) => parse_number(s),
            ResultState::Complete(ResultValue::Object(value)) => {
                let n = value.as_number();
                if n.is_nan() {
                    0.0
                } else {
                    n
                }
            }
            _ => 0.0,
        }
    }

    /// Text view: numbers use two fixed decimals, pending and error results
    /// render the placeholder
    pub fn text_result(&self) -> String {
        match &self.state {
            ResultState::Complete(ResultValue::Number(n)) => format!("{:.2}", n),
            ResultState::Complete(ResultValue::Text(s)) => s.clone(),
            ResultState::Complete(ResultValue::Object(value)) => value.as_text(),
            _ => INCOMPLETE_PLACEHOLDER.to_string(),
        }
    }

    /// Advance a pending result by one step
    pub fn execute_step(&self) -> IntermediateResult {
        let stepped = match &self.state {
            ResultState::Complete(_) => return self.clone(),
            ResultState::Delayed(delegate) => {
                if !delegate.is_complete() {
                    return self.clone();
                }
                if delegate.is_text_result() {
                    Self::text(delegate.text_result())
                } else {
                    Self::number(delegate.result())
                }
            }
            ResultState::WithFunction { function, argument } => {
                Self::with_function(*function, argument.execute_step())
            }
            ResultState::WithFormula { script, arguments } => {
                let arguments = arguments
                    .iter()
                    .map(IntermediateResult::execute_step)
                    .collect();
                Self::with_formula(Arc::clone(script), arguments)
            }
        };

        match &self.x_category_key {
            Some(key) => stepped.with_x_category_key(key.clone()),
            None => stepped,
        }
    }

    /// Complete result now: pending results become the placeholder error
    pub fn into_immediate(self) -> IntermediateResult {
        if self.is_complete() {
            self
        } else {
            let key = self.x_category_key;
            let mut result = Self::error(INCOMPLETE_PLACEHOLDER);
            result.x_category_key = key;
            result
        }
    }
}

/// Call a script on complete arguments
fn call_script(script: &CompiledScript, arguments: &[IntermediateResult]) -> IntermediateResult {
    if let Some(failed) = arguments.iter().find(|a| a.is_error()) {
        return failed.clone();
    }

    let values: Vec<Value> = arguments
        .iter()
        .map(|argument| match argument.value() {
            Some(ResultValue::Number(n)) => Value::Number(*n),
            Some(ResultValue::Text(s)) => Value::Text(s.clone()),
            Some(ResultValue::Object(v)) => v.clone(),
            _ => Value::Null,
        })
        .collect();

    match script.call(&values) {
        Ok(value) => IntermediateResult::from_script_value(value),
        Err(err) => {
            debug!(script = script.source(), error = %err, "script call failed");
            IntermediateResult::error(err.message)
        }
    }
}
