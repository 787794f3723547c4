//! Script evaluator
//!
//! Evaluates a parsed script body against positional argument values.
//! Evaluation is total: type mismatches coerce the way the CRM client's
//! scripting always did (text that is not a number becomes NaN, `+` with a
//! text operand concatenates).

use super::parser::Expr;

/// Value passed into and returned from scripts
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    Null,
}

impl Value {
    /// Numeric view; unparseable text is NaN, empty text and null are 0
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Null => 0.0,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Value::Number(n) => format_plain(*n),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => b.to_string(),
            Value::Null => "null".to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Text(s) => !s.is_empty(),
            Value::Boolean(b) => *b,
            Value::Null => false,
        }
    }
}

/// Shortest round-trip rendering, integers without a fraction
pub(crate) fn format_plain(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Functions callable from scripts. `Math.` prefixes are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Round,
    Floor,
    Ceil,
    Sqrt,
    Pow,
    Min,
    Max,
    Len,
    Upper,
    Lower,
    Trim,
    Concat,
    Number,
    Text,
    If,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        let name = name.strip_prefix("Math.").unwrap_or(name);
        let function = match name.to_ascii_lowercase().as_str() {
            "abs" => Builtin::Abs,
            "round" => Builtin::Round,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "sqrt" => Builtin::Sqrt,
            "pow" => Builtin::Pow,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "len" | "length" => Builtin::Len,
            "upper" | "touppercase" => Builtin::Upper,
            "lower" | "tolowercase" => Builtin::Lower,
            "trim" => Builtin::Trim,
            "concat" => Builtin::Concat,
            "number" | "num" => Builtin::Number,
            "string" | "str" => Builtin::Text,
            "if" | "iif" => Builtin::If,
            _ => return None,
        };
        Some(function)
    }

    /// Minimum and optional maximum argument count
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Builtin::Abs
            | Builtin::Floor
            | Builtin::Ceil
            | Builtin::Sqrt
            | Builtin::Len
            | Builtin::Upper
            | Builtin::Lower
            | Builtin::Trim
            | Builtin::Number
            | Builtin::Text => (1, Some(1)),
            Builtin::Round => (1, Some(2)),
            Builtin::Pow => (2, Some(2)),
            Builtin::Min | Builtin::Max => (1, None),
            Builtin::Concat => (0, None),
            Builtin::If => (3, Some(3)),
        }
    }

    pub fn arity_description(self) -> String {
        match self.arity() {
            (min, Some(max)) if min == max => min.to_string(),
            (min, Some(max)) => format!("{min}-{max}"),
            (min, None) => format!("at least {min}"),
        }
    }
}

/// Evaluate an expression against the positional arguments
pub fn evaluate(expr: &Expr, args: &[Value]) -> Value {
    match expr {
        Expr::Number(n) => Value::Number(*n),
        Expr::Text(s) => Value::Text(s.clone()),
        Expr::Boolean(b) => Value::Boolean(*b),
        Expr::Null => Value::Null,
        Expr::Parameter(index) => args.get(*index).cloned().unwrap_or(Value::Null),
        Expr::FunctionCall { function, args: call_args } => {
            evaluate_function(*function, call_args, args)
        }
        Expr::BinaryOp { op, left, right } => match op.as_str() {
            "&&" => {
                let l = evaluate(left, args);
                if l.is_truthy() {
                    evaluate(right, args)
                } else {
                    l
                }
            }
            "||" => {
                let l = evaluate(left, args);
                if l.is_truthy() {
                    l
                } else {
                    evaluate(right, args)
                }
            }
            _ => evaluate_binary_op(op, &evaluate(left, args), &evaluate(right, args)),
        },
        Expr::UnaryOp { op, operand } => {
            let value = evaluate(operand, args);
            match op.as_str() {
                "-" => Value::Number(-value.as_number()),
                "!" => Value::Boolean(!value.is_truthy()),
                _ => Value::Number(value.as_number()),
            }
        }
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if evaluate(condition, args).is_truthy() {
                evaluate(then, args)
            } else {
                evaluate(otherwise, args)
            }
        }
    }
}

fn evaluate_binary_op(op: &str, left: &Value, right: &Value) -> Value {
    match op {
        "+" => {
            if matches!(left, Value::Text(_)) || matches!(right, Value::Text(_)) {
                Value::Text(format!("{}{}", left.as_text(), right.as_text()))
            } else {
                Value::Number(left.as_number() + right.as_number())
            }
        }
        "-" => Value::Number(left.as_number() - right.as_number()),
        "*" => Value::Number(left.as_number() * right.as_number()),
        "/" => Value::Number(left.as_number() / right.as_number()),
        "%" => Value::Number(left.as_number() % right.as_number()),
        "^" => Value::Number(left.as_number().powf(right.as_number())),
        "==" => Value::Boolean(values_equal(left, right)),
        "!=" => Value::Boolean(!values_equal(left, right)),
        "<" | ">" | "<=" | ">=" => Value::Boolean(compare(op, left, right)),
        _ => Value::Null,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => a == b,
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => left.as_number() == right.as_number(),
    }
}

fn compare(op: &str, left: &Value, right: &Value) -> bool {
    if let (Value::Text(a), Value::Text(b)) = (left, right) {
        return match op {
            "<" => a < b,
            ">" => a > b,
            "<=" => a <= b,
            _ => a >= b,
        };
    }

    let (l, r) = (left.as_number(), right.as_number());
    match op {
        "<" => l < r,
        ">" => l > r,
        "<=" => l <= r,
        _ => l >= r,
    }
}

fn evaluate_function(function: Builtin, call_args: &[Expr], args: &[Value]) -> Value {
    if function == Builtin::If {
        return if evaluate(&call_args[0], args).is_truthy() {
            evaluate(&call_args[1], args)
        } else {
            evaluate(&call_args[2], args)
        };
    }

    let values: Vec<Value> = call_args.iter().map(|a| evaluate(a, args)).collect();
    let number = |i: usize| values.get(i).map_or(0.0, Value::as_number);
    let text = |i: usize| values.get(i).map(Value::as_text).unwrap_or_default();

    match function {
        Builtin::Abs => Value::Number(number(0).abs()),
        Builtin::Round => {
            let factor = 10f64.powi(number(1) as i32);
            Value::Number((number(0) * factor).round() / factor)
        }
        Builtin::Floor => Value::Number(number(0).floor()),
        Builtin::Ceil => Value::Number(number(0).ceil()),
        Builtin::Sqrt => Value::Number(number(0).sqrt()),
        Builtin::Pow => Value::Number(number(0).powf(number(1))),
        Builtin::Min => Value::Number(values.iter().map(Value::as_number).fold(f64::INFINITY, f64::min)),
        Builtin::Max => Value::Number(
            values
                .iter()
                .map(Value::as_number)
                .fold(f64::NEG_INFINITY, f64::max),
        ),
        Builtin::Len => Value::Number(text(0).chars().count() as f64),
        Builtin::Upper => Value::Text(text(0).to_uppercase()),
        Builtin::Lower => Value::Text(text(0).to_lowercase()),
        Builtin::Trim => Value::Text(text(0).trim().to_string()),
        Builtin::Concat => Value::Text(values.iter().map(Value::as_text).collect()),
        Builtin::Number => Value::Number(number(0)),
        Builtin::Text => Value::Text(text(0)),
        Builtin::If => Value::Null,
    }
}
