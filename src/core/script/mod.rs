//! Embedded script engine for formula value functions
//!
//! Scripts are arrow functions over positional arguments, e.g.
//! `(won, lost) => won / (won + lost) * 100`. They are compiled once when
//! the analysis is loaded and cached by their source text.

pub mod evaluator;
pub mod parser;
pub mod tokenizer;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

pub use evaluator::Value;
use parser::Expr;

/// Error while compiling or calling a script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub message: String,
    pub position: usize,
}

impl ScriptError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Script error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for ScriptError {}

/// A compiled, callable script
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledScript {
    source: String,
    params: Vec<String>,
    body: Expr,
}

impl CompiledScript {
    /// Compile script text. Syntax errors and unknown names fail here.
    pub fn compile(source: &str) -> Result<Self, ScriptError> {
        let tokens = tokenizer::tokenize(source)?;
        let ast = parser::parse(tokens)?;
        Ok(Self {
            source: source.to_string(),
            params: ast.params,
            body: ast.body,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Call the script. The argument count must match the parameter count.
    pub fn call(&self, args: &[Value]) -> Result<Value, ScriptError> {
        if args.len() != self.params.len() {
            return Err(ScriptError::new(
                format!(
                    "expected {} argument(s), got {}",
                    self.params.len(),
                    args.len()
                ),
                0,
            ));
        }
        Ok(evaluator::evaluate(&self.body, args))
    }
}

/// Compiled scripts keyed by source text
#[derive(Debug, Default)]
pub struct ScriptCache {
    scripts: Mutex<HashMap<String, Arc<CompiledScript>>>,
}

impl ScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached script for `source`, compiling it on first use
    pub fn compile(&self, source: &str) -> Result<Arc<CompiledScript>, ScriptError> {
        let key = source.trim();
        let mut scripts = self
            .scripts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(script) = scripts.get(key) {
            return Ok(Arc::clone(script));
        }

        let script = Arc::new(CompiledScript::compile(key)?);
        debug!(script = key, params = script.param_count(), "compiled script");
        scripts.insert(key.to_string(), Arc::clone(&script));
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.scripts
            .lock()
            .map(|scripts| scripts.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
