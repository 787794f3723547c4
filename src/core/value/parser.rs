//! Value formula parser
//!
//! Builds a [`ValueFunction`] tree from a configured value formula:
//!
//! ```text
//! N[Revenue]                          number field
//! T[Country]                          text field
//! X[OPP]                              record identification of a table
//! L[Forecast]                         linked (possibly asynchronous) field
//! V[Margin]                           tree of an earlier value
//! ABS(N[Revenue])                     single-argument function
//! JS[(a, b) => a / b](N[Won], N[All]) script over argument functions
//! ```
//!
//! A formula must be consumed completely. Anything left over, an unknown
//! reference or a script that does not compile rejects the whole formula.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use super::function::ValueFunction;
use super::user_function::AnalysisFunction;
use crate::core::analysis::AnalysisContext;

static WORD: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| Regex::new(r"^[A-Z0-9]+"));

/// Error while parsing a value formula
#[derive(Debug, Clone, PartialEq)]
pub struct ValueParseError {
    pub message: String,
    pub position: usize,
}

impl ValueParseError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for ValueParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Value formula error at position {}: {}",
            self.position, self.message
        )
    }
}

impl std::error::Error for ValueParseError {}

/// Cursor over a value formula
#[derive(Debug, Clone)]
pub struct ValueTokenizer<'a> {
    text: &'a str,
    position: usize,
}

impl<'a> ValueTokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, position: 0 }
    }

    /// Byte offset of the cursor
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_complete(&self) -> bool {
        self.position >= self.text.len()
    }

    pub fn unparsed(&self) -> &'a str {
        &self.text[self.position..]
    }

    pub fn substring(&self, from: usize, to: usize) -> &'a str {
        let to = to.min(self.text.len());
        self.text.get(from.min(to)..to).unwrap_or_default()
    }

    pub fn peek(&self) -> Option<char> {
        self.unparsed().chars().next()
    }

    pub fn skip_whitespace(&mut self) {
        let rest = self.unparsed();
        self.position += rest.len() - rest.trim_start().len();
    }

    /// Consume `expected` if it is the next character
    pub fn accept(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.position += expected.len_utf8();
            true
        } else {
            false
        }
    }

    /// Read a word of upper-case letters and digits
    pub fn read_word(&mut self) -> Result<Option<&'a str>, ValueParseError> {
        let pattern = WORD
            .as_ref()
            .map_err(|e| ValueParseError::new(format!("Regex error: {}", e), self.position))?;
        let Some(found) = pattern.find(self.unparsed()) else {
            return Ok(None);
        };
        let start = self.position;
        self.position += found.end();
        Ok(Some(self.substring(start, self.position)))
    }

    /// Read the contents of a `[...]` group. Nested brackets are kept;
    /// an unterminated group fails without consuming anything.
    pub fn read_index(&mut self) -> Option<&'a str> {
        let rest = self.unparsed();
        if !rest.starts_with('[') {
            return None;
        }

        let mut depth = 0usize;
        for (offset, c) in rest.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        let start = self.position + 1;
                        let end = self.position + offset;
                        self.position += offset + 1;
                        return Some(self.substring(start, end));
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// Parser for value formulas
pub struct ValueParser<'a> {
    tokenizer: ValueTokenizer<'a>,
    context: &'a AnalysisContext,
}

impl<'a> ValueParser<'a> {
    pub fn new(formula: &'a str, context: &'a AnalysisContext) -> Self {
        Self {
            tokenizer: ValueTokenizer::new(formula),
            context,
        }
    }

    /// Parse a formula; rejected formulas yield no function
    pub fn parse(formula: &str, context: &AnalysisContext) -> Option<Arc<ValueFunction>> {
        match Self::try_parse(formula, context) {
            Ok(function) => Some(function),
            Err(err) => {
                warn!(formula, error = %err, "value formula rejected");
                None
            }
        }
    }

    /// Parse a formula, reporting why it was rejected
    pub fn try_parse(
        formula: &str,
        context: &AnalysisContext,
    ) -> Result<Arc<ValueFunction>, ValueParseError> {
        let mut parser = ValueParser::new(formula, context);
        parser.tokenizer.skip_whitespace();
        if parser.tokenizer.is_complete() {
            return Err(ValueParseError::new("Empty formula", 0));
        }

        let function = parser.function()?;

        parser.tokenizer.skip_whitespace();
        if !parser.tokenizer.is_complete() {
            return Err(ValueParseError::new(
                format!("Unparsed text: '{}'", parser.tokenizer.unparsed()),
                parser.tokenizer.position(),
            ));
        }

        debug!(formula, "parsed value formula");
        Ok(function)
    }

    fn error(&self, message: impl Into<String>) -> ValueParseError {
        ValueParseError::new(message, self.tokenizer.position())
    }

    fn function(&mut self) -> Result<Arc<ValueFunction>, ValueParseError> {
        self.tokenizer.skip_whitespace();
        let word = self
            .tokenizer
            .read_word()?
            .ok_or_else(|| self.error("Expected a field, function or script"))?;
        self.tokenizer.skip_whitespace();

        match word {
            "N" | "T" | "L" => {
                let reference = self.index()?;
                let field = self
                    .context
                    .resolve_field(reference)
                    .ok_or_else(|| self.error(format!("Unknown field: {}", reference)))?;
                Ok(Arc::new(match word {
                    "N" => ValueFunction::SimpleNumberField(field),
                    "T" => ValueFunction::SimpleTextField(field),
                    _ => ValueFunction::LinkedField(field),
                }))
            }
            "X" => {
                let reference = self.index()?;
                let table_index = self
                    .context
                    .resolve_table(reference)
                    .ok_or_else(|| self.error(format!("Unknown table: {}", reference)))?;
                Ok(Arc::new(ValueFunction::InfoAreaField { table_index }))
            }
            "V" => {
                let key = self.index()?;
                self.context
                    .value_function(key)
                    .ok_or_else(|| self.error(format!("Unknown value: {}", key)))
            }
            "JS" => self.formula(),
            name => {
                let function = AnalysisFunction::from_name(name)
                    .ok_or_else(|| self.error(format!("Unknown function: {}", name)))?;
                self.expect('(')?;
                let argument = self.function()?;
                self.expect(')')?;
                Ok(Arc::new(ValueFunction::Func { function, argument }))
            }
        }
    }

    /// `JS[script](arg, ...)`
    fn formula(&mut self) -> Result<Arc<ValueFunction>, ValueParseError> {
        let source = self.index()?;
        let script = self
            .context
            .scripts()
            .compile(source)
            .map_err(|err| self.error(format!("Invalid script '{}': {}", source, err)))?;

        self.expect('(')?;
        let mut arguments = Vec::new();
        self.tokenizer.skip_whitespace();
        if !self.tokenizer.accept(')') {
            arguments.push(self.function()?);
            loop {
                self.tokenizer.skip_whitespace();
                if self.tokenizer.accept(')') {
                    break;
                }
                self.expect(',')?;
                arguments.push(self.function()?);
            }
        }

        Ok(Arc::new(ValueFunction::Formula { script, arguments }))
    }

    fn index(&mut self) -> Result<&'a str, ValueParseError> {
        self.tokenizer.skip_whitespace();
        self.tokenizer
            .read_index()
            .map(str::trim)
            .ok_or_else(|| self.error("Expected '[...]'"))
    }

    fn expect(&mut self, expected: char) -> Result<(), ValueParseError> {
        self.tokenizer.skip_whitespace();
        if self.tokenizer.accept(expected) {
            Ok(())
        } else {
            Err(self.error(format!("Expected '{}'", expected)))
        }
    }
}
