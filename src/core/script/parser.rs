//! Script parser
//!
//! Turns script tokens into a parameter list and an expression tree.
//! Uses recursive descent parsing with operator precedence. Parameter and
//! function names are resolved here, so a script that parses is callable.

use super::evaluator::Builtin;
use super::tokenizer::Token;
use super::ScriptError;

/// Expression tree of a compiled script body
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    Null,
    /// Positional parameter of the script
    Parameter(usize),
    /// Built-in function call: NAME(arg1, arg2, ...)
    FunctionCall { function: Builtin, args: Vec<Expr> },
    /// Binary operation: left op right
    BinaryOp {
        op: String,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation: -expr, !expr
    UnaryOp { op: String, operand: Box<Expr> },
    /// condition ? then : otherwise
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

/// A parsed script: named parameters and the body expression
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptAst {
    pub params: Vec<String>,
    pub body: Expr,
}

/// Parser for script tokens
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    params: Vec<String>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            params: Vec::new(),
        }
    }

    /// Parse the tokens into a script
    pub fn parse(mut self) -> Result<ScriptAst, ScriptError> {
        if self.tokens.is_empty() {
            return Err(ScriptError::new("Empty script", 0));
        }

        self.params = self.parameter_list()?;
        let body = self.expression()?;

        if !self.is_at_end() {
            return Err(ScriptError::new(
                format!("Unexpected token after expression: {:?}", self.peek()),
                self.position,
            ));
        }

        Ok(ScriptAst {
            params: self.params,
            body,
        })
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.position + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn match_any_operator(&mut self, ops: &[&str]) -> Option<String> {
        if let Some(Token::Operator(s)) = self.peek() {
            if ops.contains(&s.as_str()) {
                let op = s.clone();
                self.advance();
                return Some(op);
            }
        }
        None
    }

    /// Parameters: `x =>` | `(a, b, ...) =>` | nothing (parameterless body)
    fn parameter_list(&mut self) -> Result<Vec<String>, ScriptError> {
        if let (Some(Token::Identifier(name)), Some(Token::Arrow)) = (self.peek(), self.peek_at(1)) {
            let name = name.clone();
            self.position += 2;
            return Ok(vec![name]);
        }

        if self.peek() != Some(&Token::OpenParen) || !self.has_arrow_header() {
            return Ok(Vec::new());
        }

        self.advance();
        let mut params = Vec::new();
        if !self.match_token(&Token::CloseParen) {
            loop {
                match self.advance() {
                    Some(Token::Identifier(name)) => {
                        if params.contains(&name) {
                            return Err(ScriptError::new(
                                format!("Duplicate parameter: {}", name),
                                self.position - 1,
                            ));
                        }
                        params.push(name);
                    }
                    other => {
                        return Err(ScriptError::new(
                            format!("Expected parameter name, found {:?}", other),
                            self.position.saturating_sub(1),
                        ));
                    }
                }
                if self.match_token(&Token::CloseParen) {
                    break;
                }
                if !self.match_token(&Token::Comma) {
                    return Err(ScriptError::new(
                        "Expected ',' or ')' in parameter list",
                        self.position,
                    ));
                }
            }
        }

        if !self.match_token(&Token::Arrow) {
            return Err(ScriptError::new("Expected '=>' after parameters", self.position));
        }
        Ok(params)
    }

    /// Whether the parenthesised group at the cursor is followed by `=>`
    fn has_arrow_header(&self) -> bool {
        let mut offset = 1;
        while let Some(token) = self.peek_at(offset) {
            match token {
                Token::CloseParen => return self.peek_at(offset + 1) == Some(&Token::Arrow),
                Token::Identifier(_) | Token::Comma => offset += 1,
                _ => return false,
            }
        }
        false
    }

    fn expression(&mut self) -> Result<Expr, ScriptError> {
        self.conditional()
    }

    /// Conditional: or ( "?" expression ":" expression )?   (right-associative)
    fn conditional(&mut self) -> Result<Expr, ScriptError> {
        let condition = self.logical_or()?;

        if self.match_token(&Token::Question) {
            let then = self.expression()?;
            if !self.match_token(&Token::Colon) {
                return Err(ScriptError::new(
                    "Expected ':' in conditional expression",
                    self.position,
                ));
            }
            let otherwise = self.expression()?;
            return Ok(Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }

        Ok(condition)
    }

    fn logical_or(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(&["||"], Self::logical_and)
    }

    fn logical_and(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(&["&&"], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(&["==", "!="], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(&["<", ">", "<=", ">="], Self::term)
    }

    fn term(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(&["+", "-"], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr, ScriptError> {
        self.binary_level(&["*", "/", "%"], Self::power)
    }

    /// Left-associative chain of `next (op next)*`
    fn binary_level(
        &mut self,
        ops: &[&str],
        next: fn(&mut Self) -> Result<Expr, ScriptError>,
    ) -> Result<Expr, ScriptError> {
        let mut left = next(self)?;

        while let Some(op) = self.match_any_operator(ops) {
            let right = next(self)?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Power: unary ( "^" power )?   (right-associative)
    fn power(&mut self) -> Result<Expr, ScriptError> {
        let left = self.unary()?;

        if self.match_any_operator(&["^"]).is_some() {
            let right = self.power()?;
            Ok(Expr::BinaryOp {
                op: "^".to_string(),
                left: Box::new(left),
                right: Box::new(right),
            })
        } else {
            Ok(left)
        }
    }

    fn unary(&mut self) -> Result<Expr, ScriptError> {
        if let Some(op) = self.match_any_operator(&["-", "+", "!"]) {
            let operand = self.unary()?;
            Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
            })
        } else {
            self.primary()
        }
    }

    /// Primary: NUMBER | STRING | IDENTIFIER | CALL | "(" expr ")"
    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let start = self.position;

        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Text(s)) => Ok(Expr::Text(s)),
            Some(Token::Identifier(name)) => {
                if self.match_token(&Token::OpenParen) {
                    self.call(&name, start)
                } else {
                    self.identifier(&name, start)
                }
            }
            Some(Token::OpenParen) => {
                let expr = self.expression()?;
                if !self.match_token(&Token::CloseParen) {
                    return Err(ScriptError::new(
                        "Expected ')' after expression",
                        self.position,
                    ));
                }
                Ok(expr)
            }
            Some(token) => Err(ScriptError::new(
                format!("Unexpected token: {:?}", token),
                start,
            )),
            None => Err(ScriptError::new("Unexpected end of script", start)),
        }
    }

    fn identifier(&self, name: &str, position: usize) -> Result<Expr, ScriptError> {
        if let Some(index) = self.params.iter().position(|p| p == name) {
            return Ok(Expr::Parameter(index));
        }

        match name {
            "true" => Ok(Expr::Boolean(true)),
            "false" => Ok(Expr::Boolean(false)),
            "null" | "undefined" => Ok(Expr::Null),
            "NaN" => Ok(Expr::Number(f64::NAN)),
            _ => Err(ScriptError::new(
                format!("Unknown identifier: {}", name),
                position,
            )),
        }
    }

    fn call(&mut self, name: &str, position: usize) -> Result<Expr, ScriptError> {
        let function = Builtin::lookup(name)
            .ok_or_else(|| ScriptError::new(format!("Unknown function: {}", name), position))?;

        let mut args = Vec::new();
        if !self.match_token(&Token::CloseParen) {
            args.push(self.expression()?);
            while self.match_token(&Token::Comma) {
                args.push(self.expression()?);
            }
            if !self.match_token(&Token::CloseParen) {
                return Err(ScriptError::new(
                    "Expected ')' after function arguments",
                    self.position,
                ));
            }
        }

        let (min, max) = function.arity();
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(ScriptError::new(
                format!(
                    "{} expects {} argument(s), got {}",
                    name,
                    function.arity_description(),
                    args.len()
                ),
                position,
            ));
        }

        Ok(Expr::FunctionCall { function, args })
    }
}

/// Convenience function to parse script tokens
pub fn parse(tokens: Vec<Token>) -> Result<ScriptAst, ScriptError> {
    Parser::new(tokens).parse()
}
