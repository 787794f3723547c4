//! Script tokenizer
//!
//! Converts script text like `(won, lost) => won / (won + lost)` into a
//! sequence of tokens for the script parser.

use std::iter::Peekable;
use std::str::Chars;

use super::ScriptError;

/// A token in a script expression
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A numeric literal (e.g., 123, 45.67, 1.5e10)
    Number(f64),
    /// A string literal (e.g., "hello" or 'world')
    Text(String),
    /// A parameter name, function name or keyword (`Math.round` is one identifier)
    Identifier(String),
    /// Binary/unary operators: + - * / % ^ == != < > <= >= && || !
    Operator(String),
    /// `=>` separating the parameter list from the body
    Arrow,
    OpenParen,
    CloseParen,
    Comma,
    /// `?` of a conditional expression
    Question,
    /// `:` of a conditional expression
    Colon,
}

/// Tokenizer for script expressions
pub struct Tokenizer<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            position: 0,
        }
    }

    /// Tokenize the entire script into a vector of tokens
    pub fn tokenize(mut self) -> Result<Vec<Token>, ScriptError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, ScriptError> {
        self.skip_whitespace();

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token = match c {
            '"' | '\'' => self.read_string()?,
            '(' => {
                self.advance();
                Token::OpenParen
            }
            ')' => {
                self.advance();
                Token::CloseParen
            }
            ',' => {
                self.advance();
                Token::Comma
            }
            '?' => {
                self.advance();
                Token::Question
            }
            ':' => {
                self.advance();
                Token::Colon
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                self.advance();
                Token::Operator(c.to_string())
            }
            '=' => self.read_equals()?,
            '!' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    self.skip_strict_equality();
                    Token::Operator("!=".to_string())
                } else {
                    Token::Operator("!".to_string())
                }
            }
            '<' => {
                self.advance();
                match self.peek() {
                    Some('=') => {
                        self.advance();
                        Token::Operator("<=".to_string())
                    }
                    Some('>') => {
                        self.advance();
                        Token::Operator("!=".to_string())
                    }
                    _ => Token::Operator("<".to_string()),
                }
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Token::Operator(">=".to_string())
                } else {
                    Token::Operator(">".to_string())
                }
            }
            '&' | '|' => self.read_logical(c)?,
            c if c.is_ascii_digit() || c == '.' => self.read_number()?,
            c if c.is_alphabetic() || c == '_' || c == '$' => self.read_identifier(),
            c => {
                return Err(ScriptError::new(
                    format!("Unexpected character: '{}'", c),
                    self.position,
                ));
            }
        };

        Ok(Some(token))
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c.is_some() {
            self.position += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// `===` and `!==` behave like their loose counterparts
    fn skip_strict_equality(&mut self) {
        if self.peek() == Some('=') {
            self.advance();
        }
    }

    /// `=`, `==`, `===` compare; `=>` starts the body
    fn read_equals(&mut self) -> Result<Token, ScriptError> {
        self.advance();
        match self.peek() {
            Some('>') => {
                self.advance();
                Ok(Token::Arrow)
            }
            Some('=') => {
                self.advance();
                self.skip_strict_equality();
                Ok(Token::Operator("==".to_string()))
            }
            _ => Ok(Token::Operator("==".to_string())),
        }
    }

    fn read_logical(&mut self, first: char) -> Result<Token, ScriptError> {
        let start_pos = self.position;
        self.advance();
        if self.peek() == Some(first) {
            self.advance();
            Ok(Token::Operator(format!("{first}{first}")))
        } else {
            Err(ScriptError::new(
                format!("Unsupported operator: '{}'", first),
                start_pos,
            ))
        }
    }

    fn read_string(&mut self) -> Result<Token, ScriptError> {
        let start_pos = self.position;
        let Some(quote) = self.advance() else {
            return Err(ScriptError::new("Expected string literal", start_pos));
        };
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(ScriptError::new("Unterminated string literal", start_pos));
                }
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => value.push(c),
                    None => {
                        return Err(ScriptError::new("Unterminated string literal", start_pos));
                    }
                },
                Some(c) if c == quote => break,
                Some(c) => value.push(c),
            }
        }

        Ok(Token::Text(value))
    }

    /// Read a number (integer, decimal, or scientific notation)
    fn read_number(&mut self) -> Result<Token, ScriptError> {
        let start_pos = self.position;
        let mut num_str = String::new();

        self.read_digits(&mut num_str);

        if self.peek() == Some('.') {
            num_str.push('.');
            self.advance();
            self.read_digits(&mut num_str);
        }

        if let Some(c @ ('e' | 'E')) = self.peek() {
            num_str.push(c);
            self.advance();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                num_str.push(sign);
                self.advance();
            }
            self.read_digits(&mut num_str);
        }

        num_str
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ScriptError::new(format!("Invalid number: {}", num_str), start_pos))
    }

    fn read_digits(&mut self, into: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                into.push(c);
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '$' || c == '.' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }

        Token::Identifier(ident)
    }
}

/// Convenience function to tokenize a script
pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    Tokenizer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Token {
        Token::Identifier(name.to_string())
    }

    fn op(symbol: &str) -> Token {
        Token::Operator(symbol.to_string())
    }

    #[test]
    fn test_tokenize_arrow_function() {
        let tokens = tokenize("(a, b) => a + b").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::OpenParen,
                ident("a"),
                Token::Comma,
                ident("b"),
                Token::CloseParen,
                Token::Arrow,
                ident("a"),
                op("+"),
                ident("b"),
            ]
        );
    }

    #[test]
    fn test_tokenize_numbers() {
        assert_eq!(tokenize("3.567").unwrap(), vec![Token::Number(3.567)]);
        assert_eq!(tokenize("1.5e10").unwrap(), vec![Token::Number(1.5e10)]);
        assert_eq!(tokenize(".5").unwrap(), vec![Token::Number(0.5)]);
    }

    #[test]
    fn test_tokenize_strings_with_escapes() {
        assert_eq!(
            tokenize(r#""say \"hi\"""#).unwrap(),
            vec![Token::Text("say \"hi\"".to_string())]
        );
        assert_eq!(
            tokenize("'won'").unwrap(),
            vec![Token::Text("won".to_string())]
        );
    }

    #[test]
    fn test_tokenize_equality_variants() {
        assert_eq!(
            tokenize("a === b !== c <> d").unwrap(),
            vec![
                ident("a"),
                op("=="),
                ident("b"),
                op("!="),
                ident("c"),
                op("!="),
                ident("d"),
            ]
        );
    }

    #[test]
    fn test_tokenize_conditional_and_logical() {
        assert_eq!(
            tokenize("a > 0 && !b ? 1 : 2").unwrap(),
            vec![
                ident("a"),
                op(">"),
                Token::Number(0.0),
                op("&&"),
                op("!"),
                ident("b"),
                Token::Question,
                Token::Number(1.0),
                Token::Colon,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_tokenize_dotted_identifier() {
        assert_eq!(
            tokenize("Math.round(x)").unwrap(),
            vec![
                ident("Math.round"),
                Token::OpenParen,
                ident("x"),
                Token::CloseParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_empty_string() {
        assert_eq!(tokenize("   ").unwrap(), vec![]);
    }

    #[test]
    fn test_tokenize_error_unterminated_string() {
        let err = tokenize("\"open").unwrap_err();
        assert!(err.message.contains("Unterminated"));
    }

    #[test]
    fn test_tokenize_error_single_ampersand() {
        let err = tokenize("a & b").unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_tokenize_error_unexpected_char() {
        let err = tokenize("a # b").unwrap_err();
        assert!(err.message.contains("Unexpected"));
    }
}
