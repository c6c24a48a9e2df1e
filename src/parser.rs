//! Parser for the textual mu-calculus syntax.
//!
//! ```text
//! formula := conj ( "||" conj )*
//! conj    := unary ( "&&" unary )*
//! unary   := "true" | "false" | VAR | "(" formula ")"
//!          | "<" LABEL ">" unary | "[" LABEL "]" unary
//!          | ("mu" | "nu") VAR "." formula
//! ```
//!
//! `%` starts a comment running to the end of the line. Variables start with
//! an upper-case letter. A binder body extends as far to the right as possible,
//! so `mu X. X || <a>true` binds `X` over the whole disjunction.

use std::fmt::{Display, Formatter};

use crate::formula::Formula;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnexpectedEof,
    UnexpectedChar(char),
    Expected(&'static str),
    EmptyLabel,
    UnboundVariable(String),
    TrailingInput,
}

/// Syntax error, with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub offset: usize,
    pub kind: ParseErrorKind,
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "syntax error at offset {}: ", self.offset)?;
        match &self.kind {
            ParseErrorKind::UnexpectedEof => write!(f, "unexpected end of input"),
            ParseErrorKind::UnexpectedChar(c) => write!(f, "unexpected character '{}'", c),
            ParseErrorKind::Expected(what) => write!(f, "expected {}", what),
            ParseErrorKind::EmptyLabel => write!(f, "empty action label"),
            ParseErrorKind::UnboundVariable(x) => write!(f, "variable '{}' is not bound", x),
            ParseErrorKind::TrailingInput => write!(f, "unexpected input after formula"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parses a closed formula.
pub fn parse(input: &str) -> Result<Formula, ParseError> {
    let mut parser = Parser {
        input,
        pos: 0,
        scope: Vec::new(),
    };
    let formula = parser.formula()?;
    parser.skip_trivia();
    if parser.pos < input.len() {
        return Err(parser.error(ParseErrorKind::TrailingInput));
    }
    Ok(formula)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Variables bound by the enclosing binders, innermost last.
    scope: Vec<String>,
}

impl<'a> Parser<'a> {
    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError { offset: self.pos, kind }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with('%') {
                let end = trimmed.find('\n').unwrap_or(trimmed.len());
                self.pos += end;
            } else {
                break;
            }
        }
    }

    /// Consumes `token` if it comes next.
    fn eat(&mut self, token: &str) -> bool {
        self.skip_trivia();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &'static str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else if self.peek().is_none() {
            Err(self.error(ParseErrorKind::UnexpectedEof))
        } else {
            Err(self.error(ParseErrorKind::Expected(token)))
        }
    }

    /// Reads an identifier (`[A-Za-z_][A-Za-z0-9_']*`), without consuming it
    /// if `consume` is false.
    fn ident(&mut self, consume: bool) -> Option<&'a str> {
        self.skip_trivia();
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return None,
        }
        let end = chars
            .find(|&(_, c)| !(c.is_ascii_alphanumeric() || c == '_' || c == '\''))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if consume {
            self.pos += end;
        }
        Some(&rest[..end])
    }

    fn formula(&mut self) -> Result<Formula, ParseError> {
        let mut lhs = self.conjunction()?;
        while self.eat("||") {
            let rhs = self.conjunction()?;
            lhs = lhs.or(rhs);
        }
        Ok(lhs)
    }

    fn conjunction(&mut self) -> Result<Formula, ParseError> {
        let mut lhs = self.unary()?;
        while self.eat("&&") {
            let rhs = self.unary()?;
            lhs = lhs.and(rhs);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Formula, ParseError> {
        self.skip_trivia();
        let Some(c) = self.peek() else {
            return Err(self.error(ParseErrorKind::UnexpectedEof));
        };
        match c {
            '(' => {
                self.pos += 1;
                let inner = self.formula()?;
                self.expect(")")?;
                Ok(inner)
            }
            '<' => {
                let label = self.label('<', '>')?;
                Ok(Formula::diamond(label, self.unary()?))
            }
            '[' => {
                let label = self.label('[', ']')?;
                Ok(Formula::boxed(label, self.unary()?))
            }
            _ => self.keyword_or_var(),
        }
    }

    fn label(&mut self, open: char, close: char) -> Result<String, ParseError> {
        self.pos += open.len_utf8();
        let rest = self.rest();
        let Some(end) = rest.find(close) else {
            return Err(self.error(ParseErrorKind::UnexpectedEof));
        };
        let label = rest[..end].trim();
        if label.is_empty() {
            return Err(self.error(ParseErrorKind::EmptyLabel));
        }
        self.pos += end + close.len_utf8();
        Ok(label.to_string())
    }

    fn keyword_or_var(&mut self) -> Result<Formula, ParseError> {
        let start = self.pos;
        let Some(word) = self.ident(true) else {
            let c = self.peek().unwrap_or(' ');
            return Err(self.error(ParseErrorKind::UnexpectedChar(c)));
        };
        match word {
            "true" => Ok(Formula::True),
            "false" => Ok(Formula::False),
            "mu" | "nu" => {
                let var = match self.ident(false) {
                    Some(x) if x.starts_with(|c: char| c.is_ascii_uppercase()) => {
                        self.ident(true);
                        x.to_string()
                    }
                    _ => return Err(self.error(ParseErrorKind::Expected("fixpoint variable"))),
                };
                self.expect(".")?;
                self.scope.push(var.clone());
                let body = self.formula();
                self.scope.pop();
                let body = body?;
                Ok(if word == "mu" {
                    Formula::mu(var, body)
                } else {
                    Formula::nu(var, body)
                })
            }
            x if x.starts_with(|c: char| c.is_ascii_uppercase()) => {
                if !self.scope.iter().any(|b| b == x) {
                    return Err(ParseError {
                        offset: start,
                        kind: ParseErrorKind::UnboundVariable(x.to_string()),
                    });
                }
                Ok(Formula::var(x))
            }
            _ => {
                self.pos = start;
                self.skip_trivia();
                Err(self.error(ParseErrorKind::Expected("formula")))
            }
        }
    }
}
