//! Condition parser.
//!
//! Recursive descent parser for strategy conditions. Converts text to an
//! [`Expr`] with error messages carrying the character offset and the
//! expected/found tokens.
//!
//! Precedence, loosest first: `or` / `|`, `and` / `&`, `not` / `~`,
//! comparisons (chainable), `+ -`, `* /`, unary minus, primaries.

use crate::domain::bar::Column;
use crate::domain::condition::{ArithOp, CompareOp, Expr};
use crate::domain::error::ParseError;

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError {
                message: format!("expected '{}', found '{}'", expected, ch),
                position: self.pos,
            }),
            None => Err(ParseError {
                message: format!("expected '{}', found end of input", expected),
                position: self.pos,
            }),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        let remaining = self.remaining();
        remaining.starts_with(keyword)
            && (remaining.len() == keyword.len()
                || !remaining[keyword.len()..]
                    .chars()
                    .next()
                    .map(|c| c.is_alphanumeric() || c == '_')
                    .unwrap_or(false))
    }

    /// Consume a logic keyword in either lower or upper case, or its
    /// single-character operator form.
    fn consume_logic(&mut self, keyword: &str, symbol: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(symbol) {
            self.advance();
            return true;
        }
        let upper = keyword.to_uppercase();
        if self.peek_keyword(keyword) || self.peek_keyword(&upper) {
            self.pos += keyword.len();
            return true;
        }
        false
    }

    fn peek_word(&self) -> String {
        let mut word = String::new();
        for ch in self.remaining().chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                break;
            }
        }
        if word.is_empty() {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        } else {
            word
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: start,
            });
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", num_str),
            position: start,
        })
    }

    fn parse_identifier(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let word = self.peek_word();
        let starts_ok = word
            .chars()
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_');
        if !starts_ok {
            return Err(ParseError {
                message: format!("expected column, number or '(', found '{}'", word),
                position: start,
            });
        }

        match word.as_str() {
            "and" | "or" | "not" | "AND" | "OR" | "NOT" => {
                return Err(ParseError {
                    message: format!("unexpected keyword '{}'", word),
                    position: start,
                });
            }
            _ => {}
        }

        self.pos += word.len();
        if word.eq_ignore_ascii_case("true") {
            return Ok(Expr::Bool(true));
        }
        if word.eq_ignore_ascii_case("false") {
            return Ok(Expr::Bool(false));
        }
        Ok(Expr::Column(Column::from_name(&word)))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('(') => {
                self.advance();
                let inner = self.parse_or()?;
                self.expect_char(')')?;
                Ok(inner)
            }
            Some(ch) if ch.is_ascii_digit() || ch == '.' => Ok(Expr::Number(self.parse_number()?)),
            Some(_) => self.parse_identifier(),
            None => Err(ParseError {
                message: "expected expression, found end of input".to_string(),
                position: self.pos,
            }),
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some('-') => {
                self.advance();
                Ok(match self.parse_unary()? {
                    Expr::Number(v) => Expr::Number(-v),
                    other => Expr::Neg(Box::new(other)),
                })
            }
            Some('+') => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('*') => ArithOp::Mul,
                Some('/') => ArithOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => ArithOp::Add,
                Some('-') => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_compare_op(&mut self) -> Result<Option<CompareOp>, ParseError> {
        self.skip_whitespace();
        let remaining = self.remaining();
        let (op, len) = if remaining.starts_with("<=") {
            (CompareOp::Le, 2)
        } else if remaining.starts_with(">=") {
            (CompareOp::Ge, 2)
        } else if remaining.starts_with("==") {
            (CompareOp::Eq, 2)
        } else if remaining.starts_with("!=") {
            (CompareOp::Ne, 2)
        } else if remaining.starts_with('<') {
            (CompareOp::Lt, 1)
        } else if remaining.starts_with('>') {
            (CompareOp::Gt, 1)
        } else if remaining.starts_with('=') {
            return Err(ParseError {
                message: "expected '==', found '='".to_string(),
                position: self.pos,
            });
        } else {
            return Ok(None);
        };
        self.pos += len;
        Ok(Some(op))
    }

    /// `a < b < c` becomes `(a < b) and (b < c)`.
    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_additive()?;
        let mut operands = vec![first];
        let mut ops = Vec::new();

        while let Some(op) = self.parse_compare_op()? {
            ops.push(op);
            operands.push(self.parse_additive()?);
        }

        if ops.is_empty() {
            return Ok(operands.remove(0));
        }

        let mut pairs: Vec<Expr> = ops
            .iter()
            .enumerate()
            .map(|(i, op)| Expr::Compare {
                op: *op,
                left: Box::new(operands[i].clone()),
                right: Box::new(operands[i + 1].clone()),
            })
            .collect();

        if pairs.len() == 1 {
            Ok(pairs.remove(0))
        } else {
            Ok(Expr::And(pairs))
        }
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.consume_logic("not", '~') {
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut items = vec![self.parse_not()?];
        while self.consume_logic("and", '&') {
            items.push(self.parse_not()?);
        }
        if items.len() == 1 {
            Ok(items.remove(0))
        } else {
            Ok(Expr::And(items))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut items = vec![self.parse_and()?];
        while self.consume_logic("or", '|') {
            items.push(self.parse_and()?);
        }
        if items.len() == 1 {
            Ok(items.remove(0))
        } else {
            Ok(Expr::Or(items))
        }
    }

    fn parse(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_or()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(ParseError {
                message: format!("unexpected input after condition: '{}'", self.remaining()),
                position: self.pos,
            });
        }
        Ok(expr)
    }
}

pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
