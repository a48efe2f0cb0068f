//! Recursive-descent parser for filter expressions.
//!
//! Precedence from loosest to tightest: `OR`, `AND`, `NOT`, comparisons.

use super::ast::{
    ArithOp, CompareOp, FilterExpr, Literal, Operand, TimeExpr, TimeField, TimeOperand,
};
use super::lexer::{Lexer, Token, TokenKind};
use super::FilterError;

/// Deepest nesting of groups and `NOT`s accepted.
const MAX_DEPTH: usize = 256;

pub(crate) struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl Parser {
    pub(crate) fn new(input: &str) -> Result<Self, FilterError> {
        Ok(Self {
            tokens: Lexer::new(input).tokenize()?,
            index: 0,
            depth: 0,
        })
    }

    pub(crate) fn parse(mut self) -> Result<FilterExpr, FilterError> {
        if self.peek_is(&TokenKind::Eof) {
            return Err(self.error_here("empty filter expression"));
        }
        let expr = self.parse_or()?;
        if !self.peek_is(&TokenKind::Eof) {
            let found = self.peek_kind().describe();
            return Err(self.error_here(&format!("unexpected {found}")));
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<FilterExpr, FilterError> {
        let mut expr = self.parse_and()?;
        while self.peek_is(&TokenKind::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            expr = FilterExpr::or(expr, rhs);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<FilterExpr, FilterError> {
        let mut expr = self.parse_not()?;
        while self.peek_is(&TokenKind::And) {
            self.advance();
            let rhs = self.parse_not()?;
            expr = FilterExpr::and(expr, rhs);
        }
        Ok(expr)
    }

    fn parse_not(&mut self) -> Result<FilterExpr, FilterError> {
        if self.peek_is(&TokenKind::Not) {
            self.advance();
            self.enter()?;
            let inner = self.parse_not();
            self.depth -= 1;
            return Ok(FilterExpr::negate(inner?));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<FilterExpr, FilterError> {
        if self.peek_is(&TokenKind::LParen) {
            // `(NOW - CreatedAt) < 24hour` starts like a group but is a comparison.
            let saved = self.index;
            if let Some(left) = self.try_parenthesized_operand() {
                if let TokenKind::Compare(op) = self.peek_kind().clone() {
                    self.advance();
                    let right = self.parse_operand()?;
                    return Ok(FilterExpr::Compare { left, op, right });
                }
            }
            self.index = saved;

            self.advance();
            self.enter()?;
            let expr = self.parse_or();
            self.depth -= 1;
            let expr = expr?;
            self.expect(TokenKind::RParen)?;
            return Ok(expr);
        }
        self.parse_comparison()
    }

    fn enter(&mut self) -> Result<(), FilterError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error_here(&format!("expression nested deeper than {MAX_DEPTH} levels")));
        }
        self.depth += 1;
        Ok(())
    }

    fn parse_comparison(&mut self) -> Result<FilterExpr, FilterError> {
        let left = self.parse_operand()?;
        match self.peek_kind().clone() {
            TokenKind::In | TokenKind::NotIn => {
                let negated = self.peek_is(&TokenKind::NotIn);
                let field = match &left {
                    Operand::Literal(Literal::Ident(name)) => name.clone(),
                    _ => return Err(self.error_here("IN requires a field name on the left")),
                };
                self.advance();
                let values = self.parse_list()?;
                Ok(FilterExpr::In {
                    field,
                    negated,
                    values,
                })
            }
            TokenKind::Compare(op) => {
                self.advance();
                let right = self.parse_operand()?;
                Ok(FilterExpr::Compare { left, op, right })
            }
            other => Err(self.error_here(&format!(
                "expected comparison operator or IN, found {}",
                other.describe()
            ))),
        }
    }

    fn try_parenthesized_operand(&mut self) -> Option<Operand> {
        self.advance();
        let operand = self.parse_operand().ok()?;
        if !self.peek_is(&TokenKind::RParen) {
            return None;
        }
        self.advance();
        Some(operand)
    }

    fn parse_operand(&mut self) -> Result<Operand, FilterError> {
        let token = self.advance();
        match token.kind {
            TokenKind::LParen => {
                self.enter()?;
                let operand = self.parse_operand();
                self.depth -= 1;
                let operand = operand?;
                self.expect(TokenKind::RParen)?;
                Ok(operand)
            }
            TokenKind::Ident(name) => match TimeField::parse(&name) {
                Some(base) => Ok(Operand::Time(self.parse_time_offset(base)?)),
                None => Ok(Operand::Literal(Literal::Ident(name))),
            },
            TokenKind::Minus => match self.advance().kind {
                TokenKind::Int(value) => Ok(Operand::Literal(Literal::Int(-value))),
                _ => Err(FilterError::new("expected number after '-'", token.pos)),
            },
            kind => literal_from(kind)
                .map(Operand::Literal)
                .ok_or_else(|| FilterError::new("expected a value", token.pos)),
        }
    }

    fn parse_time_offset(&mut self, base: TimeField) -> Result<TimeExpr, FilterError> {
        let op = match self.peek_kind() {
            TokenKind::Plus => ArithOp::Add,
            TokenKind::Minus => ArithOp::Sub,
            _ => return Ok(TimeExpr { base, offset: None }),
        };
        self.advance();
        let token = self.advance();
        let operand = match token.kind {
            TokenKind::Duration(duration) => TimeOperand::Duration(duration),
            TokenKind::Ident(name) => match TimeField::parse(&name) {
                Some(field) => TimeOperand::Field(field),
                None => {
                    return Err(FilterError::new(
                        format!("'{name}' is not a time field"),
                        token.pos,
                    ))
                }
            },
            _ => {
                return Err(FilterError::new(
                    "expected duration or time field",
                    token.pos,
                ))
            }
        };
        Ok(TimeExpr {
            base,
            offset: Some((op, operand)),
        })
    }

    fn parse_list(&mut self) -> Result<Vec<Literal>, FilterError> {
        self.expect(TokenKind::LBracket)?;
        let mut values = Vec::new();
        if self.peek_is(&TokenKind::RBracket) {
            self.advance();
            return Ok(values);
        }
        loop {
            let token = self.advance();
            let literal = literal_from(token.kind)
                .ok_or_else(|| FilterError::new("expected list value", token.pos))?;
            values.push(literal);
            match self.advance().kind {
                TokenKind::Comma => continue,
                TokenKind::RBracket => return Ok(values),
                _ => return Err(self.error_prev("expected ',' or ']' in list")),
            }
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), FilterError> {
        if std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(&kind) {
            self.advance();
            Ok(())
        } else {
            let found = self.peek_kind().describe();
            Err(self.error_here(&format!("expected {}, found {found}", kind.describe())))
        }
    }

    fn error_here(&self, message: &str) -> FilterError {
        let pos = self.tokens.get(self.index).map(|t| t.pos).unwrap_or(0);
        FilterError::new(message, pos)
    }

    fn error_prev(&self, message: &str) -> FilterError {
        let pos = self
            .tokens
            .get(self.index.saturating_sub(1))
            .map(|t| t.pos)
            .unwrap_or(0);
        FilterError::new(message, pos)
    }

    /// Return the current token and move forward, sticking at `Eof`.
    fn advance(&mut self) -> Token {
        let last = self.tokens.len().saturating_sub(1);
        let token = self.tokens[self.index.min(last)].clone();
        self.index = (self.index + 1).min(last);
        token
    }

    fn peek_kind(&self) -> &TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.index.min(last)].kind
    }

    fn peek_is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }
}

fn literal_from(kind: TokenKind) -> Option<Literal> {
    match kind {
        TokenKind::Str(value) => Some(Literal::Str(value)),
        TokenKind::Int(value) => Some(Literal::Int(value)),
        TokenKind::Duration(value) => Some(Literal::Duration(value)),
        TokenKind::Ident(value) => Some(Literal::Ident(value)),
        _ => None,
    }
}
