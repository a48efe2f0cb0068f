//! Tokenizer for filter expressions.

use chrono::Duration;

use super::ast::CompareOp;
use super::FilterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Compare(CompareOp),
    Plus,
    Minus,
    Str(String),
    Int(i64),
    Duration(Duration),
    Ident(String),
    And,
    Or,
    Not,
    In,
    NotIn,
    Eof,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Compare(op) => format!("'{}'", op.as_str()),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Str(value) => format!("string '{value}'"),
            TokenKind::Int(value) => format!("number {value}"),
            TokenKind::Duration(_) => "duration".to_string(),
            TokenKind::Ident(value) => format!("'{value}'"),
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Not => "NOT".to_string(),
            TokenKind::In => "IN".to_string(),
            TokenKind::NotIn => "NOT IN".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

pub(crate) struct Lexer {
    input: Vec<char>,
    pos: usize,
}

impl Lexer {
    pub(crate) fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    /// Tokenize the whole input, ending with `Eof`.
    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, FilterError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn single(&mut self, kind: TokenKind) -> Result<Token, FilterError> {
        let pos = self.pos;
        self.pos += 1;
        Ok(Token { kind, pos })
    }

    fn next_token(&mut self) -> Result<Token, FilterError> {
        self.skip_ws();
        let pos = self.pos;
        let Some(ch) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos,
            });
        };
        match ch {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            ',' => self.single(TokenKind::Comma),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '=' | '!' | '<' | '>' => self.read_operator(),
            '\'' | '"' => self.read_string(ch),
            _ if ch.is_ascii_digit() => self.read_number(),
            _ if is_ident_start(ch) => self.read_word(),
            _ => Err(FilterError::new(format!("unexpected character '{ch}'"), pos)),
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn read_operator(&mut self) -> Result<Token, FilterError> {
        let pos = self.pos;
        let first = self.peek().unwrap_or_default();
        let second_is_eq = self.peek_at(1) == Some('=');
        let (op, width) = match (first, second_is_eq) {
            ('=', true) => (CompareOp::Eq, 2),
            ('=', false) => (CompareOp::Eq, 1),
            ('!', true) => (CompareOp::Ne, 2),
            ('<', true) => (CompareOp::Le, 2),
            ('<', false) => (CompareOp::Lt, 1),
            ('>', true) => (CompareOp::Ge, 2),
            ('>', false) => (CompareOp::Gt, 1),
            _ => return Err(FilterError::new("expected '!='", pos)),
        };
        self.pos += width;
        Ok(Token {
            kind: TokenKind::Compare(op),
            pos,
        })
    }

    fn read_string(&mut self, quote: char) -> Result<Token, FilterError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();
        while let Some(ch) = self.peek() {
            self.pos += 1;
            if ch == quote {
                return Ok(Token {
                    kind: TokenKind::Str(out),
                    pos: start,
                });
            }
            if ch == '\\' {
                let Some(escaped) = self.peek() else {
                    break;
                };
                self.pos += 1;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
            } else {
                out.push(ch);
            }
        }
        Err(FilterError::new("unterminated string literal", start))
    }

    /// An integer, or an integer immediately followed by a duration unit.
    fn read_number(&mut self) -> Result<Token, FilterError> {
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.input[start..self.pos].iter().collect();
        let value: i64 = digits
            .parse()
            .map_err(|_| FilterError::new(format!("number '{digits}' is too large"), start))?;

        if !self.peek().is_some_and(|ch| ch.is_ascii_alphabetic()) {
            return Ok(Token {
                kind: TokenKind::Int(value),
                pos: start,
            });
        }

        let unit_start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let unit: String = self.input[unit_start..self.pos].iter().collect();
        let duration = duration_from_unit(value, &unit).ok_or_else(|| {
            FilterError::new(
                format!("unknown duration unit '{unit}' (use min, hour, day, week or month)"),
                unit_start,
            )
        })?;
        Ok(Token {
            kind: TokenKind::Duration(duration),
            pos: start,
        })
    }

    fn read_word(&mut self) -> Result<Token, FilterError> {
        let start = self.pos;
        let word = self.take_ident();
        let kind = match word.to_ascii_uppercase().as_str() {
            "AND" => TokenKind::And,
            "OR" => TokenKind::Or,
            "IN" => TokenKind::In,
            "NOT" => {
                if self.followed_by_in() {
                    TokenKind::NotIn
                } else {
                    TokenKind::Not
                }
            }
            _ => TokenKind::Ident(word),
        };
        Ok(Token { kind, pos: start })
    }

    fn take_ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_continue) {
            self.pos += 1;
        }
        self.input[start..self.pos].iter().collect()
    }

    /// Consume a following `IN` keyword when present.
    fn followed_by_in(&mut self) -> bool {
        let saved = self.pos;
        self.skip_ws();
        if self.peek().is_some_and(is_ident_start) {
            let word = self.take_ident();
            if word.eq_ignore_ascii_case("in") {
                return true;
            }
        }
        self.pos = saved;
        false
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Month is a fixed 30 days.
fn duration_from_unit(value: i64, unit: &str) -> Option<Duration> {
    let lower = unit.to_ascii_lowercase();
    let base = lower.strip_suffix('s').unwrap_or(&lower);
    match base {
        "min" | "minute" => Duration::try_minutes(value),
        "hour" => Duration::try_hours(value),
        "day" => Duration::try_days(value),
        "week" => Duration::try_weeks(value),
        "month" => value.checked_mul(30).and_then(Duration::try_days),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn operators_and_punctuation() {
        assert_eq!(
            kinds("= == != < <= > >= + - ( ) [ ] ,"),
            vec![
                TokenKind::Compare(CompareOp::Eq),
                TokenKind::Compare(CompareOp::Eq),
                TokenKind::Compare(CompareOp::Ne),
                TokenKind::Compare(CompareOp::Lt),
                TokenKind::Compare(CompareOp::Le),
                TokenKind::Compare(CompareOp::Gt),
                TokenKind::Compare(CompareOp::Ge),
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Comma,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn durations_take_optional_plural() {
        assert_eq!(
            kinds("24hour 2days 1week 3months 15min"),
            vec![
                TokenKind::Duration(Duration::hours(24)),
                TokenKind::Duration(Duration::days(2)),
                TokenKind::Duration(Duration::weeks(1)),
                TokenKind::Duration(Duration::days(90)),
                TokenKind::Duration(Duration::minutes(15)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("a and b Or not c NOT   in d In"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::And,
                TokenKind::Ident("b".to_string()),
                TokenKind::Or,
                TokenKind::Not,
                TokenKind::Ident("c".to_string()),
                TokenKind::NotIn,
                TokenKind::Ident("d".to_string()),
                TokenKind::In,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn not_followed_by_identifier_starting_with_in_is_not_not_in() {
        assert_eq!(
            kinds("NOT inbox"),
            vec![
                TokenKind::Not,
                TokenKind::Ident("inbox".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn strings_use_either_quote() {
        assert_eq!(
            kinds(r#"'it\'s' "say \"hi\"""#),
            vec![
                TokenKind::Str("it's".to_string()),
                TokenKind::Str("say \"hi\"".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn errors_carry_position() {
        let err = Lexer::new("status = 'open").tokenize().unwrap_err();
        assert_eq!(err.position, 9);
        let err = Lexer::new("a = 3parsecs").tokenize().unwrap_err();
        assert_eq!(err.position, 5);
        let err = Lexer::new("a ! b").tokenize().unwrap_err();
        assert_eq!(err.position, 2);
        let err = Lexer::new("a # b").tokenize().unwrap_err();
        assert_eq!(err.position, 2);
    }
}
