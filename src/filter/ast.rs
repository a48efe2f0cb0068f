//! Filter expression tree.

use std::fmt;

use chrono::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    Binary {
        op: BinaryOp,
        left: Box<FilterExpr>,
        right: Box<FilterExpr>,
    },
    Not(Box<FilterExpr>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    In {
        field: String,
        negated: bool,
        values: Vec<Literal>,
    },
}

impl FilterExpr {
    pub fn and(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Binary {
            op: BinaryOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: FilterExpr, right: FilterExpr) -> Self {
        FilterExpr::Binary {
            op: BinaryOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn negate(expr: FilterExpr) -> Self {
        FilterExpr::Not(Box::new(expr))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }

    /// Apply the operator to an ordering of `left` relative to `right`.
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::Ne => ordering != Equal,
            CompareOp::Gt => ordering == Greater,
            CompareOp::Lt => ordering == Less,
            CompareOp::Ge => ordering != Less,
            CompareOp::Le => ordering != Greater,
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(Literal),
    Time(TimeExpr),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Duration(Duration),
    /// A bare word: a field name on the left, a value (`ready`, `CURRENT_USER`) elsewhere.
    Ident(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeField {
    Now,
    CreatedAt,
    UpdatedAt,
}

impl TimeField {
    /// Case- and separator-insensitive match (`created_at`, `CreatedAt`, `NOW`).
    pub fn parse(ident: &str) -> Option<Self> {
        match canonical_field(ident).as_str() {
            "now" => Some(TimeField::Now),
            "createdat" => Some(TimeField::CreatedAt),
            "updatedat" => Some(TimeField::UpdatedAt),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeField::Now => "NOW",
            TimeField::CreatedAt => "CreatedAt",
            TimeField::UpdatedAt => "UpdatedAt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOperand {
    Duration(Duration),
    Field(TimeField),
}

/// `base`, optionally shifted by a duration or diffed against another time field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeExpr {
    pub base: TimeField,
    pub offset: Option<(ArithOp, TimeOperand)>,
}

/// Lowercase with `_`, `-` and spaces removed.
pub fn canonical_field(name: &str) -> String {
    name.chars()
        .filter(|ch| !matches!(ch, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn format_duration(duration: &Duration) -> String {
    let minutes = duration.num_minutes();
    let units = [
        (30 * 24 * 60, "month"),
        (7 * 24 * 60, "week"),
        (24 * 60, "day"),
        (60, "hour"),
    ];
    for (size, unit) in units {
        if minutes != 0 && minutes % size == 0 {
            return format!("{}{unit}", minutes / size);
        }
    }
    format!("{minutes}min")
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(value) => write!(f, "'{}'", value.replace('\'', "\\'")),
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Duration(value) => f.write_str(&format_duration(value)),
            Literal::Ident(value) => f.write_str(value),
        }
    }
}

impl fmt::Display for TimeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.offset {
            None => f.write_str(self.base.as_str()),
            Some((op, operand)) => {
                let sign = match op {
                    ArithOp::Add => "+",
                    ArithOp::Sub => "-",
                };
                let rhs = match operand {
                    TimeOperand::Duration(duration) => format_duration(duration),
                    TimeOperand::Field(field) => field.as_str().to_string(),
                };
                write!(f, "({} {sign} {rhs})", self.base.as_str())
            }
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(literal) => literal.fmt(f),
            Operand::Time(expr) => expr.fmt(f),
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpr::Binary { op, left, right } => {
                let word = match op {
                    BinaryOp::And => "AND",
                    BinaryOp::Or => "OR",
                };
                write!(f, "({left} {word} {right})")
            }
            FilterExpr::Not(inner) => write!(f, "NOT {inner}"),
            FilterExpr::Compare { left, op, right } => {
                write!(f, "{left} {} {right}", op.as_str())
            }
            FilterExpr::In {
                field,
                negated,
                values,
            } => {
                let items: Vec<String> = values.iter().map(ToString::to_string).collect();
                let keyword = if *negated { "NOT IN" } else { "IN" };
                write!(f, "{field} {keyword} [{}]", items.join(", "))
            }
        }
    }
}
