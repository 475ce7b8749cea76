use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Dotted or indexed lookup, first segment is the top-level name.
    Path(Vec<String>),
    Call {
        function: Function,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Len,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "len" => Some(Function::Len),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Len => "len",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Len => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    In,
    Add,
    Subtract,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanEqual => ">=",
            BinaryOp::Contains => "contains",
            BinaryOp::StartsWith => "startsWith",
            BinaryOp::EndsWith => "endsWith",
            BinaryOp::Matches => "matches",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
        }
    }
}

/// Quote `raw` as a string literal the parser reads back verbatim.
pub fn quote_str(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null => f.write_str("nil"),
        Value::String(s) => f.write_str(&quote_str(s)),
        other => write!(f, "{}", other),
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Canonical form: every compound sub-expression is parenthesized, so the
/// output re-parses to the same tree regardless of precedence.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write_literal(f, value),
            Expr::Path(segments) => {
                for (i, segment) in segments.iter().enumerate() {
                    if i == 0 {
                        f.write_str(segment)?;
                    } else if is_identifier(segment) {
                        write!(f, ".{}", segment)?;
                    } else {
                        write!(f, "[{}]", quote_str(segment))?;
                    }
                }
                Ok(())
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expr::Unary { op, operand } => match op {
                UnaryOp::Not => write!(f, "!{}", Operand(operand)),
                UnaryOp::Negate => write!(f, "-{}", Operand(operand)),
            },
            Expr::Binary { op, left, right } => {
                write!(f, "{} {} {}", Operand(left), op.symbol(), Operand(right))
            }
        }
    }
}

struct Operand<'a>(&'a Expr);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Expr::Binary { .. } | Expr::Unary { .. } => write!(f, "({})", self.0),
            other => write!(f, "{}", other),
        }
    }
}
