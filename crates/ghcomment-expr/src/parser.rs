use crate::ast::{BinaryOp, Expr, Function, UnaryOp};
use once_cell::sync::Lazy;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use serde_json::{Number, Value};
use thiserror::Error;

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct ConditionParser;

/// Raised when an expression string is not valid syntax.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("compile `{expression}`: {message}")]
pub struct CompileError {
    pub expression: String,
    pub message: String,
}

static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::eq, Assoc::Left) | Op::infix(Rule::ne, Assoc::Left))
        .op(Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::le, Assoc::Left)
            | Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::ge, Assoc::Left)
            | Op::infix(Rule::contains, Assoc::Left)
            | Op::infix(Rule::starts_with, Assoc::Left)
            | Op::infix(Rule::ends_with, Assoc::Left)
            | Op::infix(Rule::matches, Assoc::Left)
            | Op::infix(Rule::in_op, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::prefix(Rule::not_op) | Op::prefix(Rule::neg))
});

/// Parse `source` into an expression tree.
pub fn parse_expression(source: &str) -> Result<Expr, CompileError> {
    let fail = |message: String| CompileError {
        expression: source.to_string(),
        message,
    };

    if source.trim().is_empty() {
        return Err(fail("empty expression".to_string()));
    }

    let mut pairs = ConditionParser::parse(Rule::expression, source)
        .map_err(|e| fail(e.to_string()))?;
    let root = pairs
        .next()
        .and_then(|expression| expression.into_inner().next())
        .ok_or_else(|| fail("empty expression".to_string()))?;

    build_expr(root.into_inner()).map_err(fail)
}

fn build_expr(pairs: Pairs<'_, Rule>) -> Result<Expr, String> {
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, operand| {
            let op = match op.as_rule() {
                Rule::not_op => UnaryOp::Not,
                Rule::neg => UnaryOp::Negate,
                rule => return Err(format!("unexpected prefix operator {:?}", rule)),
            };
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand?),
            })
        })
        .map_infix(|left, op, right| {
            let op = match op.as_rule() {
                Rule::or_op => BinaryOp::Or,
                Rule::and_op => BinaryOp::And,
                Rule::eq => BinaryOp::Equal,
                Rule::ne => BinaryOp::NotEqual,
                Rule::lt => BinaryOp::LessThan,
                Rule::le => BinaryOp::LessThanEqual,
                Rule::gt => BinaryOp::GreaterThan,
                Rule::ge => BinaryOp::GreaterThanEqual,
                Rule::contains => BinaryOp::Contains,
                Rule::starts_with => BinaryOp::StartsWith,
                Rule::ends_with => BinaryOp::EndsWith,
                Rule::matches => BinaryOp::Matches,
                Rule::in_op => BinaryOp::In,
                Rule::add => BinaryOp::Add,
                Rule::sub => BinaryOp::Subtract,
                rule => return Err(format!("unexpected operator {:?}", rule)),
            };
            Ok(Expr::Binary {
                op,
                left: Box::new(left?),
                right: Box::new(right?),
            })
        })
        .parse(pairs)
}

fn build_primary(pair: Pair<'_, Rule>) -> Result<Expr, String> {
    match pair.as_rule() {
        Rule::integer => pair
            .as_str()
            .parse::<i64>()
            .map(|n| Expr::Literal(Value::from(n)))
            .map_err(|e| format!("integer `{}`: {}", pair.as_str(), e)),
        Rule::float => {
            let parsed = pair
                .as_str()
                .parse::<f64>()
                .map_err(|e| format!("number `{}`: {}", pair.as_str(), e))?;
            Number::from_f64(parsed)
                .map(|n| Expr::Literal(Value::Number(n)))
                .ok_or_else(|| format!("number `{}` is not finite", pair.as_str()))
        }
        Rule::string => Ok(Expr::Literal(Value::String(string_value(pair)))),
        Rule::boolean => Ok(Expr::Literal(Value::Bool(pair.as_str() == "true"))),
        Rule::nil => Ok(Expr::Literal(Value::Null)),
        Rule::path => {
            let mut segments = Vec::new();
            for part in pair.into_inner() {
                match part.as_rule() {
                    Rule::ident => segments.push(part.as_str().to_string()),
                    Rule::member => {
                        if let Some(ident) = part.into_inner().next() {
                            segments.push(ident.as_str().to_string());
                        }
                    }
                    Rule::index => {
                        if let Some(key) = part.into_inner().next() {
                            segments.push(string_value(key));
                        }
                    }
                    rule => return Err(format!("unexpected path segment {:?}", rule)),
                }
            }
            Ok(Expr::Path(segments))
        }
        Rule::call => {
            let mut inner = pair.into_inner();
            let name = inner
                .next()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default();
            let function = Function::from_name(&name)
                .ok_or_else(|| format!("unknown function `{}`", name))?;
            let args = inner
                .map(|arg| build_expr(arg.into_inner()))
                .collect::<Result<Vec<_>, _>>()?;
            if args.len() != function.arity() {
                return Err(format!(
                    "function `{}` expects {} argument(s), got {}",
                    name,
                    function.arity(),
                    args.len()
                ));
            }
            Ok(Expr::Call { function, args })
        }
        Rule::expr => build_expr(pair.into_inner()),
        rule => Err(format!("unexpected {:?}", rule)),
    }
}

fn string_value(pair: Pair<'_, Rule>) -> String {
    let raw = pair
        .into_inner()
        .next()
        .map(|inner| inner.as_str())
        .unwrap_or("");
    unescape(raw)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
