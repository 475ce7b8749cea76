//! Tree-walking evaluation of parsed conditions against a JSON context.
//!
//! The context is always a JSON object whose top-level keys are the names an
//! expression may reference. Lookups are strict: an absent name or field is
//! an error carrying the full dotted path, never an implicit `nil`.

use crate::ast::{BinaryOp, Expr, Function, UnaryOp};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalError {
    #[error("unknown name `{0}`")]
    UnknownName(String),

    #[error("field `{path}` is not present")]
    MissingField { path: String },

    #[error("`{path}` is {found}, not an object")]
    NotAnObject { path: String, found: &'static str },

    #[error("operator `{op}` cannot be applied to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("`{op}` cannot be applied to {operand}")]
    UnaryTypeMismatch { op: &'static str, operand: &'static str },

    #[error("condition evaluated to {0}, not a boolean")]
    NotBoolean(&'static str),

    #[error("invalid regex `{pattern}`: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("numeric overflow in `{0}`")]
    Overflow(&'static str),
}

/// Short name of a value's JSON kind, used in error messages.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "nil",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn evaluate(expr: &Expr, ctx: &Value) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(segments) => lookup(segments, ctx).cloned(),
        Expr::Call { function, args } => call(*function, args, ctx),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, ctx)?;
            match op {
                UnaryOp::Not => match value {
                    Value::Bool(b) => Ok(Value::Bool(!b)),
                    other => Err(EvalError::UnaryTypeMismatch {
                        op: "!",
                        operand: kind_name(&other),
                    }),
                },
                UnaryOp::Negate => negate(&value),
            }
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, ctx),
    }
}

fn lookup<'v>(segments: &[String], ctx: &'v Value) -> Result<&'v Value, EvalError> {
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return Err(EvalError::UnknownName(String::new())),
    };

    let mut current = ctx
        .as_object()
        .and_then(|root| root.get(first))
        .ok_or_else(|| EvalError::UnknownName(first.clone()))?;

    for (depth, segment) in rest.iter().enumerate() {
        let object = current.as_object().ok_or_else(|| EvalError::NotAnObject {
            path: segments[..=depth].join("."),
            found: kind_name(current),
        })?;
        current = object.get(segment).ok_or_else(|| EvalError::MissingField {
            path: segments[..=depth + 1].join("."),
        })?;
    }

    Ok(current)
}

fn call(function: Function, args: &[Expr], ctx: &Value) -> Result<Value, EvalError> {
    match function {
        Function::Len => {
            let value = match args.first() {
                Some(arg) => evaluate(arg, ctx)?,
                None => Value::Null,
            };
            let len = match &value {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => {
                    return Err(EvalError::UnaryTypeMismatch {
                        op: "len",
                        operand: kind_name(other),
                    })
                }
            };
            Ok(Value::from(len as u64))
        }
    }
}

fn expect_bool(op: BinaryOp, value: &Value, other: &'static str) -> Result<bool, EvalError> {
    value.as_bool().ok_or(EvalError::TypeMismatch {
        op: op.symbol(),
        left: kind_name(value),
        right: other,
    })
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr, ctx: &Value) -> Result<Value, EvalError> {
    // Logical operators must not touch the right side once the left decides.
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        let lhs = evaluate(left, ctx)?;
        let lhs = expect_bool(op, &lhs, "bool")?;
        match (op, lhs) {
            (BinaryOp::And, false) => return Ok(Value::Bool(false)),
            (BinaryOp::Or, true) => return Ok(Value::Bool(true)),
            _ => {}
        }
        let rhs = evaluate(right, ctx)?;
        let rhs = rhs.as_bool().ok_or(EvalError::TypeMismatch {
            op: op.symbol(),
            left: "bool",
            right: kind_name(&rhs),
        })?;
        return Ok(Value::Bool(rhs));
    }

    let lhs = evaluate(left, ctx)?;
    let rhs = evaluate(right, ctx)?;
    let mismatch = || EvalError::TypeMismatch {
        op: op.symbol(),
        left: kind_name(&lhs),
        right: kind_name(&rhs),
    };

    match op {
        BinaryOp::Equal => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::NotEqual => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::LessThan
        | BinaryOp::LessThanEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanEqual => {
            let ordering = compare(&lhs, &rhs).ok_or_else(mismatch)?;
            let result = match op {
                BinaryOp::LessThan => ordering == Ordering::Less,
                BinaryOp::LessThanEqual => ordering != Ordering::Greater,
                BinaryOp::GreaterThan => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::Contains => match (&lhs, &rhs) {
            (Value::String(haystack), Value::String(needle)) => {
                Ok(Value::Bool(haystack.contains(needle.as_str())))
            }
            (Value::Array(items), needle) => {
                Ok(Value::Bool(items.iter().any(|item| values_equal(item, needle))))
            }
            _ => Err(mismatch()),
        },
        BinaryOp::In => match (&lhs, &rhs) {
            (needle, Value::Array(items)) => {
                Ok(Value::Bool(items.iter().any(|item| values_equal(item, needle))))
            }
            (Value::String(key), Value::Object(map)) => Ok(Value::Bool(map.contains_key(key))),
            (Value::String(needle), Value::String(haystack)) => {
                Ok(Value::Bool(haystack.contains(needle.as_str())))
            }
            _ => Err(mismatch()),
        },
        BinaryOp::StartsWith => match (&lhs, &rhs) {
            (Value::String(s), Value::String(prefix)) => {
                Ok(Value::Bool(s.starts_with(prefix.as_str())))
            }
            _ => Err(mismatch()),
        },
        BinaryOp::EndsWith => match (&lhs, &rhs) {
            (Value::String(s), Value::String(suffix)) => {
                Ok(Value::Bool(s.ends_with(suffix.as_str())))
            }
            _ => Err(mismatch()),
        },
        BinaryOp::Matches => match (&lhs, &rhs) {
            (Value::String(s), Value::String(pattern)) => {
                let re = regex::Regex::new(pattern).map_err(|e| EvalError::InvalidRegex {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                Ok(Value::Bool(re.is_match(s)))
            }
            _ => Err(mismatch()),
        },
        BinaryOp::Add => match (&lhs, &rhs) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
            (Value::Number(a), Value::Number(b)) => arithmetic(a, b, "+", i64::checked_add, |x, y| x + y),
            _ => Err(mismatch()),
        },
        BinaryOp::Subtract => match (&lhs, &rhs) {
            (Value::Number(a), Value::Number(b)) => arithmetic(a, b, "-", i64::checked_sub, |x, y| x - y),
            _ => Err(mismatch()),
        },
        BinaryOp::And | BinaryOp::Or => unreachable!("logical operators return early"),
    }
}

fn negate(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.checked_neg()
                    .map(Value::from)
                    .ok_or(EvalError::Overflow("-"))
            } else {
                float_value(-n.as_f64().unwrap_or(0.0), "-")
            }
        }
        other => Err(EvalError::UnaryTypeMismatch {
            op: "-",
            operand: kind_name(other),
        }),
    }
}

fn arithmetic(
    a: &Number,
    b: &Number,
    op: &'static str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return int_op(x, y).map(Value::from).ok_or(EvalError::Overflow(op));
    }
    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    float_value(float_op(x, y), op)
}

fn float_value(value: f64, op: &'static str) -> Result<Value, EvalError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(EvalError::Overflow(op))
}

/// Structural equality, with numbers compared by value (`1 == 1.0`).
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => a.as_f64() == b.as_f64(),
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).map_or(false, |other| values_equal(v, other)))
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;
    use serde_json::json;

    fn eval(source: &str, ctx: &Value) -> Result<Value, EvalError> {
        evaluate(&parse_expression(source).unwrap(), ctx)
    }

    #[test]
    fn test_exit_code_comparison() {
        let ctx = json!({ "ExitCode": 1 });
        assert_eq!(eval("ExitCode != 0", &ctx), Ok(json!(true)));
        assert_eq!(eval("ExitCode == 0", &ctx), Ok(json!(false)));
        assert_eq!(eval("ExitCode >= 1 && ExitCode < 2", &ctx), Ok(json!(true)));
    }

    #[test]
    fn test_missing_nested_field_reports_full_path() {
        let ctx = json!({ "Comment": { "Meta": {} } });
        assert_eq!(
            eval("Comment.Meta.Vars.target == \"\"", &ctx),
            Err(EvalError::MissingField {
                path: "Comment.Meta.Vars".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_top_level_name() {
        assert_eq!(
            eval("Nope", &json!({})),
            Err(EvalError::UnknownName("Nope".to_string()))
        );
    }

    #[test]
    fn test_member_access_on_scalar() {
        let ctx = json!({ "Stdout": "text" });
        assert_eq!(
            eval("Stdout.length", &ctx),
            Err(EvalError::NotAnObject {
                path: "Stdout".to_string(),
                found: "string"
            })
        );
    }

    #[test]
    fn test_and_short_circuits_over_missing_field() {
        let ctx = json!({ "Comment": { "HasMeta": false, "Meta": {} } });
        assert_eq!(
            eval("Comment.HasMeta && Comment.Meta.TemplateKey == \"default\"", &ctx),
            Ok(json!(false))
        );
        assert_eq!(eval("true || Missing", &ctx), Ok(json!(true)));
    }

    #[test]
    fn test_logical_requires_booleans() {
        let ctx = json!({ "ExitCode": 1 });
        assert!(matches!(
            eval("ExitCode && true", &ctx),
            Err(EvalError::TypeMismatch { op: "&&", left: "number", .. })
        ));
    }

    #[test]
    fn test_mixed_kind_equality_is_false() {
        let ctx = json!({ "ExitCode": 1 });
        assert_eq!(eval("ExitCode == \"1\"", &ctx), Ok(json!(false)));
        assert_eq!(eval("ExitCode == 1.0", &ctx), Ok(json!(true)));
    }

    #[test]
    fn test_ordering_mismatch_errors() {
        let ctx = json!({ "ExitCode": 1 });
        assert!(matches!(
            eval("ExitCode < \"2\"", &ctx),
            Err(EvalError::TypeMismatch { op: "<", .. })
        ));
    }

    #[test]
    fn test_string_operators() {
        let ctx = json!({ "Stdout": "error: build failed", "Vars": { "tags": ["ci", "lint"] } });
        assert_eq!(eval("Stdout contains \"build\"", &ctx), Ok(json!(true)));
        assert_eq!(eval("Stdout startsWith 'error'", &ctx), Ok(json!(true)));
        assert_eq!(eval("Stdout endsWith 'ok'", &ctx), Ok(json!(false)));
        assert_eq!(eval("Stdout matches '^error: \\\\w+'", &ctx), Ok(json!(true)));
        assert_eq!(eval("'lint' in Vars.tags", &ctx), Ok(json!(true)));
        assert_eq!(eval("'tags' in Vars", &ctx), Ok(json!(true)));
        assert_eq!(eval("len(Vars.tags) == 2", &ctx), Ok(json!(true)));
    }

    #[test]
    fn test_invalid_regex_is_eval_error() {
        let ctx = json!({ "Stdout": "x" });
        assert!(matches!(
            eval("Stdout matches '('", &ctx),
            Err(EvalError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_arithmetic() {
        let ctx = json!({ "ExitCode": 3 });
        assert_eq!(eval("ExitCode - 1 == 2", &ctx), Ok(json!(true)));
        assert_eq!(eval("-ExitCode", &ctx), Ok(json!(-3)));
        assert_eq!(eval("'a' + 'b'", &ctx), Ok(json!("ab")));
        assert_eq!(eval("1.5 + 1", &ctx), Ok(json!(2.5)));
    }
}
