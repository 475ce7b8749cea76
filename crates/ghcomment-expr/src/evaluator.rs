//! Compiled programs and the per-invocation compile cache.

use crate::ast::Expr;
use crate::eval::{evaluate, kind_name, EvalError};
use crate::parser::{parse_expression, CompileError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// A parsed expression ready to run any number of times.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    source: String,
    expr: Expr,
}

impl Program {
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        let expr = parse_expression(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate to whatever value the expression produces.
    pub fn run(&self, ctx: &Value) -> Result<Value, EvalError> {
        evaluate(&self.expr, ctx)
    }

    /// Evaluate as a condition; a non-boolean result is an error.
    pub fn matches(&self, ctx: &Value) -> Result<bool, EvalError> {
        match self.run(ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvalError::NotBoolean(kind_name(&other))),
        }
    }
}

/// Compiles expressions once per distinct source string.
///
/// Lives for a single invocation; the same `when` or update condition is
/// typically evaluated against many contexts.
#[derive(Debug, Default)]
pub struct Evaluator {
    programs: HashMap<String, Arc<Program>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(&mut self, source: &str) -> Result<Arc<Program>, CompileError> {
        if let Some(program) = self.programs.get(source) {
            return Ok(Arc::clone(program));
        }
        let program = Arc::new(Program::compile(source)?);
        self.programs
            .insert(source.to_string(), Arc::clone(&program));
        Ok(program)
    }

    pub fn matches(&mut self, source: &str, ctx: &Value) -> Result<bool, ExprError> {
        let program = self.compile(source)?;
        Ok(program.matches(ctx)?)
    }

    /// Number of distinct programs compiled so far.
    pub fn cached(&self) -> usize {
        self.programs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_is_cached_per_source() {
        let mut evaluator = Evaluator::new();
        let first = evaluator.compile("ExitCode != 0").unwrap();
        let second = evaluator.compile("ExitCode != 0").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        evaluator.compile("ExitCode == 0").unwrap();
        assert_eq!(evaluator.cached(), 2);
    }

    #[test]
    fn test_failed_compile_is_not_cached() {
        let mut evaluator = Evaluator::new();
        assert!(evaluator.compile("ExitCode !=").is_err());
        assert_eq!(evaluator.cached(), 0);
    }

    #[test]
    fn test_matches_requires_boolean() {
        let mut evaluator = Evaluator::new();
        let ctx = json!({ "ExitCode": 2 });
        assert_eq!(evaluator.matches("ExitCode != 0", &ctx), Ok(true));
        assert_eq!(
            evaluator.matches("ExitCode", &ctx),
            Err(ExprError::Eval(EvalError::NotBoolean("number")))
        );
    }

    #[test]
    fn test_run_returns_values() {
        let program = Program::compile("len(Stdout)").unwrap();
        assert_eq!(program.run(&json!({ "Stdout": "abc" })), Ok(json!(3)));
        assert_eq!(program.source(), "len(Stdout)");
    }
}
