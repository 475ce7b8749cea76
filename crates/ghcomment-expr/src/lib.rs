//! Boolean condition language for comment routing.
//!
//! Expressions reference dotted paths into a JSON context
//! (`ExitCode != 0`, `Comment.Meta.Vars.target == "lint"`) and support
//! comparison, logical and string operators.
//!
//! ```
//! use ghcomment_expr::Evaluator;
//! use serde_json::json;
//!
//! let mut evaluator = Evaluator::new();
//! let failed = evaluator
//!     .matches("ExitCode != 0", &json!({ "ExitCode": 2 }))
//!     .unwrap();
//! assert!(failed);
//! ```

pub mod ast;
pub mod eval;
pub mod evaluator;
pub mod parser;

pub use ast::{quote_str, BinaryOp, Expr, Function, UnaryOp};
pub use eval::{kind_name, values_equal, EvalError};
pub use evaluator::{Evaluator, ExprError, Program};
pub use parser::{parse_expression, CompileError};
