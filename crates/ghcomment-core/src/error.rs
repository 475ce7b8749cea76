//! Unified Error Model
use ghcomment_expr::{CompileError, EvalError, ExprError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("template key `{0}` is not defined")]
    UnknownTemplateKey(String),

    #[error("missing option: {0}")]
    MissingOption(String),

    #[error("read {path}: {message}")]
    Read { path: String, message: String },

    #[error("parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid variable `{0}`: expected key:value")]
    InvalidVar(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("snippet `{name}`: {message}")]
    Snippet { name: String, message: String },

    #[error("{0}")]
    Render(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("{operation} returned {status}: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("{0}")]
    Request(String),

    #[error("decode response: {0}")]
    Decode(String),

    #[error("graphql: {0}")]
    GraphQl(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecError {
    #[error("spawn `{command}`: {message}")]
    Spawn { command: String, message: String },
}

/// Everything that can abort an invocation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommentError {
    #[error("CONFIG/{0}")]
    Config(#[from] ConfigError),

    #[error("EXPR/{0}")]
    Compile(#[from] CompileError),

    #[error("EXPR/{0}")]
    Eval(#[from] EvalError),

    #[error("RENDER/{0}")]
    Render(#[from] RenderError),

    #[error("TRANSPORT/{0}")]
    Transport(#[from] TransportError),

    #[error("EXEC/{0}")]
    Exec(#[from] ExecError),
}

impl From<ExprError> for CommentError {
    fn from(err: ExprError) -> Self {
        match err {
            ExprError::Compile(e) => CommentError::Compile(e),
            ExprError::Eval(e) => CommentError::Eval(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_messages() {
        let err: CommentError = ConfigError::UnknownTemplateKey("nightly".into()).into();
        assert_eq!(err.to_string(), "CONFIG/template key `nightly` is not defined");

        let err: CommentError = ExprError::Eval(EvalError::UnknownName("Foo".into())).into();
        assert_eq!(err.to_string(), "EXPR/unknown name `Foo`");

        let err: CommentError = TransportError::Status {
            operation: "create comment".into(),
            status: 403,
            body: "forbidden".into(),
        }
        .into();
        assert_eq!(err.to_string(), "TRANSPORT/create comment returned 403: forbidden");

        let err: CommentError = ConfigError::InvalidVar("novalue".into()).into();
        assert_eq!(
            err.to_string(),
            "CONFIG/invalid variable `novalue`: expected key:value"
        );
    }
}
