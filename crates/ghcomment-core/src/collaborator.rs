//! Contracts for the pieces that touch the outside world.
//!
//! The routing engine only sees these traits; the binary supplies the real
//! implementations (process spawning, GitHub HTTP, environment probing) and
//! tests supply in-memory ones.
use crate::data_model::{CommandOutcome, CommitRef, ExistingComment, ResolvedComment};
use crate::error::{ExecError, RenderError, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

/// Result of a lookup whose failure is an expected degradation.
///
/// `diagnostic` explains a missing value and is meant for a warning log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestEffort<T> {
    pub value: Option<T>,
    pub diagnostic: Option<String>,
}

impl<T> BestEffort<T> {
    pub fn found(value: T) -> Self {
        Self {
            value: Some(value),
            diagnostic: None,
        }
    }

    pub fn missing(diagnostic: impl Into<String>) -> Self {
        Self {
            value: None,
            diagnostic: Some(diagnostic.into()),
        }
    }

    /// Nothing found and nothing worth reporting.
    pub fn none() -> Self {
        Self {
            value: None,
            diagnostic: None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

impl<T> From<Option<T>> for BestEffort<T> {
    fn from(value: Option<T>) -> Self {
        Self {
            value,
            diagnostic: None,
        }
    }
}

/// Template rendering primitive.
pub trait Renderer: Send + Sync {
    /// Render `template` with `snippets` available as named sub-templates.
    fn render(
        &self,
        template: &str,
        snippets: &BTreeMap<String, String>,
        data: &Value,
    ) -> Result<String, RenderError>;
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` with `args`, inheriting stdin. A non-zero exit code is
    /// an `Ok` outcome; only failing to run at all is an error.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutcome, ExecError>;
}

#[async_trait]
pub trait CommentTransport: Send + Sync {
    /// Comments on the pull request, in stable listing order.
    async fn list_comments(&self, commit: &CommitRef)
        -> Result<Vec<ExistingComment>, TransportError>;

    async fn authenticated_user(&self) -> BestEffort<String>;

    /// Create, or edit when `existing_comment_id` is set.
    async fn post_comment(&self, comment: &ResolvedComment) -> Result<(), TransportError>;

    async fn pull_request_for_commit(&self, org: &str, repo: &str, sha: &str) -> BestEffort<u64>;
}

pub trait CiDetector: Send + Sync {
    /// Short platform name, empty outside a known CI.
    fn identify_ci(&self) -> String;

    /// Link to the running build, if the platform exposes one.
    fn build_link(&self) -> Option<String>;

    /// Fill the empty fields of `commit` from the environment.
    fn complement(&self, commit: &mut CommitRef);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_effort_constructors() {
        let found = BestEffort::found("octocat".to_string());
        assert_eq!(found.value.as_deref(), Some("octocat"));
        assert!(found.diagnostic.is_none());

        let missing: BestEffort<u64> = BestEffort::missing("403 from /user");
        assert_eq!(missing.value, None);
        assert_eq!(missing.diagnostic.as_deref(), Some("403 from /user"));

        let from_opt: BestEffort<u64> = Some(5).into();
        assert_eq!(from_opt.into_value(), Some(5));
    }
}
