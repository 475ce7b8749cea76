//! Data Model: CommitRef, ExistingComment, ResolvedComment, CommandOutcome
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// GitHub's largest accepted comment body, in characters.
pub const MAX_COMMENT_CHARS: usize = 65536;

/// Where a comment is posted: a pull request, or a bare commit when
/// `pull_request_number` is 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommitRef {
    pub org: String,
    pub repo: String,
    #[serde(rename = "PRNumber")]
    pub pull_request_number: u64,
    #[serde(rename = "SHA1")]
    pub sha: String,
}

impl CommitRef {
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
            ..Default::default()
        }
    }

    pub fn with_pull_request(mut self, number: u64) -> Self {
        self.pull_request_number = number;
        self
    }

    pub fn with_sha(mut self, sha: impl Into<String>) -> Self {
        self.sha = sha.into();
        self
    }

    pub fn is_pull_request(&self) -> bool {
        self.pull_request_number != 0
    }
}

/// Database id of a comment on the hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(pub u64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a comment already present on the pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingComment {
    pub id: CommentId,
    pub body: String,
    pub author_login: String,
    pub is_minimized: bool,
}

impl ExistingComment {
    pub fn new(id: u64, author_login: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: CommentId(id),
            body: body.into(),
            author_login: author_login.into(),
            is_minimized: false,
        }
    }

    pub fn minimized(mut self) -> Self {
        self.is_minimized = true;
        self
    }
}

/// Comments in listing order plus the identity that will post, fetched
/// once per invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingComments {
    pub comments: Vec<ExistingComment>,
    pub authenticated_login: Option<String>,
}

impl ExistingComments {
    pub fn new(comments: Vec<ExistingComment>, authenticated_login: Option<String>) -> Self {
        Self {
            comments,
            authenticated_login,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// What the executor reports about one command run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub exit_code: i32,
    pub command: String,
    pub joined_command: String,
    pub stdout: String,
    pub stderr: String,
    pub combined_output: String,
}

/// A fully rendered comment, ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedComment {
    pub org: String,
    pub repo: String,
    pub pull_request_number: u64,
    pub commit_sha: String,
    pub body: String,
    pub body_for_too_long: String,
    pub template_key: String,
    pub variables: Map<String, Value>,
    /// Set when an existing comment should be edited in place.
    pub existing_comment_id: Option<CommentId>,
}

impl ResolvedComment {
    pub fn commit(&self) -> CommitRef {
        CommitRef {
            org: self.org.clone(),
            repo: self.repo.clone(),
            pull_request_number: self.pull_request_number,
            sha: self.commit_sha.clone(),
        }
    }

    pub fn is_update(&self) -> bool {
        self.existing_comment_id.is_some()
    }

    /// The body to send given the platform's size limit.
    pub fn body_within(&self, max_chars: usize) -> &str {
        if self.body.chars().count() > max_chars {
            &self.body_for_too_long
        } else {
            &self.body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(body: &str) -> ResolvedComment {
        ResolvedComment {
            org: "acme".into(),
            repo: "widgets".into(),
            pull_request_number: 3,
            commit_sha: "abc".into(),
            body: body.into(),
            body_for_too_long: "too long".into(),
            template_key: "default".into(),
            variables: Map::new(),
            existing_comment_id: None,
        }
    }

    #[test]
    fn test_body_within_limit() {
        let comment = resolved("short");
        assert_eq!(comment.body_within(10), "short");
        assert_eq!(comment.body_within(3), "too long");
    }

    #[test]
    fn test_commit_ref_of_resolved_comment() {
        let commit = resolved("x").commit();
        assert_eq!(
            commit,
            CommitRef::new("acme", "widgets").with_pull_request(3).with_sha("abc")
        );
        assert!(commit.is_pull_request());
    }
}
