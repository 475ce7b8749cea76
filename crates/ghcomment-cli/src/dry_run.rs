//! Transport that prints instead of posting.

use std::io::Write;

use async_trait::async_trait;
use ghcomment_core::{
    BestEffort, CommentTransport, CommitRef, ExistingComment, ResolvedComment, TransportError,
    MAX_COMMENT_CHARS,
};

/// Used for `--dry-run`, and for `--skip-no-token` when no token is set.
/// Reports no existing comments and no identity.
#[derive(Debug, Clone, Default)]
pub struct DryRunGitHub {
    silent: bool,
}

impl DryRunGitHub {
    pub fn new(silent: bool) -> Self {
        Self { silent }
    }

    pub fn describe(comment: &ResolvedComment) -> String {
        let target = if comment.pull_request_number != 0 {
            format!("{}/{}#{}", comment.org, comment.repo, comment.pull_request_number)
        } else {
            format!("{}/{}@{}", comment.org, comment.repo, comment.commit_sha)
        };
        let action = match comment.existing_comment_id {
            Some(id) => format!("update comment {id}"),
            None => "create comment".to_string(),
        };
        format!(
            "[ghcomment dry-run] {action} on {target}\n{}\n",
            comment.body_within(MAX_COMMENT_CHARS)
        )
    }
}

#[async_trait]
impl CommentTransport for DryRunGitHub {
    async fn list_comments(&self, _commit: &CommitRef) -> Result<Vec<ExistingComment>, TransportError> {
        Ok(Vec::new())
    }

    async fn authenticated_user(&self) -> BestEffort<String> {
        BestEffort::none()
    }

    async fn post_comment(&self, comment: &ResolvedComment) -> Result<(), TransportError> {
        if !self.silent {
            let mut stderr = std::io::stderr().lock();
            let _ = stderr.write_all(Self::describe(comment).as_bytes());
        }
        Ok(())
    }

    async fn pull_request_for_commit(&self, _org: &str, _repo: &str, _sha: &str) -> BestEffort<u64> {
        BestEffort::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghcomment_core::CommentId;
    use serde_json::Map;

    fn comment() -> ResolvedComment {
        ResolvedComment {
            org: "acme".into(),
            repo: "widgets".into(),
            pull_request_number: 4,
            commit_sha: "abc".into(),
            body: "hello".into(),
            body_for_too_long: String::new(),
            template_key: "default".into(),
            variables: Map::new(),
            existing_comment_id: None,
        }
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            DryRunGitHub::describe(&comment()),
            "[ghcomment dry-run] create comment on acme/widgets#4\nhello\n"
        );

        let mut update = comment();
        update.existing_comment_id = Some(CommentId(9));
        update.pull_request_number = 0;
        assert!(DryRunGitHub::describe(&update)
            .starts_with("[ghcomment dry-run] update comment 9 on acme/widgets@abc"));
    }

    #[tokio::test]
    async fn test_reports_nothing() {
        let transport = DryRunGitHub::new(true);
        assert!(transport.list_comments(&CommitRef::default()).await.unwrap().is_empty());
        assert_eq!(transport.authenticated_user().await.value, None);
        assert!(transport.post_comment(&comment()).await.is_ok());
    }
}
