//! GitHub transport over REST and GraphQL.

use std::time::Duration;

use async_trait::async_trait;
use ghcomment_core::{
    BestEffort, CommentId, CommentTransport, CommitRef, ExistingComment, ResolvedComment,
    TransportError, MAX_COMMENT_CHARS,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, Span};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const LIST_COMMENTS_QUERY: &str = r#"
query($owner: String!, $repo: String!, $number: Int!, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    pullRequest(number: $number) {
      comments(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes { databaseId body isMinimized author { login } }
      }
    }
  }
}
"#;

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    graphql_endpoint: String,
    span: Span,
}

impl GitHubClient {
    /// Client for github.com, or for an Enterprise server when
    /// `api_base`/`graphql_endpoint` are non-empty.
    pub fn new(
        token: &str,
        api_base: &str,
        graphql_endpoint: &str,
        span: Span,
    ) -> Result<Self, TransportError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("ghcomment"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .map_err(|e| TransportError::Request(format!("invalid authorization header: {e}")))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let api_base = if api_base.is_empty() {
            DEFAULT_API_BASE.to_string()
        } else {
            api_base.trim_end_matches('/').to_string()
        };
        let graphql_endpoint = if graphql_endpoint.is_empty() {
            graphql_endpoint_for(&api_base)
        } else {
            graphql_endpoint.to_string()
        };

        Ok(Self {
            http,
            api_base,
            graphql_endpoint,
            span,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn graphql_endpoint(&self) -> &str {
        &self.graphql_endpoint
    }

    async fn request_json<T>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("{operation}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                body: truncate_for_error(&body, 800),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(format!("{operation}: {e}")))
    }

    async fn login(&self) -> Result<String, TransportError> {
        #[derive(Deserialize)]
        struct Viewer {
            login: String,
        }

        let viewer: Viewer = self
            .request_json("get authenticated user", self.http.get(format!("{}/user", self.api_base)))
            .await?;
        Ok(viewer.login)
    }

    async fn pulls_for_commit(&self, org: &str, repo: &str, sha: &str) -> Result<Vec<u64>, TransportError> {
        #[derive(Deserialize)]
        struct Pull {
            number: u64,
        }

        let pulls: Vec<Pull> = self
            .request_json(
                "list pull requests for commit",
                self.http
                    .get(format!("{}/repos/{}/{}/commits/{}/pulls", self.api_base, org, repo, sha)),
            )
            .await?;
        Ok(pulls.into_iter().map(|p| p.number).collect())
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, TransportError> {
        #[derive(Deserialize)]
        struct GraphQlError {
            message: String,
        }
        #[derive(Deserialize)]
        struct GraphQlResponse {
            data: Option<Value>,
            #[serde(default)]
            errors: Vec<GraphQlError>,
        }

        let response: GraphQlResponse = self
            .request_json(
                "graphql",
                self.http
                    .post(&self.graphql_endpoint)
                    .json(&json!({ "query": query, "variables": variables })),
            )
            .await?;
        if !response.errors.is_empty() {
            let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
            return Err(TransportError::GraphQl(messages.join("; ")));
        }
        response
            .data
            .ok_or_else(|| TransportError::GraphQl("response has no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentPage {
    page_info: PageInfo,
    nodes: Vec<CommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    database_id: Option<u64>,
    body: String,
    is_minimized: bool,
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct Author {
    login: String,
}

#[async_trait]
impl CommentTransport for GitHubClient {
    async fn list_comments(&self, commit: &CommitRef) -> Result<Vec<ExistingComment>, TransportError> {
        let mut comments = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let data = self
                .graphql(
                    LIST_COMMENTS_QUERY,
                    json!({
                        "owner": commit.org,
                        "repo": commit.repo,
                        "number": commit.pull_request_number,
                        "cursor": cursor,
                    }),
                )
                .await?;
            let page = data
                .pointer("/repository/pullRequest/comments")
                .cloned()
                .ok_or_else(|| {
                    TransportError::GraphQl(format!(
                        "pull request {}/{}#{} not found",
                        commit.org, commit.repo, commit.pull_request_number
                    ))
                })?;
            let page: CommentPage =
                serde_json::from_value(page).map_err(|e| TransportError::Decode(e.to_string()))?;

            comments.extend(page.nodes.into_iter().filter_map(|node| {
                Some(ExistingComment {
                    id: CommentId(node.database_id?),
                    body: node.body,
                    author_login: node.author.map(|a| a.login).unwrap_or_default(),
                    is_minimized: node.is_minimized,
                })
            }));

            match page.page_info.end_cursor {
                Some(next) if page.page_info.has_next_page => cursor = Some(next),
                _ => break,
            }
        }
        debug!(parent: &self.span, org = %commit.org, repo = %commit.repo, pr = commit.pull_request_number, count = comments.len(), "listed comments");
        Ok(comments)
    }

    async fn authenticated_user(&self) -> BestEffort<String> {
        match self.login().await {
            Ok(login) => BestEffort::found(login),
            Err(e) => BestEffort::missing(e.to_string()),
        }
    }

    async fn post_comment(&self, comment: &ResolvedComment) -> Result<(), TransportError> {
        let body = comment.body_within(MAX_COMMENT_CHARS);
        let payload = json!({ "body": body });

        let (operation, request) = match comment.existing_comment_id {
            Some(id) => (
                "update issue comment",
                self.http
                    .patch(format!(
                        "{}/repos/{}/{}/issues/comments/{}",
                        self.api_base, comment.org, comment.repo, id
                    ))
                    .json(&payload),
            ),
            None if comment.pull_request_number != 0 => (
                "create issue comment",
                self.http
                    .post(format!(
                        "{}/repos/{}/{}/issues/{}/comments",
                        self.api_base, comment.org, comment.repo, comment.pull_request_number
                    ))
                    .json(&payload),
            ),
            None => (
                "create commit comment",
                self.http
                    .post(format!(
                        "{}/repos/{}/{}/commits/{}/comments",
                        self.api_base, comment.org, comment.repo, comment.commit_sha
                    ))
                    .json(&payload),
            ),
        };

        let _: Value = self.request_json(operation, request).await?;
        debug!(parent: &self.span, operation, org = %comment.org, repo = %comment.repo, "posted comment");
        Ok(())
    }

    async fn pull_request_for_commit(&self, org: &str, repo: &str, sha: &str) -> BestEffort<u64> {
        match self.pulls_for_commit(org, repo, sha).await {
            Ok(numbers) => match numbers.first() {
                Some(number) => BestEffort::found(*number),
                None => BestEffort::missing(format!("no pull request is associated with {sha}")),
            },
            Err(e) => BestEffort::missing(e.to_string()),
        }
    }
}

/// `https://ghe.example/api/v3` becomes `https://ghe.example/api/graphql`.
fn graphql_endpoint_for(api_base: &str) -> String {
    match api_base.strip_suffix("/api/v3") {
        Some(host) => format!("{host}/api/graphql"),
        None => format!("{api_base}/graphql"),
    }
}

fn truncate_for_error(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_endpoint_for() {
        assert_eq!(graphql_endpoint_for("https://api.github.com"), "https://api.github.com/graphql");
        assert_eq!(
            graphql_endpoint_for("https://ghe.example/api/v3"),
            "https://ghe.example/api/graphql"
        );
    }

    #[test]
    fn test_truncate_for_error() {
        assert_eq!(truncate_for_error("abcdef", 3), "abc...");
        assert_eq!(truncate_for_error("ab", 3), "ab");
    }

    #[test]
    fn test_enterprise_endpoints() {
        let client = GitHubClient::new("t", "https://ghe.example/api/v3/", "", Span::none()).unwrap();
        assert_eq!(client.api_base(), "https://ghe.example/api/v3");
        assert_eq!(client.graphql_endpoint(), "https://ghe.example/api/graphql");
    }
}
