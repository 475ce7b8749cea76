//! CI detection from environment variables.
//!
//! Recognized platforms:
//! - GitHub Actions (`GITHUB_ACTIONS=true`)
//! - CircleCI (`CIRCLECI=true`)

use std::collections::HashMap;

use ghcomment_core::{CiDetector, CommitRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiKind {
    GitHubActions,
    CircleCi,
}

impl CiKind {
    pub fn name(&self) -> &'static str {
        match self {
            CiKind::GitHubActions => "github-actions",
            CiKind::CircleCi => "circleci",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CiPlatform {
    kind: Option<CiKind>,
    env: HashMap<String, String>,
}

impl CiPlatform {
    pub fn detect<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let env: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let kind = if is_true(env.get("GITHUB_ACTIONS")) {
            Some(CiKind::GitHubActions)
        } else if is_true(env.get("CIRCLECI")) {
            Some(CiKind::CircleCi)
        } else {
            None
        };
        Self { kind, env }
    }

    pub fn from_env() -> Self {
        Self::detect(std::env::vars())
    }

    pub fn kind(&self) -> Option<CiKind> {
        self.kind
    }

    fn var(&self, name: &str) -> &str {
        self.env.get(name).map(String::as_str).unwrap_or("")
    }

    fn repository(&self) -> Option<(String, String)> {
        match self.kind? {
            CiKind::GitHubActions => {
                let (org, repo) = self.var("GITHUB_REPOSITORY").split_once('/')?;
                Some((org.to_string(), repo.to_string()))
            }
            CiKind::CircleCi => Some((
                self.var("CIRCLE_PROJECT_USERNAME").to_string(),
                self.var("CIRCLE_PROJECT_REPONAME").to_string(),
            )),
        }
    }

    fn sha(&self) -> &str {
        match self.kind {
            Some(CiKind::GitHubActions) => self.var("GITHUB_SHA"),
            Some(CiKind::CircleCi) => self.var("CIRCLE_SHA1"),
            None => "",
        }
    }

    fn pull_request_number(&self) -> Option<u64> {
        match self.kind? {
            // refs/pull/42/merge
            CiKind::GitHubActions => self
                .var("GITHUB_REF")
                .strip_prefix("refs/pull/")?
                .split('/')
                .next()?
                .parse()
                .ok(),
            // https://github.com/acme/widgets/pull/42
            CiKind::CircleCi => self
                .var("CIRCLE_PULL_REQUEST")
                .rsplit('/')
                .next()?
                .parse()
                .ok(),
        }
    }
}

impl CiDetector for CiPlatform {
    fn identify_ci(&self) -> String {
        self.kind.map(|k| k.name().to_string()).unwrap_or_default()
    }

    fn build_link(&self) -> Option<String> {
        let link = match self.kind? {
            CiKind::GitHubActions => {
                let server = self.var("GITHUB_SERVER_URL");
                let server = if server.is_empty() { "https://github.com" } else { server };
                let run_id = self.var("GITHUB_RUN_ID");
                if run_id.is_empty() {
                    return None;
                }
                format!(
                    "{}/{}/actions/runs/{}",
                    server.trim_end_matches('/'),
                    self.var("GITHUB_REPOSITORY"),
                    run_id
                )
            }
            CiKind::CircleCi => self.var("CIRCLE_BUILD_URL").to_string(),
        };
        Some(link).filter(|l| !l.is_empty())
    }

    fn complement(&self, commit: &mut CommitRef) {
        if let Some((org, repo)) = self.repository() {
            if commit.org.is_empty() {
                commit.org = org;
            }
            if commit.repo.is_empty() {
                commit.repo = repo;
            }
        }
        if commit.sha.is_empty() {
            commit.sha = self.sha().to_string();
        }
        if commit.pull_request_number == 0 {
            if let Some(number) = self.pull_request_number() {
                commit.pull_request_number = number;
            }
        }
    }
}

fn is_true(value: Option<&String>) -> bool {
    value.map_or(false, |v| v.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn github_actions() -> CiPlatform {
        CiPlatform::detect([
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_REPOSITORY", "acme/widgets"),
            ("GITHUB_SHA", "abc123"),
            ("GITHUB_REF", "refs/pull/42/merge"),
            ("GITHUB_SERVER_URL", "https://github.com"),
            ("GITHUB_RUN_ID", "9001"),
        ])
    }

    #[test]
    fn test_github_actions() {
        let platform = github_actions();
        assert_eq!(platform.identify_ci(), "github-actions");
        assert_eq!(
            platform.build_link().as_deref(),
            Some("https://github.com/acme/widgets/actions/runs/9001")
        );

        let mut commit = CommitRef::default();
        platform.complement(&mut commit);
        assert_eq!(
            commit,
            CommitRef::new("acme", "widgets").with_pull_request(42).with_sha("abc123")
        );
    }

    #[test]
    fn test_explicit_values_are_kept() {
        let mut commit = CommitRef::new("other", "").with_pull_request(7);
        github_actions().complement(&mut commit);
        assert_eq!(commit.org, "other");
        assert_eq!(commit.repo, "widgets");
        assert_eq!(commit.pull_request_number, 7);
    }

    #[test]
    fn test_push_build_has_no_pull_request() {
        let platform = CiPlatform::detect([
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_REPOSITORY", "acme/widgets"),
            ("GITHUB_REF", "refs/heads/main"),
        ]);
        let mut commit = CommitRef::default();
        platform.complement(&mut commit);
        assert_eq!(commit.pull_request_number, 0);
        assert_eq!(platform.build_link(), None);
    }

    #[test]
    fn test_circleci() {
        let platform = CiPlatform::detect([
            ("CIRCLECI", "true"),
            ("CIRCLE_PROJECT_USERNAME", "acme"),
            ("CIRCLE_PROJECT_REPONAME", "widgets"),
            ("CIRCLE_SHA1", "def456"),
            ("CIRCLE_PULL_REQUEST", "https://github.com/acme/widgets/pull/17"),
            ("CIRCLE_BUILD_URL", "https://circleci.com/gh/acme/widgets/5"),
        ]);
        assert_eq!(platform.identify_ci(), "circleci");
        assert_eq!(
            platform.build_link().as_deref(),
            Some("https://circleci.com/gh/acme/widgets/5")
        );
        let mut commit = CommitRef::default();
        platform.complement(&mut commit);
        assert_eq!(
            commit,
            CommitRef::new("acme", "widgets").with_pull_request(17).with_sha("def456")
        );
    }

    #[test]
    fn test_outside_ci() {
        let platform = CiPlatform::detect([("HOME", "/root")]);
        assert_eq!(platform.identify_ci(), "");
        assert_eq!(platform.build_link(), None);
        let mut commit = CommitRef::new("acme", "widgets");
        platform.complement(&mut commit);
        assert_eq!(commit, CommitRef::new("acme", "widgets"));
    }
}
