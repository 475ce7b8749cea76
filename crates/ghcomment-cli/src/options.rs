//! Command-line surface and the options the controllers consume.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ghcomment_core::{CommitRef, ConfigError};
use serde_json::{Map, Value};

pub const SKIP_ENV: &str = "GHCOMMENT_SKIP";
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const TOKEN_ENV_FALLBACK: &str = "GHCOMMENT_GITHUB_TOKEN";

#[derive(Debug, Parser)]
#[command(
    name = "ghcomment",
    version,
    about = "Post command results as GitHub pull request comments"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a command and comment on its result.
    Exec(ExecArgs),
    /// Post a comment from a template.
    Post(PostArgs),
}

#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Repository owner.
    #[arg(long, default_value = "")]
    pub org: String,
    /// Repository name.
    #[arg(long, default_value = "")]
    pub repo: String,
    /// GitHub access token.
    #[arg(long, env = TOKEN_ENV, hide_env_values = true, default_value = "")]
    pub token: String,
    /// Commit SHA.
    #[arg(long, default_value = "")]
    pub sha1: String,
    /// Pull request number.
    #[arg(long = "pr", default_value_t = 0)]
    pub pr_number: u64,
    /// Literal comment template; skips rule lookup.
    #[arg(short = 't', long, default_value = "")]
    pub template: String,
    /// Key of the template in the configuration file.
    #[arg(short = 'k', long, default_value = "default")]
    pub template_key: String,
    /// Configuration file path.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Print the comment instead of posting it.
    #[arg(long)]
    pub dry_run: bool,
    /// Print instead of posting when no token is set.
    #[arg(long)]
    pub skip_no_token: bool,
    /// Do not report comment errors.
    #[arg(short = 's', long)]
    pub silent: bool,
    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,
    /// Template variable as `key:value`.
    #[arg(long = "var")]
    pub vars: Vec<String>,
    /// Template variable read from a file, as `key:path`.
    #[arg(long = "var-file")]
    pub var_files: Vec<String>,
    /// Condition selecting an existing comment to edit.
    #[arg(short = 'u', long, default_value = "")]
    pub update_condition: String,
}

#[derive(Debug, Args)]
pub struct ExecArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Run the command without commenting.
    #[arg(long)]
    pub skip_comment: bool,
    /// The command to run.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PostArgs {
    #[command(flatten)]
    pub common: CommonArgs,
    /// Read the template from standard input.
    #[arg(long)]
    pub stdin_template: bool,
}

/// Options shared by `exec` and `post`, with variables already parsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    pub org: String,
    pub repo: String,
    pub token: String,
    pub sha1: String,
    pub pr_number: u64,
    pub template: String,
    pub template_key: String,
    pub config_path: Option<PathBuf>,
    pub dry_run: bool,
    pub skip_no_token: bool,
    pub silent: bool,
    pub log_level: Option<String>,
    pub vars: Map<String, Value>,
    pub update_condition: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOptions {
    pub options: Options,
    pub args: Vec<String>,
    pub skip_comment: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostOptions {
    pub options: Options,
    pub stdin_template: bool,
}

impl Options {
    pub fn from_args(args: CommonArgs) -> Result<Self, ConfigError> {
        let mut vars = parse_vars(&args.vars)?;
        vars.extend(parse_var_files(&args.var_files)?);
        Ok(Self {
            org: args.org,
            repo: args.repo,
            token: args.token,
            sha1: args.sha1,
            pr_number: args.pr_number,
            template: args.template,
            template_key: args.template_key,
            config_path: args.config,
            dry_run: args.dry_run,
            skip_no_token: args.skip_no_token,
            silent: args.silent,
            log_level: args.log_level,
            vars,
            update_condition: args.update_condition,
        })
    }

    pub fn commit(&self) -> CommitRef {
        CommitRef::new(self.org.clone(), self.repo.clone())
            .with_pull_request(self.pr_number)
            .with_sha(self.sha1.clone())
    }

    pub fn set_commit(&mut self, commit: CommitRef) {
        self.org = commit.org;
        self.repo = commit.repo;
        self.pr_number = commit.pull_request_number;
        self.sha1 = commit.sha;
    }

    /// Where to post must be known.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.org.is_empty() {
            return Err(ConfigError::MissingOption("org".into()));
        }
        if self.repo.is_empty() {
            return Err(ConfigError::MissingOption("repo".into()));
        }
        if self.pr_number == 0 && self.sha1.is_empty() {
            return Err(ConfigError::MissingOption("pr or sha1".into()));
        }
        Ok(())
    }
}

impl ExecOptions {
    pub fn from_args(args: ExecArgs) -> Result<Self, ConfigError> {
        Ok(Self {
            options: Options::from_args(args.common)?,
            args: args.command,
            skip_comment: args.skip_comment,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.options.validate()?;
        if self.options.template_key.is_empty() {
            return Err(ConfigError::MissingOption("template-key".into()));
        }
        if self.args.is_empty() {
            return Err(ConfigError::MissingOption("command".into()));
        }
        Ok(())
    }
}

impl PostOptions {
    pub fn from_args(args: PostArgs) -> Result<Self, ConfigError> {
        Ok(Self {
            options: Options::from_args(args.common)?,
            stdin_template: args.stdin_template,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.options.validate()?;
        if self.options.template.is_empty() && self.options.template_key.is_empty() {
            return Err(ConfigError::MissingOption("template or template-key".into()));
        }
        Ok(())
    }
}

/// Parse `key:value` pairs.
pub fn parse_vars(pairs: &[String]) -> Result<Map<String, Value>, ConfigError> {
    let mut vars = Map::new();
    for pair in pairs {
        let (key, value) = split_pair(pair)?;
        vars.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(vars)
}

/// Parse `key:path` pairs, reading each value from its file.
pub fn parse_var_files(pairs: &[String]) -> Result<Map<String, Value>, ConfigError> {
    let mut vars = Map::new();
    for pair in pairs {
        let (key, path) = split_pair(pair)?;
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_string(),
            message: format!("value of variable {key}: {e}"),
        })?;
        vars.insert(key.to_string(), Value::String(content));
    }
    Ok(vars)
}

fn split_pair(pair: &str) -> Result<(&str, &str), ConfigError> {
    pair.split_once(':')
        .ok_or_else(|| ConfigError::InvalidVar(pair.to_string()))
}

/// Interpret the skip environment variable like a boolean flag.
pub fn skip_requested(value: Option<&str>) -> Result<bool, ConfigError> {
    match value.map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if ["1", "t", "true", "yes"].contains(&v.to_ascii_lowercase().as_str()) => Ok(true),
        Some(v) if ["0", "f", "false", "no"].contains(&v.to_ascii_lowercase().as_str()) => Ok(false),
        Some(v) => Err(ConfigError::Parse {
            path: SKIP_ENV.to_string(),
            message: format!("`{v}` is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_vars() {
        let vars = parse_vars(&["target:lint".into(), "url:http://x:8080".into()]).unwrap();
        assert_eq!(vars["target"], json!("lint"));
        assert_eq!(vars["url"], json!("http://x:8080"));
        assert_eq!(
            parse_vars(&["novalue".into()]),
            Err(ConfigError::InvalidVar("novalue".into()))
        );
    }

    #[test]
    fn test_parse_var_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "line one\n").unwrap();
        let vars = parse_var_files(&[format!("notes:{}", path.display())]).unwrap();
        assert_eq!(vars["notes"], json!("line one\n"));

        let missing = format!("notes:{}", dir.path().join("nope").display());
        assert!(matches!(parse_var_files(&[missing]), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_exec_command_line() {
        let cli = Cli::try_parse_from([
            "ghcomment", "exec", "--org", "acme", "--repo", "widgets", "--pr", "3",
            "--var", "target:lint", "-k", "test", "--", "make", "-j", "4",
        ])
        .unwrap();
        let Command::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        let opts = ExecOptions::from_args(args).unwrap();
        assert_eq!(opts.args, vec!["make", "-j", "4"]);
        assert_eq!(opts.options.template_key, "test");
        assert_eq!(opts.options.vars["target"], json!("lint"));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_post_command_line() {
        let cli = Cli::try_parse_from([
            "ghcomment", "post", "--org", "acme", "--repo", "widgets", "--sha1", "abc",
            "-t", "hello", "--dry-run",
        ])
        .unwrap();
        let Command::Post(args) = cli.command else {
            panic!("expected post");
        };
        let opts = PostOptions::from_args(args).unwrap();
        assert_eq!(opts.options.template, "hello");
        assert_eq!(opts.options.template_key, "default");
        assert!(opts.options.dry_run);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let mut opts = Options {
            org: "acme".into(),
            repo: "widgets".into(),
            template_key: "default".into(),
            ..Default::default()
        };
        assert_eq!(
            opts.validate(),
            Err(ConfigError::MissingOption("pr or sha1".into()))
        );
        opts.pr_number = 1;
        assert!(opts.validate().is_ok());

        let exec = ExecOptions {
            options: opts,
            args: Vec::new(),
            skip_comment: false,
        };
        assert_eq!(exec.validate(), Err(ConfigError::MissingOption("command".into())));
    }

    #[test]
    fn test_skip_requested() {
        assert_eq!(skip_requested(None), Ok(false));
        assert_eq!(skip_requested(Some("true")), Ok(true));
        assert_eq!(skip_requested(Some("0")), Ok(false));
        assert!(skip_requested(Some("maybe")).is_err());
    }
}
