//! The `exec` and `post` flows.

use std::collections::BTreeMap;

use ghcomment_core::{
    CiDetector, CommandExecutor, CommandOutcome, CommentError, CommentTransport, ExecError,
    ExecutionContext, ExistingComments, Renderer, ResolvedComment, TARGET_VAR,
};
use ghcomment_render::{snippets, SnippetParams};
use ghcomment_route::{CommentAssembler, Config, Rule};
use serde_json::{Map, Value};
use tracing::{debug, info, warn, Span};

use crate::options::{ExecOptions, Options, PostOptions};

/// What `exec` reports back to the process.
#[derive(Debug)]
pub struct ExecOutcome {
    /// Always the wrapped command's own exit code.
    pub exit_code: i32,
    /// The command could not be started at all.
    pub exec_error: Option<ExecError>,
    /// Commenting failed; never changes `exit_code`.
    pub comment_error: Option<CommentError>,
    pub posted: Option<ResolvedComment>,
}

/// Shared by both flows: repository defaults, assembly and posting.
pub struct CommentPoster {
    config: Config,
    transport: Box<dyn CommentTransport>,
    platform: Option<Box<dyn CiDetector>>,
    assembler: CommentAssembler,
    span: Span,
}

impl CommentPoster {
    pub fn new(
        config: Config,
        transport: Box<dyn CommentTransport>,
        renderer: Box<dyn Renderer>,
        span: Span,
    ) -> Self {
        Self {
            config,
            transport,
            platform: None,
            assembler: CommentAssembler::new(renderer, span.clone()),
            span,
        }
    }

    pub fn with_platform(mut self, platform: Box<dyn CiDetector>) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fill org, repo, SHA and PR number from CI, the commit's pull request
    /// and the configuration's `base`, in that order.
    pub async fn complement(&self, opts: &mut Options) {
        let mut commit = opts.commit();
        if let Some(platform) = &self.platform {
            platform.complement(&mut commit);
        }

        if commit.pull_request_number == 0 && !commit.sha.is_empty() {
            let lookup = self
                .transport
                .pull_request_for_commit(&commit.org, &commit.repo, &commit.sha)
                .await;
            if let Some(diagnostic) = &lookup.diagnostic {
                warn!(
                    parent: &self.span,
                    org = %commit.org,
                    repo = %commit.repo,
                    sha = %commit.sha,
                    %diagnostic,
                    "could not find the pull request of the commit"
                );
            }
            if let Some(number) = lookup.value.filter(|n| *n > 0) {
                commit.pull_request_number = number;
            }
        }

        if commit.org.is_empty() {
            commit.org = self.config.base_org().to_string();
        }
        if commit.repo.is_empty() {
            commit.repo = self.config.base_repo().to_string();
        }
        opts.set_commit(commit);
    }

    /// Configuration variables overlaid with the command-line ones, with
    /// `target` defaulting to the empty string.
    pub fn merged_vars(&self, opts: &Options) -> Map<String, Value> {
        let mut vars = self.config.vars.clone();
        for (key, value) in &opts.vars {
            vars.insert(key.clone(), value.clone());
        }
        if vars.get(TARGET_VAR).map_or(true, Value::is_null) {
            vars.insert(TARGET_VAR.to_string(), Value::String(String::new()));
        }
        vars
    }

    fn snippets(&self, joined_command: &str) -> BTreeMap<String, String> {
        let link = self.platform.as_ref().and_then(|p| p.build_link());
        snippets(
            &SnippetParams {
                build_link: link.as_deref(),
                joined_command,
            },
            &self.config.templates,
        )
    }

    async fn existing_comments(&self, context: &ExecutionContext) -> Result<ExistingComments, CommentError> {
        let identity = self.transport.authenticated_user().await;
        if let Some(diagnostic) = &identity.diagnostic {
            warn!(parent: &self.span, %diagnostic, "could not get the authenticated user, comments of every author are candidates");
        }
        let comments = self.transport.list_comments(&context.commit()).await?;
        debug!(parent: &self.span, count = comments.len(), "fetched existing comments");
        Ok(ExistingComments::new(comments, identity.value))
    }

    /// Assemble and post. `Ok(None)` when there is nothing to post.
    pub async fn deliver(
        &mut self,
        rules: &[Rule],
        context: &ExecutionContext,
    ) -> Result<Option<ResolvedComment>, CommentError> {
        let selection = match self.assembler.select(rules, context)? {
            Some(selection) => selection,
            None => return Ok(None),
        };

        let existing = if CommentAssembler::needs_existing_comments(&selection, context) {
            self.existing_comments(context).await?
        } else {
            ExistingComments::empty()
        };

        let snippets = self.snippets(&context.joined_command);
        let comment = self
            .assembler
            .assemble_selection(&selection, context, &snippets, &existing)?;

        self.transport.post_comment(&comment).await?;
        info!(
            parent: &self.span,
            org = %comment.org,
            repo = %comment.repo,
            pr = comment.pull_request_number,
            sha = %comment.commit_sha,
            updated = comment.is_update(),
            "posted comment"
        );
        Ok(Some(comment))
    }
}

pub struct ExecController {
    poster: CommentPoster,
    executor: Box<dyn CommandExecutor>,
}

impl ExecController {
    pub fn new(poster: CommentPoster, executor: Box<dyn CommandExecutor>) -> Self {
        Self { poster, executor }
    }

    /// Run the command, then comment on it.
    ///
    /// Commenting errors are reported on stderr unless `silent` and land in
    /// [`ExecOutcome::comment_error`]; they never alter the exit code.
    pub async fn exec(&mut self, mut opts: ExecOptions) -> ExecOutcome {
        self.poster.complement(&mut opts.options).await;

        let (program, args) = match opts.args.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (String::new(), Vec::new()),
        };
        let joined_command = opts.args.join(" ");

        let (outcome, exec_error) = if program.is_empty() {
            (None, None)
        } else {
            match self.executor.run(&program, &args).await {
                Ok(outcome) => (Some(outcome), None),
                Err(err) => (None, Some(err)),
            }
        };
        let outcome = outcome.unwrap_or_else(|| {
            let message = exec_error.as_ref().map(ToString::to_string).unwrap_or_default();
            CommandOutcome {
                exit_code: 1,
                command: joined_command.clone(),
                joined_command: joined_command.clone(),
                stderr: message.clone(),
                combined_output: message,
                ..Default::default()
            }
        });
        let exit_code = outcome.exit_code;

        if opts.skip_comment {
            return ExecOutcome {
                exit_code,
                exec_error,
                comment_error: None,
                posted: None,
            };
        }

        let result = self.comment(&opts, outcome, joined_command).await;
        let (posted, comment_error) = match result {
            Ok(posted) => (posted, None),
            Err(err) => {
                if !opts.options.silent {
                    eprintln!("ghcomment error: {}", err);
                }
                (None, Some(err))
            }
        };

        ExecOutcome {
            exit_code,
            exec_error,
            comment_error,
            posted,
        }
    }

    async fn comment(
        &mut self,
        opts: &ExecOptions,
        outcome: CommandOutcome,
        joined_command: String,
    ) -> Result<Option<ResolvedComment>, CommentError> {
        let rules = if opts.options.template.is_empty() {
            self.poster.config().exec_rules(&opts.options.template_key)?
        } else {
            Vec::new()
        };
        opts.validate()?;

        let variables = self.poster.merged_vars(&opts.options);
        let context = ExecutionContext::new(opts.options.commit())
            .with_outcome(CommandOutcome {
                joined_command,
                ..outcome
            })
            .with_template_key(opts.options.template_key.clone())
            .with_template(opts.options.template.clone())
            .with_update_condition(opts.options.update_condition.clone())
            .with_variables(variables);

        self.poster.deliver(&rules, &context).await
    }
}

pub struct PostController {
    poster: CommentPoster,
}

impl PostController {
    pub fn new(poster: CommentPoster) -> Self {
        Self { poster }
    }

    /// Post a comment. The template comes from `--template` (or stdin,
    /// already read into it) or from the configuration's `post` section.
    pub async fn post(&mut self, mut opts: PostOptions) -> Result<Option<ResolvedComment>, CommentError> {
        self.poster.complement(&mut opts.options).await;
        opts.validate()?;

        let rules = if opts.options.template.is_empty() {
            vec![self.poster.config().post_rule(&opts.options.template_key)?]
        } else {
            Vec::new()
        };

        let variables = self.poster.merged_vars(&opts.options);
        let context = ExecutionContext::new(opts.options.commit())
            .with_template_key(opts.options.template_key.clone())
            .with_template(opts.options.template.clone())
            .with_update_condition(opts.options.update_condition.clone())
            .with_variables(variables);

        self.poster.deliver(&rules, &context).await
    }
}
