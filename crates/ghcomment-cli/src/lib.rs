//! ghcomment: run a command and report its result as a GitHub comment.
pub mod controller;
pub mod dry_run;
pub mod executor;
pub mod github;
pub mod logging;
pub mod options;
pub mod platform;

use std::io::{IsTerminal, Read};

use anyhow::{Context, Result};
use ghcomment_core::CommentTransport;
use ghcomment_render::TemplateRenderer;
use ghcomment_route::Config;
use tracing::info_span;

use crate::controller::{CommentPoster, ExecController, PostController};
use crate::dry_run::DryRunGitHub;
use crate::executor::ProcessExecutor;
use crate::github::GitHubClient;
use crate::options::{
    skip_requested, Cli, Command, ExecOptions, Options, PostOptions, SKIP_ENV, TOKEN_ENV_FALLBACK,
};
use crate::platform::CiPlatform;

/// Run one invocation and return the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    let skip = skip_requested(std::env::var(SKIP_ENV).ok().as_deref())?;
    match cli.command {
        Command::Exec(args) => {
            let mut opts = ExecOptions::from_args(args)?;
            opts.skip_comment |= skip;
            run_exec(opts).await
        }
        Command::Post(args) => {
            if skip {
                return Ok(0);
            }
            run_post(PostOptions::from_args(args)?).await
        }
    }
}

async fn run_exec(mut opts: ExecOptions) -> Result<i32> {
    logging::init(opts.options.log_level.as_deref());
    let span = info_span!("exec");
    let config = load_config(&mut opts.options)?;
    let transport = transport(&opts.options, &config, span.clone())?;

    let poster = CommentPoster::new(config, transport, Box::new(TemplateRenderer::new()), span.clone())
        .with_platform(Box::new(CiPlatform::from_env()));
    let mut controller = ExecController::new(poster, Box::new(ProcessExecutor::new(span)));

    let outcome = controller.exec(opts).await;
    if let Some(err) = &outcome.exec_error {
        eprintln!("ghcomment error: {}", err);
    }
    Ok(outcome.exit_code)
}

async fn run_post(mut opts: PostOptions) -> Result<i32> {
    logging::init(opts.options.log_level.as_deref());
    let span = info_span!("post");
    if opts.options.template.is_empty() && opts.stdin_template && !std::io::stdin().is_terminal() {
        let mut template = String::new();
        std::io::stdin()
            .read_to_string(&mut template)
            .context("read the template from standard input")?;
        opts.options.template = template;
    }

    let config = load_config(&mut opts.options)?;
    let transport = transport(&opts.options, &config, span.clone())?;
    let poster = CommentPoster::new(config, transport, Box::new(TemplateRenderer::new()), span)
        .with_platform(Box::new(CiPlatform::from_env()));

    match PostController::new(poster).post(opts.clone()).await {
        Ok(_) => Ok(0),
        Err(err) => {
            if !opts.options.silent {
                eprintln!("ghcomment error: {}", err);
            }
            Ok(1)
        }
    }
}

fn load_config(opts: &mut Options) -> Result<Config> {
    let working_dir = std::env::current_dir().context("get the current directory")?;
    let config = Config::find_and_read(opts.config_path.as_deref(), &working_dir)?;
    opts.skip_no_token |= config.skip_no_token;
    if opts.token.is_empty() {
        opts.token = std::env::var(TOKEN_ENV_FALLBACK).unwrap_or_default();
    }
    Ok(config)
}

fn transport(opts: &Options, config: &Config, span: tracing::Span) -> Result<Box<dyn CommentTransport>> {
    if opts.dry_run || (opts.skip_no_token && opts.token.is_empty()) {
        return Ok(Box::new(DryRunGitHub::new(opts.silent)));
    }
    let client = GitHubClient::new(
        &opts.token,
        &config.ghe_base_url,
        &config.ghe_graphql_endpoint,
        span,
    )?;
    Ok(Box::new(client))
}
