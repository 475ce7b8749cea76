//! Runs the wrapped command, echoing its output while capturing it.

use std::process::Stdio;

use async_trait::async_trait;
use ghcomment_core::{CommandExecutor, CommandOutcome, ExecError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{warn, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

pub struct ProcessExecutor {
    echo: bool,
    span: Span,
}

impl ProcessExecutor {
    pub fn new(span: Span) -> Self {
        Self { echo: true, span }
    }

    /// Capture only, without forwarding output to this process.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutcome, ExecError> {
        let command_line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        let spawn_error = |e: std::io::Error| ExecError::Spawn {
            command: command_line.clone(),
            message: e.to_string(),
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, Stream::Stderr, tx.clone()));
        }
        drop(tx);

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut combined = Vec::new();
        while let Some((stream, chunk)) = rx.recv().await {
            match stream {
                Stream::Stdout => {
                    if self.echo {
                        let _ = tokio::io::stdout().write_all(&chunk).await;
                    }
                    stdout.extend_from_slice(&chunk);
                }
                Stream::Stderr => {
                    if self.echo {
                        let _ = tokio::io::stderr().write_all(&chunk).await;
                    }
                    stderr.extend_from_slice(&chunk);
                }
            }
            combined.extend_from_slice(&chunk);
        }

        let status = child.wait().await.map_err(spawn_error)?;
        let exit_code = match status.code() {
            Some(code) => code,
            None => {
                warn!(parent: &self.span, command = %command_line, "command terminated by signal");
                1
            }
        };

        Ok(CommandOutcome {
            exit_code,
            command: command_line.clone(),
            joined_command: command_line,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            combined_output: String::from_utf8_lossy(&combined).into_owned(),
        })
    }
}

/// Forwards whole lines, so a character is never split across chunks of
/// the combined output.
async fn pump<R>(reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, Vec<u8>)>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if tx.send((stream, line)).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn executor() -> ProcessExecutor {
        ProcessExecutor::new(Span::none()).quiet()
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_captures_streams_and_exit_code() {
        let outcome = executor()
            .run("sh", &sh("echo out; echo err 1>&2; exit 3"))
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
        assert!(outcome.combined_output.contains("out\n"));
        assert!(outcome.combined_output.contains("err\n"));
        assert_eq!(outcome.joined_command, "sh -c echo out; echo err 1>&2; exit 3");
    }

    #[tokio::test]
    async fn test_multibyte_output_survives_interleaving() {
        let outcome = executor()
            .run(
                "sh",
                &sh(r"printf 'h\303'; printf 'x\n' 1>&2; sleep 0.1; printf '\251llo\n'"),
            )
            .await
            .unwrap();
        assert_eq!(outcome.stdout, "h\u{e9}llo\n");
        assert!(outcome.combined_output.contains("h\u{e9}llo\n"));
        assert!(outcome.combined_output.contains("x\n"));
        assert!(!outcome.combined_output.contains('\u{fffd}'));
    }

    #[tokio::test]
    async fn test_success() {
        let outcome = executor().run("true", &[]).await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.combined_output, "");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = executor()
            .run("ghcomment-no-such-program", &[])
            .await
            .unwrap_err();
        let ExecError::Spawn { command, .. } = err;
        assert_eq!(command, "ghcomment-no-such-program");
    }
}
