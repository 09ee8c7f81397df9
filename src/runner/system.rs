// ABOUTME: CommandRunner backed by real OS processes via tokio::process.
// ABOUTME: Pipes stdin, enforces optional timeouts, and kills children that outlive them.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

use super::{CommandOutput, CommandRunner, CommandSpec, LineStream, RunnerError};

/// Runs commands on the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).kill_on_drop(true);
        if let Some(ref dir) = spec.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunnerError> {
        tracing::debug!(command = %spec, "running");

        let mut cmd = Self::command(spec);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        // Feed stdin from a separate task so a chatty child cannot deadlock on a full stdout pipe.
        let feeder = match (child.stdin.take(), spec.stdin.clone()) {
            (Some(mut stdin), Some(input)) => Some(tokio::spawn(async move {
                let result = stdin.write_all(&input).await;
                drop(stdin);
                result
            })),
            _ => None,
        };

        let wait = child.wait_with_output();
        let output = match spec.timeout {
            Some(after) => tokio::time::timeout(after, wait)
                .await
                .map_err(|_| RunnerError::Timeout {
                    command: spec.to_string(),
                    after,
                })?,
            None => wait.await,
        }
        .map_err(|source| RunnerError::Io {
            program: spec.program.clone(),
            source,
        })?;

        if let Some(feeder) = feeder {
            match feeder.await {
                Ok(Ok(())) => {}
                // A child that exits early closes its stdin; its exit status tells the real story.
                Ok(Err(e)) => tracing::debug!(command = %spec, "stdin write ended early: {}", e),
                Err(e) => tracing::debug!(command = %spec, "stdin task failed: {}", e),
            }
        }

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!(command = %spec, exit_code = ?result.exit_code, "finished");
        Ok(result)
    }

    async fn stream(&self, spec: &CommandSpec) -> Result<LineStream, RunnerError> {
        tracing::debug!(command = %spec, "streaming");

        let mut cmd = Self::command(spec);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdout = child.stdout.take().ok_or_else(|| RunnerError::Io {
            program: spec.program.clone(),
            source: std::io::Error::other("stdout was not captured"),
        })?;

        let lines = BufReader::new(stdout).lines();
        // The child rides along in the stream state so it is killed when the stream is dropped.
        let stream = futures::stream::unfold((lines, child), |(mut lines, child)| async move {
            match lines.next_line().await {
                Ok(Some(line)) => Some((Ok(line), (lines, child))),
                Ok(None) => None,
                Err(e) => Some((Err(e), (lines, child))),
            }
        });

        Ok(Box::pin(stream))
    }

    fn find_program(&self, name: &str) -> Option<PathBuf> {
        find_on_path(name)
    }
}

/// Search `PATH` for an executable file named `name`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    let candidates: &[&str] = if cfg!(windows) {
        &["", ".exe", ".cmd", ".bat"]
    } else {
        &[""]
    };

    std::env::split_paths(&path).find_map(|dir| {
        candidates.iter().find_map(|ext| {
            let candidate = dir.join(format!("{}{}", name, ext));
            is_executable(&candidate).then_some(candidate)
        })
    })
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let output = SystemRunner
            .run(&CommandSpec::new("sh").args(["-c", "echo hello; exit 3"]))
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.stdout_lossy().trim(), "hello");
    }

    #[tokio::test]
    async fn pipes_stdin() {
        let output = SystemRunner
            .run(&CommandSpec::new("cat").stdin(b"select 1;".to_vec()))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, b"select 1;");
    }

    #[tokio::test]
    async fn enforces_timeout() {
        let err = SystemRunner
            .run(
                &CommandSpec::new("sleep")
                    .arg("5")
                    .timeout(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = SystemRunner
            .run(&CommandSpec::new("keel-definitely-not-a-program"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn streams_lines() {
        let stream = SystemRunner
            .stream(&CommandSpec::new("printf").arg("a\\nb\\n"))
            .await
            .unwrap();
        let lines: Vec<String> = stream.map(|l| l.unwrap()).collect().await;
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn finds_sh_on_path() {
        assert!(find_on_path("sh").is_some());
        assert!(find_on_path("keel-definitely-not-a-program").is_none());
    }
}
