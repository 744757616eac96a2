//! Subprocess execution
//!
//! The package manager is the only long-running step. It runs as a child
//! process whose output is streamed line by line into the log; only the
//! exit status decides success.

use crate::error::{NodeLayerError, NodeLayerResult};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Max number of output lines to include in error messages.
const ERROR_TAIL_LINES: usize = 50;

/// A single command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    pub program: String,
    pub args: Vec<String>,
    pub dir: PathBuf,
    /// Variables layered over the inherited environment
    pub env: Vec<(String, String)>,
}

impl Execution {
    pub fn new(program: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: dir.into(),
            env: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    /// The value this execution sets for `name`, if any (last one wins)
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Human-readable command line
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs executions to completion
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run the command; non-zero exit is an error
    async fn execute(&self, execution: &Execution) -> NodeLayerResult<()>;
}

/// Executor that spawns real child processes
#[derive(Debug, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, execution: &Execution) -> NodeLayerResult<()> {
        let command_line = execution.command_line();
        info!("Running '{}'", command_line);
        debug!("Working directory: {}", execution.dir.display());

        let mut child = Command::new(&execution.program)
            .args(&execution.args)
            .current_dir(&execution.dir)
            .envs(execution.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| NodeLayerError::command_failed(command_line.clone(), e))?;

        let output = stream_child_output(&mut child, &|line| info!("  {}", line)).await;

        let status = child
            .wait()
            .await
            .map_err(|e| NodeLayerError::command_failed(command_line.clone(), e))?;

        if status.success() {
            Ok(())
        } else {
            Err(NodeLayerError::CommandExecution {
                command: command_line,
                code: status.code().unwrap_or(-1),
                output: error_tail(&output),
            })
        }
    }
}

/// Keep the last `ERROR_TAIL_LINES` lines of output for error diagnostics.
pub(crate) fn error_tail(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> Vec<String> {
    let mut all_output = Vec::new();
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return all_output;
    };

    let mut stderr_reader = BufReader::new(stderr).lines();
    let mut stdout_reader = BufReader::new(stdout).lines();

    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = stderr_reader.next_line(), if !stderr_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stderr_done = true,
                }
            }
            line = stdout_reader.next_line(), if !stdout_done => {
                match line {
                    Ok(Some(line)) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    _ => stdout_done = true,
                }
            }
        }
    }

    all_output
}
