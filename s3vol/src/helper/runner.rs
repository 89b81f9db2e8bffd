//! Subprocess execution.

use std::io;

use async_trait::async_trait;

use super::command::CommandSpec;

/// Exit status and combined output of a finished command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,

    /// stdout followed by stderr
    pub output: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            code: Some(0),
            output: String::new(),
        }
    }

    pub fn failure(code: i32, output: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            output: output.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a [`CommandSpec`] to completion.
///
/// `Err` means the program could not be started; a program that ran and
/// failed is an `Ok` with a non-zero code.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;
}

/// Runs commands with `tokio::process`.
///
/// No timeout: a hung helper blocks its caller until it exits.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k, v)))
            .stdin(std::process::Stdio::null());

        tracing::debug!(command = ?spec, "Executing helper command");
        let output = cmd.output().await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            code: output.status.code(),
            output: combined.trim_end().to_string(),
        })
    }
}
