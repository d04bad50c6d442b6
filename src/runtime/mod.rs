//! External command boundary
//!
//! Everything that touches containers goes through a [`CommandRunner`].
//! Only success or failure of a command is observed, never its output.

pub mod docker;
pub mod process;

pub use docker::ServiceControl;
pub use process::ProcessRunner;

use crate::error::{DevenvError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

/// A command line to execute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// Invocation of `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Executes invocations, one at a time, waiting for each to finish
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `invocation` to completion
    async fn run(&self, invocation: &Invocation) -> Result<()>;
}

/// Records invocations instead of executing them.
///
/// Backs `--dry-run`. Invocations whose argument list contains one of the
/// configured failing arguments report a failure.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    failing: HashSet<String>,
}

impl RecordingRunner {
    /// Runner that succeeds for everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that fails invocations mentioning any of `args`
    pub fn failing_on<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Invocations seen so far
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        tracing::info!("[dry-run] {}", invocation);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        if invocation.args.iter().any(|a| self.failing.contains(a)) {
            return Err(DevenvError::Subprocess {
                program: invocation.program.clone(),
                status: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display() {
        let inv = Invocation::new("docker").args(["exec", "php81"]).arg("echo hi");
        assert_eq!(inv.to_string(), "docker exec php81 \"echo hi\"");
    }

    #[tokio::test]
    async fn test_recording_runner() {
        let runner = RecordingRunner::failing_on(["httpd"]);
        let ok = Invocation::new("docker").args(["restart", "nginx"]);
        let bad = Invocation::new("docker").args(["restart", "httpd"]);

        assert!(runner.run(&ok).await.is_ok());
        assert!(matches!(
            runner.run(&bad).await,
            Err(DevenvError::Subprocess { .. })
        ));
        assert_eq!(runner.calls(), vec![ok, bad]);
    }
}
