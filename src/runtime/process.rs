//! Runs invocations as child processes

use super::{CommandRunner, Invocation};
use crate::error::{DevenvError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Spawns each invocation and waits for it, bounded by a timeout
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Duration,
    inherit_output: bool,
}

impl ProcessRunner {
    /// Runner abandoning commands after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            inherit_output: false,
        }
    }

    /// Let child output go to this process' stdout/stderr
    pub fn inherit_output(mut self, inherit: bool) -> Self {
        self.inherit_output = inherit;
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, invocation: &Invocation) -> Result<()> {
        debug!("Running {}", invocation);

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).kill_on_drop(true).stdin(Stdio::null());
        if !self.inherit_output {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        if let Some(ref dir) = invocation.cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| DevenvError::Subprocess {
            program: invocation.program.clone(),
            status: format!("failed to start: {}", e),
        })?;

        // On timeout the child is dropped, which kills it.
        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                return Err(DevenvError::Timeout(format!(
                    "{} did not finish within {:?}",
                    invocation, self.timeout
                )))
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(DevenvError::Subprocess {
                program: invocation.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_and_failure() {
        let runner = ProcessRunner::new(Duration::from_secs(10));
        assert!(runner.run(&Invocation::new("true")).await.is_ok());
        assert!(matches!(
            runner.run(&Invocation::new("false")).await,
            Err(DevenvError::Subprocess { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = ProcessRunner::new(Duration::from_secs(10));
        let result = runner
            .run(&Invocation::new("devenv-definitely-not-a-program"))
            .await;
        assert!(matches!(result, Err(DevenvError::Subprocess { .. })));
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = ProcessRunner::new(Duration::from_millis(100));
        let result = runner.run(&Invocation::new("sleep").arg("5")).await;
        assert!(matches!(result, Err(DevenvError::Timeout(_))));
    }
}
