//! Container operations expressed as docker CLI invocations

use super::{CommandRunner, Invocation};
use crate::config::Settings;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Issues container commands through a [`CommandRunner`]
#[derive(Clone)]
pub struct ServiceControl {
    runner: Arc<dyn CommandRunner>,
    docker: String,
    work_dir: PathBuf,
    remote_host: Option<String>,
}

impl ServiceControl {
    /// Control using `runner` with the docker program and host from `settings`
    pub fn new(runner: Arc<dyn CommandRunner>, settings: &Settings) -> Self {
        Self {
            runner,
            docker: settings.docker_program.clone(),
            work_dir: settings.work_dir.clone(),
            remote_host: settings
                .dev_env
                .then(|| settings.dev_docker_host.clone()),
        }
    }

    fn docker(&self) -> Invocation {
        Invocation::new(&self.docker).current_dir(&self.work_dir)
    }

    /// Restart one container
    pub async fn restart(&self, service: &str) -> Result<()> {
        self.runner
            .run(&self.docker().args(["restart", service]))
            .await
    }

    /// Replace the file at `path` inside the container with `content`
    pub async fn write_file(&self, service: &str, path: &str, content: &str) -> Result<()> {
        let script = format!("printf '%s' \"$1\" > {}", path);
        let invocation = self
            .docker()
            .args(["exec", service, "sh", "-c"])
            .arg(script)
            .args(["sh", content]);
        self.runner.run(&invocation).await
    }

    /// Run the script applying the deployment document.
    ///
    /// The script is executed directly on Linux and through `sh` elsewhere.
    pub async fn apply(&self, script: &Path) -> Result<()> {
        let script = script.to_string_lossy().to_string();
        let invocation = if cfg!(target_os = "linux") {
            Invocation::new(script)
        } else {
            Invocation::new("sh").arg(script)
        };
        self.runner
            .run(&invocation.current_dir(&self.work_dir))
            .await
    }

    /// Reload or restart the reverse proxy and, unless `proxy_only`, the web server.
    ///
    /// Against a remote development host the services are reloaded in place;
    /// locally they are restarted through compose.
    pub async fn restart_web_tier(
        &self,
        reverse_proxy: &str,
        web_server: &str,
        proxy_only: bool,
    ) -> Result<()> {
        match &self.remote_host {
            Some(host) => {
                self.runner
                    .run(&self.remote_exec(host, reverse_proxy, "nginx -s reload"))
                    .await?;
                if !proxy_only {
                    self.runner
                        .run(&self.remote_exec(host, web_server, "apache2ctl restart"))
                        .await?;
                }
            }
            None => {
                self.runner
                    .run(&self.docker().args(["compose", "restart", reverse_proxy]))
                    .await?;
                if !proxy_only {
                    self.runner
                        .run(&self.docker().args(["compose", "restart", web_server]))
                        .await?;
                }
            }
        }
        Ok(())
    }

    fn remote_exec(&self, host: &str, service: &str, command: &str) -> Invocation {
        self.docker()
            .args(["-H", host, "exec", "-t", service, "sh", "-c", command])
    }
}
