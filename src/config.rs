//! devenv settings
//!
//! Settings come from an optional YAML file and are then adjusted by
//! command line flags. Relative file names resolve against `work_dir`.

use crate::classify::NamingConvention;
use crate::compose::parser::resolve_template_path;
use crate::error::{DevenvError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the settings file looked up in the work directory
pub const SETTINGS_FILE: &str = "devenv.yaml";

/// Environment key holding the debug host address
pub const DEBUG_HOST_KEY: &str = "XDEBUG_HOST";

/// devenv settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the environment checkout
    pub work_dir: PathBuf,
    /// Template document, may contain the `{.arch}` placeholder
    pub template: String,
    /// Deployment document
    pub deployment: PathBuf,
    /// Environment variable store
    pub env_file: PathBuf,
    /// Seed read when `env_file` does not exist yet
    pub env_example_file: PathBuf,
    /// Script applying the deployment document
    pub install_script: PathBuf,
    /// Seconds between drift checks
    pub poll_interval_secs: u64,
    /// Seconds before an external command is abandoned
    pub command_timeout_secs: u64,
    /// Port the debugger listens on
    pub debug_port: u16,
    /// Environment key holding the debug host address
    pub debug_host_key: String,
    /// Debug configuration file inside debug-enabled containers
    pub debug_config_path: String,
    /// Container CLI
    pub docker_program: String,
    /// Reverse proxy service, restarted after the runtime services
    pub reverse_proxy: String,
    /// Web server service, restarted last
    pub web_server: String,
    /// Service naming convention
    pub naming: NamingConvention,
    /// Constrained development context
    pub dev_env: bool,
    /// Address prefix required in the development context
    pub dev_address_prefix: String,
    /// Remote container host used in the development context
    pub dev_docker_host: String,
}

impl Default for Settings {
    fn default() -> Self {
        let work_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".docker-environment");

        Self {
            work_dir,
            template: "docker-compose.yml.{.arch}.dist".to_string(),
            deployment: PathBuf::from("docker-compose.yml"),
            env_file: PathBuf::from(".env"),
            env_example_file: PathBuf::from(".env.example"),
            install_script: PathBuf::from("install.sh"),
            poll_interval_secs: 5,
            command_timeout_secs: 120,
            debug_port: 10000,
            debug_host_key: DEBUG_HOST_KEY.to_string(),
            debug_config_path: "/usr/local/etc/php/conf.d/xdebug.ini".to_string(),
            docker_program: "docker".to_string(),
            reverse_proxy: "nginx".to_string(),
            web_server: "httpd".to_string(),
            naming: NamingConvention::default(),
            dev_env: false,
            dev_address_prefix: "172.28".to_string(),
            dev_docker_host: "192.168.36.240:4243".to_string(),
        }
    }
}

impl Settings {
    /// Settings rooted at `work_dir`, everything else default
    pub fn with_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }

    /// Load settings.
    ///
    /// An explicit path must exist. Without one, `devenv.yaml` in the
    /// default work directory is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let defaults = Self::default();
                let candidate = defaults.work_dir.join(SETTINGS_FILE);
                if candidate.exists() {
                    Self::from_file(&candidate)
                } else {
                    Ok(defaults)
                }
            }
        }
    }

    /// Parse settings from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DevenvError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let settings: Self = serde_yaml::from_str(&content).map_err(|e| {
            DevenvError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the reconciler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(DevenvError::InvalidConfig(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.command_timeout_secs == 0 {
            return Err(DevenvError::InvalidConfig(
                "command_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.naming.debug_marker.is_empty() || self.naming.runtime_marker.is_empty() {
            return Err(DevenvError::InvalidConfig(
                "naming markers must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }

    /// Template document path with the architecture substituted
    pub fn template_path(&self) -> PathBuf {
        self.resolve(&resolve_template_path(&self.template))
    }

    /// Deployment document path
    pub fn deployment_path(&self) -> PathBuf {
        self.resolve(&self.deployment)
    }

    /// Environment store path
    pub fn env_path(&self) -> PathBuf {
        self.resolve(&self.env_file)
    }

    /// Environment seed path
    pub fn env_example_path(&self) -> PathBuf {
        self.resolve(&self.env_example_file)
    }

    /// Install script path
    pub fn install_script_path(&self) -> PathBuf {
        self.resolve(&self.install_script)
    }

    /// Interval between drift checks
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Timeout for one external command
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Address prefix required by the address policy, if any
    pub fn required_address_prefix(&self) -> Option<&str> {
        if self.dev_env {
            Some(self.dev_address_prefix.as_str())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_paths() {
        let settings = Settings::with_work_dir("/srv/env");
        assert_eq!(settings.deployment_path(), PathBuf::from("/srv/env/docker-compose.yml"));
        assert_eq!(settings.env_path(), PathBuf::from("/srv/env/.env"));
        assert!(settings.template_path().starts_with("/srv/env"));
        assert!(!settings.template_path().to_string_lossy().contains("{.arch}"));
        assert_eq!(settings.poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.required_address_prefix(), None);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            "work_dir: /opt/env\npoll_interval_secs: 10\ndev_env: true\nnaming:\n  runtime_marker: node\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.work_dir, PathBuf::from("/opt/env"));
        assert_eq!(settings.poll_interval_secs, 10);
        assert_eq!(settings.debug_port, 10000);
        assert_eq!(settings.naming.runtime_marker, "node");
        assert_eq!(settings.naming.debug_marker, "_xdebug");
        assert_eq!(settings.required_address_prefix(), Some("172.28"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(SETTINGS_FILE);
        std::fs::write(&path, "poll_interval_secs: 0\n").unwrap();
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(DevenvError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_absolute_paths_kept() {
        let mut settings = Settings::with_work_dir("/srv/env");
        settings.deployment = PathBuf::from("/tmp/compose.yml");
        assert_eq!(settings.deployment_path(), PathBuf::from("/tmp/compose.yml"));
    }
}
