//! Debugger configuration for runtime containers

use crate::classify::DebugVariant;
use crate::env_store::EnvStore;
use crate::error::{DevenvError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Render the debug configuration file for `variant`
pub fn render_config(variant: DebugVariant, host: &str, port: u16) -> String {
    match variant {
        DebugVariant::Legacy => format!(
            "zend_extension=xdebug.so\n\
             xdebug.remote_enable=1\n\
             xdebug.remote_autostart=1\n\
             xdebug.remote_connect_back=0\n\
             xdebug.remote_handler=dbgp\n\
             xdebug.idekey=PHPSTORM\n\
             xdebug.remote_host={}\n\
             xdebug.remote_port={}\n",
            host, port
        ),
        DebugVariant::Modern => format!(
            "zend_extension=xdebug.so\n\
             xdebug.mode=debug\n\
             xdebug.start_with_request=yes\n\
             xdebug.discover_client_host=0\n\
             xdebug.idekey=PHPSTORM\n\
             xdebug.client_host={}\n\
             xdebug.client_port={}\n",
            host, port
        ),
    }
}

/// Source of the address currently embedded in debug configuration
#[async_trait]
pub trait DebugAddressSource: Send + Sync {
    /// The embedded address, or an error when none has been written yet
    async fn current_address(&self) -> Result<String>;
}

/// Reads the debug address from a key of the environment file
#[derive(Debug, Clone)]
pub struct EnvFileMarker {
    path: PathBuf,
    key: String,
}

impl EnvFileMarker {
    /// Marker stored as `key=address` in the file at `path`
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl DebugAddressSource for EnvFileMarker {
    async fn current_address(&self) -> Result<String> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        EnvStore::new(&self.path, content)
            .get(&self.key)
            .filter(|address| !address.is_empty())
            .ok_or_else(|| {
                DevenvError::DebugAddressUnavailable(format!(
                    "{} not set in {}",
                    self.key,
                    self.path.display()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_render_variants() {
        let legacy = render_config(DebugVariant::Legacy, "10.0.0.5", 10000);
        assert!(legacy.contains("xdebug.remote_host=10.0.0.5\n"));
        assert!(legacy.contains("xdebug.remote_port=10000\n"));
        assert!(!legacy.contains("client_host"));

        let modern = render_config(DebugVariant::Modern, "10.0.0.5", 9003);
        assert!(modern.contains("xdebug.client_host=10.0.0.5\n"));
        assert!(modern.contains("xdebug.client_port=9003\n"));
        assert!(modern.contains("xdebug.mode=debug"));
    }

    #[tokio::test]
    async fn test_env_file_marker() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".env");
        let marker = EnvFileMarker::new(&path, "XDEBUG_HOST");

        assert!(marker.current_address().await.is_err());

        std::fs::write(&path, "APP=1\nXDEBUG_HOST=\n").unwrap();
        assert!(matches!(
            marker.current_address().await,
            Err(DevenvError::DebugAddressUnavailable(_))
        ));

        std::fs::write(&path, "XDEBUG_HOST=192.168.1.20\n").unwrap();
        assert_eq!(marker.current_address().await.unwrap(), "192.168.1.20");
    }
}
