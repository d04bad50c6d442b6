//! Error types for devenv

use thiserror::Error;

/// Result type for devenv operations
pub type Result<T> = std::result::Result<T, DevenvError>;

/// devenv error types
#[derive(Error, Debug)]
pub enum DevenvError {
    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Compose file parse error: {0}")]
    ComposeParse(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Command `{program}` failed: {status}")]
    Subprocess { program: String, status: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Debug address unavailable: {0}")]
    DebugAddressUnavailable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DevenvError {
    /// Whether the failed operation can be retried on a later cycle
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DevenvError::Io(_)
                | DevenvError::Subprocess { .. }
                | DevenvError::Timeout(_)
                | DevenvError::DebugAddressUnavailable(_)
                | DevenvError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let io = DevenvError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert!(io.is_retryable());
        assert!(DevenvError::Timeout("docker".to_string()).is_retryable());
        assert!(!DevenvError::ComposeParse("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_subprocess_display() {
        let err = DevenvError::Subprocess {
            program: "docker".to_string(),
            status: "exit status: 1".to_string(),
        };
        assert_eq!(err.to_string(), "Command `docker` failed: exit status: 1");
    }
}
