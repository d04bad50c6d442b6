//! Compose document loading and serialization

use crate::error::{DevenvError, Result};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// Placeholder in template paths replaced by the host architecture
pub const ARCH_PLACEHOLDER: &str = "{.arch}";

/// Architecture identifier used in template file names.
///
/// Template files follow container-platform naming (`amd64`, `arm64`)
/// rather than Rust target names.
pub fn arch_identifier() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "arm" => "arm",
        "powerpc64" => "ppc64le",
        "s390x" => "s390x",
        "riscv64" => "riscv64",
        other => other,
    }
}

/// Substitute the architecture placeholder in a template path
pub fn resolve_template_path(pattern: &str) -> PathBuf {
    PathBuf::from(pattern.replace(ARCH_PLACEHOLDER, arch_identifier()))
}

/// Compose document parser
pub struct ComposeParser;

impl ComposeParser {
    /// Parse compose file from path
    pub fn parse_file(path: &Path) -> Result<Value> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DevenvError::ComposeParse(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse_str(&content)
    }

    /// Parse a compose file that may not exist yet
    pub fn parse_optional(path: &Path) -> Result<Option<Value>> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse_str(&content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DevenvError::Io(e)),
        }
    }

    /// Parse compose file from string.
    ///
    /// Duplicate keys within one mapping are rejected.
    pub fn parse_str(content: &str) -> Result<Value> {
        serde_yaml::from_str(content)
            .map_err(|e| DevenvError::ComposeParse(format!("Failed to parse YAML: {}", e)))
    }

    /// Serialize a document; mapping order is preserved
    pub fn to_string(document: &Value) -> Result<String> {
        Ok(serde_yaml::to_string(document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_template_path() {
        let path = resolve_template_path("/env/docker-compose.yml.{.arch}.dist");
        let expected = format!("/env/docker-compose.yml.{}.dist", arch_identifier());
        assert_eq!(path, PathBuf::from(expected));
        assert!(!path.to_string_lossy().contains(ARCH_PLACEHOLDER));
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let yaml = r#"
services:
  web:
    image: nginx
  web:
    image: httpd
"#;
        assert!(ComposeParser::parse_str(yaml).is_err());
    }

    #[test]
    fn test_parse_optional_missing_file() {
        let temp = tempdir().unwrap();
        let parsed = ComposeParser::parse_optional(&temp.path().join("docker-compose.yml")).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_round_trip_keeps_unmodeled_keys() {
        let yaml = r#"
services:
  web:
    image: nginx
    x-custom:
      nested: [1, 2, 3]
"#;
        let doc = ComposeParser::parse_str(yaml).unwrap();
        let text = ComposeParser::to_string(&doc).unwrap();
        let reparsed = ComposeParser::parse_str(&text).unwrap();
        assert_eq!(doc, reparsed);
        assert!(text.contains("x-custom"));
    }
}
