//! Service naming conventions
//!
//! Services are classified purely by name. All substring rules live here so
//! that the convention can change in one place.

use serde::{Deserialize, Serialize};

/// Debug configuration flavour a service expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugVariant {
    /// Xdebug 2 settings (`remote_*`), used by older PHP images
    Legacy,
    /// Xdebug 3 settings (`client_*`)
    Modern,
}

/// Name markers used to classify services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    /// Marks services that carry debug configuration
    pub debug_marker: String,
    /// Marks language runtime services restarted after reconfiguration
    pub runtime_marker: String,
    /// Marks services needing the modern debug variant
    pub modern_debug_marker: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            debug_marker: "_xdebug".to_string(),
            runtime_marker: "php".to_string(),
            modern_debug_marker: "81".to_string(),
        }
    }
}

impl NamingConvention {
    /// Whether the service embeds debug configuration
    pub fn is_debug_enabled(&self, name: &str) -> bool {
        name.contains(&self.debug_marker)
    }

    /// Whether the service is restarted when debug configuration changes.
    /// Every debug-enabled service counts as a runtime service.
    pub fn is_runtime(&self, name: &str) -> bool {
        name.contains(&self.runtime_marker) || self.is_debug_enabled(name)
    }

    /// Debug configuration flavour for the service
    pub fn debug_variant(&self, name: &str) -> DebugVariant {
        if name.contains(&self.modern_debug_marker) {
            DebugVariant::Modern
        } else {
            DebugVariant::Legacy
        }
    }

    /// Debug-enabled services among `active`, keeping their order
    pub fn debug_services<'a, S: AsRef<str>>(&self, active: &'a [S]) -> Vec<&'a str> {
        active
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| self.is_debug_enabled(name))
            .collect()
    }

    /// Runtime services among `active`: debug-enabled ones first, then the
    /// remaining runtime services, each group in `active` order
    pub fn restart_order<'a, S: AsRef<str>>(&self, active: &'a [S]) -> Vec<&'a str> {
        let (mut debug, rest): (Vec<&str>, Vec<&str>) = active
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| self.is_runtime(name))
            .partition(|name| self.is_debug_enabled(name));
        debug.extend(rest);
        debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let naming = NamingConvention::default();
        assert!(naming.is_debug_enabled("php81_xdebug"));
        assert!(!naming.is_debug_enabled("php81"));
        assert!(naming.is_runtime("php81"));
        assert!(naming.is_runtime("node_xdebug"));
        assert!(!naming.is_runtime("db"));
        assert!(!naming.is_runtime("nginx"));
    }

    #[test]
    fn test_debug_variant() {
        let naming = NamingConvention::default();
        assert_eq!(naming.debug_variant("php81_xdebug"), DebugVariant::Modern);
        assert_eq!(naming.debug_variant("php74_xdebug"), DebugVariant::Legacy);
    }

    #[test]
    fn test_restart_order() {
        let naming = NamingConvention::default();
        let active = ["db", "php74", "web_php81_xdebug", "redis", "php56_xdebug"];
        assert_eq!(
            naming.restart_order(&active),
            vec!["web_php81_xdebug", "php56_xdebug", "php74"]
        );
        assert_eq!(
            naming.debug_services(&active),
            vec!["web_php81_xdebug", "php56_xdebug"]
        );
    }

    #[test]
    fn test_custom_markers() {
        let naming = NamingConvention {
            debug_marker: "-debug".to_string(),
            runtime_marker: "node".to_string(),
            modern_debug_marker: "20".to_string(),
        };
        assert!(naming.is_debug_enabled("node20-debug"));
        assert_eq!(naming.debug_variant("node20-debug"), DebugVariant::Modern);
        assert!(!naming.is_runtime("php81"));
    }
}
