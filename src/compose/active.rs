//! Which template services are currently deployed

use super::graph::{ServiceGraph, SERVICES_KEY};
use super::tree;
use serde_yaml::Value;

/// Services present in the deployment document.
///
/// `flags` is positional: `flags[i]` answers for the `i`-th service of the
/// template graph the set was computed against. A set is never updated in
/// place; reloading the documents computes a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSet {
    names: Vec<String>,
    flags: Vec<bool>,
}

impl ActiveSet {
    /// Compute the set for `graph` against an optional deployment document
    pub fn compute(graph: &ServiceGraph, deployment: Option<&Value>) -> Self {
        let names: Vec<String> = deployment
            .and_then(|doc| tree::find(doc, SERVICES_KEY))
            .and_then(tree::mapping_keys)
            .map(|keys| keys.into_iter().map(str::to_string).collect())
            .unwrap_or_default();

        let flags = graph
            .iter()
            .map(|service| names.iter().any(|n| *n == service.name))
            .collect();

        Self { names, flags }
    }

    /// Whether `name` is deployed
    pub fn is_active(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Deployed service names, in deployment document order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Positional table aligned with the template graph
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    /// Flag for the service at `index` in the template graph
    pub fn flag(&self, index: usize) -> Option<bool> {
        self.flags.get(index).copied()
    }

    /// Whether the positional table still lines up with `graph`
    pub fn is_aligned_with(&self, graph: &ServiceGraph) -> bool {
        self.flags.len() == graph.len()
    }

    /// Number of deployed services
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing is deployed
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn template() -> ServiceGraph {
        let doc = parse(
            r#"
services:
  web: {}
  db: {}
  php81_xdebug: {}
"#,
        );
        ServiceGraph::from_document(&doc).0
    }

    #[test]
    fn test_flags_follow_template_order() {
        let graph = template();
        let deployment = parse(
            r#"
services:
  web: {}
  db: {}
"#,
        );
        let active = ActiveSet::compute(&graph, Some(&deployment));

        // template order: db, php81_xdebug, web
        assert_eq!(active.flags(), &[true, false, true]);
        assert!(active.is_active("web"));
        assert!(active.is_active("db"));
        assert!(!active.is_active("php81_xdebug"));
        assert_eq!(active.names(), &["web".to_string(), "db".to_string()]);
        assert!(active.is_aligned_with(&graph));
    }

    #[test]
    fn test_no_deployment_document() {
        let graph = template();
        let active = ActiveSet::compute(&graph, None);
        assert!(active.is_empty());
        assert_eq!(active.flags(), &[false, false, false]);
    }

    #[test]
    fn test_nested_service_keys_do_not_count() {
        let graph = template();
        let deployment = parse(
            r#"
services:
  proxy:
    labels:
      web: "true"
"#,
        );
        let active = ActiveSet::compute(&graph, Some(&deployment));
        assert!(!active.is_active("web"));
        assert!(active.is_active("proxy"));
        assert_eq!(active.flag(2), Some(false));
        assert_eq!(active.flag(3), None);
    }
}
