//! Typed view of the services declared in a compose document

use super::tree;
use serde::Serialize;
use serde_yaml::Value;
use std::fmt;

/// Key under which compose documents declare their services
pub const SERVICES_KEY: &str = "services";

/// A service declared in a compose document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    /// Service name (the key under `services`)
    pub name: String,
    /// Entries of `links`
    pub links: Vec<String>,
    /// Entries of `depends_on`
    pub depends_on: Vec<String>,
    /// Value of `image`, empty when absent
    pub image: String,
    /// The service definition exactly as parsed
    #[serde(skip)]
    pub original: Value,
}

/// A shape problem found while reading a document.
///
/// Issues never abort a load: the affected field is left empty and the
/// rest of the catalog stays usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralIssue {
    /// Service the issue belongs to, `None` for document-level problems
    pub service: Option<String>,
    /// What was wrong
    pub message: String,
}

impl StructuralIssue {
    fn document(message: impl Into<String>) -> Self {
        Self {
            service: None,
            message: message.into(),
        }
    }

    fn service(name: &str, message: impl Into<String>) -> Self {
        Self {
            service: Some(name.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for StructuralIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.service {
            Some(service) => write!(f, "service '{}': {}", service, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Read every service of `document`, in source order
pub fn extract_services(document: &Value) -> (Vec<Service>, Vec<StructuralIssue>) {
    let mut services = Vec::new();
    let mut issues = Vec::new();

    let Some(node) = tree::find(document, SERVICES_KEY) else {
        issues.push(StructuralIssue::document("no 'services' section found"));
        return (services, issues);
    };

    let Value::Mapping(entries) = node else {
        issues.push(StructuralIssue::document("'services' is not a mapping"));
        return (services, issues);
    };

    for (key, value) in entries.iter() {
        let Some(name) = key.as_str() else {
            issues.push(StructuralIssue::document(format!(
                "skipping service with non-string name {:?}",
                key
            )));
            continue;
        };
        services.push(build_service(name, value, &mut issues));
    }

    (services, issues)
}

fn build_service(name: &str, value: &Value, issues: &mut Vec<StructuralIssue>) -> Service {
    let mut service = Service {
        name: name.to_string(),
        links: Vec::new(),
        depends_on: Vec::new(),
        image: String::new(),
        original: value.clone(),
    };

    if !value.is_mapping() {
        issues.push(StructuralIssue::service(name, "definition is not a mapping"));
        return service;
    }

    service.links = string_list(name, value, "links", issues);
    service.depends_on = string_list(name, value, "depends_on", issues);

    match value.get("image") {
        None => {}
        Some(Value::String(image)) => service.image = image.clone(),
        Some(_) => issues.push(StructuralIssue::service(name, "'image' is not a string")),
    }

    service
}

/// Read a list of names stored under `key`.
///
/// Accepts the sequence form and, for `depends_on`, the long mapping form
/// whose keys are the names. Any non-string element empties the whole field.
fn string_list(
    service: &str,
    value: &Value,
    key: &str,
    issues: &mut Vec<StructuralIssue>,
) -> Vec<String> {
    let names: Option<Vec<String>> = match value.get(key) {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Sequence(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::Mapping(map)) => map
            .keys()
            .map(|k| k.as_str().map(str::to_string))
            .collect(),
        Some(_) => None,
    };

    names.unwrap_or_else(|| {
        issues.push(StructuralIssue::service(
            service,
            format!("'{}' must be a list of names", key),
        ));
        Vec::new()
    })
}

/// The services of a template document, sorted by name
#[derive(Debug, Clone, Default)]
pub struct ServiceGraph {
    services: Vec<Service>,
}

impl ServiceGraph {
    /// Build a graph from services in any order
    pub fn from_services(mut services: Vec<Service>) -> Self {
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Self { services }
    }

    /// Build a graph from a parsed document
    pub fn from_document(document: &Value) -> (Self, Vec<StructuralIssue>) {
        let (services, issues) = extract_services(document);
        (Self::from_services(services), issues)
    }

    /// Services in name order
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Iterate services in name order
    pub fn iter(&self) -> std::slice::Iter<'_, Service> {
        self.services.iter()
    }

    /// Number of services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the graph has no services
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Service names in name order
    pub fn names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a service by name
    pub fn get(&self, name: &str) -> Option<&Service> {
        self.position(name).map(|i| &self.services[i])
    }

    /// Position of a service in name order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.services
            .binary_search_by(|s| s.name.as_str().cmp(name))
            .ok()
    }

    /// Whether a service with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Resolve a dependency label to its service
    pub fn check_depends(&self, label: &str) -> Option<&Service> {
        self.get(label)
    }

    /// Dependencies and links of `name` that are not declared in this graph
    pub fn missing_dependencies(&self, name: &str) -> Vec<String> {
        let Some(service) = self.get(name) else {
            return Vec::new();
        };
        service
            .depends_on
            .iter()
            .chain(service.links.iter())
            .map(|label| label.split(':').next().unwrap_or(label))
            .filter(|label| !self.contains(label))
            .map(str::to_string)
            .collect()
    }
}

impl<'a> IntoIterator for &'a ServiceGraph {
    type Item = &'a Service;
    type IntoIter = std::slice::Iter<'a, Service>;

    fn into_iter(self) -> Self::IntoIter {
        self.services.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_extract_fields() {
        let doc = parse(
            r#"
services:
  web:
    image: nginx:latest
    links:
      - php81_xdebug
    depends_on:
      - db
    ports:
      - "80:80"
  db:
    image: mysql:8
"#,
        );
        let (services, issues) = extract_services(&doc);
        assert!(issues.is_empty());
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].name, "web");
        assert_eq!(services[0].links, vec!["php81_xdebug"]);
        assert_eq!(services[0].depends_on, vec!["db"]);
        assert_eq!(services[0].image, "nginx:latest");
        assert!(services[0].original.get("ports").is_some());
        assert_eq!(services[1].name, "db");
    }

    #[test]
    fn test_absent_lists_are_empty() {
        let doc = parse(
            r#"
services:
  cache:
    image: redis
"#,
        );
        let (services, issues) = extract_services(&doc);
        assert!(issues.is_empty());
        assert!(services[0].links.is_empty());
        assert!(services[0].depends_on.is_empty());
    }

    #[test]
    fn test_depends_on_long_form() {
        let doc = parse(
            r#"
services:
  app:
    depends_on:
      db:
        condition: service_healthy
      cache:
        condition: service_started
"#,
        );
        let (services, issues) = extract_services(&doc);
        assert!(issues.is_empty());
        assert_eq!(services[0].depends_on, vec!["db", "cache"]);
        assert_eq!(services[0].image, "");
    }

    #[test]
    fn test_malformed_entries_degrade() {
        let doc = parse(
            r#"
services:
  broken: just-a-string
  mixed:
    image: php:8.1
    links:
      - db
      - 42
  empty:
"#,
        );
        let (services, issues) = extract_services(&doc);
        assert_eq!(services.len(), 3);

        let broken = &services[0];
        assert_eq!(broken.name, "broken");
        assert!(broken.links.is_empty());
        assert_eq!(broken.original, Value::from("just-a-string"));

        let mixed = &services[1];
        assert!(mixed.links.is_empty());
        assert_eq!(mixed.image, "php:8.1");

        assert_eq!(issues.len(), 3);
        assert_eq!(issues[1].service.as_deref(), Some("mixed"));
    }

    #[test]
    fn test_missing_services_section() {
        let (services, issues) = extract_services(&parse("version: '3'"));
        assert!(services.is_empty());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].service.is_none());
    }

    #[test]
    fn test_graph_sorted_and_lookup() {
        let doc = parse(
            r#"
services:
  web: {}
  db: {}
  php81_xdebug: {}
"#,
        );
        let (graph, _) = ServiceGraph::from_document(&doc);
        assert_eq!(graph.names(), vec!["db", "php81_xdebug", "web"]);
        assert_eq!(graph.position("web"), Some(2));
        assert!(graph.get("redis").is_none());
        assert_eq!(graph.check_depends("db").map(|s| s.name.as_str()), Some("db"));
    }

    #[test]
    fn test_missing_dependencies() {
        let doc = parse(
            r#"
services:
  web:
    links:
      - "php:php-fpm"
    depends_on:
      - db
  php: {}
"#,
        );
        let (graph, _) = ServiceGraph::from_document(&doc);
        assert_eq!(graph.missing_dependencies("web"), vec!["db"]);
        assert!(graph.missing_dependencies("php").is_empty());
    }
}
