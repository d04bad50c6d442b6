//! Writes the deployment document for a chosen set of services

use super::graph::{ServiceGraph, SERVICES_KEY};
use super::parser::ComposeParser;
use super::tree;
use crate::error::{DevenvError, Result};
use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A rendered deployment document
#[derive(Debug, Clone)]
pub struct Rendered {
    /// The filtered document
    pub document: Value,
    /// Services written, in graph order
    pub emitted: Vec<String>,
    /// Requested names with no template service
    pub skipped: Vec<String>,
}

/// Result of a successful materialization
#[derive(Debug, Clone)]
pub struct MaterializeOutcome {
    /// Where the document was written
    pub path: PathBuf,
    /// Services written, in graph order
    pub emitted: Vec<String>,
    /// Requested names with no template service
    pub skipped: Vec<String>,
    /// SHA-256 of the written bytes, hex encoded
    pub digest: String,
}

/// Build a copy of `template` whose `services` hold only the requested ones.
///
/// Each emitted entry is the service's original definition. Unknown names
/// are left out without failing.
pub fn render<I, S>(template: &Value, graph: &ServiceGraph, requested: I) -> Result<Rendered>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let requested: BTreeSet<String> = requested
        .into_iter()
        .map(|name| name.as_ref().to_string())
        .collect();

    let mut selected = Mapping::new();
    let mut emitted = Vec::new();
    for service in graph.iter().filter(|s| requested.contains(&s.name)) {
        selected.insert(Value::from(service.name.clone()), service.original.clone());
        emitted.push(service.name.clone());
    }

    let skipped: Vec<String> = requested
        .into_iter()
        .filter(|name| !graph.contains(name))
        .collect();

    let mut document = template.clone();
    match tree::find_mut(&mut document, SERVICES_KEY) {
        Some(node) => *node = Value::Mapping(selected),
        None => match &mut document {
            Value::Mapping(root) => {
                root.insert(Value::from(SERVICES_KEY), Value::Mapping(selected));
            }
            _ => {
                return Err(DevenvError::Structural(
                    "template root is not a mapping".to_string(),
                ))
            }
        },
    }

    Ok(Rendered {
        document,
        emitted,
        skipped,
    })
}

/// Render and atomically replace the deployment document at `path`
pub async fn materialize<I, S>(
    template: &Value,
    graph: &ServiceGraph,
    requested: I,
    path: &Path,
) -> Result<MaterializeOutcome>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let rendered = render(template, graph, requested)?;
    for name in &rendered.skipped {
        warn!("Requested service '{}' is not in the template, skipping", name);
    }

    let text = ComposeParser::to_string(&rendered.document)?;
    write_atomic(path, text.as_bytes()).await?;
    debug!(
        "Wrote {} services to {}",
        rendered.emitted.len(),
        path.display()
    );

    Ok(MaterializeOutcome {
        path: path.to_path_buf(),
        emitted: rendered.emitted,
        skipped: rendered.skipped,
        digest: digest(text.as_bytes()),
    })
}

/// Write `bytes` to a fresh temporary file next to `path` and rename it over `path`.
///
/// The temporary file is removed when the rename fails. An existing file
/// keeps its permissions.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await?;

    let path = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".devenv-")
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        tmp.write_all(&bytes)?;
        if let Ok(metadata) = std::fs::metadata(&path) {
            tmp.as_file().set_permissions(metadata.permissions())?;
        }
        tmp.persist(&path).map_err(|e| DevenvError::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| DevenvError::Io(std::io::Error::other(e)))?
}

/// Hex encoded SHA-256 of `bytes`
pub fn digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
