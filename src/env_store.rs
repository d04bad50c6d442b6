//! Environment variable store (`.env`)
//!
//! The store is a flat `KEY=value` text file. It is kept as text so that
//! comments and layout survive; edits are exact substring substitutions and
//! the file is always rewritten whole.

use crate::compose::emitter::write_atomic;
use crate::error::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// In-memory copy of the environment file
#[derive(Debug, Clone)]
pub struct EnvStore {
    path: PathBuf,
    content: String,
}

impl EnvStore {
    /// Store for `path` with the given content, nothing read or written
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Read `path`, falling back to `seed` when it does not exist yet.
    ///
    /// Writes always go to `path`. A missing seed yields an empty store.
    pub async fn load(path: &Path, seed: &Path) -> Result<Self> {
        let content = match read_optional(path).await? {
            Some(content) => content,
            None => {
                debug!("{} not found, seeding from {}", path.display(), seed.display());
                read_optional(seed).await?.unwrap_or_default()
            }
        };
        Ok(Self::new(path, content))
    }

    /// File the store persists to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Value of the last `key=value` line for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        let pattern = format!(r"(?m)^\s*{}=(.*?)\s*$", regex::escape(key));
        let re = Regex::new(&pattern).ok()?;
        re.captures_iter(&self.content)
            .last()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Replace every occurrence of `from` with `to`, returning how many were replaced
    pub fn substitute(&mut self, from: &str, to: &str) -> usize {
        if from.is_empty() {
            return 0;
        }
        let count = self.content.matches(from).count();
        if count > 0 {
            self.content = self.content.replace(from, to);
        }
        count
    }

    /// Replace the whole text
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Write the whole text back to disk
    pub async fn persist(&self) -> Result<()> {
        write_atomic(&self.path, self.content.as_bytes()).await
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
