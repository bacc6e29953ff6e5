//! Collection names and their storage locations.

use std::path::{Path, PathBuf};

use paperchat_core::{Error, Result};

/// File holding a collection's persisted index, inside the collection's directory.
pub const INDEX_FILE: &str = "index.json";

const MAX_NAME_LEN: usize = 128;

/// A validated collection name.
///
/// Names are kept exactly as given and restricted to `[A-Za-z0-9_.-]`, so
/// every name maps to exactly one directory under the index root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionName(String);

impl CollectionName {
    /// Resolve an optional caller-supplied name, using `default` when the
    /// name is missing or blank.
    pub fn resolve(name: Option<&str>, default: &str) -> Result<Self> {
        match name.filter(|n| !n.trim().is_empty()) {
            Some(n) => Self::parse(n),
            None => Self::parse(default),
        }
    }

    /// Validate a collection name.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() || raw.chars().count() > MAX_NAME_LEN {
            return Err(Error::invalid_input(format!(
                "collection name must be 1-{MAX_NAME_LEN} characters"
            )));
        }
        if raw == "." || raw == ".." {
            return Err(Error::invalid_input(format!(
                "'{raw}' is not a valid collection name"
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
        {
            return Err(Error::invalid_input(format!(
                "collection name '{raw}' contains invalid character {bad:?}; \
                 use letters, digits, '_', '-' or '.'"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory owned by this collection under `root`.
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    /// Path of the persisted index file under `root`.
    pub fn index_path(&self, root: &Path) -> PathBuf {
        self.dir(root).join(INDEX_FILE)
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
