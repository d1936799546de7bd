//! Snapshot persistence for the novel tree.
//!
//! The JSON snapshot is the only state shared between pipeline stages:
//! each stage loads it, mutates the novel in memory and rewrites it whole.

use crate::error::StoreError;
use crate::novel::Novel;
use std::path::{Path, PathBuf};

/// Snapshot filename.
const NOVEL_JSON: &str = "novel.json";

/// Compiled markdown filename.
const NOVEL_MD: &str = "novel.md";

/// Packaged e-book filename.
const NOVEL_EPUB: &str = "novel.epub";

/// Output locations for one novel, derived from `directory/novel_code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NovelPaths {
    root: PathBuf,
}

impl NovelPaths {
    pub fn new(directory: &Path, novel_code: &str) -> Self {
        Self {
            root: directory.join(novel_code),
        }
    }

    /// Directory holding every file of this novel.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the JSON snapshot.
    pub fn json(&self) -> PathBuf {
        self.root.join(NOVEL_JSON)
    }

    /// Path of the compiled markdown.
    pub fn markdown(&self) -> PathBuf {
        self.root.join(NOVEL_MD)
    }

    /// Path of the EPUB.
    pub fn epub(&self) -> PathBuf {
        self.root.join(NOVEL_EPUB)
    }
}

/// Normalizes the novel's text in place and writes it as JSON.
pub fn save(novel: &mut Novel, path: &Path) -> Result<(), StoreError> {
    novel.make_printable();

    let json = serde_json::to_string_pretty(novel)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(path, json).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and validates a snapshot.
pub fn load(path: &Path) -> Result<Novel, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let novel: Novel = serde_json::from_str(&content)?;
    novel.validate()?;
    Ok(novel)
}
