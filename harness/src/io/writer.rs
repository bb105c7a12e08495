//! Allow-listed file writes into the target project.
//!
//! Every edit is resolved against the project root and checked against the
//! allow-list before anything touches the disk. Containment compares path
//! components of normalized, symlink-resolved paths, so `docker-evil/` is never
//! mistaken for a child of `docker/`.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::types::FileEdit;
use crate::error::LoopError;
use crate::io::config::WriteConfig;

/// A single allow-list entry. Both kinds are absolute once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowEntry {
    /// Exactly this file.
    File(PathBuf),
    /// Any path strictly below this directory.
    Dir(PathBuf),
}

impl AllowEntry {
    fn permits(&self, target: &Path) -> bool {
        match self {
            AllowEntry::File(file) => target == file,
            AllowEntry::Dir(dir) => target != dir && target.starts_with(dir),
        }
    }
}

/// Absolute allow-list, resolved against a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<AllowEntry>,
}

impl AllowList {
    /// Resolve the relative entries of `config` against `root`.
    pub fn from_config(root: &Path, config: &WriteConfig) -> Result<Self> {
        let mut entries = Vec::new();
        for dir in &config.allow_dirs {
            entries.push(AllowEntry::Dir(resolve_path(&root.join(dir))?));
        }
        for file in &config.allow_files {
            entries.push(AllowEntry::File(resolve_path(&root.join(file))?));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[AllowEntry] {
        &self.entries
    }

    pub fn permits(&self, target: &Path) -> bool {
        self.entries.iter().any(|entry| entry.permits(target))
    }
}

/// Writes file edits under a fixed project root, refusing anything the allow-list
/// does not cover.
#[derive(Debug, Clone)]
pub struct ScopedWriter {
    root: PathBuf,
    allow: AllowList,
}

impl ScopedWriter {
    pub fn new(root: &Path, config: &WriteConfig) -> Result<Self> {
        let root = resolve_path(root)?;
        let allow = AllowList::from_config(&root, config)?;
        debug!(root = %root.display(), entries = allow.entries().len(), "scoped writer ready");
        Ok(Self { root, allow })
    }

    /// Resolve `relative` to the absolute path it would be written to.
    ///
    /// Fails with [`LoopError::OutOfBounds`] when no allow-list entry covers it.
    /// Never touches the filesystem beyond reading metadata.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let target = resolve_path(&self.root.join(relative))?;
        if !self.allow.permits(&target) {
            return Err(LoopError::OutOfBounds { path: target }.into());
        }
        Ok(target)
    }

    /// Write one edit, creating parent directories as needed and overwriting
    /// any existing file. Returns the absolute path written.
    pub fn write(&self, edit: &FileEdit) -> Result<PathBuf> {
        let target = self.resolve(&edit.path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&target, &edit.content)
            .with_context(|| format!("write {}", target.display()))?;
        info!(path = %edit.path, bytes = edit.content.len(), "wrote file");
        Ok(target)
    }

    /// Apply edits in order, calling `on_written` after each file lands.
    ///
    /// The first refusal aborts the batch; earlier writes stay on disk.
    pub fn write_all<F>(&self, edits: &[FileEdit], mut on_written: F) -> Result<Vec<PathBuf>>
    where
        F: FnMut(&FileEdit),
    {
        let mut written = Vec::with_capacity(edits.len());
        for edit in edits {
            written.push(self.write(edit)?);
            on_written(edit);
        }
        Ok(written)
    }
}

/// Normalize `.`/`..` lexically, then canonicalize the deepest existing ancestor
/// so that symlinked directories resolve to where they really point.
fn resolve_path(path: &Path) -> Result<PathBuf> {
    let normalized = normalize(path);
    let mut existing = normalized.as_path();
    let mut rest = Vec::new();
    loop {
        match fs::canonicalize(existing) {
            Ok(canonical) => {
                let mut resolved = canonical;
                for part in rest.iter().rev() {
                    resolved.push(part);
                }
                return Ok(resolved);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                    return Ok(normalized);
                };
                rest.push(name.to_os_string());
                existing = parent;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("resolve {}", existing.display()));
            }
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
