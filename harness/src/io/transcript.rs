//! Per-run transcripts under `<transcript_dir>/<run-id>/<iteration>/`.
//!
//! Raw model responses are written before they are parsed, so an iteration that
//! fails on malformed output still leaves its evidence behind.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::reflection::Reflection;

/// Summary written as `meta.json` once an iteration has been decided.
#[derive(Debug, Clone, Serialize)]
pub struct IterationMeta {
    pub iteration: u32,
    pub files_written: Vec<String>,
    pub done: bool,
}

#[derive(Debug, Clone)]
pub struct IterationPaths {
    pub dir: PathBuf,
    pub plan_path: PathBuf,
    pub act_path: PathBuf,
    pub reflection_raw_path: PathBuf,
    pub reflection_path: PathBuf,
    pub meta_path: PathBuf,
}

impl IterationPaths {
    pub fn new(run_dir: &Path, iteration: u32) -> Self {
        let dir = run_dir.join(iteration.to_string());
        Self {
            dir: dir.clone(),
            plan_path: dir.join("plan.md"),
            act_path: dir.join("act.md"),
            reflection_raw_path: dir.join("reflection.txt"),
            reflection_path: dir.join("reflection.json"),
            meta_path: dir.join("meta.json"),
        }
    }
}

/// Writer for one run's transcript directory.
#[derive(Debug, Clone)]
pub struct Transcript {
    run_dir: PathBuf,
}

impl Transcript {
    /// Start a transcript in a fresh `run-<unix-millis>` directory under `base`.
    pub fn create(base: &Path) -> Result<Self> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        Self::with_run_id(base, &format!("run-{millis}"))
    }

    pub fn with_run_id(base: &Path, run_id: &str) -> Result<Self> {
        let run_dir = base.join(run_id);
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("create transcript dir {}", run_dir.display()))?;
        Ok(Self { run_dir })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn paths(&self, iteration: u32) -> IterationPaths {
        IterationPaths::new(&self.run_dir, iteration)
    }

    pub fn write_plan(&self, iteration: u32, plan: &str) -> Result<()> {
        write_text(&self.paths(iteration).plan_path, plan)
    }

    pub fn write_act(&self, iteration: u32, response: &str) -> Result<()> {
        write_text(&self.paths(iteration).act_path, response)
    }

    pub fn write_reflection_raw(&self, iteration: u32, response: &str) -> Result<()> {
        write_text(&self.paths(iteration).reflection_raw_path, response)
    }

    pub fn write_reflection(&self, iteration: u32, reflection: &Reflection) -> Result<()> {
        write_json(&self.paths(iteration).reflection_path, reflection)
    }

    pub fn write_meta(&self, meta: &IterationMeta) -> Result<()> {
        write_json(&self.paths(meta.iteration).meta_path, meta)
    }
}

fn write_text(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create transcript dir {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    write_text(path, &buf)
}
