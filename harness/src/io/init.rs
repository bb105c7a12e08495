//! Workspace layout and `harness init` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use super::config::{HarnessConfig, write_config};
use super::context::{ACCEPTANCE_CRITERIA, REFLECTION_RUBRIC, TASK_SPEC, template_path};
use crate::core::types::Phase;

const PLAN_TEMPLATE: &str = include_str!("../../prompts/plan.md");
const ACT_TEMPLATE: &str = include_str!("../../prompts/act.md");
const REFLECT_TEMPLATE: &str = include_str!("../../prompts/reflect.md");

const TASK_SPEC_PLACEHOLDER: &str = "# Task\n\nDescribe what the agent should build.\n";
const ACCEPTANCE_PLACEHOLDER: &str =
    "# Acceptance criteria\n\n- List the conditions that make the task complete.\n";
const RUBRIC_PLACEHOLDER: &str =
    "# Reflection rubric\n\n- List the dimensions the reflection should score.\n";

/// Paths of a harness workspace, resolved from its config file location.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub project_root: PathBuf,
    pub agent_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub transcript_dir: PathBuf,
}

impl WorkspacePaths {
    /// Paths in `config` are joined onto the directory holding `config_path`.
    pub fn new(config_path: impl Into<PathBuf>, config: &HarnessConfig) -> Self {
        let config_path = config_path.into();
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let agent_dir = root.join(&config.agent_dir);
        Self {
            config_path,
            project_root: root.join(&config.project_root),
            prompts_dir: agent_dir.join("prompts"),
            agent_dir,
            transcript_dir: root.join(&config.transcript_dir),
            root,
        }
    }

    pub fn template_path(&self, phase: Phase) -> PathBuf {
        template_path(&self.prompts_dir, phase)
    }

    /// Harness-owned paths, left out of the project snapshot when
    /// `project_root` contains them.
    pub fn harness_owned(&self) -> [&Path; 3] {
        [&self.config_path, &self.agent_dir, &self.transcript_dir]
    }
}

/// Options for [`init_workspace`].
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Overwrite existing config, documents and templates.
    pub force: bool,
}

/// Scaffold the config file at `config_path`, plus the context documents and
/// the default prompt templates next to it.
///
/// Fails if any of those files already exists unless `options.force` is set.
pub fn init_workspace(config_path: &Path, options: &InitOptions) -> Result<WorkspacePaths> {
    let config = HarnessConfig::default();
    let paths = WorkspacePaths::new(config_path, &config);
    let files = scaffold_files(&paths);

    if !options.force {
        if let Some((existing, _)) = files.iter().find(|(path, _)| path.exists()) {
            return Err(anyhow!(
                "harness init: {} already exists (use --force to overwrite)",
                existing.display()
            ));
        }
    }

    write_config(&paths.config_path, &config)?;
    for (path, contents) in &files[1..] {
        write_file(path, contents)?;
    }
    create_dir(&paths.project_root)?;

    Ok(paths)
}

/// Every file `init` owns, config first.
fn scaffold_files(paths: &WorkspacePaths) -> Vec<(PathBuf, &'static str)> {
    vec![
        (paths.config_path.clone(), ""),
        (paths.agent_dir.join(TASK_SPEC), TASK_SPEC_PLACEHOLDER),
        (paths.agent_dir.join(ACCEPTANCE_CRITERIA), ACCEPTANCE_PLACEHOLDER),
        (paths.agent_dir.join(REFLECTION_RUBRIC), RUBRIC_PLACEHOLDER),
        (paths.template_path(Phase::Plan), PLAN_TEMPLATE),
        (paths.template_path(Phase::Act), ACT_TEMPLATE),
        (paths.template_path(Phase::Reflect), REFLECT_TEMPLATE),
    ]
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("write file {}", path.display()))
}
