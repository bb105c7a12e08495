//! Test-only helpers: a scripted model client and a scratch workspace.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::types::Phase;
use crate::io::config::{CONFIG_FILE, HarnessConfig};
use crate::io::context::{ACCEPTANCE_CRITERIA, REFLECTION_RUBRIC, TASK_SPEC};
use crate::io::init::WorkspacePaths;
use crate::io::llm::LlmClient;
use crate::io::writer::ScopedWriter;
use crate::looping::LoopInputs;

/// Client that replays queued responses in order and records every prompt.
///
/// `Err(message)` entries fail the call with that message. Calling past the
/// end of the script is an error.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    responses: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedClient {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(responses.into_iter().map(|text| Ok(text.into())).collect())
    }

    pub fn with_results(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            prompts: RefCell::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl LlmClient for ScriptedClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted client has no response left")),
        }
    }
}

/// Reflection JSON with every required key and the given `done` value.
pub fn reflection_json(done: serde_json::Value) -> String {
    serde_json::json!({
        "scores": {"clarity": 3},
        "acceptance_met": false,
        "issues": [],
        "confidence": 0.5,
        "done": done,
    })
    .to_string()
}

/// Scratch workspace with small templates, context documents and a target
/// project holding `train.py`, laid out like `harness init` with
/// `project_root = "project"`.
pub struct TestProject {
    temp: TempDir,
    paths: WorkspacePaths,
    config: HarnessConfig,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let config = HarnessConfig {
            project_root: PathBuf::from("project"),
            ..HarnessConfig::default()
        };
        let paths = WorkspacePaths::new(temp.path().join(CONFIG_FILE), &config);

        write(
            &paths.template_path(Phase::Plan),
            "PLAN\n{{TASK_SPEC}}\n{{PROJECT_TREE}}",
        )?;
        write(&paths.template_path(Phase::Act), "ACT\n{{PLAN}}")?;
        write(
            &paths.template_path(Phase::Reflect),
            "REFLECT\n{{ACCEPTANCE_CRITERIA}}\n{{REFLECTION_RUBRIC}}",
        )?;
        write(&paths.agent_dir.join(TASK_SPEC), "Build a Docker image.")?;
        write(&paths.agent_dir.join(ACCEPTANCE_CRITERIA), "Image builds.")?;
        write(&paths.agent_dir.join(REFLECTION_RUBRIC), "Score clarity.")?;
        write(&paths.project_root.join("train.py"), "print('train')\n")?;

        Ok(Self {
            temp,
            paths,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn project_root(&self) -> &Path {
        &self.paths.project_root
    }

    pub fn inputs(&self) -> Result<LoopInputs> {
        LoopInputs::load(&self.paths)
    }

    pub fn writer(&self) -> Result<ScopedWriter> {
        ScopedWriter::new(&self.paths.project_root, &self.config.write)
    }
}

fn write(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
