//! Static loop inputs read once before the first iteration.
//!
//! - [`ContextBundle`]: task spec, acceptance criteria, reflection rubric.
//! - [`ProjectTree`]: sorted file listing of the target project.
//! - [`Templates`]: the `plan`, `act` and `reflect` prompt templates.
//!
//! None of these expose mutation; the loop only ever borrows them.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;
use walkdir::WalkDir;

use crate::core::types::Phase;

pub const TASK_SPEC: &str = "task_spec.md";
pub const ACCEPTANCE_CRITERIA: &str = "acceptance_criteria.md";
pub const REFLECTION_RUBRIC: &str = "reflection_rubric.md";

/// Documents loaded into every bundle, in load order.
pub const CONTEXT_DOCUMENTS: [&str; 3] = [TASK_SPEC, ACCEPTANCE_CRITERIA, REFLECTION_RUBRIC];

/// Named context documents and their full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBundle {
    docs: BTreeMap<String, String>,
}

impl ContextBundle {
    /// Read every document in [`CONTEXT_DOCUMENTS`] from `agent_dir`.
    pub fn load(agent_dir: &Path) -> Result<Self> {
        let mut docs = BTreeMap::new();
        for name in CONTEXT_DOCUMENTS {
            let path = agent_dir.join(name);
            let text = fs::read_to_string(&path)
                .with_context(|| format!("read context document {}", path.display()))?;
            docs.insert(name.to_string(), text);
        }
        debug!(agent_dir = %agent_dir.display(), docs = docs.len(), "loaded context bundle");
        Ok(Self { docs })
    }

    pub fn get(&self, name: &str) -> Result<&str> {
        self.docs
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("context document {name} is not loaded"))
    }
}

/// Newline-joined, sorted list of files under the project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTree(String);

impl ProjectTree {
    /// Walk `root` and list every file relative to it with `/` separators.
    ///
    /// Directories are omitted, including symlinks that resolve to one; such
    /// links are not descended into. `excluded` paths and everything below them
    /// are skipped, which keeps the harness's own files out of the listing when
    /// they live inside the project.
    pub fn snapshot_excluding(root: &Path, excluded: &[&Path]) -> Result<Self> {
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !excluded.iter().any(|path| entry.path() == *path));
        for entry in walker {
            let entry =
                entry.with_context(|| format!("walk project tree {}", root.display()))?;
            if entry.file_type().is_dir() || entry.path().is_dir() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .with_context(|| format!("relativize {}", entry.path().display()))?;
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
        files.sort();
        debug!(root = %root.display(), files = files.len(), "captured project tree");
        Ok(Self(files.join("\n")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The three phase templates, keyed by phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    plan: String,
    act: String,
    reflect: String,
}

impl Templates {
    /// Load `<prompts_dir>/{plan,act,reflect}.md`.
    pub fn load(prompts_dir: &Path) -> Result<Self> {
        Ok(Self {
            plan: read_template(prompts_dir, Phase::Plan)?,
            act: read_template(prompts_dir, Phase::Act)?,
            reflect: read_template(prompts_dir, Phase::Reflect)?,
        })
    }

    pub fn get(&self, phase: Phase) -> &str {
        match phase {
            Phase::Plan => &self.plan,
            Phase::Act => &self.act,
            Phase::Reflect => &self.reflect,
        }
    }
}

/// Path of the template file for `phase`.
pub fn template_path(prompts_dir: &Path, phase: Phase) -> PathBuf {
    prompts_dir.join(format!("{}.md", phase.as_str()))
}

fn read_template(prompts_dir: &Path, phase: Phase) -> Result<String> {
    let path = template_path(prompts_dir, phase);
    fs::read_to_string(&path).with_context(|| format!("read {phase} template {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_loads_all_documents() {
        let temp = tempfile::tempdir().expect("tempdir");
        for name in CONTEXT_DOCUMENTS {
            fs::write(temp.path().join(name), format!("body of {name}")).expect("write");
        }

        let bundle = ContextBundle::load(temp.path()).expect("load");
        assert_eq!(bundle.get(TASK_SPEC).expect("spec"), "body of task_spec.md");
        assert_eq!(
            bundle.get(REFLECTION_RUBRIC).expect("rubric"),
            "body of reflection_rubric.md"
        );
        assert!(bundle.get("other.md").is_err());
    }

    #[test]
    fn bundle_load_names_missing_document() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join(TASK_SPEC), "spec").expect("write");

        let err = ContextBundle::load(temp.path()).unwrap_err();
        assert!(format!("{err:#}").contains(ACCEPTANCE_CRITERIA));
    }

    #[test]
    fn tree_lists_files_sorted_and_relative() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("src/nested")).expect("dirs");
        fs::create_dir_all(root.join("empty")).expect("empty dir");
        fs::write(root.join("src/train.py"), "").expect("write");
        fs::write(root.join("src/nested/data.py"), "").expect("write");
        fs::write(root.join("README.md"), "").expect("write");
        fs::write(root.join("Dockerfile"), "").expect("write");

        let tree = ProjectTree::snapshot_excluding(root, &[]).expect("snapshot");
        assert_eq!(
            tree.as_str(),
            "Dockerfile\nREADME.md\nsrc/nested/data.py\nsrc/train.py"
        );
    }

    #[test]
    fn tree_skips_excluded_paths() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir_all(root.join("agent/prompts")).expect("agent dir");
        fs::create_dir_all(root.join(".harness/runs/run-1/1")).expect("runs dir");
        fs::write(root.join("agent/prompts/plan.md"), "").expect("write");
        fs::write(root.join(".harness/runs/run-1/1/act.md"), "").expect("write");
        fs::write(root.join("harness.toml"), "").expect("write");
        fs::write(root.join("agent.py"), "").expect("write");
        fs::write(root.join("train.py"), "").expect("write");

        let tree = ProjectTree::snapshot_excluding(
            root,
            &[
                &root.join("agent"),
                &root.join(".harness/runs"),
                &root.join("harness.toml"),
            ],
        )
        .expect("snapshot");
        assert_eq!(tree.as_str(), "agent.py\ntrain.py");
    }

    #[cfg(unix)]
    #[test]
    fn tree_omits_symlinked_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("project");
        let data = temp.path().join("data");
        fs::create_dir_all(&root).expect("project dir");
        fs::create_dir_all(&data).expect("data dir");
        fs::write(data.join("mnist.bin"), "").expect("write");
        fs::write(root.join("train.py"), "").expect("write");
        std::os::unix::fs::symlink(&data, root.join("data")).expect("dir link");
        std::os::unix::fs::symlink(root.join("train.py"), root.join("main.py"))
            .expect("file link");

        let tree = ProjectTree::snapshot_excluding(&root, &[]).expect("snapshot");
        assert_eq!(tree.as_str(), "main.py\ntrain.py");
    }

    #[test]
    fn tree_of_empty_project_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tree = ProjectTree::snapshot_excluding(temp.path(), &[]).expect("snapshot");
        assert_eq!(tree.as_str(), "");
    }

    #[test]
    fn templates_load_by_phase_name() {
        let temp = tempfile::tempdir().expect("tempdir");
        for phase in [Phase::Plan, Phase::Act, Phase::Reflect] {
            fs::write(template_path(temp.path(), phase), format!("{phase} {{{{X}}}}"))
                .expect("write");
        }

        let templates = Templates::load(temp.path()).expect("load");
        assert_eq!(templates.get(Phase::Plan), "plan {{X}}");
        assert_eq!(templates.get(Phase::Reflect), "reflect {{X}}");
    }

    #[test]
    fn missing_template_is_reported() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(template_path(temp.path(), Phase::Plan), "plan").expect("write");

        let err = Templates::load(temp.path()).unwrap_err();
        assert!(err.to_string().contains("act template"));
    }
}
