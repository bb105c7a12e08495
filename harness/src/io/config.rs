//! Harness configuration stored in `harness.toml`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "harness.toml";

/// Harness configuration (TOML).
///
/// Paths are relative to the directory holding the config file. Missing fields
/// default to the values the harness ships with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Plan/act/reflect cycles before giving up. `0` runs nothing.
    pub max_iterations: u32,

    /// Target project: snapshotted for the plan prompt and the root for writes.
    pub project_root: PathBuf,

    /// Holds the context documents and `prompts/`.
    pub agent_dir: PathBuf,

    /// Write per-iteration transcripts under `transcript_dir`.
    pub transcripts: bool,

    pub transcript_dir: PathBuf,

    pub write: WriteConfig,

    pub llm: LlmConfig,
}

/// Allow-list for the scoped writer, relative to `project_root`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WriteConfig {
    /// Directories whose descendants may be written.
    pub allow_dirs: Vec<PathBuf>,
    /// Individual files that may be written.
    pub allow_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LlmBackend {
    /// Spawn `llm.command` with the prompt on stdin.
    Command,
    /// POST to an OpenAI-compatible `/responses` endpoint.
    Responses,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: LlmBackend,

    /// Command line for the `command` backend. `{response_file}` in any
    /// argument is replaced by a temp file the command must write its answer to.
    pub command: Vec<String>,

    /// Per-call wall-clock limit in seconds.
    pub timeout_secs: u64,

    /// Reject command responses larger than this many bytes.
    pub output_limit_bytes: usize,

    pub model: String,
    pub max_output_tokens: u32,
    pub base_url: String,

    /// Environment variable holding the bearer token for the `responses` backend.
    pub api_key_env: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            project_root: PathBuf::from("."),
            agent_dir: PathBuf::from("agent"),
            transcripts: true,
            transcript_dir: PathBuf::from(".harness/runs"),
            write: WriteConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            allow_dirs: vec![PathBuf::from("docker")],
            allow_files: vec![PathBuf::from("README.md")],
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Command,
            command: [
                "codex",
                "exec",
                "--skip-git-repo-check",
                "--output-last-message",
                "{response_file}",
                "-",
            ]
            .iter()
            .map(|arg| arg.to_string())
            .collect(),
            timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
            model: "gpt-4.1".to_string(),
            max_output_tokens: 800,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.llm.timeout_secs == 0 {
            return Err(anyhow!("llm.timeout_secs must be > 0"));
        }
        if self.llm.output_limit_bytes == 0 {
            return Err(anyhow!("llm.output_limit_bytes must be > 0"));
        }
        match self.llm.backend {
            LlmBackend::Command => {
                if self.llm.command.is_empty() || self.llm.command[0].trim().is_empty() {
                    return Err(anyhow!("llm.command must be a non-empty array"));
                }
            }
            LlmBackend::Responses => {
                if self.llm.model.trim().is_empty() {
                    return Err(anyhow!("llm.model must be set for the responses backend"));
                }
                if self.llm.base_url.trim().is_empty() {
                    return Err(anyhow!("llm.base_url must be set for the responses backend"));
                }
            }
        }
        for entry in self.write.allow_dirs.iter().chain(&self.write.allow_files) {
            validate_allow_entry(entry)?;
        }
        Ok(())
    }
}

fn validate_allow_entry(entry: &Path) -> Result<()> {
    if entry.as_os_str().is_empty() {
        return Err(anyhow!("write allow-list entries must be non-empty"));
    }
    if entry.is_absolute() {
        return Err(anyhow!(
            "write allow-list entry {} must be relative to project_root",
            entry.display()
        ));
    }
    if entry.components().any(|c| c == Component::ParentDir) {
        return Err(anyhow!(
            "write allow-list entry {} must not contain '..'",
            entry.display()
        ));
    }
    Ok(())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
