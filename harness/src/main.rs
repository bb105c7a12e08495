//! Plan → act → reflect agent loop harness.
//!
//! Reads `harness.toml`, loads the agent's context documents and prompt
//! templates once, then drives the model through plan, act and reflect phases
//! until it reports completion or the iteration budget is exhausted.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use harness::core::types::Phase;
use harness::exit_codes;
use harness::io::config::{CONFIG_FILE, HarnessConfig, load_config};
use harness::io::context::ProjectTree;
use harness::io::init::{InitOptions, WorkspacePaths, init_workspace};
use harness::io::llm::build_client;
use harness::io::transcript::Transcript;
use harness::io::writer::ScopedWriter;
use harness::logging;
use harness::looping::{AgentLoop, LoopEvent, LoopInputs, LoopStop};

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Plan/act/reflect agent loop over a target project"
)]
struct Cli {
    /// Config file; workspace paths are relative to its directory.
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the loop until the agent reports completion or iterations run out.
    Run {
        /// Override `max_iterations` from the config file.
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Do not write transcripts for this run.
        #[arg(long)]
        no_transcript: bool,
    },
    /// Print the rendered prompt for one phase without calling the model.
    Render {
        #[arg(value_enum)]
        phase: PhaseArg,
        /// Plan text substituted into the act prompt.
        #[arg(long)]
        plan_file: Option<PathBuf>,
    },
    /// Print the project file listing the plan prompt sees.
    Tree,
    /// Create `harness.toml`, context documents and default prompt templates.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PhaseArg {
    Plan,
    Act,
    Reflect,
}

impl From<PhaseArg> for Phase {
    fn from(phase: PhaseArg) -> Self {
        match phase {
            PhaseArg::Plan => Phase::Plan,
            PhaseArg::Act => Phase::Act,
            PhaseArg::Reflect => Phase::Reflect,
        }
    }
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config_path = std::path::absolute(&cli.config)
        .with_context(|| format!("resolve {}", cli.config.display()))?;
    match cli.command {
        Command::Run {
            max_iterations,
            no_transcript,
        } => cmd_run(&config_path, max_iterations, no_transcript),
        Command::Render { phase, plan_file } => {
            cmd_render(&config_path, phase.into(), plan_file.as_deref())
        }
        Command::Tree => cmd_tree(&config_path),
        Command::Init { force } => cmd_init(&config_path, force),
    }
}

fn load_workspace(config_path: &Path) -> Result<(HarnessConfig, WorkspacePaths)> {
    let config = load_config(config_path)?;
    let paths = WorkspacePaths::new(config_path, &config);
    Ok((config, paths))
}

fn cmd_run(config_path: &Path, max_iterations: Option<u32>, no_transcript: bool) -> Result<i32> {
    let (config, paths) = load_workspace(config_path)?;
    let max_iterations = max_iterations.unwrap_or(config.max_iterations);

    let inputs = LoopInputs::load(&paths)?;
    let writer = ScopedWriter::new(&paths.project_root, &config.write)?;
    let client = build_client(&config.llm, paths.project_root.clone())?;
    let transcript = if config.transcripts && !no_transcript {
        Some(Transcript::create(&paths.transcript_dir)?)
    } else {
        None
    };

    let mut agent = AgentLoop::new(&*client, &writer, &inputs);
    if let Some(transcript) = &transcript {
        agent = agent.with_transcript(transcript);
    }

    let outcome = agent.run(max_iterations, print_event)?;
    if let Some(transcript) = &transcript {
        println!("Transcript: {}", transcript.run_dir().display());
    }
    match outcome.stop {
        LoopStop::Complete { .. } => {
            println!("\nAgent reports task complete.");
            Ok(exit_codes::OK)
        }
        LoopStop::Exhausted { .. } => {
            println!("Max iterations reached without completion.");
            Ok(exit_codes::EXHAUSTED)
        }
    }
}

fn print_event(event: &LoopEvent<'_>) {
    match event {
        LoopEvent::Plan { iteration, text } => {
            println!("\n=== Iteration {iteration} ===");
            println!("\n--- AGENT PLAN ---\n");
            println!("{text}");
        }
        LoopEvent::ActResponse { text, .. } => {
            println!("\n--- AGENT ACT RESPONSE ---\n");
            println!("{text}");
        }
        LoopEvent::FileWritten { path, .. } => println!("[agent_act] Wrote {path}"),
        LoopEvent::ReflectionResponse { text, .. } => {
            println!("\n--- AGENT REFLECTION RESPONSE ---\n");
            println!("{text}");
        }
        LoopEvent::Reflection { reflection, .. } => {
            println!("\n--- REFLECTION SUMMARY ---");
            println!("{}", reflection.summary());
        }
        LoopEvent::DoneNotBoolean { value, .. } => {
            println!("Warning: reflection \"done\" is not boolean: {value}. Treating as false.");
        }
        LoopEvent::Continuing { .. } => {
            println!("\nAgent indicates further improvement needed. Continuing loop.");
        }
    }
}

fn cmd_render(config_path: &Path, phase: Phase, plan_file: Option<&Path>) -> Result<i32> {
    let (_, paths) = load_workspace(config_path)?;
    let inputs = LoopInputs::load(&paths)?;
    let prompt = match phase {
        Phase::Plan => inputs.plan_prompt()?,
        Phase::Act => {
            let plan = match plan_file {
                Some(path) => fs::read_to_string(path)
                    .with_context(|| format!("read plan {}", path.display()))?,
                None => String::new(),
            };
            inputs.act_prompt(&plan)
        }
        Phase::Reflect => inputs.reflect_prompt()?,
    };
    println!("{prompt}");
    Ok(exit_codes::OK)
}

fn cmd_tree(config_path: &Path) -> Result<i32> {
    let (_, paths) = load_workspace(config_path)?;
    let tree = ProjectTree::snapshot_excluding(&paths.project_root, &paths.harness_owned())?;
    if !tree.as_str().is_empty() {
        println!("{}", tree.as_str());
    }
    Ok(exit_codes::OK)
}

fn cmd_init(config_path: &Path, force: bool) -> Result<i32> {
    let paths = init_workspace(config_path, &InitOptions { force })?;
    println!("Initialized harness workspace in {}", paths.root.display());
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::parse_from(["harness", "run"]);
        assert_eq!(cli.config, PathBuf::from(CONFIG_FILE));
        assert!(matches!(
            cli.command,
            Command::Run {
                max_iterations: None,
                no_transcript: false
            }
        ));
    }

    #[test]
    fn parse_run_overrides() {
        let cli = Cli::parse_from([
            "harness",
            "run",
            "--max-iterations",
            "3",
            "--no-transcript",
            "--config",
            "other.toml",
        ]);
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert!(matches!(
            cli.command,
            Command::Run {
                max_iterations: Some(3),
                no_transcript: true
            }
        ));
    }

    #[test]
    fn parse_render_phase() {
        let cli = Cli::parse_from(["harness", "render", "reflect"]);
        match cli.command {
            Command::Render { phase, plan_file } => {
                assert_eq!(Phase::from(phase), Phase::Reflect);
                assert!(plan_file.is_none());
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["harness", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }
}
