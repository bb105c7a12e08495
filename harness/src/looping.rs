//! The plan → act → reflect loop behind `harness run`.
//!
//! Inputs are loaded once ([`LoopInputs::load`]) and then borrowed by every
//! iteration. Each iteration asks the model for a plan, applies the files the
//! act response names through the [`ScopedWriter`], and stops early once the
//! reflection reports `done: true`. Any fatal error ends the run immediately.

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::parse::parse_file_edits;
use crate::core::reflection::{DoneFlag, Reflection};
use crate::core::render::render;
use crate::core::types::Phase;
use crate::error::LoopError;
use crate::io::context::{
    ACCEPTANCE_CRITERIA, ContextBundle, ProjectTree, REFLECTION_RUBRIC, TASK_SPEC, Templates,
};
use crate::io::init::WorkspacePaths;
use crate::io::llm::LlmClient;
use crate::io::transcript::{IterationMeta, Transcript};
use crate::io::writer::ScopedWriter;

/// Templates, context documents and project snapshot shared by all iterations.
#[derive(Debug, Clone)]
pub struct LoopInputs {
    pub templates: Templates,
    pub context: ContextBundle,
    pub tree: ProjectTree,
}

impl LoopInputs {
    pub fn load(paths: &WorkspacePaths) -> Result<Self> {
        let inputs = Self {
            templates: Templates::load(&paths.prompts_dir)?,
            context: ContextBundle::load(&paths.agent_dir)?,
            tree: ProjectTree::snapshot_excluding(&paths.project_root, &paths.harness_owned())?,
        };
        debug!(prompts_dir = %paths.prompts_dir.display(), "loaded loop inputs");
        Ok(inputs)
    }

    pub fn plan_prompt(&self) -> Result<String> {
        Ok(render(
            self.templates.get(Phase::Plan),
            &[
                ("TASK_SPEC", self.context.get(TASK_SPEC)?),
                ("PROJECT_TREE", self.tree.as_str()),
            ],
        ))
    }

    pub fn act_prompt(&self, plan: &str) -> String {
        render(self.templates.get(Phase::Act), &[("PLAN", plan)])
    }

    pub fn reflect_prompt(&self) -> Result<String> {
        Ok(render(
            self.templates.get(Phase::Reflect),
            &[
                ("ACCEPTANCE_CRITERIA", self.context.get(ACCEPTANCE_CRITERIA)?),
                ("REFLECTION_RUBRIC", self.context.get(REFLECTION_RUBRIC)?),
            ],
        ))
    }
}

/// Progress reported to the caller while the loop runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopEvent<'a> {
    Plan { iteration: u32, text: &'a str },
    ActResponse { iteration: u32, text: &'a str },
    FileWritten { iteration: u32, path: &'a str },
    ReflectionResponse { iteration: u32, text: &'a str },
    Reflection { iteration: u32, reflection: &'a Reflection },
    /// `done` was not a boolean; the iteration counts as not done.
    DoneNotBoolean { iteration: u32, value: &'a Value },
    /// The reflection asked for another iteration.
    Continuing { iteration: u32 },
}

/// Reason why [`AgentLoop::run`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStop {
    /// The reflection of `iteration` reported `done: true`.
    Complete { iteration: u32 },
    /// Every iteration ran without the agent reporting completion.
    Exhausted { max_iterations: u32 },
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    /// Iterations that ran to completion.
    pub iterations: u32,
    pub stop: LoopStop,
}

/// One loop run over borrowed inputs.
pub struct AgentLoop<'a, C: LlmClient + ?Sized> {
    client: &'a C,
    writer: &'a ScopedWriter,
    inputs: &'a LoopInputs,
    transcript: Option<&'a Transcript>,
}

impl<'a, C: LlmClient + ?Sized> AgentLoop<'a, C> {
    pub fn new(client: &'a C, writer: &'a ScopedWriter, inputs: &'a LoopInputs) -> Self {
        Self {
            client,
            writer,
            inputs,
            transcript: None,
        }
    }

    pub fn with_transcript(mut self, transcript: &'a Transcript) -> Self {
        self.transcript = Some(transcript);
        self
    }

    /// Run up to `max_iterations` plan/act/reflect cycles.
    ///
    /// Stops early when a reflection reports `done: true`. `0` iterations
    /// makes no model calls and reports exhaustion.
    pub fn run<F>(&self, max_iterations: u32, mut on_event: F) -> Result<LoopOutcome>
    where
        F: FnMut(&LoopEvent<'_>),
    {
        for iteration in 1..=max_iterations {
            let plan = self.plan(iteration, &mut on_event)?;
            let files_written = self.act(iteration, &plan, &mut on_event)?;
            let reflection = self.reflect(iteration, &mut on_event)?;
            let done = self.decide(iteration, &reflection, &mut on_event);

            if let Some(transcript) = self.transcript {
                transcript.write_meta(&IterationMeta {
                    iteration,
                    files_written,
                    done,
                })?;
            }

            if done {
                info!(iteration, "agent reported completion");
                return Ok(LoopOutcome {
                    iterations: iteration,
                    stop: LoopStop::Complete { iteration },
                });
            }
            on_event(&LoopEvent::Continuing { iteration });
        }

        info!(max_iterations, "iteration budget exhausted");
        Ok(LoopOutcome {
            iterations: max_iterations,
            stop: LoopStop::Exhausted { max_iterations },
        })
    }

    #[instrument(skip_all, fields(iteration))]
    pub fn plan<F>(&self, iteration: u32, on_event: &mut F) -> Result<String>
    where
        F: FnMut(&LoopEvent<'_>),
    {
        let prompt = self.inputs.plan_prompt()?;
        let plan = self.call(Phase::Plan, &prompt)?;
        if let Some(transcript) = self.transcript {
            transcript.write_plan(iteration, &plan)?;
        }
        on_event(&LoopEvent::Plan {
            iteration,
            text: &plan,
        });
        Ok(plan)
    }

    /// Returns the relative paths written, in response order.
    #[instrument(skip_all, fields(iteration))]
    pub fn act<F>(&self, iteration: u32, plan: &str, on_event: &mut F) -> Result<Vec<String>>
    where
        F: FnMut(&LoopEvent<'_>),
    {
        let prompt = self.inputs.act_prompt(plan);
        let response = self.call(Phase::Act, &prompt)?;
        if let Some(transcript) = self.transcript {
            transcript.write_act(iteration, &response)?;
        }
        on_event(&LoopEvent::ActResponse {
            iteration,
            text: &response,
        });

        let edits = parse_file_edits(&response);
        if edits.is_empty() {
            return Err(LoopError::NoFileEdits.into());
        }
        debug!(files = edits.len(), "parsed act response");

        self.writer.write_all(&edits, |edit| {
            on_event(&LoopEvent::FileWritten {
                iteration,
                path: &edit.path,
            })
        })?;
        Ok(edits.into_iter().map(|edit| edit.path).collect())
    }

    #[instrument(skip_all, fields(iteration))]
    pub fn reflect<F>(&self, iteration: u32, on_event: &mut F) -> Result<Reflection>
    where
        F: FnMut(&LoopEvent<'_>),
    {
        let prompt = self.inputs.reflect_prompt()?;
        let response = self.call(Phase::Reflect, &prompt)?;
        if let Some(transcript) = self.transcript {
            transcript.write_reflection_raw(iteration, &response)?;
        }
        on_event(&LoopEvent::ReflectionResponse {
            iteration,
            text: &response,
        });

        let reflection = Reflection::parse(&response)?;
        if let Some(transcript) = self.transcript {
            transcript.write_reflection(iteration, &reflection)?;
        }
        on_event(&LoopEvent::Reflection {
            iteration,
            reflection: &reflection,
        });
        Ok(reflection)
    }

    fn decide<F>(&self, iteration: u32, reflection: &Reflection, on_event: &mut F) -> bool
    where
        F: FnMut(&LoopEvent<'_>),
    {
        let flag = reflection.done_flag();
        if flag == DoneFlag::NotBoolean {
            warn!(iteration, done = %reflection.done, "reflection done is not boolean, treating as false");
            on_event(&LoopEvent::DoneNotBoolean {
                iteration,
                value: &reflection.done,
            });
        }
        flag.is_done()
    }

    fn call(&self, phase: Phase, prompt: &str) -> Result<String> {
        debug!(%phase, prompt_bytes = prompt.len(), "calling model");
        self.client
            .complete(prompt)
            .map_err(|source| LoopError::Transport { phase, source }.into())
    }
}
