//! Coder agent: one task per turn over a [`CoderState`] cursor.
//!
//! A turn either reports DONE (cursor past the last task, no model calls) or
//! runs the task at the cursor through the tool loop and advances the cursor
//! by exactly one.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::path::sandbox_path;
use crate::core::selector::{CoderPhase, coder_phase};
use crate::core::types::{CoderState, RunStatus, StageUpdate, TaskPlan};
use crate::io::config::{RunConfig, TaskFailurePolicy};
use crate::io::model::LanguageModel;
use crate::io::model_types::ChatMessage;
use crate::io::prompt::{CoderPromptInputs, PromptBuilder};
use crate::io::workspace::Workspace;

use super::tool_loop::{LoopOutcome, run_tool_loop};

/// A task's tool loop did not finish cleanly and the run is configured to
/// abort on that.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("task {} ({filepath}) incomplete: {reason}", .step + 1)]
pub struct TaskIncomplete {
    /// Zero-based task index.
    pub step: usize,
    pub filepath: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct CoderAgent {
    prompts: PromptBuilder,
    max_tool_rounds: u32,
    on_failure: TaskFailurePolicy,
}

impl CoderAgent {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            prompts: PromptBuilder::new(config.prompt_budget_bytes),
            max_tool_rounds: config.max_tool_rounds,
            on_failure: config.on_task_failure,
        }
    }

    /// Run one coder turn.
    ///
    /// `coder_state` is `None` on the first turn; the cursor is then created at
    /// index 0 over `task_plan`.
    #[instrument(skip_all)]
    pub fn turn<M: LanguageModel + ?Sized>(
        &self,
        model: &M,
        workspace: &Workspace,
        task_plan: &TaskPlan,
        coder_state: Option<CoderState>,
    ) -> Result<StageUpdate> {
        let mut state = coder_state.unwrap_or_else(|| CoderState::new(task_plan.clone()));
        let next = match coder_phase(Some(&state)) {
            CoderPhase::InProgress { idx, task } => Some((idx, task.clone())),
            CoderPhase::NotStarted | CoderPhase::Done => None,
        };
        let Some((idx, task)) = next else {
            return Ok(StageUpdate::Coded {
                coder_state: state,
                status: Some(RunStatus::Done),
                incomplete_step: None,
            });
        };
        let total_steps = state.total_steps();
        info!(step = idx + 1, total_steps, filepath = %task.filepath, "coding task");

        let existing = workspace.read_file(&task.filepath)?;
        let files = workspace.list_files()?;
        let system = self.prompts.coder_system()?.render();
        let prompt = self
            .prompts
            .coder_task(&CoderPromptInputs {
                step_idx: idx,
                total_steps,
                task: &task,
                plan: Some(&state.task_plan.plan),
                files: &files,
                existing: &existing,
            })?
            .render();
        let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];

        let report = run_tool_loop(model, workspace, messages, self.max_tool_rounds)?;
        let target = sandbox_path(&task.filepath)?;
        let failure = match report.outcome {
            LoopOutcome::Exhausted => Some(format!(
                "tool loop used all {} rounds",
                self.max_tool_rounds
            )),
            LoopOutcome::Finished { .. } if !report.written.contains(&target) => {
                Some("target file was not written".to_string())
            }
            LoopOutcome::Finished { .. } => None,
        };

        let incomplete_step = match failure {
            None => None,
            Some(reason) => match self.on_failure {
                TaskFailurePolicy::Abort => {
                    return Err(TaskIncomplete {
                        step: idx,
                        filepath: task.filepath,
                        reason,
                    }
                    .into());
                }
                TaskFailurePolicy::Advance => {
                    warn!(step = idx + 1, filepath = %task.filepath, %reason, "task incomplete, advancing");
                    Some(idx)
                }
            },
        };

        state.advance();
        Ok(StageUpdate::Coded {
            coder_state: state,
            status: None,
            incomplete_step,
        })
    }
}
