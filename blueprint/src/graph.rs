//! Orchestration: planner -> architect -> coder (self-loop until DONE).
//!
//! The coder edge is a bounded loop. Every coder turn, including the final one
//! that only observes DONE, counts against `max_coder_turns`.

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::agents::architect::ArchitectAgent;
use crate::agents::coder::CoderAgent;
use crate::agents::planner::PlannerAgent;
use crate::core::budget::{TurnBudget, turns_required};
use crate::core::types::{CoderState, ImplementationTask, Plan, RunState, StageUpdate, TaskPlan};
use crate::io::config::RunConfig;
use crate::io::model::LanguageModel;
use crate::io::workspace::Workspace;

/// The coder needed more turns than the run allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error(
    "iteration limit of {limit} coder turns reached with {completed_steps}/{total_steps} tasks done"
)]
pub struct IterationLimitExceeded {
    pub limit: u32,
    pub completed_steps: usize,
    pub total_steps: usize,
}

/// Input for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInput {
    pub user_prompt: String,
    pub max_coder_turns: u32,
}

/// Progress notification emitted after each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageEvent<'a> {
    Planned(&'a Plan),
    Architected(&'a TaskPlan),
    /// A task finished; `incomplete` is set when it was flagged and skipped.
    Coded {
        idx: usize,
        total: usize,
        task: &'a ImplementationTask,
        incomplete: bool,
    },
    Done {
        total: usize,
        incomplete: &'a [usize],
    },
}

/// Run the pipeline to completion.
///
/// With `resume`, planning and architecture are skipped and the coder
/// continues from the given cursor.
#[instrument(skip_all, fields(max_coder_turns = input.max_coder_turns, resume = resume.is_some()))]
pub fn run<M: LanguageModel + ?Sized>(
    input: &RunInput,
    model: &M,
    workspace: &Workspace,
    config: &RunConfig,
    resume: Option<CoderState>,
    on_event: &mut dyn FnMut(&StageEvent<'_>),
) -> Result<RunState> {
    let mut state = RunState::new(input.user_prompt.clone());

    let task_plan = match resume {
        Some(coder_state) => {
            info!(
                step = coder_state.current_step_idx,
                total = coder_state.total_steps(),
                "resuming coder"
            );
            let task_plan = coder_state.task_plan.clone();
            state.apply(StageUpdate::Planned {
                plan: task_plan.plan.clone(),
            });
            state.apply(StageUpdate::Architected {
                task_plan: task_plan.clone(),
            });
            state.coder_state = Some(coder_state);
            task_plan
        }
        None => {
            let plan = PlannerAgent::new(config.prompt_budget_bytes).run(model, &input.user_prompt)?;
            on_event(&StageEvent::Planned(&plan));
            state.apply(StageUpdate::Planned { plan: plan.clone() });

            let task_plan = ArchitectAgent::new(config.prompt_budget_bytes).run(model, &plan)?;
            on_event(&StageEvent::Architected(&task_plan));
            state.apply(StageUpdate::Architected {
                task_plan: task_plan.clone(),
            });
            task_plan
        }
    };

    let total = task_plan.implementation_steps.len();
    let start = state
        .coder_state
        .as_ref()
        .map_or(0, |c| c.current_step_idx);
    let required = turns_required(total, start);
    if required > input.max_coder_turns as usize {
        warn!(
            required,
            limit = input.max_coder_turns,
            "task plan needs more coder turns than allowed"
        );
    }

    let coder = CoderAgent::new(config);
    let mut budget = TurnBudget::new(input.max_coder_turns);
    while !state.is_done() {
        if !budget.try_consume() {
            let completed_steps = state
                .coder_state
                .as_ref()
                .map_or(0, |c| c.current_step_idx.min(total));
            return Err(IterationLimitExceeded {
                limit: budget.limit(),
                completed_steps,
                total_steps: total,
            }
            .into());
        }

        let update = coder.turn(model, workspace, &task_plan, state.coder_state.take())?;
        state.apply(update);

        if state.is_done() {
            on_event(&StageEvent::Done {
                total,
                incomplete: &state.incomplete_steps,
            });
        } else if let Some(idx) = state
            .coder_state
            .as_ref()
            .and_then(|c| c.current_step_idx.checked_sub(1))
        {
            if let Some(task) = task_plan.implementation_steps.get(idx) {
                on_event(&StageEvent::Coded {
                    idx,
                    total,
                    task,
                    incomplete: state.incomplete_steps.last() == Some(&idx),
                });
            }
        }
    }

    info!(turns = budget.used(), tasks = total, "run complete");
    Ok(state)
}
