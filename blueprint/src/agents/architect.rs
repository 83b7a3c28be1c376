//! Architect agent: [`Plan`] to ordered [`TaskPlan`].

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, instrument};

use crate::core::invariants::validate_tasks;
use crate::core::types::{ArchitectOutput, Plan, TaskPlan};
use crate::io::model::{LanguageModel, StructuredRequest};
use crate::io::model_types::ChatMessage;
use crate::io::prompt::PromptBuilder;

use super::{check_invariants, coerce, load_schema};

const TASK_PLAN_SCHEMA: &str = include_str!("../../schemas/task_plan.schema.json");

/// Contract name the architect output is bound to.
pub const TASK_PLAN_CONTRACT: &str = "TaskPlan";

#[derive(Debug, Clone)]
pub struct ArchitectAgent {
    schema: Value,
    prompts: PromptBuilder,
}

impl ArchitectAgent {
    pub fn new(prompt_budget_bytes: usize) -> Self {
        Self {
            schema: load_schema(TASK_PLAN_SCHEMA),
            prompts: PromptBuilder::new(prompt_budget_bytes),
        }
    }

    /// Decompose `plan` into tasks. The returned task plan carries `plan`
    /// unchanged; the model never reproduces it.
    #[instrument(skip_all, fields(project = %plan.name, planned_files = plan.files.len()))]
    pub fn run<M: LanguageModel + ?Sized>(&self, model: &M, plan: &Plan) -> Result<TaskPlan> {
        let plan_json = serde_json::to_string_pretty(plan).context("serialize plan")?;
        let prompt = self
            .prompts
            .architect(TASK_PLAN_CONTRACT, &plan_json)?
            .render();
        let messages = [ChatMessage::user(prompt)];
        let raw = model.structured(&StructuredRequest {
            contract: TASK_PLAN_CONTRACT,
            description: "Ordered per-file implementation tasks.",
            schema: &self.schema,
            messages: &messages,
        })?;

        let output: ArchitectOutput = coerce(TASK_PLAN_CONTRACT, &self.schema, raw)?;
        check_invariants(
            TASK_PLAN_CONTRACT,
            validate_tasks(&output.implementation_steps),
        )?;
        let task_plan = output.into_task_plan(plan.clone());
        info!(steps = task_plan.implementation_steps.len(), "task plan ready");
        Ok(task_plan)
    }
}
