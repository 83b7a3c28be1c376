//! Planner agent: user request to [`Plan`].

use anyhow::Result;
use serde_json::Value;
use tracing::{info, instrument};

use crate::core::invariants::validate_plan;
use crate::core::types::Plan;
use crate::io::model::{LanguageModel, StructuredRequest};
use crate::io::model_types::ChatMessage;
use crate::io::prompt::PromptBuilder;

use super::{check_invariants, coerce, load_schema};

const PLAN_SCHEMA: &str = include_str!("../../schemas/plan.schema.json");

/// Contract name the planner output is bound to.
pub const PLAN_CONTRACT: &str = "Plan";

/// Planner agent wrapper that owns schema and prompt settings.
#[derive(Debug, Clone)]
pub struct PlannerAgent {
    schema: Value,
    prompts: PromptBuilder,
}

impl PlannerAgent {
    pub fn new(prompt_budget_bytes: usize) -> Self {
        Self {
            schema: load_schema(PLAN_SCHEMA),
            prompts: PromptBuilder::new(prompt_budget_bytes),
        }
    }

    #[instrument(skip_all, fields(prompt_bytes = user_prompt.len()))]
    pub fn run<M: LanguageModel + ?Sized>(&self, model: &M, user_prompt: &str) -> Result<Plan> {
        let prompt = self.prompts.planner(PLAN_CONTRACT, user_prompt)?.render();
        let messages = [ChatMessage::user(prompt)];
        let raw = model.structured(&StructuredRequest {
            contract: PLAN_CONTRACT,
            description: "Engineering plan for the requested project.",
            schema: &self.schema,
            messages: &messages,
        })?;

        let plan: Plan = coerce(PLAN_CONTRACT, &self.schema, raw)?;
        check_invariants(PLAN_CONTRACT, validate_plan(&plan))?;
        info!(name = %plan.name, files = plan.files.len(), "plan ready");
        Ok(plan)
    }
}
