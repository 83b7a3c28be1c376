//! Prompt builder for the three pipeline stages.
//!
//! Templates live in `src/io/prompts/` and are compiled into the binary.
//! Each template is split into sections by `<!-- section:KEY required|droppable -->`
//! markers so the coder prompt can stay within a byte budget.

use std::sync::LazyLock;

use anyhow::Result;
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::types::{ImplementationTask, Plan};

const PLANNER_TEMPLATE: &str = include_str!("prompts/planner.md");
const ARCHITECT_TEMPLATE: &str = include_str!("prompts/architect.md");
const CODER_SYSTEM_TEMPLATE: &str = include_str!("prompts/coder_system.md");
const CODER_TASK_TEMPLATE: &str = include_str!("prompts/coder_task.md");

static SECTION_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
        .expect("section marker regex should be valid")
});

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("planner", PLANNER_TEMPLATE)
            .expect("planner template should be valid");
        env.add_template("architect", ARCHITECT_TEMPLATE)
            .expect("architect template should be valid");
        env.add_template("coder_system", CODER_SYSTEM_TEMPLATE)
            .expect("coder system template should be valid");
        env.add_template("coder_task", CODER_TASK_TEMPLATE)
            .expect("coder task template should be valid");
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    /// Section identifier (e.g., "contract", "existing").
    key: String,
    /// Whether this section is required (cannot be dropped).
    required: bool,
    /// Full section content including header.
    content: String,
}

/// Parse sections from rendered template output using HTML comment markers.
fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let mut sections = Vec::new();
    let matches: Vec<_> = SECTION_RE.captures_iter(rendered).collect();

    for (i, caps) in matches.iter().enumerate() {
        let (Some(marker), Some(key), Some(kind)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        let end = matches
            .get(i + 1)
            .and_then(|m| m.get(0))
            .map_or(rendered.len(), |m| m.start());

        let content = rendered[marker.end()..end].trim().to_string();
        let required = kind.as_str() == "required";
        if !content.is_empty() || required {
            sections.push(ParsedSection {
                key: key.as_str().to_string(),
                required,
                content,
            });
        }
    }

    sections
}

/// Apply budget to parsed sections, dropping droppable sections as needed.
///
/// Drop order: project -> files. If still over budget the last section is
/// truncated.
fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len =
        |secs: &[ParsedSection]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    if total_len(sections) <= budget {
        return;
    }

    for key in ["project", "files"] {
        if total_len(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            let dropped_len = sections[idx].content.len();
            debug!(
                section = key,
                bytes_dropped = dropped_len,
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    if total_len(sections) <= budget {
        return;
    }
    let other_len: usize = sections
        .iter()
        .take(sections.len().saturating_sub(1))
        .map(|s| s.content.len())
        .sum();
    let allowed = budget.saturating_sub(other_len);
    let Some(last) = sections.last_mut() else {
        return;
    };
    let before_len = last.content.len();
    if before_len > allowed {
        const MARKER: &str = "\n[truncated]";
        let keep = floor_char_boundary(&last.content, allowed.saturating_sub(MARKER.len()));
        last.content.truncate(keep);
        last.content.push_str(MARKER);
        debug!(
            section = last.key,
            before_len,
            after_len = last.content.len(),
            "truncated section for budget"
        );
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Render sections back to a single string.
fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Inputs for one coder task prompt.
#[derive(Debug, Clone)]
pub struct CoderPromptInputs<'a> {
    /// Zero-based index of the task.
    pub step_idx: usize,
    pub total_steps: usize,
    pub task: &'a ImplementationTask,
    /// Plan the task came from, for orientation.
    pub plan: Option<&'a Plan>,
    /// Files currently in the project.
    pub files: &'a [String],
    /// Current contents of the target file; empty when it does not exist.
    pub existing: &'a str,
}

/// Builds stage prompts within a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    /// Create a builder with the given byte budget. Only coder task prompts
    /// are held to it; planner and architect prompts carry their input whole.
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    /// Planner prompt embedding the user's request.
    pub fn planner(&self, contract: &str, user_prompt: &str) -> Result<PromptPack> {
        self.build(
            "planner",
            context! {
                contract => contract,
                user_prompt => user_prompt.trim(),
            },
            None,
        )
    }

    /// Architect prompt embedding the serialized plan.
    pub fn architect(&self, contract: &str, plan_json: &str) -> Result<PromptPack> {
        self.build(
            "architect",
            context! {
                contract => contract,
                plan_json => plan_json,
            },
            None,
        )
    }

    /// Fixed system prompt for the coder's tool loop.
    pub fn coder_system(&self) -> Result<PromptPack> {
        self.build("coder_system", context! {}, None)
    }

    /// Task prompt for one coder turn.
    pub fn coder_task(&self, input: &CoderPromptInputs<'_>) -> Result<PromptPack> {
        self.build(
            "coder_task",
            context! {
                step_number => input.step_idx + 1,
                total_steps => input.total_steps,
                filepath => &input.task.filepath,
                task_description => input.task.task_description.trim(),
                project_name => input.plan.map(|p| p.name.as_str()),
                project_description => input.plan.map(|p| p.description.trim()),
                techstack => input.plan.map(|p| p.techstack.clone()).unwrap_or_default(),
                files => input.files,
                existing => input.existing,
            },
            Some(self.budget_bytes),
        )
    }

    fn build(
        &self,
        template: &str,
        ctx: minijinja::Value,
        budget_bytes: Option<usize>,
    ) -> Result<PromptPack> {
        let rendered = PromptEngine::new().render(template, ctx)?;
        let mut sections = parse_sections(&rendered);
        if let Some(budget) = budget_bytes {
            apply_budget_to_sections(&mut sections, budget);
        }
        Ok(PromptPack {
            content: render_sections(&sections),
        })
    }
}

/// A rendered prompt ready to send to the model.
#[derive(Debug, Clone)]
pub struct PromptPack {
    content: String,
}

impl PromptPack {
    /// Get the rendered prompt content.
    pub fn render(&self) -> String {
        self.content.clone()
    }
}
