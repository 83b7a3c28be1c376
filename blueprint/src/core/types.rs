//! Shared contracts passed between pipeline stages.
//!
//! These types are plain data: they carry no I/O and compare by value. The
//! planner produces a [`Plan`], the architect expands it into a [`TaskPlan`],
//! and the coder walks the task plan through a [`CoderState`] cursor.

use serde::{Deserialize, Serialize};

/// High-level interpretation of the user's request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Short project name.
    pub name: String,
    /// One-paragraph description of what is being built.
    pub description: String,
    /// Technology choices (languages, frameworks, libraries).
    pub techstack: Vec<String>,
    /// Human-readable feature descriptions.
    pub features: Vec<String>,
    /// Top-level files the project needs.
    pub files: Vec<PlannedFile>,
}

/// A file named by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedFile {
    /// Path relative to the project root.
    pub path: String,
    /// What the file is for.
    pub purpose: String,
}

/// One unit of coding work: a file and what to do to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationTask {
    /// Target path relative to the project root.
    pub filepath: String,
    /// What must be written or changed in that file.
    pub task_description: String,
}

/// Ordered coding tasks plus the plan they were derived from.
///
/// Order is significant: later tasks may read files written by earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPlan {
    pub implementation_steps: Vec<ImplementationTask>,
    /// Attached by the architect stage after the model responds; never
    /// generated by the model.
    pub plan: Plan,
}

/// Task list exactly as the architect model returns it, before the plan is
/// stitched back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectOutput {
    pub implementation_steps: Vec<ImplementationTask>,
}

impl ArchitectOutput {
    /// Attach the originating plan, producing the full [`TaskPlan`].
    pub fn into_task_plan(self, plan: Plan) -> TaskPlan {
        TaskPlan {
            implementation_steps: self.implementation_steps,
            plan,
        }
    }
}

/// Iteration cursor over a [`TaskPlan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoderState {
    pub task_plan: TaskPlan,
    /// Zero-based index of the next task to run.
    pub current_step_idx: usize,
}

impl CoderState {
    pub fn new(task_plan: TaskPlan) -> Self {
        Self {
            task_plan,
            current_step_idx: 0,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.task_plan.implementation_steps.len()
    }

    /// The task at the cursor, or `None` once every task has run.
    pub fn current_task(&self) -> Option<&ImplementationTask> {
        self.task_plan
            .implementation_steps
            .get(self.current_step_idx)
    }

    pub fn is_done(&self) -> bool {
        self.current_step_idx >= self.total_steps()
    }

    /// Move the cursor forward by exactly one task.
    pub fn advance(&mut self) {
        self.current_step_idx += 1;
    }
}

/// Terminal flag carried by the run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    #[default]
    InProgress,
    Done,
}

/// Record threaded through every stage of a run.
///
/// Stages never write this directly; they return a [`StageUpdate`] that the
/// graph merges with [`RunState::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub user_prompt: String,
    pub plan: Option<Plan>,
    pub task_plan: Option<TaskPlan>,
    pub coder_state: Option<CoderState>,
    pub status: RunStatus,
    /// Indices of tasks whose tool loop did not finish cleanly.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incomplete_steps: Vec<usize>,
}

impl RunState {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            plan: None,
            task_plan: None,
            coder_state: None,
            status: RunStatus::InProgress,
            incomplete_steps: Vec::new(),
        }
    }

    /// Merge a stage's partial update into the run record.
    pub fn apply(&mut self, update: StageUpdate) {
        match update {
            StageUpdate::Planned { plan } => self.plan = Some(plan),
            StageUpdate::Architected { task_plan } => self.task_plan = Some(task_plan),
            StageUpdate::Coded {
                coder_state,
                status,
                incomplete_step,
            } => {
                self.coder_state = Some(coder_state);
                if let Some(status) = status {
                    self.status = status;
                }
                if let Some(idx) = incomplete_step {
                    self.incomplete_steps.push(idx);
                }
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == RunStatus::Done
    }
}

/// Partial update returned by a single stage invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageUpdate {
    Planned {
        plan: Plan,
    },
    Architected {
        task_plan: TaskPlan,
    },
    Coded {
        coder_state: CoderState,
        /// `Some(Done)` once the cursor has passed the last task.
        status: Option<RunStatus>,
        /// Set when the task just run was flagged as incomplete.
        incomplete_step: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Plan {
        Plan {
            name: "site".to_string(),
            description: "a site".to_string(),
            techstack: vec!["html".to_string()],
            features: vec!["home page".to_string()],
            files: vec![PlannedFile {
                path: "index.html".to_string(),
                purpose: "home".to_string(),
            }],
        }
    }

    fn task(path: &str) -> ImplementationTask {
        ImplementationTask {
            filepath: path.to_string(),
            task_description: format!("write {path}"),
        }
    }

    #[test]
    fn architect_output_attaches_plan_unchanged() {
        let output = ArchitectOutput {
            implementation_steps: vec![task("index.html")],
        };
        let task_plan = output.into_task_plan(plan());
        assert_eq!(task_plan.plan, plan());
        assert_eq!(task_plan.implementation_steps.len(), 1);
    }

    #[test]
    fn coder_state_walks_tasks_in_order() {
        let mut state = CoderState::new(TaskPlan {
            implementation_steps: vec![task("a"), task("b")],
            plan: plan(),
        });
        assert_eq!(state.current_task().map(|t| t.filepath.as_str()), Some("a"));
        state.advance();
        assert_eq!(state.current_task().map(|t| t.filepath.as_str()), Some("b"));
        state.advance();
        assert!(state.is_done());
        assert!(state.current_task().is_none());
    }

    #[test]
    fn status_serializes_as_screaming_case() {
        let json = serde_json::to_string(&RunStatus::Done).expect("serialize");
        assert_eq!(json, "\"DONE\"");
    }

    #[test]
    fn apply_merges_partial_updates() {
        let mut state = RunState::new("build a site");
        state.apply(StageUpdate::Planned { plan: plan() });
        assert_eq!(state.plan, Some(plan()));
        assert!(state.task_plan.is_none());

        let coder_state = CoderState::new(TaskPlan {
            implementation_steps: vec![task("a")],
            plan: plan(),
        });
        state.apply(StageUpdate::Coded {
            coder_state: coder_state.clone(),
            status: None,
            incomplete_step: Some(0),
        });
        assert_eq!(state.coder_state, Some(coder_state));
        assert_eq!(state.incomplete_steps, vec![0]);
        assert!(!state.is_done());
    }
}
