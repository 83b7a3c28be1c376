//! Deterministic task selection for the coder stage.

use crate::core::types::{CoderState, ImplementationTask};

/// Where the coder state machine currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoderPhase<'a> {
    /// No cursor exists yet; the next coder turn creates one at index 0.
    NotStarted,
    /// The task at `idx` is next.
    InProgress {
        idx: usize,
        task: &'a ImplementationTask,
    },
    /// Every task has run.
    Done,
}

/// Classify a (possibly absent) coder cursor.
pub fn coder_phase(state: Option<&CoderState>) -> CoderPhase<'_> {
    let Some(state) = state else {
        return CoderPhase::NotStarted;
    };
    match state.current_task() {
        Some(task) => CoderPhase::InProgress {
            idx: state.current_step_idx,
            task,
        },
        None => CoderPhase::Done,
    }
}
