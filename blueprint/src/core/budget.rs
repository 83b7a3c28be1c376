//! Turn budget for the coder self-loop.

/// Counts coder turns against a fixed limit.
///
/// A task plan with N steps needs N + 1 turns: one per task plus the turn that
/// observes the cursor past the end and emits the terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnBudget {
    limit: u32,
    used: u32,
}

impl TurnBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    /// Reserve one turn. Returns `false` when the limit is already spent.
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// Turns required to finish a task plan of `steps` tasks starting at `start`.
pub fn turns_required(steps: usize, start: usize) -> usize {
    steps.saturating_sub(start) + 1
}
