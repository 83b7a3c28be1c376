//! Prompt-to-project code generator.
//!
//! A natural-language request flows through three model-backed stages:
//! the planner produces a [`Plan`](core::types::Plan), the architect turns it
//! into ordered per-file tasks, and the coder executes those tasks one turn at
//! a time against a sandboxed project directory. The crate keeps a strict
//! split:
//!
//! - **[`core`]**: Pure, deterministic logic (contracts, path sandboxing,
//!   invariants, turn and retry budgets). No I/O.
//! - **[`io`]**: Side effects (config, model HTTP client, prompt rendering,
//!   project file system).
//!
//! [`agents`] implement the stages, [`graph`] wires them into a run and
//! [`retry`] wraps a run in rate-limit retry.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod graph;
pub mod io;
pub mod logging;
pub mod retry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
