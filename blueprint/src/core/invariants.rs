//! Semantic invariants not expressible via JSON Schema.

use std::collections::HashSet;

use crate::core::path::sandbox_path;
use crate::core::types::{ImplementationTask, Plan};

/// Check plan invariants:
/// - Non-blank `name`
/// - At least one planned file
/// - Every planned file path stays inside the project root
pub fn validate_plan(plan: &Plan) -> Vec<String> {
    let mut errors = Vec::new();
    if plan.name.trim().is_empty() {
        errors.push("plan name must not be empty".to_string());
    }
    if plan.files.is_empty() {
        errors.push("plan must list at least one file".to_string());
    }
    let mut seen = HashSet::new();
    for (idx, file) in plan.files.iter().enumerate() {
        match sandbox_path(&file.path) {
            Ok(path) => {
                if !seen.insert(path) {
                    errors.push(format!("files[{idx}]: duplicate path '{}'", file.path));
                }
            }
            Err(err) => errors.push(format!("files[{idx}]: {err}")),
        }
    }
    errors
}

/// Check task list invariants:
/// - At least one task
/// - Every `filepath` is non-empty and resolves inside the project root
/// - Every task carries a description
///
/// Repeated paths are allowed; a later task may refine an earlier file.
pub fn validate_tasks(tasks: &[ImplementationTask]) -> Vec<String> {
    let mut errors = Vec::new();
    if tasks.is_empty() {
        errors.push("implementation_steps must not be empty".to_string());
    }
    for (idx, task) in tasks.iter().enumerate() {
        if let Err(err) = sandbox_path(&task.filepath) {
            errors.push(format!("implementation_steps[{idx}]: {err}"));
        }
        if task.task_description.trim().is_empty() {
            errors.push(format!(
                "implementation_steps[{idx}]: task_description must not be empty"
            ));
        }
    }
    errors
}
