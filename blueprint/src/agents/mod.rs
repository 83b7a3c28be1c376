//! Stage agents: planner, architect and coder.
//!
//! Planner and architect make one structured-output call each; the coder runs
//! a bounded tool loop per task.

use jsonschema::Draft;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

pub mod architect;
pub mod coder;
pub mod planner;
pub mod tool_loop;

/// The model's structured output could not be coerced into its contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{contract} output rejected: {reason}")]
pub struct StructuredOutputError {
    pub contract: &'static str,
    pub reason: String,
}

impl StructuredOutputError {
    fn new(contract: &'static str, reason: impl Into<String>) -> Self {
        Self {
            contract,
            reason: reason.into(),
        }
    }
}

/// Parse an embedded contract schema.
pub(crate) fn load_schema(raw: &str) -> Value {
    serde_json::from_str(raw).expect("embedded contract schema should be valid json")
}

/// Coerce raw model output into `T`: JSON parse, schema check, then serde.
pub(crate) fn coerce<T: DeserializeOwned>(
    contract: &'static str,
    schema: &Value,
    raw: Option<String>,
) -> Result<T, StructuredOutputError> {
    let raw = raw.ok_or_else(|| StructuredOutputError::new(contract, "model returned nothing"))?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|err| StructuredOutputError::new(contract, format!("invalid json: {err}")))?;

    let validator = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .expect("embedded contract schema should compile");
    let messages: Vec<String> = validator
        .iter_errors(&value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        warn!(contract, violations = messages.len(), "schema validation failed");
        return Err(StructuredOutputError::new(
            contract,
            format!("schema validation failed: {}", messages.join("; ")),
        ));
    }

    serde_json::from_value(value)
        .map_err(|err| StructuredOutputError::new(contract, format!("deserialize: {err}")))
}

/// Turn invariant violations into a contract error.
pub(crate) fn check_invariants(
    contract: &'static str,
    errors: Vec<String>,
) -> Result<(), StructuredOutputError> {
    if errors.is_empty() {
        return Ok(());
    }
    Err(StructuredOutputError::new(
        contract,
        format!("invariants failed: {}", errors.join("; ")),
    ))
}
