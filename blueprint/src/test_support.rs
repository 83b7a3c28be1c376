//! Test-only helpers: sample contracts, a temp project and a scripted model.

use std::cell::RefCell;
use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;

use crate::core::types::{ImplementationTask, Plan, PlannedFile, TaskPlan};
use crate::io::model::{ChatRequest, LanguageModel, ModelError, StructuredRequest};
use crate::io::model_types::{AssistantTurn, ChatMessage, ToolCall};
use crate::io::workspace::Workspace;

/// Plan for a two-page static site.
pub fn sample_plan() -> Plan {
    Plan {
        name: "Static Site".to_string(),
        description: "A two-page static website.".to_string(),
        techstack: vec!["HTML".to_string(), "CSS".to_string()],
        features: vec!["Home page".to_string(), "About page".to_string()],
        files: vec![
            PlannedFile {
                path: "index.html".to_string(),
                purpose: "Home page".to_string(),
            },
            PlannedFile {
                path: "about.html".to_string(),
                purpose: "About page".to_string(),
            },
        ],
    }
}

/// Deterministic task for `path`.
pub fn task(path: &str) -> ImplementationTask {
    ImplementationTask {
        filepath: path.to_string(),
        task_description: format!("Implement {path}."),
    }
}

/// Task plan over [`sample_plan`] with the given steps.
pub fn sample_task_plan(steps: Vec<ImplementationTask>) -> TaskPlan {
    TaskPlan {
        implementation_steps: steps,
        plan: sample_plan(),
    }
}

/// A `write_file` tool call.
pub fn write_call(id: &str, path: &str, content: &str) -> ToolCall {
    let args = serde_json::json!({"path": path, "content": content});
    ToolCall::new(id, "write_file", args.to_string())
}

/// Fresh project root inside a temp dir. Keep the `TempDir` alive for the
/// duration of the test.
pub fn project() -> (tempfile::TempDir, Workspace) {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = Workspace::init(temp.path().join("generated_project")).expect("init project");
    (temp, workspace)
}

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Structured output; `None` means the model produced no contract call.
    Structured(Option<Value>),
    /// Raw structured text, for malformed JSON.
    Raw(String),
    /// Chat turn for the tool loop.
    Turn(AssistantTurn),
    /// HTTP 429 from the endpoint.
    RateLimited,
}

impl Scripted {
    pub fn structured<T: Serialize>(value: &T) -> Self {
        Self::Structured(Some(
            serde_json::to_value(value).expect("serialize scripted reply"),
        ))
    }
}

/// A call the scripted model received.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Structured { contract: String, prompt: String },
    Chat { messages: Vec<ChatMessage> },
}

/// Model that replays a fixed script and records every call.
///
/// Replies are consumed in order regardless of call kind; a structured call
/// that meets a chat turn (or the reverse) fails with an invalid response.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: RefCell<VecDeque<Scripted>>,
    calls: RefCell<Vec<Recorded>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Scripted>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.borrow().clone()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }

    fn next(&self) -> Result<Scripted, ModelError> {
        self.replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ModelError::InvalidResponse("script exhausted".to_string()))
    }
}

impl LanguageModel for ScriptedModel {
    fn structured(&self, request: &StructuredRequest<'_>) -> Result<Option<String>, ModelError> {
        let prompt = request
            .messages
            .iter()
            .filter_map(|m| m.content.as_deref())
            .collect::<Vec<_>>()
            .join("\n");
        self.calls.borrow_mut().push(Recorded::Structured {
            contract: request.contract.to_string(),
            prompt,
        });
        match self.next()? {
            Scripted::Structured(value) => Ok(value.map(|v| v.to_string())),
            Scripted::Raw(text) => Ok(Some(text)),
            Scripted::RateLimited => Err(ModelError::RateLimited { retry_after: None }),
            Scripted::Turn(_) => Err(ModelError::InvalidResponse(
                "scripted chat turn for structured call".to_string(),
            )),
        }
    }

    fn chat(&self, request: &ChatRequest<'_>) -> Result<AssistantTurn, ModelError> {
        self.calls.borrow_mut().push(Recorded::Chat {
            messages: request.messages.to_vec(),
        });
        match self.next()? {
            Scripted::Turn(turn) => Ok(turn),
            Scripted::RateLimited => Err(ModelError::RateLimited { retry_after: None }),
            Scripted::Structured(_) | Scripted::Raw(_) => Err(ModelError::InvalidResponse(
                "scripted structured reply for chat call".to_string(),
            )),
        }
    }
}
