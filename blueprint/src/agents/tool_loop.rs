//! Bounded tool-calling loop for one coder task.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::io::model::{ChatRequest, LanguageModel};
use crate::io::model_types::ChatMessage;
use crate::io::tools::{dispatch, tool_definitions};
use crate::io::workspace::Workspace;

/// How the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// The model answered without tool calls.
    Finished { summary: Option<String> },
    /// `max_rounds` model calls were spent without a final answer.
    Exhausted,
}

/// Summary of a tool loop run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLoopReport {
    pub outcome: LoopOutcome,
    /// Model calls made.
    pub rounds: u32,
    /// Root-relative paths written, in first-write order.
    pub written: Vec<PathBuf>,
}

/// Drive the model until it stops calling tools or `max_rounds` calls are
/// spent. Tool results are appended to `messages` in call order.
#[instrument(skip_all, fields(max_rounds = max_rounds))]
pub fn run_tool_loop<M: LanguageModel + ?Sized>(
    model: &M,
    workspace: &Workspace,
    mut messages: Vec<ChatMessage>,
    max_rounds: u32,
) -> Result<ToolLoopReport> {
    let tools = tool_definitions();
    let mut written: Vec<PathBuf> = Vec::new();

    for round in 1..=max_rounds {
        let turn = model.chat(&ChatRequest {
            messages: &messages,
            tools: &tools,
        })?;
        messages.push(ChatMessage::assistant(&turn));

        if turn.is_final() {
            debug!(round, "model finished");
            return Ok(ToolLoopReport {
                outcome: LoopOutcome::Finished {
                    summary: turn.content,
                },
                rounds: round,
                written,
            });
        }

        for call in &turn.tool_calls {
            let reply = dispatch(workspace, call)?;
            if let Some(path) = reply.written {
                if !written.contains(&path) {
                    written.push(path);
                }
            }
            messages.push(ChatMessage::tool(call.id.clone(), reply.content));
        }
        debug!(round, calls = turn.tool_calls.len(), "tool round done");
    }

    warn!(max_rounds, "tool loop exhausted");
    Ok(ToolLoopReport {
        outcome: LoopOutcome::Exhausted,
        rounds: max_rounds,
        written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::model_types::{AssistantTurn, Role, ToolCall};
    use crate::test_support::{Recorded, Scripted, ScriptedModel, project, write_call};
    use serde_json::json;

    #[test]
    fn loop_dispatches_calls_until_final_answer() {
        let (_temp, ws) = project();
        let model = ScriptedModel::new(vec![
            Scripted::Turn(AssistantTurn::calls(vec![
                ToolCall::new("c1", "list_files", "{}"),
                write_call("c2", "index.html", "<h1>hi</h1>"),
            ])),
            Scripted::Turn(AssistantTurn::text("done")),
        ]);

        let report = run_tool_loop(&model, &ws, vec![ChatMessage::user("go")], 5).expect("loop");
        assert_eq!(
            report.outcome,
            LoopOutcome::Finished {
                summary: Some("done".to_string())
            }
        );
        assert_eq!(report.rounds, 2);
        assert_eq!(report.written, vec![PathBuf::from("index.html")]);
        assert_eq!(ws.read_file("index.html").expect("read"), "<h1>hi</h1>");

        let calls = model.calls();
        let Recorded::Chat { messages } = &calls[1] else {
            panic!("expected chat call");
        };
        // user, assistant(tool calls), tool, tool
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].role, Role::Tool);
        assert_eq!(messages[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[2].content.as_deref(), Some("No files found."));
        assert_eq!(messages[3].content.as_deref(), Some("WROTE:index.html"));
    }

    #[test]
    fn loop_stops_after_max_rounds() {
        let (_temp, ws) = project();
        let read = || {
            Scripted::Turn(AssistantTurn::calls(vec![ToolCall::new(
                "r",
                "read_file",
                json!({"path": "a.txt"}).to_string(),
            )]))
        };
        let model = ScriptedModel::new(vec![read(), read(), read()]);
        let report = run_tool_loop(&model, &ws, vec![ChatMessage::user("go")], 2).expect("loop");
        assert_eq!(report.outcome, LoopOutcome::Exhausted);
        assert_eq!(report.rounds, 2);
        assert!(report.written.is_empty());
        assert_eq!(model.calls().len(), 2);
    }

    #[test]
    fn refused_path_is_reported_back_and_loop_continues() {
        let (_temp, ws) = project();
        let model = ScriptedModel::new(vec![
            Scripted::Turn(AssistantTurn::calls(vec![write_call("c1", "/etc/x", "x")])),
            Scripted::Turn(AssistantTurn::calls(vec![write_call("c2", "x.txt", "x")])),
            Scripted::Turn(AssistantTurn::text("ok")),
        ]);
        let report = run_tool_loop(&model, &ws, vec![ChatMessage::user("go")], 5).expect("loop");
        assert_eq!(report.written, vec![PathBuf::from("x.txt")]);

        let calls = model.calls();
        let Recorded::Chat { messages } = &calls[1] else {
            panic!("expected chat call");
        };
        let refusal = messages.last().and_then(|m| m.content.as_deref()).unwrap_or("");
        assert!(refusal.starts_with("ERROR:"), "got {refusal}");
    }
}
