//! Tool surface exposed to the coder model.
//!
//! The model sees four functions. Each call is parsed into a typed
//! [`ToolCommand`] and executed against the [`Workspace`]. Requests the model
//! can fix itself (unknown tool, bad arguments, a path outside the root) come
//! back as error text; file-system failures abort the turn.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::model_types::{ToolCall, ToolDefinition};
use super::workspace::{Workspace, WorkspaceError};

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const LIST_FILES: &str = "list_files";
pub const GET_CURRENT_DIRECTORY: &str = "get_current_directory";

/// Function definitions advertised to the model.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::function(
            READ_FILE,
            "Read a file from the project. Returns an empty string if the file does not exist.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path relative to the project root"
                    }
                },
                "required": ["path"]
            }),
        ),
        ToolDefinition::function(
            WRITE_FILE,
            "Write the full content of a file, creating parent directories and replacing any existing file.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path relative to the project root"
                    },
                    "content": {
                        "type": "string",
                        "description": "Complete file content"
                    }
                },
                "required": ["path", "content"]
            }),
        ),
        ToolDefinition::function(
            LIST_FILES,
            "List every file in the project, relative to the project root.",
            json!({"type": "object", "properties": {}}),
        ),
        ToolDefinition::function(
            GET_CURRENT_DIRECTORY,
            "Return the absolute path of the project root.",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}

/// A parsed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCommand {
    ReadFile { path: String },
    WriteFile { path: String, content: String },
    ListFiles,
    GetCurrentDirectory,
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

impl ToolCommand {
    /// Parse a model tool call. The error is meant for the model to read.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, String> {
        let args = if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        };
        match name {
            READ_FILE => {
                let PathArgs { path } = serde_json::from_str(args)
                    .map_err(|err| format!("invalid arguments for {name}: {err}"))?;
                Ok(Self::ReadFile { path })
            }
            WRITE_FILE => {
                let WriteArgs { path, content } = serde_json::from_str(args)
                    .map_err(|err| format!("invalid arguments for {name}: {err}"))?;
                Ok(Self::WriteFile { path, content })
            }
            LIST_FILES => Ok(Self::ListFiles),
            GET_CURRENT_DIRECTORY => Ok(Self::GetCurrentDirectory),
            other => Err(format!("unknown tool '{other}'")),
        }
    }
}

/// Result of one dispatched call, ready to be sent back as a `tool` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolReply {
    pub content: String,
    /// `true` when the call was refused and `content` explains why.
    pub is_error: bool,
    /// Root-relative path written by this call, if any.
    pub written: Option<PathBuf>,
}

impl ToolReply {
    fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
            written: None,
        }
    }

    fn refused(reason: impl Into<String>) -> Self {
        Self {
            content: format!("ERROR: {}", reason.into()),
            is_error: true,
            written: None,
        }
    }
}

/// Execute one model tool call against the workspace.
pub fn dispatch(workspace: &Workspace, call: &ToolCall) -> Result<ToolReply> {
    let command = match ToolCommand::parse(&call.function.name, &call.function.arguments) {
        Ok(command) => command,
        Err(reason) => {
            warn!(tool = %call.function.name, %reason, "refused tool call");
            return Ok(ToolReply::refused(reason));
        }
    };
    debug!(tool = %call.function.name, id = %call.id, "dispatching tool call");
    let reply = match command {
        ToolCommand::ReadFile { path } => workspace.read_file(&path).map(ToolReply::ok),
        ToolCommand::WriteFile { path, content } => {
            workspace.write_file(&path, &content).map(|written| ToolReply {
                content: format!("WROTE:{path}"),
                is_error: false,
                written: Some(written),
            })
        }
        ToolCommand::ListFiles => workspace.list_files().map(|files| {
            if files.is_empty() {
                ToolReply::ok("No files found.")
            } else {
                ToolReply::ok(files.join("\n"))
            }
        }),
        ToolCommand::GetCurrentDirectory => Ok(ToolReply::ok(workspace.current_directory())),
    };
    match reply {
        Ok(reply) => Ok(reply),
        Err(WorkspaceError::Rejected(rejection)) => {
            warn!(tool = %call.function.name, %rejection, "refused path");
            Ok(ToolReply::refused(rejection.to_string()))
        }
        Err(err @ WorkspaceError::Io { .. }) => {
            Err(err).with_context(|| format!("tool {} failed", call.function.name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall::new("call_1", name, args.to_string())
    }

    fn workspace() -> (tempfile::TempDir, Workspace) {
        let temp = tempfile::tempdir().expect("tempdir");
        let ws = Workspace::init(temp.path().join("project")).expect("init");
        (temp, ws)
    }

    #[test]
    fn definitions_cover_the_tool_contract() {
        let names: Vec<_> = tool_definitions()
            .into_iter()
            .map(|t| t.function.name)
            .collect();
        assert_eq!(
            names,
            vec![READ_FILE, WRITE_FILE, LIST_FILES, GET_CURRENT_DIRECTORY]
        );
    }

    #[test]
    fn parse_accepts_empty_arguments_for_nullary_tools() {
        assert_eq!(ToolCommand::parse(LIST_FILES, ""), Ok(ToolCommand::ListFiles));
        assert_eq!(
            ToolCommand::parse(GET_CURRENT_DIRECTORY, "{}"),
            Ok(ToolCommand::GetCurrentDirectory)
        );
    }

    #[test]
    fn parse_rejects_missing_arguments_and_unknown_tools() {
        let err = ToolCommand::parse(WRITE_FILE, r#"{"path": "a.txt"}"#).unwrap_err();
        assert!(err.contains("content"));
        let err = ToolCommand::parse("delete_file", "{}").unwrap_err();
        assert!(err.contains("unknown tool"));
    }

    #[test]
    fn write_then_read_through_dispatch() {
        let (_temp, ws) = workspace();
        let reply = dispatch(
            &ws,
            &call(WRITE_FILE, json!({"path": "src/app.js", "content": "let x = 1;"})),
        )
        .expect("write");
        assert_eq!(reply.content, "WROTE:src/app.js");
        assert_eq!(reply.written, Some(PathBuf::from("src").join("app.js")));

        let reply = dispatch(&ws, &call(READ_FILE, json!({"path": "src/app.js"}))).expect("read");
        assert_eq!(reply.content, "let x = 1;");

        let reply = dispatch(&ws, &call(LIST_FILES, json!({}))).expect("list");
        assert_eq!(reply.content, "src/app.js");
    }

    #[test]
    fn escaping_path_is_returned_to_the_model() {
        let (temp, ws) = workspace();
        let reply = dispatch(
            &ws,
            &call(WRITE_FILE, json!({"path": "../escape.txt", "content": "x"})),
        )
        .expect("dispatch");
        assert!(reply.is_error);
        assert!(reply.content.starts_with("ERROR:"));
        assert!(reply.written.is_none());
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[test]
    fn malformed_arguments_are_returned_to_the_model() {
        let (_temp, ws) = workspace();
        let reply = dispatch(&ws, &ToolCall::new("c", READ_FILE, "{not json")).expect("dispatch");
        assert!(reply.is_error);
        assert!(reply.content.contains("invalid arguments"));
    }

    #[test]
    fn empty_project_lists_placeholder() {
        let (_temp, ws) = workspace();
        let reply = dispatch(&ws, &call(LIST_FILES, json!({}))).expect("list");
        assert_eq!(reply.content, "No files found.");
        let reply = dispatch(&ws, &call(GET_CURRENT_DIRECTORY, json!({}))).expect("cwd");
        assert_eq!(reply.content, ws.current_directory());
    }
}
