//! Tool dispatcher: registers the native tool surface (gated by an
//! optional allow-list), discovers namespaced child-provider tools after a
//! short settle interval, and routes `tools/call` between the two.
//!
//! Native tool names never contain a `:`, so there is no ambiguity between
//! a native tool and a namespaced child tool (`"{child}:{originalName}"`).

use crate::aggregator::Aggregator;
use crate::registry::ProcessRegistry;
use crate::{files, output, workspace};
use rmcp::model::{CallToolRequestParam, CallToolResult, Content, Tool};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Delay between spawning child providers and registering their tools,
/// giving slow-starting children a chance to complete their handshake
/// before the first `tools/list` call goes out.
const CHILD_SETTLE_INTERVAL: Duration = Duration::from_millis(300);

const NATIVE_TOOL_NAMES: &[&str] = &[
    "execute_command",
    "check_process",
    "send_input",
    "file_read",
    "file_write",
    "file_edit",
    "file_ls",
    "file_grep",
];

pub struct Dispatcher {
    registry: ProcessRegistry,
    aggregator: Aggregator,
    allowed: Option<HashSet<String>>,
    child_tools: Mutex<Vec<Tool>>,
    default_inactivity_timeout: u64,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        registry: ProcessRegistry,
        aggregator: Aggregator,
        allowed_tools_env: Option<&str>,
        default_inactivity_timeout: u64,
    ) -> Self {
        let allowed = allowed_tools_env.map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<HashSet<_>>()
        });
        Self {
            registry,
            aggregator,
            allowed,
            child_tools: Mutex::new(Vec::new()),
            default_inactivity_timeout: crate::process::clamp_inactivity_budget(default_inactivity_timeout),
        }
    }

    /// Spawn child providers and discover their tools. Called once at
    /// startup; safe to call again to pick up newly available children.
    pub async fn start(&self) {
        tokio::time::sleep(CHILD_SETTLE_INTERVAL).await;
        let tools = self.aggregator.discover_tools().await;
        *self.child_tools.lock().await = tools;
    }

    fn is_allowed(&self, name: &str) -> bool {
        match &self.allowed {
            Some(set) => set.contains(name),
            None => true,
        }
    }

    pub fn native_tools(&self) -> Vec<Tool> {
        native_tool_definitions()
            .into_iter()
            .filter(|t| self.is_allowed(&t.name))
            .collect()
    }

    pub async fn list_tools(&self) -> Vec<Tool> {
        let mut tools = self.native_tools();
        tools.extend(self.child_tools.lock().await.iter().cloned());
        tools
    }

    pub async fn call_tool(&self, request: CallToolRequestParam) -> CallToolResult {
        let name = request.name.to_string();
        if name.contains(':') {
            return match self.aggregator.call_tool(&name, request.arguments).await {
                Ok(result) => result,
                Err(e) => text_result(format!("Error calling {name}: {e}")),
            };
        }

        if !NATIVE_TOOL_NAMES.contains(&name.as_str()) || !self.is_allowed(&name) {
            return text_result(format!("Error: unknown tool: {name}"));
        }

        let args = request.arguments.unwrap_or_default();
        let text = self.call_native(&name, args).await;
        text_result(text)
    }

    async fn call_native(&self, name: &str, args: Map<String, Value>) -> String {
        let value = Value::Object(args);
        match name {
            "execute_command" => self.native_execute_command(value).await,
            "check_process" => self.native_check_process(value).await,
            "send_input" => self.native_send_input(value).await,
            "file_read" => self.native_file_read(value).await,
            "file_write" => self.native_file_write(value).await,
            "file_edit" => self.native_file_edit(value).await,
            "file_ls" => self.native_file_ls(value).await,
            "file_grep" => self.native_file_grep(value).await,
            _ => format!("Error: unknown tool: {name}"),
        }
    }

    async fn native_execute_command(&self, value: Value) -> String {
        let params: ExecuteCommandParams = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => return format!("Error: invalid arguments: {e}"),
        };
        let budget = params.inactivity_timeout.unwrap_or(self.default_inactivity_timeout);
        let cwd = match workspace::ensure_current_root().await {
            Ok(p) => p,
            Err(e) => return format!("Error: failed to prepare workspace root: {e}"),
        };
        self.registry
            .execute_command(
                &params.command,
                params.rationale.as_deref(),
                budget,
                Some(&cwd.to_string_lossy()),
            )
            .await
    }

    async fn native_check_process(&self, value: Value) -> String {
        let params: CheckProcessParams = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => return format!("Error: invalid arguments: {e}"),
        };
        self.registry.check_process(&params.process_id).await
    }

    async fn native_send_input(&self, value: Value) -> String {
        let params: SendInputParams = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => return format!("Error: invalid arguments: {e}"),
        };
        self.registry
            .send_input(&params.process_id, &params.input, params.auto_newline.unwrap_or(true))
            .await
    }

    async fn native_file_read(&self, value: Value) -> String {
        let params: FileReadParams = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => return format!("Error: invalid arguments: {e}"),
        };
        let path = match resolve_path(&params.file_path).await {
            Ok(p) => p,
            Err(e) => return e,
        };
        let rendered = files::read(&path, params.offset.unwrap_or(0), params.limit.unwrap_or(0)).await;
        output::truncate(&rendered)
    }

    async fn native_file_write(&self, value: Value) -> String {
        let params: FileWriteParams = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => return format!("Error: invalid arguments: {e}"),
        };
        let path = match resolve_path(&params.file_path).await {
            Ok(p) => p,
            Err(e) => return e,
        };
        files::write(&path, &params.content).await
    }

    async fn native_file_edit(&self, value: Value) -> String {
        let params: FileEditParams = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => return format!("Error: invalid arguments: {e}"),
        };
        let path = match resolve_path(&params.file_path).await {
            Ok(p) => p,
            Err(e) => return e,
        };
        files::edit(
            &path,
            &params.old_string,
            &params.new_string,
            params.replace_all.unwrap_or(false),
        )
        .await
    }

    async fn native_file_ls(&self, value: Value) -> String {
        let params: FileLsParams = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => return format!("Error: invalid arguments: {e}"),
        };
        let path = match resolve_path(&params.path.unwrap_or_else(|| ".".to_string())).await {
            Ok(p) => p,
            Err(e) => return e,
        };
        let ignore = params.ignore.unwrap_or_default();
        output::truncate(&files::list(&path, &ignore).await)
    }

    async fn native_file_grep(&self, value: Value) -> String {
        let params: FileGrepParams = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => return format!("Error: invalid arguments: {e}"),
        };
        let path = match resolve_path(&params.path.unwrap_or_else(|| ".".to_string())).await {
            Ok(p) => p,
            Err(e) => return e,
        };
        let rendered = files::grep(
            &params.pattern,
            &path,
            params.include.as_deref(),
            params.case_insensitive.unwrap_or(false),
            params.max_results.unwrap_or(100),
        )
        .await;
        output::truncate(&rendered)
    }
}

async fn resolve_path(path: &str) -> Result<PathBuf, String> {
    workspace::resolve(path)
        .await
        .map_err(|e| format!("Error: failed to resolve path {path}: {e}"))
}

fn text_result(text: String) -> CallToolResult {
    CallToolResult::success(vec![Content::text(text)])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteCommandParams {
    command: String,
    #[serde(default)]
    rationale: Option<String>,
    #[serde(default)]
    inactivity_timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckProcessParams {
    process_id: String,
    #[serde(default)]
    #[allow(dead_code)]
    rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendInputParams {
    process_id: String,
    input: String,
    #[serde(default)]
    auto_newline: Option<bool>,
    #[serde(default)]
    #[allow(dead_code)]
    rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileReadParams {
    file_path: String,
    #[serde(default)]
    #[allow(dead_code)]
    rationale: Option<String>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileWriteParams {
    file_path: String,
    content: String,
    #[serde(default)]
    #[allow(dead_code)]
    rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEditParams {
    file_path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: Option<bool>,
    #[serde(default)]
    #[allow(dead_code)]
    rationale: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileLsParams {
    #[serde(default)]
    #[allow(dead_code)]
    rationale: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    ignore: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileGrepParams {
    pattern: String,
    #[serde(default)]
    #[allow(dead_code)]
    rationale: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    include: Option<String>,
    #[serde(default)]
    case_insensitive: Option<bool>,
    #[serde(default)]
    max_results: Option<usize>,
}

fn native_tool_definitions() -> Vec<Tool> {
    vec![
        Tool::new(
            "execute_command",
            "Run a shell command and wait for it to finish or go quiet. Returns captured output and, once the command exits, its exit code.",
            schema_map(json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Shell command to run via /bin/sh -c" },
                    "rationale": { "type": "string", "description": "Why this command is being run" },
                    "inactivityTimeout": { "type": "integer", "description": "Seconds of inactivity before backgrounding (0-600, default 20)" },
                },
                "required": ["command", "rationale"],
            })),
        ),
        Tool::new(
            "check_process",
            "Check on a backgrounded process: returns its status, captured output so far, and exit code if it has finished.",
            schema_map(json!({
                "type": "object",
                "properties": {
                    "processId": { "type": "string" },
                    "rationale": { "type": "string" },
                },
                "required": ["processId", "rationale"],
            })),
        ),
        Tool::new(
            "send_input",
            "Send input to a running process's stdin.",
            schema_map(json!({
                "type": "object",
                "properties": {
                    "processId": { "type": "string" },
                    "input": { "type": "string" },
                    "autoNewline": { "type": "boolean", "description": "Append a trailing newline (default true)" },
                    "rationale": { "type": "string" },
                },
                "required": ["processId", "input", "rationale"],
            })),
        ),
        Tool::new(
            "file_read",
            "Read a file with line numbers. Lines longer than 2000 characters are truncated.",
            schema_map(json!({
                "type": "object",
                "properties": {
                    "filePath": { "type": "string" },
                    "rationale": { "type": "string" },
                    "offset": { "type": "integer", "description": "0-based line offset to start after (default 0)" },
                    "limit": { "type": "integer", "description": "Maximum number of lines to return (default 2000)" },
                },
                "required": ["filePath", "rationale"],
            })),
        ),
        Tool::new(
            "file_write",
            "Write content to a file, creating intermediate directories and overwriting any existing file.",
            schema_map(json!({
                "type": "object",
                "properties": {
                    "filePath": { "type": "string" },
                    "content": { "type": "string" },
                    "rationale": { "type": "string" },
                },
                "required": ["filePath", "content", "rationale"],
            })),
        ),
        Tool::new(
            "file_edit",
            "Replace an exact string in a file with another. Fails if the string isn't found or if old and new are identical.",
            schema_map(json!({
                "type": "object",
                "properties": {
                    "filePath": { "type": "string" },
                    "oldString": { "type": "string" },
                    "newString": { "type": "string" },
                    "replaceAll": { "type": "boolean" },
                    "rationale": { "type": "string" },
                },
                "required": ["filePath", "oldString", "newString", "rationale"],
            })),
        ),
        Tool::new(
            "file_ls",
            "List files and directories under a path, up to 100 entries.",
            schema_map(json!({
                "type": "object",
                "properties": {
                    "rationale": { "type": "string" },
                    "path": { "type": "string", "description": "Defaults to \".\"" },
                    "ignore": { "type": "array", "items": { "type": "string" } },
                },
                "required": ["rationale"],
            })),
        ),
        Tool::new(
            "file_grep",
            "Search file contents with a regular expression, grouped by file with line numbers.",
            schema_map(json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string" },
                    "rationale": { "type": "string" },
                    "path": { "type": "string" },
                    "include": { "type": "string", "description": "Glob filtering which file names to search" },
                    "caseInsensitive": { "type": "boolean" },
                    "maxResults": { "type": "integer" },
                },
                "required": ["pattern", "rationale"],
            })),
        ),
    ]
}

fn schema_map(value: Value) -> Arc<Map<String, Value>> {
    Arc::new(value.as_object().cloned().unwrap_or_default())
}
