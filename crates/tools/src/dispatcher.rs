//! Tool dispatcher (§4.6): looks up a tool call by name, validates its
//! argument shape, executes it, and converts every failure mode into a
//! plain `String` result — errors are data to the LLM, never exceptions.

use std::sync::Arc;
use std::time::Instant;

use memengine_domain::config::{ArchivalConfig, ToolsConfig};
use memengine_domain::embed::Embedder;
use memengine_domain::tool::ToolCall;
use memengine_domain::trace::TraceEvent;
use memengine_memory::{AgentStore, ArchivalStore};
use serde::Deserialize;

use crate::{exec, fetch, file_tools, memory_tools};

const FAILURE_MARKER: &str = "[tool_error]";

pub struct ToolContext {
    pub workspace_root: std::path::PathBuf,
    pub agent_id: String,
    pub agents: Arc<AgentStore>,
    pub archival: Arc<ArchivalStore>,
    pub embedder: Arc<dyn Embedder>,
    pub tools_config: ToolsConfig,
    pub archival_config: ArchivalConfig,
}

/// Dispatch one tool call and return its result string (success or
/// failure-marker-prefixed error) along with whether it succeeded.
pub async fn dispatch(ctx: &ToolContext, call: &ToolCall) -> String {
    let started = Instant::now();
    let outcome = dispatch_inner(ctx, call).await;
    let (outcome_str, result) = match outcome {
        Ok(text) => ("ok".to_string(), text),
        Err(text) => ("error".to_string(), format!("{FAILURE_MARKER} {text}")),
    };

    TraceEvent::ToolDispatch {
        agent: ctx.agent_id.clone(),
        tool_name: call.tool_name.clone(),
        duration_ms: started.elapsed().as_millis() as u64,
        outcome: outcome_str,
    }
    .emit();

    result
}

async fn dispatch_inner(ctx: &ToolContext, call: &ToolCall) -> Result<String, String> {
    match call.tool_name.as_str() {
        "read_file" => {
            let args: ReadFileArgs = parse_args(&call.arguments)?;
            file_tools::read_file(&ctx.workspace_root, &args.path, ctx.tools_config.file_size_cap_bytes).await
        }
        "write_file" => {
            let args: WriteFileArgs = parse_args(&call.arguments)?;
            file_tools::write_file(&ctx.workspace_root, &args.path, &args.content, ctx.tools_config.file_size_cap_bytes).await
        }
        "edit_file" => {
            let args: EditFileArgs = parse_args(&call.arguments)?;
            file_tools::edit_file(&ctx.workspace_root, &args.path, &args.old, &args.new, args.replace_all.unwrap_or(false)).await
        }
        "delete_file" => {
            let args: DeleteFileArgs = parse_args(&call.arguments)?;
            file_tools::delete_file(&ctx.workspace_root, &args.path).await
        }
        "find_files" => {
            let args: FindFilesArgs = parse_args(&call.arguments)?;
            file_tools::find_files(&ctx.workspace_root, &args.glob, args.root.as_deref())
        }
        "search_in_files" => {
            let args: SearchInFilesArgs = parse_args(&call.arguments)?;
            file_tools::search_in_files(&ctx.workspace_root, &args.regex, &args.file_glob, args.root.as_deref()).await
        }
        "run_command" => {
            let args: RunCommandArgs = parse_args(&call.arguments)?;
            let outcome = exec::run_command(
                &ctx.workspace_root,
                &args.command,
                ctx.tools_config.timeout_secs,
                ctx.tools_config.output_cap_bytes,
            )
            .await?;
            Ok(outcome.output)
        }
        "run_python" => {
            let args: RunPythonArgs = parse_args(&call.arguments)?;
            let outcome = exec::run_python(
                &ctx.workspace_root,
                &args.code,
                ctx.tools_config.timeout_secs,
                ctx.tools_config.output_cap_bytes,
            )
            .await?;
            Ok(outcome.output)
        }
        "fetch_url" => {
            let args: FetchUrlArgs = parse_args(&call.arguments)?;
            fetch::fetch_url(&args.url, ctx.tools_config.timeout_secs, ctx.tools_config.file_size_cap_bytes).await
        }
        "save_memory" => {
            let args: SaveMemoryArgs = parse_args(&call.arguments)?;
            memory_tools::save_memory(&ctx.archival, ctx.embedder.as_ref(), &ctx.agent_id, &args.content).await
        }
        "search_memory" => {
            let args: SearchMemoryArgs = parse_args(&call.arguments)?;
            memory_tools::search_memory(
                &ctx.archival,
                ctx.embedder.as_ref(),
                &ctx.agent_id,
                &args.query,
                args.limit.unwrap_or(ctx.archival_config.search_limit_default),
                ctx.archival_config.search_limit_max,
            )
            .await
        }
        "update_working_memory" => {
            let args: UpdateWorkingMemoryArgs = parse_args(&call.arguments)?;
            memory_tools::update_working_memory(&ctx.agents, &ctx.agent_id, &args.field_path, &args.value)
        }
        other => Err(format!("unknown tool '{other}'")),
    }
}

fn parse_args<T: for<'de> Deserialize<'de>>(value: &serde_json::Value) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|e| format!("invalid arguments: {e}"))
}

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[derive(Deserialize)]
struct EditFileArgs {
    path: String,
    old: String,
    new: String,
    #[serde(default)]
    replace_all: Option<bool>,
}

#[derive(Deserialize)]
struct DeleteFileArgs {
    path: String,
}

#[derive(Deserialize)]
struct FindFilesArgs {
    glob: String,
    #[serde(default)]
    root: Option<String>,
}

#[derive(Deserialize)]
struct SearchInFilesArgs {
    regex: String,
    file_glob: String,
    #[serde(default)]
    root: Option<String>,
}

#[derive(Deserialize)]
struct RunCommandArgs {
    command: String,
}

#[derive(Deserialize)]
struct RunPythonArgs {
    code: String,
}

#[derive(Deserialize)]
struct FetchUrlArgs {
    url: String,
}

#[derive(Deserialize)]
struct SaveMemoryArgs {
    content: String,
    #[serde(default)]
    #[allow(dead_code)]
    tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct SearchMemoryArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct UpdateWorkingMemoryArgs {
    field_path: String,
    value: String,
}
