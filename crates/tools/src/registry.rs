//! Tool schema registry (§4.6): generated once at startup, reused for every
//! `chat` call rather than recomputed per tool invocation.

use memengine_domain::tool::ToolDefinition;
use serde_json::json;

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "read_file".into(),
            description: "Read the contents of a file in the workspace.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"],
            }),
        },
        ToolDefinition {
            name: "write_file".into(),
            description: "Write (create or overwrite) a file in the workspace.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "content": { "type": "string" },
                },
                "required": ["path", "content"],
            }),
        },
        ToolDefinition {
            name: "edit_file".into(),
            description: "Replace an exact string in a file with a new one.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "old": { "type": "string" },
                    "new": { "type": "string" },
                    "replace_all": { "type": "boolean" },
                },
                "required": ["path", "old", "new"],
            }),
        },
        ToolDefinition {
            name: "delete_file".into(),
            description: "Delete a file or directory (recursively) in the workspace.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"],
            }),
        },
        ToolDefinition {
            name: "find_files".into(),
            description: "Find files in the workspace matching a glob pattern.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "glob": { "type": "string" },
                    "root": { "type": "string" },
                },
                "required": ["glob"],
            }),
        },
        ToolDefinition {
            name: "search_in_files".into(),
            description: "Search workspace files matching a glob for lines matching a regex.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "regex": { "type": "string" },
                    "file_glob": { "type": "string" },
                    "root": { "type": "string" },
                },
                "required": ["regex", "file_glob"],
            }),
        },
        ToolDefinition {
            name: "run_command".into(),
            description: "Run a whitelisted read-only shell command in the workspace.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "command": { "type": "string" } },
                "required": ["command"],
            }),
        },
        ToolDefinition {
            name: "run_python".into(),
            description: "Run a snippet of Python code (python3 -c) in the workspace.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "code": { "type": "string" } },
                "required": ["code"],
            }),
        },
        ToolDefinition {
            name: "fetch_url".into(),
            description: "Fetch an http(s) URL and return its response body.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "url": { "type": "string" } },
                "required": ["url"],
            }),
        },
        ToolDefinition {
            name: "save_memory".into(),
            description: "Save a piece of content to durable archival memory.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "content": { "type": "string" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                },
                "required": ["content"],
            }),
        },
        ToolDefinition {
            name: "search_memory".into(),
            description: "Search archival memory by semantic similarity.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer" },
                },
                "required": ["query"],
            }),
        },
        ToolDefinition {
            name: "update_working_memory".into(),
            description: "Update a field in the working memory document.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "field_path": { "type": "string" },
                    "value": { "type": "string" },
                },
                "required": ["field_path", "value"],
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_exactly_the_closed_tool_set() {
        let defs = tool_definitions();
        let names: Vec<&str> = defs.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "read_file",
                "write_file",
                "edit_file",
                "delete_file",
                "find_files",
                "search_in_files",
                "run_command",
                "run_python",
                "fetch_url",
                "save_memory",
                "search_memory",
                "update_working_memory",
            ]
        );
    }
}
