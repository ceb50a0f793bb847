//! Context assembler (§4.3): deterministic concatenation of system memory,
//! tool schemas, working memory, and the FIFO view into the message list
//! handed to the chat client. No reordering, deduplication, truncation, or
//! archival injection happens here — all bounding is the FIFO's job.

use memengine_domain::model::ConversationEntry;
use memengine_domain::model::ConversationRole;
use memengine_domain::tool::{Message, ToolCall, ToolDefinition};
use memengine_domain::trace::TraceEvent;

use crate::guideline::GUIDELINE_BLOCK;
use crate::report::ContextReport;

const WORKING_MEMORY_HEADER: &str = "=== WORKING MEMORY ===";

pub struct ContextAssembler;

impl ContextAssembler {
    /// Render the first system message: static system-memory text, the
    /// tool schema descriptions, and the fixed guideline block.
    fn render_system_message(system_memory_text: &str, tools: &[ToolDefinition]) -> String {
        let mut out = String::new();
        out.push_str(system_memory_text.trim_end());
        out.push_str("\n\n");
        out.push_str(GUIDELINE_BLOCK);
        out.push_str("\n\n=== AVAILABLE TOOLS ===\n");
        for tool in tools {
            out.push_str(&format!(
                "- {}: {}\n  parameters: {}\n",
                tool.name, tool.description, tool.parameters
            ));
        }
        out
    }

    fn render_working_memory_message(working_memory_text: &str) -> String {
        format!("{}\n{}", WORKING_MEMORY_HEADER, working_memory_text)
    }

    /// Produce the message list for one chat call, plus a compact
    /// observability report (§4.3).
    pub fn assemble(
        agent: &str,
        system_memory_text: &str,
        working_memory_text: &str,
        tools: &[ToolDefinition],
        fifo: &[ConversationEntry],
    ) -> (Vec<Message>, ContextReport) {
        let mut messages = Vec::with_capacity(fifo.len() + 2);

        let system_text = Self::render_system_message(system_memory_text, tools);
        messages.push(Message::system(system_text));

        let working_text = Self::render_working_memory_message(working_memory_text);
        messages.push(Message::system(working_text.clone()));

        // Pending assistant message being assembled: text plus any tool
        // calls folded in from subsequent role=tool_call rows (§4.3 item 3).
        let mut pending: Option<(String, Vec<ToolCall>)> = None;

        let flush = |pending: &mut Option<(String, Vec<ToolCall>)>, messages: &mut Vec<Message>| {
            if let Some((text, calls)) = pending.take() {
                if calls.is_empty() {
                    messages.push(Message::assistant(text));
                } else {
                    messages.push(Message::assistant_with_tool_calls(text, calls));
                }
            }
        };

        for entry in fifo {
            match entry.role {
                ConversationRole::User => {
                    flush(&mut pending, &mut messages);
                    messages.push(Message::user(entry.content.clone()));
                }
                ConversationRole::Assistant => {
                    flush(&mut pending, &mut messages);
                    pending = Some((entry.content.clone(), Vec::new()));
                }
                ConversationRole::ToolCall => {
                    let call = ToolCall {
                        call_id: entry
                            .tool_correlation_id
                            .clone()
                            .unwrap_or_else(|| entry.id.clone()),
                        tool_name: entry.tool_name.clone().unwrap_or_default(),
                        arguments: entry.tool_args.clone().unwrap_or(serde_json::Value::Null),
                    };
                    match &mut pending {
                        Some((_, calls)) => calls.push(call),
                        None => {
                            // No preceding assistant row in the window (e.g.
                            // it already overflowed out) — synthesize an
                            // empty-text holder so the tool call still folds
                            // into a valid assistant message.
                            pending = Some((String::new(), vec![call]));
                        }
                    }
                }
                ConversationRole::ToolResult => {
                    flush(&mut pending, &mut messages);
                    let correlation = entry
                        .tool_correlation_id
                        .clone()
                        .unwrap_or_else(|| entry.id.clone());
                    messages.push(Message::tool_result(correlation, entry.content.clone(), false));
                }
                ConversationRole::SystemAnnouncement => {
                    flush(&mut pending, &mut messages);
                    messages.push(Message::system(entry.content.clone()));
                }
            }
        }
        flush(&mut pending, &mut messages);

        let report = Self::build_report(&messages, &working_text);
        TraceEvent::ContextAssembled {
            agent: agent.to_string(),
            messages_by_role: report.messages_by_role.clone(),
            working_memory_bytes: report.working_memory_bytes,
            total_chars: report.total_chars,
        }
        .emit();

        (messages, report)
    }

    fn build_report(messages: &[Message], working_text: &str) -> ContextReport {
        use memengine_domain::tool::Role;
        use std::collections::BTreeMap;

        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut total_chars = 0usize;
        for msg in messages {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            *counts.entry(role).or_insert(0) += 1;
            total_chars += msg.content.extract_all_text().len();
        }

        ContextReport {
            messages_by_role: counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            working_memory_bytes: working_text.len(),
            total_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(role: ConversationRole, content: &str) -> ConversationEntry {
        ConversationEntry {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: "a1".into(),
            role,
            content: content.to_string(),
            tool_name: None,
            tool_args: None,
            tool_correlation_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn assembles_system_working_and_fifo_in_order() {
        let fifo = vec![
            entry(ConversationRole::User, "hello"),
            entry(ConversationRole::Assistant, "hi there"),
        ];
        let (messages, report) =
            ContextAssembler::assemble("a1", "You are helpful.", "{}", &[], &fifo);
        assert_eq!(messages.len(), 4); // system, working, user, assistant
        assert_eq!(messages[0].role, memengine_domain::tool::Role::System);
        assert_eq!(messages[1].role, memengine_domain::tool::Role::System);
        assert_eq!(messages[2].role, memengine_domain::tool::Role::User);
        assert_eq!(messages[3].role, memengine_domain::tool::Role::Assistant);
        // system (x2, same role key), user, assistant — 3 distinct role keys.
        assert_eq!(report.messages_by_role.len(), 3);
    }

    #[test]
    fn tool_call_folds_into_preceding_assistant_message() {
        let mut call = entry(ConversationRole::ToolCall, "");
        call.tool_name = Some("read_file".into());
        call.tool_args = Some(serde_json::json!({"path": "a.txt"}));
        call.tool_correlation_id = Some("c1".into());

        let mut result = entry(ConversationRole::ToolResult, "file contents");
        result.tool_correlation_id = Some("c1".into());

        let fifo = vec![
            entry(ConversationRole::User, "read a.txt"),
            entry(ConversationRole::Assistant, "let me check"),
            call,
            result,
        ];
        let (messages, _) = ContextAssembler::assemble("a1", "sys", "{}", &[], &fifo);
        // system, working, user, assistant(with tool_calls), tool
        assert_eq!(messages.len(), 5);
        let tool_calls = messages[3].content.tool_calls();
        assert_eq!(tool_calls.len(), 1);
        assert_eq!(tool_calls[0].tool_name, "read_file");
        assert_eq!(messages[4].role, memengine_domain::tool::Role::Tool);
    }

    #[test]
    fn no_reordering_or_dedup_of_fifo_entries() {
        let fifo = vec![
            entry(ConversationRole::User, "one"),
            entry(ConversationRole::User, "one"),
        ];
        let (messages, _) = ContextAssembler::assemble("a1", "sys", "{}", &[], &fifo);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].content.extract_all_text(), "one");
        assert_eq!(messages[3].content.extract_all_text(), "one");
    }
}
