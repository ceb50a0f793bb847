use serde::Serialize;

/// Structured trace events emitted across the engine.
///
/// Each variant carries a stable, machine-parseable shape and is logged as a
/// single JSON-valued `tracing` field rather than interpolated free text, so
/// events can be filtered and replayed without parsing log lines.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ArchivalInsert {
        agent: String,
        entry_id: String,
        content_chars: usize,
    },
    ArchivalSearch {
        agent: String,
        k: usize,
        returned: usize,
        duration_ms: u64,
    },
    FifoOverflow {
        agent: String,
        promoted: bool,
        reason: Option<String>,
    },
    ToolDispatch {
        agent: String,
        tool_name: String,
        duration_ms: u64,
        outcome: String,
    },
    StepTransition {
        agent: String,
        from: String,
        to: String,
    },
    PersistenceCommit {
        agent: String,
        table: String,
        rows: usize,
    },
    ContextAssembled {
        agent: String,
        messages_by_role: Vec<(String, usize)>,
        working_memory_bytes: usize,
        total_chars: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "engine_event");
    }
}
