use serde::{Deserialize, Serialize};

/// Compact, machine-readable summary of one `assemble` call (§4.3
/// observability): message counts by role, working-memory byte length, and
/// total assembled character count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextReport {
    pub messages_by_role: Vec<(String, usize)>,
    pub working_memory_bytes: usize,
    pub total_chars: usize,
}
