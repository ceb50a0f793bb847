//! Append-only conversation log (§4.2, §4.8). The FIFO queue is a bounded
//! in-memory view over this table; the table itself is never truncated.

use chrono::Utc;
use memengine_domain::error::Result;
use memengine_domain::model::{ConversationEntry, ConversationRole};
use rusqlite::params;
use uuid::Uuid;

use crate::pool::Pool;

pub struct ConversationLog {
    pool: Pool,
}

impl ConversationLog {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn append(
        &self,
        agent_id: &str,
        role: ConversationRole,
        content: &str,
        tool_name: Option<&str>,
        tool_args: Option<&serde_json::Value>,
        tool_correlation_id: Option<&str>,
    ) -> Result<ConversationEntry> {
        let entry = ConversationEntry {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            role,
            content: content.to_string(),
            tool_name: tool_name.map(str::to_string),
            tool_args: tool_args.cloned(),
            tool_correlation_id: tool_correlation_id.map(str::to_string),
            created_at: Utc::now(),
        };

        let conn = crate::pool::get(&self.pool)?;
        conn.execute(
            "INSERT INTO conversation_history \
             (id, agent_id, role, content, tool_name, tool_args, tool_correlation_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id,
                entry.agent_id,
                entry.role.as_str(),
                entry.content,
                entry.tool_name,
                entry.tool_args.as_ref().map(|v| v.to_string()),
                entry.tool_correlation_id,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(entry)
    }

    /// Load the most recent `k` rows for `agent_id`, in chronological order
    /// (oldest first) — the shape the FIFO queue and context assembler need.
    pub fn load_last_k(&self, agent_id: &str, k: usize) -> Result<Vec<ConversationEntry>> {
        let conn = crate::pool::get(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT id, agent_id, role, content, tool_name, tool_args, tool_correlation_id, created_at \
             FROM conversation_history WHERE agent_id = ?1 \
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![agent_id, k as i64], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().rev().collect())
    }

    pub fn count(&self, agent_id: &str) -> Result<usize> {
        let conn = crate::pool::get(&self.pool)?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversation_history WHERE agent_id = ?1",
            params![agent_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<ConversationEntry> {
    let role_str: String = row.get(2)?;
    let tool_args_str: Option<String> = row.get(5)?;
    let created_at: String = row.get(7)?;
    Ok(ConversationEntry {
        id: row.get(0)?,
        agent_id: row.get(1)?,
        role: ConversationRole::from_str(&role_str).unwrap_or(ConversationRole::SystemAnnouncement),
        content: row.get(3)?,
        tool_name: row.get(4)?,
        tool_args: tool_args_str.and_then(|s| serde_json::from_str(&s).ok()),
        tool_correlation_id: row.get(6)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .unwrap()
            .with_timezone(&Utc),
    })
}
