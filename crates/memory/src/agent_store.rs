//! Agent identity and lifecycle (§3, §6). An agent is created once at
//! startup or first use and destroyed only by explicit admin deletion,
//! which cascades to every archival and conversation row.

use chrono::Utc;
use memengine_domain::error::{EngineError, Result};
use memengine_domain::model::{Agent, WorkingMemory, WORKING_MEMORY_CAP_BYTES};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::pool::Pool;

/// Structural marker embedded in the default system-memory template. The
/// startup migration check (§6) compares this marker against what is
/// stored; a mismatch means the binary's template shape changed and the
/// stored value is replaced.
const SYSTEM_TEMPLATE_MARKER: &str = "<!-- memengine-system-template:v1 -->";

pub fn default_system_memory_text(name: &str, model_id: &str) -> String {
    format!(
        "{marker}\n\
         You are {name}, a persistent conversational agent backed by a \
         hierarchical memory system. Your chat model is {model_id}. You \
         have durable archival memory and a small working-memory document; \
         neither is visible unless you explicitly query or update it.",
        marker = SYSTEM_TEMPLATE_MARKER,
        name = name,
        model_id = model_id,
    )
}

pub struct AgentStore {
    pool: Pool,
}

impl AgentStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Load an existing agent by name, or create one with the given
    /// defaults. Runs the system-memory migration check either way (§6).
    pub fn get_or_create(
        &self,
        name: &str,
        model_id: &str,
        fifo_capacity: usize,
        workspace_root: &std::path::Path,
    ) -> Result<Agent> {
        let conn = crate::pool::get(&self.pool)?;
        let existing: Option<Agent> = conn
            .query_row(
                "SELECT id, name, model_id, system_memory_text, working_memory_text, \
                 fifo_capacity, workspace_root, created_at, updated_at \
                 FROM agents WHERE name = ?1",
                params![name],
                row_to_agent,
            )
            .optional()?;

        let mut agent = match existing {
            Some(a) => a,
            None => {
                let now = Utc::now();
                let agent = Agent {
                    id: Uuid::new_v4().to_string(),
                    name: name.to_string(),
                    model_id: model_id.to_string(),
                    system_memory_text: default_system_memory_text(name, model_id),
                    working_memory_text: WorkingMemory::default().to_text(),
                    fifo_capacity,
                    workspace_root: workspace_root.to_path_buf(),
                    created_at: now,
                    updated_at: now,
                };
                conn.execute(
                    "INSERT INTO agents (id, name, model_id, system_memory_text, \
                     working_memory_text, fifo_capacity, workspace_root, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        agent.id,
                        agent.name,
                        agent.model_id,
                        agent.system_memory_text,
                        agent.working_memory_text,
                        agent.fifo_capacity as i64,
                        agent.workspace_root.to_string_lossy(),
                        agent.created_at.to_rfc3339(),
                        agent.updated_at.to_rfc3339(),
                    ],
                )?;
                agent
            }
        };

        if !agent.system_memory_text.contains(SYSTEM_TEMPLATE_MARKER) {
            let fresh = default_system_memory_text(&agent.name, &agent.model_id);
            conn.execute(
                "UPDATE agents SET system_memory_text = ?1, updated_at = ?2 WHERE id = ?3",
                params![fresh, Utc::now().to_rfc3339(), agent.id],
            )?;
            agent.system_memory_text = fresh;
            tracing::info!(agent = %agent.name, "system memory template migrated");
        }

        std::fs::create_dir_all(&agent.workspace_root)?;
        Ok(agent)
    }

    /// Apply `update_working_memory(field_path, value)` (§4.6): merge one
    /// field into the document, enforcing the size cap after update.
    pub fn update_working_memory(&self, agent_id: &str, field_path: &str, value: &str) -> Result<String> {
        let conn = crate::pool::get(&self.pool)?;
        let current_text: String = conn.query_row(
            "SELECT working_memory_text FROM agents WHERE id = ?1",
            params![agent_id],
            |row| row.get(0),
        )?;

        let mut doc = WorkingMemory::from_text(&current_text);
        let parsed_value: serde_json::Value =
            serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        set_field_path(&mut doc.0, field_path, parsed_value);

        let updated_text = doc.to_text();
        if updated_text.len() > WORKING_MEMORY_CAP_BYTES {
            return Err(EngineError::ResourceExhausted(format!(
                "working memory would exceed {} bytes (got {})",
                WORKING_MEMORY_CAP_BYTES,
                updated_text.len()
            )));
        }

        conn.execute(
            "UPDATE agents SET working_memory_text = ?1, updated_at = ?2 WHERE id = ?3",
            params![updated_text, Utc::now().to_rfc3339(), agent_id],
        )?;
        Ok(updated_text)
    }

    pub fn get_working_memory(&self, agent_id: &str) -> Result<String> {
        let conn = crate::pool::get(&self.pool)?;
        let text: String = conn.query_row(
            "SELECT working_memory_text FROM agents WHERE id = ?1",
            params![agent_id],
            |row| row.get(0),
        )?;
        Ok(text)
    }

    /// Admin deletion: cascades to `memory_entries` and `conversation_history`
    /// via `ON DELETE CASCADE`.
    pub fn delete_agent(&self, agent_id: &str) -> Result<()> {
        let conn = crate::pool::get(&self.pool)?;
        conn.execute("DELETE FROM agents WHERE id = ?1", params![agent_id])?;
        Ok(())
    }
}

/// Set a single field (dotted path is treated as one flat key, matching
/// the engine's "opaque key-value text" treatment of working memory, §3).
fn set_field_path(map: &mut serde_json::Map<String, serde_json::Value>, field_path: &str, value: serde_json::Value) {
    map.insert(field_path.to_string(), value);
}

fn row_to_agent(row: &rusqlite::Row) -> rusqlite::Result<Agent> {
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        model_id: row.get(2)?,
        system_memory_text: row.get(3)?,
        working_memory_text: row.get(4)?,
        fifo_capacity: row.get::<_, i64>(5)? as usize,
        workspace_root: std::path::PathBuf::from(row.get::<_, String>(6)?),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .unwrap()
            .with_timezone(&Utc),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .unwrap()
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_schema;
    use r2d2_sqlite::SqliteConnectionManager;

    fn test_pool() -> Pool {
        let manager = SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        ensure_schema(&pool.get().unwrap()).unwrap();
        pool
    }

    #[test]
    fn creates_agent_with_default_system_memory() {
        let store = AgentStore::new(test_pool());
        let dir = tempfile::tempdir().unwrap();
        let agent = store.get_or_create("alice", "gpt-4o-mini", 50, dir.path()).unwrap();
        assert_eq!(agent.name, "alice");
        assert!(agent.system_memory_text.contains(SYSTEM_TEMPLATE_MARKER));
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let store = AgentStore::new(test_pool());
        let dir = tempfile::tempdir().unwrap();
        let a1 = store.get_or_create("alice", "gpt-4o-mini", 50, dir.path()).unwrap();
        let a2 = store.get_or_create("alice", "gpt-4o-mini", 50, dir.path()).unwrap();
        assert_eq!(a1.id, a2.id);
    }

    #[test]
    fn update_working_memory_applied_twice_is_idempotent() {
        let store = AgentStore::new(test_pool());
        let dir = tempfile::tempdir().unwrap();
        let agent = store.get_or_create("alice", "m", 50, dir.path()).unwrap();
        let t1 = store.update_working_memory(&agent.id, "mood", "\"curious\"").unwrap();
        let t2 = store.update_working_memory(&agent.id, "mood", "\"curious\"").unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn update_working_memory_rejects_oversized_document() {
        let store = AgentStore::new(test_pool());
        let dir = tempfile::tempdir().unwrap();
        let agent = store.get_or_create("alice", "m", 50, dir.path()).unwrap();
        let huge = "x".repeat(WORKING_MEMORY_CAP_BYTES + 100);
        let result = store.update_working_memory(&agent.id, "blob", &format!("\"{}\"", huge));
        assert!(result.is_err());
    }
}
