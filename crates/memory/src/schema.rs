//! Idempotent schema creation (§4.8, §6 "schema migration"). No external
//! migration runner — the schema is small and stable, so `CREATE TABLE IF
//! NOT EXISTS` plus index creation runs at startup.

use memengine_domain::error::Result;
use rusqlite::Connection;

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            id                   TEXT PRIMARY KEY,
            name                 TEXT NOT NULL UNIQUE,
            model_id             TEXT NOT NULL,
            system_memory_text   TEXT NOT NULL,
            working_memory_text  TEXT NOT NULL,
            fifo_capacity        INTEGER NOT NULL,
            workspace_root       TEXT NOT NULL,
            created_at           TEXT NOT NULL,
            updated_at           TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS memory_entries (
            id          TEXT PRIMARY KEY,
            agent_id    TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            embedding   BLOB NOT NULL,
            metadata    TEXT,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_memory_entries_agent
            ON memory_entries(agent_id, created_at DESC);

        CREATE TABLE IF NOT EXISTS conversation_history (
            id                    TEXT PRIMARY KEY,
            agent_id              TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
            role                  TEXT NOT NULL,
            content               TEXT NOT NULL,
            tool_name             TEXT,
            tool_args             TEXT,
            tool_correlation_id   TEXT,
            created_at            TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conversation_history_agent
            ON conversation_history(agent_id, created_at DESC);
        "#,
    )?;
    Ok(())
}

pub fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_blob_round_trips() {
        let v = vec![1.0_f32, -2.5, 0.0, 3.25];
        let blob = vector_to_blob(&v);
        assert_eq!(blob_to_vector(&blob), v);
    }
}
