//! Durable archival store with cosine-similarity search (§4.1). Rows live in
//! the relational `memory_entries` table; the ANN index is a resident HNSW
//! graph per agent, rebuilt from that table lazily on first access and kept
//! in sync on every insert for the rest of the process lifetime.

use anndists::dist::DistCosine;
use chrono::{DateTime, Utc};
use hnsw_rs::hnsw::{Hnsw, Neighbour};
use memengine_domain::error::{EngineError, Result};
use memengine_domain::model::MemoryEntry;
use memengine_domain::trace::TraceEvent;
use parking_lot::RwLock;
use rusqlite::params;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::pool::Pool;
use crate::schema::{blob_to_vector, vector_to_blob};

/// One row's worth of metadata kept alongside its HNSW internal id, so a
/// search hit can be turned back into a [`MemoryEntry`] without a query.
#[derive(Clone)]
struct EntryMeta {
    id: String,
    content: String,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

struct AgentIndex {
    graph: Hnsw<'static, f32, DistCosine>,
    metas: Vec<EntryMeta>,
}

pub struct ArchivalStore {
    pool: Pool,
    embedding_dim: usize,
    hnsw_m: usize,
    hnsw_ef_construction: usize,
    hnsw_ef_search: usize,
    indices: RwLock<HashMap<String, Arc<RwLock<AgentIndex>>>>,
}

impl ArchivalStore {
    pub fn new(pool: Pool, embedding_dim: usize, hnsw_m: usize, hnsw_ef_construction: usize, hnsw_ef_search: usize) -> Self {
        Self {
            pool,
            embedding_dim,
            hnsw_m,
            hnsw_ef_construction,
            hnsw_ef_search,
            indices: RwLock::new(HashMap::new()),
        }
    }

    fn index_for(&self, agent_id: &str) -> Result<Arc<RwLock<AgentIndex>>> {
        if let Some(existing) = self.indices.read().get(agent_id) {
            return Ok(existing.clone());
        }

        let conn = crate::pool::get(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT id, content, embedding, metadata, created_at FROM memory_entries \
             WHERE agent_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows: Vec<(String, String, Vec<u8>, Option<String>, String)> = stmt
            .query_map(params![agent_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;

        let graph = Hnsw::new(
            self.hnsw_m,
            (rows.len() + 64).max(1024),
            16,
            self.hnsw_ef_construction,
            DistCosine,
        );
        let mut metas = Vec::with_capacity(rows.len());
        for (internal_id, (id, content, embedding_blob, metadata_json, created_at)) in rows.into_iter().enumerate() {
            let vector = blob_to_vector(&embedding_blob);
            graph.insert((&vector, internal_id));
            metas.push(EntryMeta {
                id,
                content,
                metadata: metadata_json.and_then(|s| serde_json::from_str(&s).ok()),
                created_at: DateTime::parse_from_rfc3339(&created_at).unwrap().with_timezone(&Utc),
            });
        }

        let index = Arc::new(RwLock::new(AgentIndex { graph, metas }));
        self.indices.write().insert(agent_id.to_string(), index.clone());
        Ok(index)
    }

    /// Persist a new entry and add it to the resident index (§4.1). Returns
    /// the stored entry.
    pub fn insert(&self, agent_id: &str, content: &str, vector: Vec<f32>, metadata: Option<serde_json::Value>) -> Result<MemoryEntry> {
        if vector.len() != self.embedding_dim {
            return Err(EngineError::Validation(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                vector.len()
            )));
        }

        let entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            content: content.to_string(),
            vector: vector.clone(),
            metadata: metadata.clone(),
            created_at: Utc::now(),
        };

        // Materialize the resident index *before* writing the new row, so a
        // lazy `index_for` rebuild (reading from `memory_entries`) cannot
        // see a row this call is about to add manually below.
        let index = self.index_for(agent_id)?;

        {
            let conn = crate::pool::get(&self.pool)?;
            conn.execute(
                "INSERT INTO memory_entries (id, agent_id, content, embedding, metadata, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id,
                    entry.agent_id,
                    entry.content,
                    vector_to_blob(&vector),
                    metadata.as_ref().map(|v| v.to_string()),
                    entry.created_at.to_rfc3339(),
                ],
            )?;
        }

        {
            let mut guard = index.write();
            let internal_id = guard.metas.len();
            guard.graph.insert((&vector, internal_id));
            guard.metas.push(EntryMeta {
                id: entry.id.clone(),
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
                created_at: entry.created_at,
            });
        }

        TraceEvent::ArchivalInsert {
            agent: agent_id.to_string(),
            entry_id: entry.id.clone(),
            content_chars: entry.content.chars().count(),
        }
        .emit();

        Ok(entry)
    }

    /// Cosine-similarity top-k search (§4.1). `query_vector` must match the
    /// configured embedding dimension.
    pub fn search_top_k(&self, agent_id: &str, query_vector: &[f32], k: usize) -> Result<Vec<(MemoryEntry, f32)>> {
        if query_vector.len() != self.embedding_dim {
            return Err(EngineError::Validation(format!(
                "query embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                query_vector.len()
            )));
        }

        let started = std::time::Instant::now();
        let index = self.index_for(agent_id)?;
        let guard = index.read();
        if guard.metas.is_empty() {
            TraceEvent::ArchivalSearch {
                agent: agent_id.to_string(),
                k,
                returned: 0,
                duration_ms: started.elapsed().as_millis() as u64,
            }
            .emit();
            return Ok(Vec::new());
        }

        let neighbours: Vec<Neighbour> = guard.graph.search(query_vector, k, self.hnsw_ef_search);
        let results: Vec<(MemoryEntry, f32)> = neighbours
            .into_iter()
            .filter_map(|n| {
                let meta = guard.metas.get(n.d_id)?;
                let similarity = 1.0 - n.distance;
                Some((
                    MemoryEntry {
                        id: meta.id.clone(),
                        agent_id: agent_id.to_string(),
                        content: meta.content.clone(),
                        vector: Vec::new(),
                        metadata: meta.metadata.clone(),
                        created_at: meta.created_at,
                    },
                    similarity,
                ))
            })
            .collect();

        TraceEvent::ArchivalSearch {
            agent: agent_id.to_string(),
            k,
            returned: results.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        Ok(results)
    }

    pub fn count(&self, agent_id: &str) -> Result<usize> {
        let conn = crate::pool::get(&self.pool)?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memory_entries WHERE agent_id = ?1",
            params![agent_id],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Drop the resident index for an agent, e.g. after admin deletion.
    pub fn evict(&self, agent_id: &str) {
        self.indices.write().remove(agent_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_schema;
    use r2d2_sqlite::SqliteConnectionManager;

    fn test_store(dim: usize) -> ArchivalStore {
        let manager = SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        let conn = pool.get().unwrap();
        ensure_schema(&conn).unwrap();
        for agent_id in ["a1", "a2"] {
            conn.execute(
                "INSERT INTO agents (id, name, model_id, system_memory_text, working_memory_text, \
                 fifo_capacity, workspace_root, created_at, updated_at) \
                 VALUES (?1, ?1, 'm', '', '{}', 50, '.', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
                params![agent_id],
            )
            .unwrap();
        }
        drop(conn);
        ArchivalStore::new(pool, dim, 16, 64, 64)
    }

    #[test]
    fn save_then_search_round_trips() {
        let store = test_store(3);
        store.insert("a1", "the sky is blue", vec![1.0, 0.0, 0.0], None).unwrap();
        store.insert("a1", "grass is green", vec![0.0, 1.0, 0.0], None).unwrap();

        let results = store.search_top_k("a1", &[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.content, "the sky is blue");
        assert!(results[0].1 > 0.9);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let store = test_store(3);
        let result = store.insert("a1", "bad vector", vec![1.0, 0.0], None);
        assert!(result.is_err());
    }

    #[test]
    fn agents_are_isolated() {
        let store = test_store(2);
        store.insert("a1", "only visible to a1", vec![1.0, 0.0], None).unwrap();
        let results = store.search_top_k("a2", &[1.0, 0.0], 5).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn index_survives_rebuild_from_relational_rows() {
        let store = test_store(2);
        store.insert("a1", "first", vec![1.0, 0.0], None).unwrap();
        store.evict("a1");
        let results = store.search_top_k("a1", &[1.0, 0.0], 5).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.content, "first");
    }
}
