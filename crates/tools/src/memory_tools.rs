//! Memory tools (§4.6): save_memory, search_memory, update_working_memory.
//! Thin wrappers over [`memengine_memory`] that shape results into the
//! plain-text success strings the LLM expects.

use memengine_domain::embed::Embedder;
use memengine_memory::{AgentStore, ArchivalStore};

pub async fn save_memory(
    archival: &ArchivalStore,
    embedder: &dyn Embedder,
    agent_id: &str,
    content: &str,
) -> Result<String, String> {
    let vector = embedder.embed(content).await.map_err(|e| e.to_string())?;
    archival
        .insert(agent_id, content, vector, None)
        .map_err(|e| e.to_string())?;
    Ok("Saved to archival memory".to_string())
}

pub async fn search_memory(
    archival: &ArchivalStore,
    embedder: &dyn Embedder,
    agent_id: &str,
    query: &str,
    limit: usize,
    limit_max: usize,
) -> Result<String, String> {
    let bounded_limit = limit.min(limit_max).max(1);
    let vector = embedder.embed(query).await.map_err(|e| e.to_string())?;
    let hits = archival
        .search_top_k(agent_id, &vector, bounded_limit)
        .map_err(|e| e.to_string())?;

    if hits.is_empty() {
        return Ok("No matching memories found".to_string());
    }

    let lines: Vec<String> = hits
        .iter()
        .map(|(entry, similarity)| format!("[{:.2}] {}", similarity, entry.content))
        .collect();
    Ok(lines.join("\n"))
}

pub fn update_working_memory(agents: &AgentStore, agent_id: &str, field_path: &str, value: &str) -> Result<String, String> {
    agents
        .update_working_memory(agent_id, field_path, value)
        .map(|_| format!("Updated {field_path}"))
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use memengine_domain::error::Result as DomainResult;
    use memengine_memory::pool::Pool;
    use memengine_memory::schema::ensure_schema;
    use r2d2_sqlite::SqliteConnectionManager;

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
            Ok(vec![text.len() as f32, 0.0])
        }
    }

    fn harness() -> (Pool, String) {
        let manager = SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        let conn = pool.get().unwrap();
        ensure_schema(&conn).unwrap();
        drop(conn);
        let agent_store = AgentStore::new(pool.clone());
        let agent = agent_store.get_or_create("alice", "m", 50, std::path::Path::new(".")).unwrap();
        (pool, agent.id)
    }

    #[tokio::test]
    async fn save_then_search_round_trips() {
        let (pool, agent_id) = harness();
        let archival = ArchivalStore::new(pool, 2, 16, 64, 64);
        let embedder = FakeEmbedder;

        save_memory(&archival, &embedder, &agent_id, "favorite color is purple").await.unwrap();
        let result = search_memory(&archival, &embedder, &agent_id, "favorite color", 5, 20).await.unwrap();
        assert!(result.contains("purple"));
    }

    #[tokio::test]
    async fn search_on_empty_store_succeeds_with_no_matches() {
        let (pool, agent_id) = harness();
        let archival = ArchivalStore::new(pool, 2, 16, 64, 64);
        let embedder = FakeEmbedder;

        let result = search_memory(&archival, &embedder, &agent_id, "anything", 5, 20).await.unwrap();
        assert_eq!(result, "No matching memories found");
    }

    #[test]
    fn update_working_memory_reports_the_field() {
        let (pool, agent_id) = harness();
        let agent_store = AgentStore::new(pool);
        let result = update_working_memory(&agent_store, &agent_id, "mood", "\"curious\"").unwrap();
        assert_eq!(result, "Updated mood");
    }
}
