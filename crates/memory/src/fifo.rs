//! FIFO queue: a bounded in-memory view over the conversation log (§4.2).
//! Every appended row occupies a view slot. Once the view holds more than
//! `capacity` rows, the oldest drops out; if that row is overflow-eligible
//! it is also promoted into archival memory. The log row itself is never
//! deleted either way.

use memengine_domain::embed::Embedder;
use memengine_domain::error::Result;
use memengine_domain::model::{ConversationEntry, ConversationRole};
use memengine_domain::trace::TraceEvent;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::archival::ArchivalStore;
use crate::conversation_log::ConversationLog;

pub struct FifoQueue {
    log: Arc<ConversationLog>,
    archival: Arc<ArchivalStore>,
    capacity: usize,
    view: VecDeque<ConversationEntry>,
}

impl FifoQueue {
    /// Seed the view from the tail of the log (§6 restart semantics): on
    /// process start the view is rebuilt from the last `capacity` rows —
    /// every role, not just overflow-eligible ones — so a restart never
    /// re-promotes or re-drops anything that already happened in a prior
    /// process.
    pub fn load_from_log(log: Arc<ConversationLog>, archival: Arc<ArchivalStore>, agent_id: &str, capacity: usize) -> Result<Self> {
        let recent = log.load_last_k(agent_id, capacity)?;
        let view: VecDeque<ConversationEntry> = recent.into_iter().collect();
        Ok(Self {
            log,
            archival,
            capacity,
            view,
        })
    }

    pub fn items(&self) -> &VecDeque<ConversationEntry> {
        &self.view
    }

    /// Append a row to the durable log, then unconditionally to the view
    /// (§4.2 — the view is "the last K conversation rows", every role
    /// included). Overflow eviction, not append, is where eligibility
    /// matters: only an evicted row that `is_overflow_eligible()` is
    /// promoted into archival memory.
    pub async fn append(
        &mut self,
        agent_id: &str,
        role: ConversationRole,
        content: &str,
        tool_name: Option<&str>,
        tool_args: Option<&serde_json::Value>,
        tool_correlation_id: Option<&str>,
        embedder: &dyn Embedder,
    ) -> Result<ConversationEntry> {
        let entry = self
            .log
            .append(agent_id, role, content, tool_name, tool_args, tool_correlation_id)?;

        self.view.push_back(entry.clone());
        if self.view.len() > self.capacity {
            self.overflow_oldest(agent_id, embedder).await;
        }
        Ok(entry)
    }

    /// Best-effort: promotion failures never fail the turn (§4.2). The
    /// oldest row always drops from the view regardless of whether the
    /// embed/insert into archival memory succeeds; a failure is only
    /// logged.
    async fn overflow_oldest(&mut self, agent_id: &str, embedder: &dyn Embedder) {
        let Some(oldest) = self.view.pop_front() else {
            return;
        };
        if !oldest.is_overflow_eligible() {
            return;
        }

        let promotion = async {
            let vector = embedder.embed(&oldest.content).await?;
            self.archival.insert(agent_id, &oldest.content, vector, None)
        }
        .await;

        match promotion {
            Ok(_) => {
                TraceEvent::FifoOverflow {
                    agent: agent_id.to_string(),
                    promoted: true,
                    reason: None,
                }
                .emit();
            }
            Err(e) => {
                TraceEvent::FifoOverflow {
                    agent: agent_id.to_string(),
                    promoted: false,
                    reason: Some(e.to_string()),
                }
                .emit();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_schema;
    use async_trait::async_trait;
    use r2d2_sqlite::SqliteConnectionManager;

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 0.0])
        }
    }

    fn harness(capacity: usize) -> (Arc<ConversationLog>, Arc<ArchivalStore>, FifoQueue) {
        let manager = SqliteConnectionManager::memory();
        let pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        let conn = pool.get().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO agents (id, name, model_id, system_memory_text, working_memory_text, \
             fifo_capacity, workspace_root, created_at, updated_at) \
             VALUES ('a1', 'a1', 'm', '', '{}', 50, '.', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        drop(conn);
        let log = Arc::new(ConversationLog::new(pool.clone()));
        let archival = Arc::new(ArchivalStore::new(pool, 2, 16, 64, 64));
        let fifo = FifoQueue::load_from_log(log.clone(), archival.clone(), "a1", capacity).unwrap();
        (log, archival, fifo)
    }

    #[tokio::test]
    async fn view_never_exceeds_capacity() {
        let (_, _, mut fifo) = harness(3);
        let embedder = FakeEmbedder;
        for i in 0..10 {
            fifo.append("a1", ConversationRole::User, &format!("msg{}", i), None, None, None, &embedder)
                .await
                .unwrap();
        }
        assert_eq!(fifo.len(), 3);
    }

    #[tokio::test]
    async fn overflow_promotes_oldest_into_archival() {
        let (_, archival, mut fifo) = harness(2);
        let embedder = FakeEmbedder;
        fifo.append("a1", ConversationRole::User, "first", None, None, None, &embedder)
            .await
            .unwrap();
        fifo.append("a1", ConversationRole::User, "second", None, None, None, &embedder)
            .await
            .unwrap();
        fifo.append("a1", ConversationRole::User, "third", None, None, None, &embedder)
            .await
            .unwrap();

        assert_eq!(fifo.len(), 2);
        assert_eq!(archival.count("a1").unwrap(), 1);
    }

    #[tokio::test]
    async fn non_eligible_rows_occupy_a_view_slot_but_are_never_promoted() {
        let (_, archival, mut fifo) = harness(1);
        let embedder = FakeEmbedder;
        fifo.append("a1", ConversationRole::SystemAnnouncement, "note", None, None, None, &embedder)
            .await
            .unwrap();
        assert_eq!(fifo.len(), 1);

        // Pushing it out of a capacity-1 view must not promote it, since a
        // SystemAnnouncement row is not overflow-eligible.
        fifo.append("a1", ConversationRole::User, "next", None, None, None, &embedder)
            .await
            .unwrap();
        assert_eq!(archival.count("a1").unwrap(), 0);
    }

    #[tokio::test]
    async fn tool_call_rows_occupy_a_view_slot() {
        let (_, _, mut fifo) = harness(3);
        let embedder = FakeEmbedder;
        fifo.append(
            "a1",
            ConversationRole::ToolCall,
            "",
            Some("read_file"),
            Some(&serde_json::json!({"path": "a.txt"})),
            Some("c1"),
            &embedder,
        )
        .await
        .unwrap();
        assert_eq!(fifo.len(), 1);
        assert_eq!(fifo.items()[0].role, ConversationRole::ToolCall);
    }

    #[tokio::test]
    async fn restart_rebuild_is_idempotent() {
        let (log, archival, mut fifo) = harness(2);
        let embedder = FakeEmbedder;
        fifo.append("a1", ConversationRole::User, "a", None, None, None, &embedder)
            .await
            .unwrap();
        fifo.append("a1", ConversationRole::User, "b", None, None, None, &embedder)
            .await
            .unwrap();

        let rebuilt = FifoQueue::load_from_log(log, archival, "a1", 2).unwrap();
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt.items()[0].content, "a");
        assert_eq!(rebuilt.items()[1].content, "b");
    }
}
