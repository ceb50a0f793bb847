//! Persistent agent memory: relational store, resident HNSW archival index,
//! FIFO conversation view, and working memory.

pub mod agent_store;
pub mod archival;
pub mod conversation_log;
pub mod fifo;
pub mod pool;
pub mod schema;

use std::sync::Arc;

use memengine_domain::config::Config;
use memengine_domain::error::Result;
use memengine_domain::model::Agent;

pub use agent_store::AgentStore;
pub use archival::ArchivalStore;
pub use conversation_log::ConversationLog;
pub use fifo::FifoQueue;
pub use pool::Pool;

/// Ties the relational pool, archival index, conversation log, and agent
/// record store into the one handle the engine and tools depend on.
pub struct Store {
    pub pool: Pool,
    pub agents: Arc<AgentStore>,
    pub conversation_log: Arc<ConversationLog>,
    pub archival: Arc<ArchivalStore>,
}

impl Store {
    pub fn open(config: &Config) -> Result<Self> {
        let pool = pool::build_pool(&config.database)?;
        {
            let conn = pool::get(&pool)?;
            schema::ensure_schema(&conn)?;
        }

        Ok(Self {
            agents: Arc::new(AgentStore::new(pool.clone())),
            conversation_log: Arc::new(ConversationLog::new(pool.clone())),
            archival: Arc::new(ArchivalStore::new(
                pool.clone(),
                config.archival.embedding_dim,
                config.archival.hnsw_m,
                config.archival.hnsw_ef_construction,
                config.archival.hnsw_ef_search,
            )),
            pool,
        })
    }

    /// Load or create an agent and the bounded FIFO view over its
    /// conversation log, ready for the step loop (§4.7).
    pub fn open_agent(&self, config: &Config) -> Result<(Agent, FifoQueue)> {
        let agent = self.agents.get_or_create(
            &config.agent.name,
            &config.agent.model_id,
            config.agent.fifo_capacity,
            &config.agent.workspace_root,
        )?;
        let fifo = FifoQueue::load_from_log(
            self.conversation_log.clone(),
            self.archival.clone(),
            &agent.id,
            agent.fifo_capacity,
        )?;
        Ok((agent, fifo))
    }
}
