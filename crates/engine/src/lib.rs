//! Agent step loop (§4.7): turn orchestration over a provider, the closed
//! tool set, and per-agent memory. [`bootstrap`] wires a loaded [`Config`]
//! into a ready-to-run [`AgentEngine`] the way the CLI entry point needs.

pub mod cancel;
pub mod step;

pub use cancel::CancelToken;
pub use step::AgentEngine;

use std::sync::Arc;

use memengine_domain::config::Config;
use memengine_domain::error::Result;
use memengine_memory::Store;
use memengine_providers::{auth::ApiKey, OpenAiCompatProvider};

/// Open the store, load or create the configured agent, and build a
/// chat/embedding provider from environment-supplied credentials (§6) —
/// the full startup sequence the CLI (or any other collaborator) needs
/// before it can call [`AgentEngine::run_turn`].
pub fn bootstrap(config: &Config) -> Result<AgentEngine> {
    let store = Store::open(config)?;
    let (agent, fifo) = store.open_agent(config)?;

    let api_key = ApiKey::from_env(&config.llm.api_key_env)?;
    let provider = Arc::new(OpenAiCompatProvider::new(
        "memengine",
        config.llm.chat_base_url.clone(),
        api_key,
        agent.model_id.clone(),
        config.llm.embedding_model.clone(),
        config.llm.request_timeout_secs.unwrap_or(60),
    )?);

    Ok(AgentEngine::new(
        agent,
        fifo,
        store.agents.clone(),
        store.archival.clone(),
        provider.clone(),
        provider,
        config.tools.clone(),
        config.archival.clone(),
        config.engine.tool_iteration_ceiling,
    ))
}
