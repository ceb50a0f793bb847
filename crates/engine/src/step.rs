//! Agent step loop (§4.7): drives one user turn through
//! `idle → awaiting_model → executing_tools → terminal`, assembling
//! context, calling the chat client, dispatching tool calls in order, and
//! persisting every append before it is reflected in the in-memory FIFO
//! view (enforced by [`memengine_memory::FifoQueue::append`] itself).

use std::sync::Arc;

use memengine_contextpack::ContextAssembler;
use memengine_domain::config::{ArchivalConfig, ToolsConfig};
use memengine_domain::embed::Embedder;
use memengine_domain::error::Result;
use memengine_domain::model::{Agent, ConversationRole};
use memengine_domain::tool::ToolDefinition;
use memengine_domain::trace::TraceEvent;
use memengine_memory::{AgentStore, ArchivalStore, FifoQueue};
use memengine_providers::{ChatRequest, LlmProvider};
use memengine_tools::ToolContext;

use crate::cancel::CancelToken;

const CANCELLED_MESSAGE: &str = "Turn cancelled.";

/// Drives a single agent's step loop. Not `Send`-shared across turns: each
/// agent's loop is serialized against itself (§5 scheduling model), so one
/// `AgentEngine` handles one agent's turns one at a time.
pub struct AgentEngine {
    agent: Agent,
    fifo: FifoQueue,
    agents_store: Arc<AgentStore>,
    provider: Arc<dyn LlmProvider>,
    embedder: Arc<dyn Embedder>,
    tool_ctx: ToolContext,
    tool_defs: Vec<ToolDefinition>,
    tool_iteration_ceiling: usize,
}

impl AgentEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: Agent,
        fifo: FifoQueue,
        agents_store: Arc<AgentStore>,
        archival: Arc<ArchivalStore>,
        provider: Arc<dyn LlmProvider>,
        embedder: Arc<dyn Embedder>,
        tools_config: ToolsConfig,
        archival_config: ArchivalConfig,
        tool_iteration_ceiling: usize,
    ) -> Self {
        let tool_ctx = ToolContext {
            workspace_root: agent.workspace_root.clone(),
            agent_id: agent.id.clone(),
            agents: agents_store.clone(),
            archival,
            embedder: embedder.clone(),
            tools_config,
            archival_config,
        };
        Self {
            agent,
            fifo,
            agents_store,
            provider,
            embedder,
            tool_ctx,
            tool_defs: memengine_tools::tool_definitions(),
            tool_iteration_ceiling,
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn fifo_len(&self) -> usize {
        self.fifo.len()
    }

    /// Run one user turn to completion and return the assistant's final
    /// text (§4.7 state machine). `cancel` is polled before every chat call
    /// and before every tool dispatch.
    pub async fn run_turn(&mut self, user_text: &str, cancel: &CancelToken) -> Result<String> {
        self.transition("idle", "awaiting_model");
        self.fifo
            .append(
                &self.agent.id,
                ConversationRole::User,
                user_text,
                None,
                None,
                None,
                self.embedder.as_ref(),
            )
            .await?;

        let mut executed_rounds = 0usize;
        let mut forced_final_pass_done = false;

        loop {
            if cancel.is_cancelled() {
                return self.finalize_cancelled().await;
            }

            let forced = executed_rounds >= self.tool_iteration_ceiling && !forced_final_pass_done;
            if forced {
                forced_final_pass_done = true;
                self.fifo
                    .append(
                        &self.agent.id,
                        ConversationRole::SystemAnnouncement,
                        "tool iteration limit reached",
                        None,
                        None,
                        None,
                        self.embedder.as_ref(),
                    )
                    .await?;
            }

            let working_memory_text = self.agents_store.get_working_memory(&self.agent.id)?;
            let items: Vec<_> = self.fifo.items().iter().cloned().collect();
            let (messages, _report) = ContextAssembler::assemble(
                &self.agent.id,
                &self.agent.system_memory_text,
                &working_memory_text,
                &self.tool_defs,
                &items,
            );

            let response = self
                .provider
                .chat(&ChatRequest {
                    messages,
                    tools: self.tool_defs.clone(),
                    temperature: Some(0.2),
                    max_tokens: None,
                    model: Some(self.agent.model_id.clone()),
                })
                .await?;

            if response.tool_calls.is_empty() || forced {
                self.transition("awaiting_model", "terminal");
                self.fifo
                    .append(
                        &self.agent.id,
                        ConversationRole::Assistant,
                        &response.content,
                        None,
                        None,
                        None,
                        self.embedder.as_ref(),
                    )
                    .await?;
                return Ok(response.content);
            }

            self.transition("awaiting_model", "executing_tools");
            self.fifo
                .append(
                    &self.agent.id,
                    ConversationRole::Assistant,
                    &response.content,
                    None,
                    None,
                    None,
                    self.embedder.as_ref(),
                )
                .await?;
            for call in &response.tool_calls {
                self.fifo
                    .append(
                        &self.agent.id,
                        ConversationRole::ToolCall,
                        "",
                        Some(&call.tool_name),
                        Some(&call.arguments),
                        Some(&call.call_id),
                        self.embedder.as_ref(),
                    )
                    .await?;
            }

            for call in &response.tool_calls {
                if cancel.is_cancelled() {
                    return self.finalize_cancelled().await;
                }
                let result = memengine_tools::dispatch(&self.tool_ctx, call).await;
                self.fifo
                    .append(
                        &self.agent.id,
                        ConversationRole::ToolResult,
                        &result,
                        Some(&call.tool_name),
                        None,
                        Some(&call.call_id),
                        self.embedder.as_ref(),
                    )
                    .await?;
            }
            executed_rounds += 1;
            self.transition("executing_tools", "awaiting_model");
        }
    }

    async fn finalize_cancelled(&mut self) -> Result<String> {
        self.fifo
            .append(
                &self.agent.id,
                ConversationRole::Assistant,
                CANCELLED_MESSAGE,
                None,
                None,
                None,
                self.embedder.as_ref(),
            )
            .await?;
        self.transition("*", "terminal");
        Ok(CANCELLED_MESSAGE.to_string())
    }

    fn transition(&self, from: &str, to: &str) {
        TraceEvent::StepTransition {
            agent: self.agent.id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        }
        .emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use memengine_domain::config::{ArchivalConfig as ArchivalCfg, ToolsConfig as ToolsCfg};
    use memengine_domain::error::Result as DomainResult;
    use memengine_domain::tool::ToolCall;
    use memengine_memory::pool::Pool;
    use memengine_memory::schema::ensure_schema;
    use memengine_providers::{ChatResponse, EmbeddingsRequest, EmbeddingsResponse};
    use parking_lot::Mutex;
    use r2d2_sqlite::SqliteConnectionManager;
    use tempfile::TempDir;

    /// Scripted provider: returns queued responses in order, regardless of
    /// the request, so tests can drive exact state-machine paths.
    struct ScriptedProvider {
        responses: Mutex<Vec<ChatResponse>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, _req: &ChatRequest) -> DomainResult<ChatResponse> {
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                return Ok(ChatResponse {
                    content: "done".into(),
                    tool_calls: vec![],
                    model: "fake".into(),
                    finish_reason: None,
                });
            }
            Ok(responses.remove(0))
        }

        async fn embeddings(&self, req: EmbeddingsRequest) -> DomainResult<EmbeddingsResponse> {
            Ok(EmbeddingsResponse {
                embeddings: req.input.iter().map(|s| vec![s.len() as f32, 0.0]).collect(),
            })
        }

        fn provider_id(&self) -> &str {
            "scripted"
        }
    }

    #[async_trait]
    impl Embedder for ScriptedProvider {
        async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
            Ok(vec![text.len() as f32, 0.0])
        }
    }

    fn harness(responses: Vec<ChatResponse>) -> (AgentEngine, TempDir) {
        let manager = SqliteConnectionManager::memory();
        let pool: Pool = r2d2::Pool::builder().max_size(1).build(manager).unwrap();
        let conn = pool.get().unwrap();
        ensure_schema(&conn).unwrap();
        drop(conn);

        let agents_store = Arc::new(AgentStore::new(pool.clone()));
        let ws = TempDir::new().unwrap();
        let agent = agents_store.get_or_create("alice", "fake-model", 50, ws.path()).unwrap();
        let fifo = FifoQueue::load_from_log(
            Arc::new(memengine_memory::ConversationLog::new(pool.clone())),
            Arc::new(ArchivalStore::new(pool.clone(), 2, 16, 64, 64)),
            &agent.id,
            agent.fifo_capacity,
        )
        .unwrap();
        let archival = Arc::new(ArchivalStore::new(pool, 2, 16, 64, 64));
        let provider = Arc::new(ScriptedProvider {
            responses: Mutex::new(responses),
        });

        let engine = AgentEngine::new(
            agent,
            fifo,
            agents_store,
            archival,
            provider.clone(),
            provider,
            ToolsCfg::default(),
            ArchivalCfg::default(),
            8,
        );
        (engine, ws)
    }

    fn text_response(text: &str) -> ChatResponse {
        ChatResponse {
            content: text.to_string(),
            tool_calls: vec![],
            model: "fake".into(),
            finish_reason: None,
        }
    }

    fn tool_call_response(text: &str, tool_name: &str, args: serde_json::Value) -> ChatResponse {
        ChatResponse {
            content: text.to_string(),
            tool_calls: vec![ToolCall {
                call_id: "c1".into(),
                tool_name: tool_name.into(),
                arguments: args,
            }],
            model: "fake".into(),
            finish_reason: None,
        }
    }

    #[tokio::test]
    async fn text_only_reply_terminates_immediately() {
        let (mut engine, _ws) = harness(vec![text_response("hello there")]);
        let reply = engine.run_turn("hi", &CancelToken::new()).await.unwrap();
        assert_eq!(reply, "hello there");
        assert_eq!(engine.fifo_len(), 2); // user + assistant
    }

    #[tokio::test]
    async fn tool_call_round_trip_feeds_result_back_to_model() {
        let (mut engine, ws) = harness(vec![
            tool_call_response("let me check", "write_file", serde_json::json!({"path": "a.txt", "content": "hi"})),
            text_response("wrote it"),
        ]);
        let reply = engine.run_turn("write a file", &CancelToken::new()).await.unwrap();
        assert_eq!(reply, "wrote it");
        assert!(ws.path().join("a.txt").exists());
        // user, assistant(with tool_calls), tool_call, tool_result,
        // assistant(final) — every row occupies a view slot (§4.2); only
        // overflow eviction is gated on eligibility.
        assert_eq!(engine.fifo_len(), 5);
    }

    #[tokio::test]
    async fn iteration_ceiling_forces_terminal_reply_and_drops_further_tool_calls() {
        let mut responses: Vec<ChatResponse> = (0..8)
            .map(|_| tool_call_response("again", "find_files", serde_json::json!({"glob": "*.txt"})))
            .collect();
        responses.push(tool_call_response("still want tools", "find_files", serde_json::json!({"glob": "*.txt"})));
        let (mut engine, _ws) = harness(responses);

        let reply = engine.run_turn("loop forever", &CancelToken::new()).await.unwrap();
        assert_eq!(reply, "still want tools");
    }

    #[tokio::test]
    async fn cancellation_before_chat_call_finalizes_immediately() {
        let (mut engine, _ws) = harness(vec![text_response("should not be reached")]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let reply = engine.run_turn("hi", &cancel).await.unwrap();
        assert_eq!(reply, "Turn cancelled.");
    }
}
