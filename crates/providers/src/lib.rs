//! LLM provider adapter: the chat/embedding capability surface (§6)
//! consumed by the agent step loop and the archival/save/search tools.

pub mod auth;
pub mod openai_compat;
pub mod traits;
pub(crate) mod util;

pub use memengine_domain::embed::Embedder;
pub use openai_compat::OpenAiCompatProvider;
pub use traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
