//! Embedding capability surface (§6), factored out of [`crate::tool`] so the
//! archival store and FIFO overflow hook can depend on it without pulling in
//! the full chat provider trait.

use crate::error::Result;

/// Produce a fixed-dimension vector for a text. D is fixed at deployment;
/// implementations do not normalize (the archival store treats similarity
/// as `1 − cosine_distance`).
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
