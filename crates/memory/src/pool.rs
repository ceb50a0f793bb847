//! Connection pool over the relational store (§4.8). SQLite is the concrete
//! backend; `embedding` columns are stored as `BLOB` (little-endian f32s)
//! since SQLite has no native `vector(D)` type — the ANN index itself lives
//! in the resident per-agent HNSW graph (§4.1), kept consistent with these
//! rows on every insert.

use memengine_domain::config::DatabaseConfig;
use memengine_domain::error::{EngineError, Result};
use r2d2_sqlite::SqliteConnectionManager;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

pub fn build_pool(cfg: &DatabaseConfig) -> Result<Pool> {
    let manager = SqliteConnectionManager::file(&cfg.url).with_init(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")
    });
    r2d2::Pool::builder()
        .min_idle(Some(cfg.pool_min))
        .max_size(cfg.pool_max)
        .build(manager)
        .map_err(|e| EngineError::BackendUnavailable(format!("connection pool: {}", e)))
}

pub fn get(pool: &Pool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| EngineError::BackendUnavailable(format!("pool acquire: {}", e)))
}
