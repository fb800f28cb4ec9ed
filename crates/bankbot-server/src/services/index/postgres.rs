use async_trait::async_trait;
use pgvector::Vector;
use sqlx::FromRow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{EntryMetadata, IndexMatch, SemanticIndex};
use crate::database::DbPool;
use crate::services::provider::EmbeddingProvider;
use crate::utils::error::ChatError;

pub const DEFAULT_TABLE: &str = "response_cache";

/// Semantic index stored in a Postgres table with a pgvector column.
/// Ranking uses the cosine distance operator `<=>`, so distances line up with
/// [`super::MemoryIndex`]. Id uniqueness is enforced by the primary key; equal
/// distances come back in insertion order.
pub struct PgVectorIndex {
    pool: DbPool,
    embedder: Arc<dyn EmbeddingProvider>,
    table: String,
    query_timeout: Duration,
}

#[derive(FromRow)]
struct MatchRow {
    id: String,
    query: String,
    document: String,
    distance: f64,
}

/// Run one statement with an upper bound on its duration.
async fn bounded<T, F>(limit: Duration, op: &str, statement: F) -> Result<T, ChatError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, statement).await {
        Ok(result) => {
            result.map_err(|e| ChatError::IndexUnavailable(format!("{} failed: {}", op, e)))
        }
        Err(_) => Err(ChatError::IndexUnavailable(format!(
            "{} timed out after {:?}",
            op, limit
        ))),
    }
}

fn validate_table_name(table: &str) -> Result<(), ChatError> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ChatError::Config(format!("invalid index table name {:?}", table)))
    }
}

impl PgVectorIndex {
    /// Connect and make sure the extension and table exist. `dimension` of 0
    /// creates an unconstrained `vector` column.
    pub async fn connect(
        pool: DbPool,
        embedder: Arc<dyn EmbeddingProvider>,
        dimension: usize,
        query_timeout: Duration,
    ) -> Result<Self, ChatError> {
        Self::connect_table(pool, embedder, DEFAULT_TABLE, dimension, query_timeout).await
    }

    /// Same as [`Self::connect`] against a named table. The name is spliced
    /// into SQL, so it must be a plain identifier.
    pub async fn connect_table(
        pool: DbPool,
        embedder: Arc<dyn EmbeddingProvider>,
        table: &str,
        dimension: usize,
        query_timeout: Duration,
    ) -> Result<Self, ChatError> {
        validate_table_name(table)?;

        let index = Self {
            pool,
            embedder,
            table: table.to_string(),
            query_timeout,
        };
        index.ensure_schema(dimension).await?;
        Ok(index)
    }

    async fn ensure_schema(&self, dimension: usize) -> Result<(), ChatError> {
        let column = if dimension == 0 {
            "vector".to_string()
        } else {
            format!("vector({})", dimension)
        };

        bounded(
            self.query_timeout,
            "create extension",
            sqlx::query("CREATE EXTENSION IF NOT EXISTS vector").execute(self.pool.get_pool()),
        )
        .await?;

        let ddl = format!(
            r#"CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                seq BIGSERIAL NOT NULL,
                query TEXT NOT NULL CHECK (length(query) > 0),
                document TEXT NOT NULL CHECK (length(document) > 0),
                embedding {} NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#,
            self.table, column
        );
        bounded(
            self.query_timeout,
            "create table",
            sqlx::query(&ddl).execute(self.pool.get_pool()),
        )
        .await?;

        info!("{} table ready", self.table);
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vector, ChatError> {
        self.embedder
            .embed(text)
            .await
            .map(Vector::from)
            .map_err(|e| ChatError::IndexUnavailable(format!("embedding failed: {:#}", e)))
    }
}

#[async_trait]
impl SemanticIndex for PgVectorIndex {
    async fn add(&self, document: &str, metadata: EntryMetadata, id: &str) -> Result<(), ChatError> {
        let embedding = self.embed(document).await?;

        let sql = format!(
            "INSERT INTO {} (id, query, document, embedding) VALUES ($1, $2, $3, $4)",
            self.table
        );
        bounded(
            self.query_timeout,
            "insert",
            sqlx::query(&sql)
                .bind(id)
                .bind(&metadata.query)
                .bind(document)
                .bind(embedding)
                .execute(self.pool.get_pool()),
        )
        .await?;

        debug!("Indexed entry {} in Postgres", id);
        Ok(())
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<IndexMatch>, ChatError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embed(text).await?;

        let sql = format!(
            r#"SELECT
                id,
                query,
                document,
                (embedding <=> $1)::float8 AS distance
               FROM {}
               ORDER BY embedding <=> $1, seq
               LIMIT $2"#,
            self.table
        );
        let rows = bounded(
            self.query_timeout,
            "nearest-neighbour query",
            sqlx::query_as::<_, MatchRow>(&sql)
                .bind(query_vector)
                .bind(k as i64)
                .persistent(false)
                .fetch_all(self.pool.get_pool()),
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| IndexMatch {
                id: row.id,
                distance: row.distance as f32,
                document: row.document,
                metadata: EntryMetadata { query: row.query },
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, ChatError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        let count = bounded(
            self.query_timeout,
            "count",
            sqlx::query_scalar::<_, i64>(&sql).fetch_one(self.pool.get_pool()),
        )
        .await?;
        Ok(count.max(0) as usize)
    }
}
