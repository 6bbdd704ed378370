use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dicomflow_core::models::{ChunkSession, NewChunkSession};
use dicomflow_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Reassembly state of files arriving in chunks
#[async_trait]
pub trait ChunkSessionRepository: Send + Sync {
    /// Open a session for chunk 0. Reopening an existing file id starts it over.
    async fn start(&self, session: NewChunkSession) -> Result<ChunkSession, AppError>;

    async fn get(&self, uploaded_by: Uuid, file_id: &str)
        -> Result<Option<ChunkSession>, AppError>;

    /// Count one more chunk, but only if `chunk_index` is the next expected one.
    /// Returns `None` when the session is missing or the index is out of order.
    async fn record_chunk(
        &self,
        uploaded_by: Uuid,
        file_id: &str,
        chunk_index: i32,
        size_bytes: i64,
    ) -> Result<Option<ChunkSession>, AppError>;

    async fn delete(&self, uploaded_by: Uuid, file_id: &str) -> Result<(), AppError>;

    /// Remove every session not touched since `idle_since` and return them, so
    /// their staged chunks can be deleted.
    async fn take_stale(&self, idle_since: DateTime<Utc>) -> Result<Vec<ChunkSession>, AppError>;
}

#[derive(Clone)]
pub struct PgChunkSessionRepository {
    pool: PgPool,
}

impl PgChunkSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChunkSessionRepository for PgChunkSessionRepository {
    #[tracing::instrument(
        skip(self, session),
        fields(
            db.table = "chunk_sessions",
            db.operation = "upsert",
            file_id = %session.file_id,
            total_chunks = session.total_chunks
        )
    )]
    async fn start(&self, session: NewChunkSession) -> Result<ChunkSession, AppError> {
        let row = sqlx::query_as::<Postgres, ChunkSession>(
            r#"
            INSERT INTO chunk_sessions (
                file_id, uploaded_by, order_id, file_name, folder_path,
                total_chunks, received_chunks, received_bytes
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, 0)
            ON CONFLICT (uploaded_by, file_id) DO UPDATE SET
                order_id = EXCLUDED.order_id,
                file_name = EXCLUDED.file_name,
                folder_path = EXCLUDED.folder_path,
                total_chunks = EXCLUDED.total_chunks,
                received_chunks = 0,
                received_bytes = 0,
                updated_at = NOW()
            RETURNING file_id, uploaded_by, order_id, file_name, folder_path,
                      total_chunks, received_chunks, received_bytes, created_at, updated_at
            "#,
        )
        .bind(&session.file_id)
        .bind(session.uploaded_by)
        .bind(session.order_id)
        .bind(&session.file_name)
        .bind(&session.folder_path)
        .bind(session.total_chunks)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "chunk_sessions", db.operation = "select")
    )]
    async fn get(
        &self,
        uploaded_by: Uuid,
        file_id: &str,
    ) -> Result<Option<ChunkSession>, AppError> {
        let row = sqlx::query_as::<Postgres, ChunkSession>(
            r#"
            SELECT file_id, uploaded_by, order_id, file_name, folder_path,
                   total_chunks, received_chunks, received_bytes, created_at, updated_at
            FROM chunk_sessions
            WHERE uploaded_by = $1 AND file_id = $2
            "#,
        )
        .bind(uploaded_by)
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "chunk_sessions", db.operation = "update")
    )]
    async fn record_chunk(
        &self,
        uploaded_by: Uuid,
        file_id: &str,
        chunk_index: i32,
        size_bytes: i64,
    ) -> Result<Option<ChunkSession>, AppError> {
        let row = sqlx::query_as::<Postgres, ChunkSession>(
            r#"
            UPDATE chunk_sessions
            SET received_chunks = received_chunks + 1,
                received_bytes = received_bytes + $4,
                updated_at = NOW()
            WHERE uploaded_by = $1 AND file_id = $2 AND received_chunks = $3
            RETURNING file_id, uploaded_by, order_id, file_name, folder_path,
                      total_chunks, received_chunks, received_bytes, created_at, updated_at
            "#,
        )
        .bind(uploaded_by)
        .bind(file_id)
        .bind(chunk_index)
        .bind(size_bytes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "chunk_sessions", db.operation = "delete")
    )]
    async fn delete(&self, uploaded_by: Uuid, file_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM chunk_sessions WHERE uploaded_by = $1 AND file_id = $2")
            .bind(uploaded_by)
            .bind(file_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "chunk_sessions", db.operation = "delete")
    )]
    async fn take_stale(&self, idle_since: DateTime<Utc>) -> Result<Vec<ChunkSession>, AppError> {
        let rows = sqlx::query_as::<Postgres, ChunkSession>(
            r#"
            DELETE FROM chunk_sessions
            WHERE updated_at < $1
            RETURNING file_id, uploaded_by, order_id, file_name, folder_path,
                      total_chunks, received_chunks, received_bytes, created_at, updated_at
            "#,
        )
        .bind(idle_since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
