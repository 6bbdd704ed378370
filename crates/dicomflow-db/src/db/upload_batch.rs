use async_trait::async_trait;
use dicomflow_core::models::UploadBatch;
use dicomflow_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Folder structures registered ahead of chunked uploads
#[async_trait]
pub trait UploadBatchRepository: Send + Sync {
    async fn create(
        &self,
        uploaded_by: Uuid,
        patient_id: Uuid,
        folder_paths: Vec<String>,
    ) -> Result<UploadBatch, AppError>;

    async fn get(&self, uploaded_by: Uuid, order_id: Uuid)
        -> Result<Option<UploadBatch>, AppError>;
}

#[derive(Clone)]
pub struct PgUploadBatchRepository {
    pool: PgPool,
}

impl PgUploadBatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UploadBatchRepository for PgUploadBatchRepository {
    #[tracing::instrument(
        skip(self, folder_paths),
        fields(
            db.table = "upload_batches",
            db.operation = "insert",
            folder_count = folder_paths.len()
        )
    )]
    async fn create(
        &self,
        uploaded_by: Uuid,
        patient_id: Uuid,
        folder_paths: Vec<String>,
    ) -> Result<UploadBatch, AppError> {
        let batch = sqlx::query_as::<Postgres, UploadBatch>(
            r#"
            INSERT INTO upload_batches (order_id, uploaded_by, patient_id, folder_paths)
            VALUES ($1, $2, $3, $4)
            RETURNING order_id, uploaded_by, patient_id, folder_paths, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(uploaded_by)
        .bind(patient_id)
        .bind(&folder_paths)
        .fetch_one(&self.pool)
        .await?;

        Ok(batch)
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "upload_batches", db.operation = "select")
    )]
    async fn get(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
    ) -> Result<Option<UploadBatch>, AppError> {
        let batch = sqlx::query_as::<Postgres, UploadBatch>(
            r#"
            SELECT order_id, uploaded_by, patient_id, folder_paths, created_at
            FROM upload_batches
            WHERE order_id = $1 AND uploaded_by = $2
            "#,
        )
        .bind(order_id)
        .bind(uploaded_by)
        .fetch_optional(&self.pool)
        .await?;

        Ok(batch)
    }
}
