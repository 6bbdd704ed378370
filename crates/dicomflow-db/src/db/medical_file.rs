use async_trait::async_trait;
use dicomflow_core::models::{MedicalFile, NewMedicalFile, OrderStatus};
use dicomflow_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Access to medical file records. Every query is scoped by the uploader.
#[async_trait]
pub trait MedicalFileRepository: Send + Sync {
    /// Persist a freshly received file with the initial status and progress 0
    async fn insert(&self, file: NewMedicalFile) -> Result<MedicalFile, AppError>;

    /// All records uploaded by `uploaded_by`, newest first
    async fn list_by_uploader(&self, uploaded_by: Uuid) -> Result<Vec<MedicalFile>, AppError>;

    /// Records of one order owned by `uploaded_by`, oldest first
    async fn list_by_order(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
    ) -> Result<Vec<MedicalFile>, AppError>;

    /// Set status and progress on every record of the order; returns the number updated
    async fn update_order_status(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
        status: OrderStatus,
        progress: i32,
    ) -> Result<u64, AppError>;

    /// Add a doctor to every record of the order unless already present;
    /// returns the number of records matched
    async fn add_collaborator(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<u64, AppError>;
}

const MEDICAL_FILE_COLUMNS: &str = r#"
    id, file_name, file_type, storage_path, uploaded_by, patient_id, size_bytes,
    status, progress, order_id, collaborating_doctors, folder_path, tags,
    created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgMedicalFileRepository {
    pool: PgPool,
}

impl PgMedicalFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MedicalFileRepository for PgMedicalFileRepository {
    #[tracing::instrument(
        skip(self, file),
        fields(
            db.table = "medical_files",
            db.operation = "insert",
            order_id = %file.order_id,
            file_name = %file.file_name
        )
    )]
    async fn insert(&self, file: NewMedicalFile) -> Result<MedicalFile, AppError> {
        let query = format!(
            r#"
            INSERT INTO medical_files (
                id, file_name, file_type, storage_path, uploaded_by, patient_id,
                size_bytes, status, progress, order_id, collaborating_doctors,
                folder_path, tags
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, $9, '{{}}', $10, $11)
            RETURNING {}
            "#,
            MEDICAL_FILE_COLUMNS
        );

        let record = sqlx::query_as::<Postgres, MedicalFile>(&query)
            .bind(Uuid::new_v4())
            .bind(&file.file_name)
            .bind(file.file_type)
            .bind(&file.storage_path)
            .bind(file.uploaded_by)
            .bind(file.patient_id)
            .bind(file.size_bytes)
            .bind(NewMedicalFile::INITIAL_STATUS)
            .bind(file.order_id)
            .bind(&file.folder_path)
            .bind(&file.tags)
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(record_id = %record.id, "Medical file record created");

        Ok(record)
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "medical_files", db.operation = "select")
    )]
    async fn list_by_uploader(&self, uploaded_by: Uuid) -> Result<Vec<MedicalFile>, AppError> {
        let query = format!(
            r#"
            SELECT {}
            FROM medical_files
            WHERE uploaded_by = $1
            ORDER BY created_at DESC
            "#,
            MEDICAL_FILE_COLUMNS
        );

        let records = sqlx::query_as::<Postgres, MedicalFile>(&query)
            .bind(uploaded_by)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "medical_files", db.operation = "select")
    )]
    async fn list_by_order(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
    ) -> Result<Vec<MedicalFile>, AppError> {
        let query = format!(
            r#"
            SELECT {}
            FROM medical_files
            WHERE uploaded_by = $1 AND order_id = $2
            ORDER BY created_at ASC, file_name ASC
            "#,
            MEDICAL_FILE_COLUMNS
        );

        let records = sqlx::query_as::<Postgres, MedicalFile>(&query)
            .bind(uploaded_by)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "medical_files", db.operation = "update")
    )]
    async fn update_order_status(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
        status: OrderStatus,
        progress: i32,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE medical_files
            SET status = $3, progress = $4, updated_at = NOW()
            WHERE uploaded_by = $1 AND order_id = $2
            "#,
        )
        .bind(uploaded_by)
        .bind(order_id)
        .bind(status)
        .bind(progress)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(
        skip(self),
        fields(db.table = "medical_files", db.operation = "update")
    )]
    async fn add_collaborator(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<u64, AppError> {
        // Matching rows are always touched so the count reflects the order size,
        // the array only grows when the doctor is missing.
        let result = sqlx::query(
            r#"
            UPDATE medical_files
            SET collaborating_doctors = CASE
                    WHEN $3 = ANY(collaborating_doctors) THEN collaborating_doctors
                    ELSE array_append(collaborating_doctors, $3)
                END,
                updated_at = NOW()
            WHERE uploaded_by = $1 AND order_id = $2
            "#,
        )
        .bind(uploaded_by)
        .bind(order_id)
        .bind(doctor_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
