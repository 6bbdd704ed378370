use async_trait::async_trait;
use dicomflow_core::models::User;
use dicomflow_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Read-only view of the user directory
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Users among `ids`, in no particular order; unknown ids are skipped
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<Postgres, User>(
            "SELECT id, display_name, email, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[tracing::instrument(
        skip(self, ids),
        fields(db.table = "users", db.operation = "select", count = ids.len())
    )]
    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let users = sqlx::query_as::<Postgres, User>(
            "SELECT id, display_name, email, role FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
