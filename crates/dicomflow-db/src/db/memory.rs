//! In-memory repositories for tests
//!
//! Same contracts as the PostgreSQL repositories, backed by vectors and maps behind
//! a `tokio` mutex so handler tests can run without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dicomflow_core::models::{
    ChunkSession, MedicalFile, NewChunkSession, NewMedicalFile, OrderStatus, UploadBatch, User,
};
use dicomflow_core::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ChunkSessionRepository, MedicalFileRepository, UploadBatchRepository, UserRepository};

#[derive(Clone, Default)]
pub struct InMemoryMedicalFileRepository {
    records: Arc<Mutex<Vec<MedicalFile>>>,
}

impl InMemoryMedicalFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as-is, bypassing the insert defaults
    pub async fn seed(&self, record: MedicalFile) {
        self.records.lock().await.push(record);
    }

    /// Snapshot of every stored record
    pub async fn all(&self) -> Vec<MedicalFile> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl MedicalFileRepository for InMemoryMedicalFileRepository {
    async fn insert(&self, file: NewMedicalFile) -> Result<MedicalFile, AppError> {
        let mut records = self.records.lock().await;
        if records.iter().any(|r| r.storage_path == file.storage_path) {
            return Err(AppError::BadRequest(format!(
                "Storage path already recorded: {}",
                file.storage_path
            )));
        }

        let now = Utc::now();
        let record = MedicalFile {
            id: Uuid::new_v4(),
            file_name: file.file_name,
            file_type: file.file_type,
            storage_path: file.storage_path,
            uploaded_by: file.uploaded_by,
            patient_id: file.patient_id,
            size_bytes: file.size_bytes,
            status: NewMedicalFile::INITIAL_STATUS,
            progress: 0,
            order_id: file.order_id,
            collaborating_doctors: Vec::new(),
            folder_path: file.folder_path,
            tags: file.tags,
            created_at: now,
            updated_at: now,
        };
        records.push(record.clone());
        Ok(record)
    }

    async fn list_by_uploader(&self, uploaded_by: Uuid) -> Result<Vec<MedicalFile>, AppError> {
        let mut found: Vec<MedicalFile> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.uploaded_by == uploaded_by)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn list_by_order(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
    ) -> Result<Vec<MedicalFile>, AppError> {
        let mut found: Vec<MedicalFile> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.uploaded_by == uploaded_by && r.order_id == order_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        Ok(found)
    }

    async fn update_order_status(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
        status: OrderStatus,
        progress: i32,
    ) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut updated = 0;
        for record in self
            .records
            .lock()
            .await
            .iter_mut()
            .filter(|r| r.uploaded_by == uploaded_by && r.order_id == order_id)
        {
            record.status = status;
            record.progress = progress;
            record.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn add_collaborator(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut matched = 0;
        for record in self
            .records
            .lock()
            .await
            .iter_mut()
            .filter(|r| r.uploaded_by == uploaded_by && r.order_id == order_id)
        {
            if !record.collaborating_doctors.contains(&doctor_id) {
                record.collaborating_doctors.push(doctor_id);
            }
            record.updated_at = now;
            matched += 1;
        }
        Ok(matched)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUploadBatchRepository {
    batches: Arc<Mutex<HashMap<Uuid, UploadBatch>>>,
}

impl InMemoryUploadBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UploadBatchRepository for InMemoryUploadBatchRepository {
    async fn create(
        &self,
        uploaded_by: Uuid,
        patient_id: Uuid,
        folder_paths: Vec<String>,
    ) -> Result<UploadBatch, AppError> {
        let batch = UploadBatch {
            order_id: Uuid::new_v4(),
            uploaded_by,
            patient_id,
            folder_paths,
            created_at: Utc::now(),
        };
        self.batches
            .lock()
            .await
            .insert(batch.order_id, batch.clone());
        Ok(batch)
    }

    async fn get(
        &self,
        uploaded_by: Uuid,
        order_id: Uuid,
    ) -> Result<Option<UploadBatch>, AppError> {
        Ok(self
            .batches
            .lock()
            .await
            .get(&order_id)
            .filter(|b| b.uploaded_by == uploaded_by)
            .cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryChunkSessionRepository {
    sessions: Arc<Mutex<HashMap<(Uuid, String), ChunkSession>>>,
}

impl InMemoryChunkSessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

#[async_trait]
impl ChunkSessionRepository for InMemoryChunkSessionRepository {
    async fn start(&self, session: NewChunkSession) -> Result<ChunkSession, AppError> {
        let now = Utc::now();
        let mut sessions = self.sessions.lock().await;
        let key = (session.uploaded_by, session.file_id.clone());
        let created_at = sessions.get(&key).map(|s| s.created_at).unwrap_or(now);
        let row = ChunkSession {
            file_id: session.file_id,
            uploaded_by: session.uploaded_by,
            order_id: session.order_id,
            file_name: session.file_name,
            folder_path: session.folder_path,
            total_chunks: session.total_chunks,
            received_chunks: 0,
            received_bytes: 0,
            created_at,
            updated_at: now,
        };
        sessions.insert(key, row.clone());
        Ok(row)
    }

    async fn get(
        &self,
        uploaded_by: Uuid,
        file_id: &str,
    ) -> Result<Option<ChunkSession>, AppError> {
        Ok(self
            .sessions
            .lock()
            .await
            .get(&(uploaded_by, file_id.to_string()))
            .cloned())
    }

    async fn record_chunk(
        &self,
        uploaded_by: Uuid,
        file_id: &str,
        chunk_index: i32,
        size_bytes: i64,
    ) -> Result<Option<ChunkSession>, AppError> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&(uploaded_by, file_id.to_string())) {
            Some(session) if session.received_chunks == chunk_index => {
                session.received_chunks += 1;
                session.received_bytes += size_bytes;
                session.updated_at = Utc::now();
                Ok(Some(session.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete(&self, uploaded_by: Uuid, file_id: &str) -> Result<(), AppError> {
        self.sessions
            .lock()
            .await
            .remove(&(uploaded_by, file_id.to_string()));
        Ok(())
    }

    async fn take_stale(&self, idle_since: DateTime<Utc>) -> Result<Vec<ChunkSession>, AppError> {
        let mut sessions = self.sessions.lock().await;
        let stale: Vec<(Uuid, String)> = sessions
            .iter()
            .filter(|(_, s)| s.updated_at < idle_since)
            .map(|(key, _)| key.clone())
            .collect();
        Ok(stale
            .into_iter()
            .filter_map(|key| sessions.remove(&key))
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<Mutex<HashMap<Uuid, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, user: User) {
        self.users.lock().await.insert(user.id, user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[Uuid]) -> Result<Vec<User>, AppError> {
        let users = self.users.lock().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicomflow_core::models::FileType;

    fn new_file(uploaded_by: Uuid, order_id: Uuid, name: &str) -> NewMedicalFile {
        NewMedicalFile {
            file_name: name.to_string(),
            file_type: FileType::Dicom,
            storage_path: format!("dicom/{}/{}/{}", uploaded_by, order_id, name),
            uploaded_by,
            patient_id: Uuid::new_v4(),
            size_bytes: 132,
            order_id,
            folder_path: String::new(),
            tags: vec!["DICOM".to_string()],
        }
    }

    #[tokio::test]
    async fn bulk_update_is_scoped_to_owner() {
        let repo = InMemoryMedicalFileRepository::new();
        let order = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        repo.insert(new_file(owner, order, "a.dcm")).await.unwrap();
        repo.insert(new_file(owner, order, "b.dcm")).await.unwrap();
        repo.insert(new_file(stranger, order, "c.dcm")).await.unwrap();

        let updated = repo
            .update_order_status(owner, order, OrderStatus::Completed, 100)
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let strangers = repo.list_by_order(stranger, order).await.unwrap();
        assert_eq!(strangers[0].status, OrderStatus::InProgress);
    }

    #[tokio::test]
    async fn collaborator_is_added_once() {
        let repo = InMemoryMedicalFileRepository::new();
        let order = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        repo.insert(new_file(owner, order, "a.dcm")).await.unwrap();

        assert_eq!(repo.add_collaborator(owner, order, doctor).await.unwrap(), 1);
        assert_eq!(repo.add_collaborator(owner, order, doctor).await.unwrap(), 1);

        let records = repo.list_by_order(owner, order).await.unwrap();
        assert_eq!(records[0].collaborating_doctors, vec![doctor]);
    }

    #[tokio::test]
    async fn chunks_must_arrive_in_order() {
        let repo = InMemoryChunkSessionRepository::new();
        let owner = Uuid::new_v4();
        repo.start(NewChunkSession {
            file_id: "1-a.dcm".to_string(),
            uploaded_by: owner,
            order_id: Uuid::new_v4(),
            file_name: "a.dcm".to_string(),
            folder_path: String::new(),
            total_chunks: 2,
        })
        .await
        .unwrap();

        assert!(repo.record_chunk(owner, "1-a.dcm", 1, 10).await.unwrap().is_none());
        let session = repo.record_chunk(owner, "1-a.dcm", 0, 10).await.unwrap().unwrap();
        assert_eq!(session.received_chunks, 1);
        let session = repo.record_chunk(owner, "1-a.dcm", 1, 5).await.unwrap().unwrap();
        assert!(session.is_complete());
        assert_eq!(session.received_bytes, 15);
    }

    #[tokio::test]
    async fn take_stale_removes_only_idle_sessions() {
        let repo = InMemoryChunkSessionRepository::new();
        let owner = Uuid::new_v4();
        let start = |file_id: &str| NewChunkSession {
            file_id: file_id.to_string(),
            uploaded_by: owner,
            order_id: Uuid::new_v4(),
            file_name: "a.dcm".to_string(),
            folder_path: String::new(),
            total_chunks: 2,
        };
        repo.start(start("1-old.dcm")).await.unwrap();
        let cutoff = Utc::now() + chrono::Duration::milliseconds(1);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.start(start("2-new.dcm")).await.unwrap();

        let taken = repo.take_stale(cutoff).await.unwrap();

        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].file_id, "1-old.dcm");
        assert_eq!(repo.len().await, 1);
        assert!(repo.get(owner, "2-new.dcm").await.unwrap().is_some());
        assert!(repo.take_stale(cutoff).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batches_are_scoped_to_owner() {
        let repo = InMemoryUploadBatchRepository::new();
        let owner = Uuid::new_v4();
        let batch = repo
            .create(owner, Uuid::new_v4(), vec!["A".to_string()])
            .await
            .unwrap();
        assert!(repo.get(owner, batch.order_id).await.unwrap().is_some());
        assert!(repo.get(Uuid::new_v4(), batch.order_id).await.unwrap().is_none());
    }
}
