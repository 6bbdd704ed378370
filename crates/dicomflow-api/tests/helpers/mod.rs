#![allow(dead_code)]

pub mod auth;
pub mod fixtures;
pub mod workflows;

use auth::TestUser;
use axum_test::TestServer;
use dicomflow_api::setup::routes::setup_routes;
use dicomflow_api::state::{AppState, RepositoryState, UploadLimits, UploadState};
use dicomflow_core::models::{User, UserRole};
use dicomflow_core::{Config, ServerConfig};
use dicomflow_db::memory::{
    InMemoryChunkSessionRepository, InMemoryMedicalFileRepository, InMemoryUploadBatchRepository,
    InMemoryUserRepository,
};
use dicomflow_storage::LocalStorage;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Test application backed by in-memory repositories and a temp-dir storage root
pub struct TestApp {
    pub server: TestServer,
    pub medical_files: InMemoryMedicalFileRepository,
    pub upload_batches: InMemoryUploadBatchRepository,
    pub chunk_sessions: InMemoryChunkSessionRepository,
    pub users: InMemoryUserRepository,
    pub storage: Arc<LocalStorage>,
    /// Uploading doctor
    pub doctor: TestUser,
    /// Second doctor, used as collaborator or as another uploader
    pub colleague: TestUser,
    pub patient: TestUser,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn test_config(storage_path: &str) -> ServerConfig {
    ServerConfig {
        server_port: 0,
        environment: "test".to_string(),
        cors_origins: vec!["*".to_string()],
        database_url: "postgres://unused".to_string(),
        db_max_connections: 1,
        db_timeout_seconds: 1,
        jwt_secret: auth::TEST_JWT_SECRET.to_string(),
        storage_path: storage_path.to_string(),
        max_chunk_file_size_bytes: 500 * 1024 * 1024,
        max_files_per_request: 2000,
        max_single_upload_size_bytes: 100 * 1024 * 1024,
        max_request_body_bytes: 4 * 1024 * 1024 * 1024,
        http_concurrency_limit: 64,
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Like [`setup_test_app`], with a hook to adjust the configuration first
pub async fn setup_test_app_with(adjust: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let storage_path = temp_dir.path().to_string_lossy().to_string();

    let mut server_config = test_config(&storage_path);
    adjust(&mut server_config);
    let config = Config(Box::new(server_config));

    let storage = Arc::new(
        LocalStorage::new(temp_dir.path())
            .await
            .expect("Failed to create local storage"),
    );

    let medical_files = InMemoryMedicalFileRepository::new();
    let upload_batches = InMemoryUploadBatchRepository::new();
    let chunk_sessions = InMemoryChunkSessionRepository::new();
    let users = InMemoryUserRepository::new();

    let doctor = seed_user(&users, "Dr. Grey", UserRole::Doctor).await;
    let colleague = seed_user(&users, "Dr. Shepherd", UserRole::Doctor).await;
    let patient = seed_user(&users, "Pat Patient", UserRole::Patient).await;

    let state = Arc::new(AppState {
        repos: RepositoryState {
            medical_files: Arc::new(medical_files.clone()),
            upload_batches: Arc::new(upload_batches.clone()),
            chunk_sessions: Arc::new(chunk_sessions.clone()),
            users: Arc::new(users.clone()),
        },
        upload: UploadState {
            storage: storage.clone(),
            limits: UploadLimits::from_config(&config),
        },
        pool: None,
    });

    let router = setup_routes(&config, state).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        medical_files,
        upload_batches,
        chunk_sessions,
        users,
        storage,
        doctor,
        colleague,
        patient,
        _temp_dir: temp_dir,
    }
}

async fn seed_user(users: &InMemoryUserRepository, name: &str, role: UserRole) -> TestUser {
    let id = Uuid::new_v4();
    users
        .add(User {
            id,
            display_name: name.to_string(),
            email: format!("{}@example.com", id),
            role,
        })
        .await;
    TestUser::new(id, role)
}
