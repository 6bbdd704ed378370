//! Multi-request flows shared by the upload tests.

use super::auth::TestUser;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use uuid::Uuid;

pub async fn register_structure(
    client: &TestServer,
    user: &TestUser,
    patient_id: Uuid,
    structure: &[&str],
) -> TestResponse {
    client
        .post("/dicom/folder-structure")
        .add_header("Authorization", user.bearer())
        .json(&json!({ "patientId": patient_id, "structure": structure }))
        .await
}

/// Register a structure and return the minted order id
pub async fn register_order(
    client: &TestServer,
    user: &TestUser,
    patient_id: Uuid,
    structure: &[&str],
) -> Uuid {
    let response = register_structure(client, user, patient_id, structure).await;
    assert_eq!(response.status_code(), 201, "{}", response.text());
    let body: Value = response.json();
    body["orderId"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("orderId in response")
}

pub struct ChunkRequest<'a> {
    pub order_id: Uuid,
    pub file_id: &'a str,
    pub file_name: &'a str,
    pub folder_path: &'a str,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub data: Vec<u8>,
}

pub async fn send_chunk(client: &TestServer, user: &TestUser, chunk: ChunkRequest<'_>) -> TestResponse {
    let form = MultipartForm::new()
        .add_part("chunk", Part::bytes(chunk.data).file_name(chunk.file_name))
        .add_text("fileId", chunk.file_id)
        .add_text("chunkIndex", chunk.chunk_index)
        .add_text("totalChunks", chunk.total_chunks)
        .add_text("orderId", chunk.order_id)
        .add_text("fileName", chunk.file_name)
        .add_text("folderPath", chunk.folder_path);

    client
        .post("/dicom/chunks")
        .add_header("Authorization", user.bearer())
        .multipart(form)
        .await
}

/// Send `data` as sequential chunks of `chunk_size`; returns the last receipt.
#[allow(clippy::too_many_arguments)]
pub async fn upload_in_chunks(
    client: &TestServer,
    user: &TestUser,
    order_id: Uuid,
    file_id: &str,
    file_name: &str,
    folder_path: &str,
    data: &[u8],
    chunk_size: usize,
) -> Value {
    let pieces: Vec<&[u8]> = if data.is_empty() {
        vec![data]
    } else {
        data.chunks(chunk_size).collect()
    };
    let total_chunks = pieces.len();

    let mut last = Value::Null;
    for (chunk_index, piece) in pieces.into_iter().enumerate() {
        let response = send_chunk(
            client,
            user,
            ChunkRequest {
                order_id,
                file_id,
                file_name,
                folder_path,
                chunk_index,
                total_chunks,
                data: piece.to_vec(),
            },
        )
        .await;
        assert_eq!(response.status_code(), 200, "{}", response.text());
        last = response.json();
    }
    last
}

/// `POST /dicom/upload` with one part per `(file name, bytes)`
pub async fn upload_whole_files(
    client: &TestServer,
    user: &TestUser,
    patient_id: Uuid,
    files: Vec<(&str, Vec<u8>)>,
) -> TestResponse {
    let mut form = MultipartForm::new().add_text("patientId", patient_id);
    for (name, data) in files {
        form = form.add_part("files", Part::bytes(data).file_name(name));
    }

    client
        .post("/dicom/upload")
        .add_header("Authorization", user.bearer())
        .multipart(form)
        .await
}
