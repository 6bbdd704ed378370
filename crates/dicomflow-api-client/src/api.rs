//! Domain methods for the dicomflow API client.
//!
//! Request and response types come from `dicomflow_core::models`.

use crate::upload::{validate_all, ChunkTransport, OutgoingChunk, UploadCandidate};
use crate::ApiClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use dicomflow_core::models::{
    AddCollaboratorRequest, ChunkReceipt, CollaboratorsResponse, OrderBucket, OrderDetail,
    OrderStatus, OrderSummary, RegisterFolderStructureRequest, RegisterFolderStructureResponse,
    UpdateOrderStatusRequest, UpdateOrderStatusResponse, UploadResponse,
};
use dicomflow_core::validation::UploadLimit;
use reqwest::multipart::{Form, Part};
use uuid::Uuid;

impl ApiClient {
    /// Register the folder paths of an upload and receive its order id.
    pub async fn register_folder_structure(
        &self,
        patient_id: Uuid,
        structure: Vec<String>,
    ) -> Result<RegisterFolderStructureResponse> {
        self.post_json(
            "/dicom/folder-structure",
            &RegisterFolderStructureRequest {
                patient_id,
                structure,
            },
        )
        .await
    }

    /// Send one chunk of a file.
    pub async fn upload_chunk(&self, chunk: OutgoingChunk) -> Result<ChunkReceipt> {
        let size = chunk.data.len();
        let form = Form::new()
            .text("fileId", chunk.file_id)
            .text("chunkIndex", chunk.chunk_index.to_string())
            .text("totalChunks", chunk.total_chunks.to_string())
            .text("orderId", chunk.order_id.to_string())
            .text("fileName", chunk.file_name.clone())
            .text("folderPath", chunk.folder_path)
            .part(
                "chunk",
                Part::stream_with_length(chunk.data, size as u64).file_name(chunk.file_name),
            );

        self.post_multipart("/dicom/chunks", form).await
    }

    /// Upload whole files in a single request; every file becomes one record of a
    /// new order. Files are checked against the 100 MiB single-upload cap first.
    pub async fn upload_files(
        &self,
        patient_id: Uuid,
        files: &[UploadCandidate],
    ) -> Result<UploadResponse> {
        validate_all(files, UploadLimit::SingleFile).await?;

        let mut form = Form::new().text("patientId", patient_id.to_string());
        for file in files {
            let bytes = tokio::fs::read(&file.path)
                .await
                .with_context(|| format!("Failed to read file: {}", file.path.display()))?;
            form = form.part(
                "files[]",
                Part::bytes(bytes).file_name(file.relative_path_string()),
            );
        }

        self.post_multipart("/dicom/upload", form).await
    }

    /// Orders of the caller in `bucket`, newest first.
    pub async fn list_orders(&self, bucket: OrderBucket) -> Result<Vec<OrderSummary>> {
        let status = match bucket {
            OrderBucket::Current => "current",
            OrderBucket::Completed => "completed",
        };
        self.get("/dicom/orders", &[("status", status.to_string())])
            .await
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetail> {
        self.get(&format!("/dicom/orders/{}", order_id), &[]).await
    }

    /// Set status and progress on every record of an order.
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        progress: i32,
    ) -> Result<UpdateOrderStatusResponse> {
        self.patch_json(
            &format!("/dicom/orders/{}/status", order_id),
            &UpdateOrderStatusRequest { status, progress },
        )
        .await
    }

    pub async fn add_collaborator(
        &self,
        order_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<CollaboratorsResponse> {
        self.post_json(
            &format!("/dicom/orders/{}/collaborators", order_id),
            &AddCollaboratorRequest { doctor_id },
        )
        .await
    }
}

#[async_trait]
impl ChunkTransport for ApiClient {
    async fn register_folder_structure(
        &self,
        request: RegisterFolderStructureRequest,
    ) -> Result<RegisterFolderStructureResponse> {
        ApiClient::register_folder_structure(self, request.patient_id, request.structure).await
    }

    async fn send_chunk(&self, chunk: OutgoingChunk) -> Result<ChunkReceipt> {
        self.upload_chunk(chunk).await
    }
}
