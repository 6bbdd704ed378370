//! Folder registration, chunk reassembly and whole-file upload.

use crate::state::{RepositoryState, UploadState};
use bytes::Bytes;
use dicomflow_core::constants::{DICOM_HEADER_LEN, DICOM_TAG, FOLDER_UPLOAD_MAX_BYTES};
use dicomflow_core::models::{
    ChunkReceipt, ChunkSession, FileType, MedicalFileResponse, NewChunkSession, NewMedicalFile,
    RegisterFolderStructureRequest, RegisterFolderStructureResponse, UploadBatch, UploadResponse,
};
use dicomflow_core::validation::dicom::{check_extension, check_magic};
use dicomflow_core::validation::{folder_path_of, normalize_folder_path};
use dicomflow_core::{validate_dicom, AppError, HeaderProbe, UploadLimit};
use dicomflow_storage::medical_file_key;
use uuid::Uuid;

/// One chunk of a folder upload, as parsed from `POST /dicom/chunks`
#[derive(Debug, Clone)]
pub struct ChunkUpload {
    pub file_id: String,
    pub chunk_index: i32,
    pub total_chunks: i32,
    pub order_id: Uuid,
    pub file_name: String,
    pub folder_path: String,
    pub data: Bytes,
}

/// One file part of `POST /dicom/upload`. `file_name` may carry a relative path.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub data: Bytes,
}

async fn ensure_patient_exists(repos: &RepositoryState, patient_id: Uuid) -> Result<(), AppError> {
    match repos.users.get(patient_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("Patient {} not found", patient_id))),
    }
}

/// Record the folder structure of an upload and mint its order id.
#[tracing::instrument(skip(repos, request), fields(folders = request.structure.len()))]
pub async fn register_folder_structure(
    repos: &RepositoryState,
    caller: Uuid,
    request: RegisterFolderStructureRequest,
) -> Result<RegisterFolderStructureResponse, AppError> {
    let mut structure: Vec<String> = Vec::with_capacity(request.structure.len());
    for raw in &request.structure {
        let path = normalize_folder_path(raw)?;
        if !structure.contains(&path) {
            structure.push(path);
        }
    }

    ensure_patient_exists(repos, request.patient_id).await?;

    let batch = repos
        .upload_batches
        .create(caller, request.patient_id, structure)
        .await?;

    tracing::info!(
        order_id = %batch.order_id,
        patient_id = %batch.patient_id,
        folders = batch.folder_paths.len(),
        "Folder structure registered"
    );

    Ok(RegisterFolderStructureResponse {
        order_id: batch.order_id,
        structure: batch.folder_paths,
    })
}

fn check_chunk_shape(chunk: &ChunkUpload) -> Result<(), AppError> {
    if chunk.file_id.trim().is_empty() {
        return Err(AppError::InvalidInput("fileId must not be empty".to_string()));
    }
    if chunk.file_name.trim().is_empty() || chunk.file_name.contains(['/', '\\']) {
        return Err(AppError::InvalidInput(format!(
            "Invalid file name '{}'",
            chunk.file_name
        )));
    }
    if chunk.total_chunks < 1 {
        return Err(AppError::InvalidInput(
            "totalChunks must be at least 1".to_string(),
        ));
    }
    if chunk.chunk_index < 0 || chunk.chunk_index >= chunk.total_chunks {
        return Err(AppError::InvalidInput(format!(
            "chunkIndex {} is outside 0..{}",
            chunk.chunk_index, chunk.total_chunks
        )));
    }
    Ok(())
}

/// Open the session on chunk 0, or load it and check the chunk continues it.
async fn open_session(
    repos: &RepositoryState,
    caller: Uuid,
    chunk: &ChunkUpload,
    folder_path: &str,
) -> Result<ChunkSession, AppError> {
    if chunk.chunk_index == 0 {
        check_extension(&chunk.file_name).map_err(|e| AppError::InvalidInput(e.to_string()))?;
        // The header check needs the whole preamble; tiny first chunks are left to the client.
        if chunk.data.len() >= DICOM_HEADER_LEN || chunk.total_chunks == 1 {
            check_magic(&chunk.file_name, HeaderProbe::Bytes(&chunk.data))
                .map_err(|e| AppError::InvalidInput(e.to_string()))?;
        }

        return repos
            .chunk_sessions
            .start(NewChunkSession {
                file_id: chunk.file_id.clone(),
                uploaded_by: caller,
                order_id: chunk.order_id,
                file_name: chunk.file_name.clone(),
                folder_path: folder_path.to_string(),
                total_chunks: chunk.total_chunks,
            })
            .await;
    }

    let session = repos
        .chunk_sessions
        .get(caller, &chunk.file_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("No upload in progress for file {}", chunk.file_id))
        })?;

    if session.order_id != chunk.order_id
        || session.file_name != chunk.file_name
        || session.total_chunks != chunk.total_chunks
        || session.folder_path != folder_path
    {
        return Err(AppError::InvalidInput(format!(
            "Chunk {} does not match the upload started for file {}",
            chunk.chunk_index, chunk.file_id
        )));
    }

    if session.received_chunks != chunk.chunk_index {
        return Err(AppError::InvalidInput(format!(
            "Chunks must arrive in order: expected chunk {} of file {}, got {}",
            session.received_chunks, chunk.file_id, chunk.chunk_index
        )));
    }

    Ok(session)
}

/// Stage one chunk; on the last one, assemble the file and persist its record.
#[tracing::instrument(
    skip(repos, upload, chunk),
    fields(
        order_id = %chunk.order_id,
        file_id = %chunk.file_id,
        chunk_index = chunk.chunk_index,
        total_chunks = chunk.total_chunks
    )
)]
pub async fn receive_chunk(
    repos: &RepositoryState,
    upload: &UploadState,
    caller: Uuid,
    chunk: ChunkUpload,
) -> Result<ChunkReceipt, AppError> {
    check_chunk_shape(&chunk)?;
    let folder_path = normalize_folder_path(&chunk.folder_path)?;

    let batch = repos
        .upload_batches
        .get(caller, chunk.order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {} not found", chunk.order_id)))?;

    if !batch.contains_folder(&folder_path) {
        return Err(AppError::InvalidInput(format!(
            "Folder '{}' is not part of the structure registered for order {}",
            folder_path, batch.order_id
        )));
    }

    let session = open_session(repos, caller, &chunk, &folder_path).await?;

    let chunk_len = chunk.data.len() as u64;
    if session.received_bytes as u64 + chunk_len > FOLDER_UPLOAD_MAX_BYTES {
        return Err(AppError::InvalidInput(format!(
            "File {} exceeds the maximum size of {}",
            chunk.file_name,
            UploadLimit::FolderUpload.label()
        )));
    }

    upload
        .storage
        .put(&session.chunk_key(chunk.chunk_index), chunk.data)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let session = repos
        .chunk_sessions
        .record_chunk(caller, &chunk.file_id, chunk.chunk_index, chunk_len as i64)
        .await?
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Chunk {} of file {} arrived out of order",
                chunk.chunk_index, chunk.file_id
            ))
        })?;

    let record_id = if session.is_complete() {
        Some(finalize_file(repos, upload, &batch, &session).await?)
    } else {
        None
    };

    Ok(ChunkReceipt {
        file_id: session.file_id,
        chunk_index: chunk.chunk_index,
        received_chunks: session.received_chunks,
        total_chunks: session.total_chunks,
        completed: record_id.is_some(),
        record_id,
    })
}

async fn finalize_file(
    repos: &RepositoryState,
    upload: &UploadState,
    batch: &UploadBatch,
    session: &ChunkSession,
) -> Result<Uuid, AppError> {
    let chunk_keys = session.chunk_keys();
    let storage_path = medical_file_key(
        session.uploaded_by,
        session.order_id,
        &session.file_id,
        &session.file_name,
    );

    let size = upload
        .storage
        .concat(&chunk_keys, &storage_path)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let record = repos
        .medical_files
        .insert(NewMedicalFile {
            file_name: session.file_name.clone(),
            file_type: FileType::from_file_name(&session.file_name),
            storage_path,
            uploaded_by: session.uploaded_by,
            patient_id: batch.patient_id,
            size_bytes: size as i64,
            order_id: session.order_id,
            folder_path: session.folder_path.clone(),
            tags: vec![DICOM_TAG.to_string()],
        })
        .await?;

    for key in &chunk_keys {
        if let Err(e) = upload.storage.delete(key).await {
            tracing::warn!(key = %key, error = %e, "Failed to delete staged chunk");
        }
    }
    repos
        .chunk_sessions
        .delete(session.uploaded_by, &session.file_id)
        .await?;

    tracing::info!(
        record_id = %record.id,
        file_name = %record.file_name,
        folder_path = %record.folder_path,
        size_bytes = size,
        "File assembled"
    );

    Ok(record.id)
}

/// Split a client-supplied relative name into `(file name, folder path)`.
fn split_relative_name(raw: &str) -> Result<(String, String), AppError> {
    let segments: Vec<String> = raw
        .replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let file_name = segments
        .last()
        .cloned()
        .ok_or_else(|| AppError::InvalidInput("File name must not be empty".to_string()))?;
    if file_name == "." || file_name == ".." {
        return Err(AppError::InvalidInput(format!("Invalid file name '{}'", raw)));
    }
    let folder_path = normalize_folder_path(&folder_path_of(&segments))?;

    Ok((file_name, folder_path))
}

/// Store whole files under a fresh order id, one record each.
#[tracing::instrument(skip(repos, upload, files), fields(files = files.len()))]
pub async fn upload_files(
    repos: &RepositoryState,
    upload: &UploadState,
    caller: Uuid,
    patient_id: Uuid,
    files: Vec<IncomingFile>,
) -> Result<UploadResponse, AppError> {
    if files.is_empty() {
        return Err(AppError::InvalidInput("No files provided".to_string()));
    }

    ensure_patient_exists(repos, patient_id).await?;

    let limit = UploadLimit::Custom(upload.limits.max_single_upload_bytes);
    let mut named = Vec::with_capacity(files.len());
    let mut failures = Vec::new();
    for file in files {
        let (file_name, folder_path) = split_relative_name(&file.file_name)?;
        let header = &file.data[..file.data.len().min(DICOM_HEADER_LEN)];
        let result = validate_dicom(
            &file_name,
            file.data.len() as u64,
            HeaderProbe::Bytes(header),
            limit,
        );
        if let Some(reason) = result.reason {
            failures.push(reason);
        }
        named.push((file_name, folder_path, file.data));
    }

    if !failures.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "{} file(s) failed validation: {}",
            failures.len(),
            failures.join("; ")
        )));
    }

    let order_id = Uuid::new_v4();
    let mut stored = Vec::with_capacity(named.len());
    for (file_name, folder_path, data) in named {
        let size_bytes = data.len() as i64;
        let storage_path =
            medical_file_key(caller, order_id, &Uuid::new_v4().to_string(), &file_name);

        upload
            .storage
            .put(&storage_path, data)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let record = repos
            .medical_files
            .insert(NewMedicalFile {
                file_type: FileType::from_file_name(&file_name),
                file_name,
                storage_path,
                uploaded_by: caller,
                patient_id,
                size_bytes,
                order_id,
                folder_path,
                tags: vec![DICOM_TAG.to_string()],
            })
            .await?;
        stored.push(MedicalFileResponse::from(record));
    }

    tracing::info!(order_id = %order_id, files = stored.len(), "Files uploaded");

    Ok(UploadResponse {
        order_id,
        files: stored,
    })
}
