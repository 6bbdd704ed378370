//! Whole-file upload through `POST /dicom/upload`.

mod helpers;

use dicomflow_storage::Storage;
use helpers::fixtures::dicom_bytes;
use helpers::workflows::upload_whole_files;
use helpers::{setup_test_app, setup_test_app_with};
use serde_json::Value;
use uuid::Uuid;

#[tokio::test]
async fn test_upload_groups_files_under_one_order() {
    let app = setup_test_app().await;

    let response = upload_whole_files(
        app.client(),
        &app.doctor,
        app.patient.id,
        vec![
            ("A/1.dcm", dicom_bytes(200)),
            ("A/B/2.dcm", dicom_bytes(300)),
            ("3", dicom_bytes(132)),
        ],
    )
    .await;

    assert_eq!(response.status_code(), 201, "{}", response.text());
    let body: Value = response.json();
    let order_id: Uuid = body["orderId"].as_str().unwrap().parse().unwrap();
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 3);

    let mut records = app.medical_files.all().await;
    records.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    assert!(records.iter().all(|r| r.order_id == order_id && r.uploaded_by == app.doctor.id));
    let names: Vec<&str> = records.iter().map(|r| r.file_name.as_str()).collect();
    assert_eq!(names, vec!["1.dcm", "2.dcm", "3"]);
    let folders: Vec<&str> = records.iter().map(|r| r.folder_path.as_str()).collect();
    assert_eq!(folders, vec!["A", "A/B", ""]);
    assert!(records.iter().all(|r| r.tags == vec!["DICOM".to_string()]));

    assert_eq!(
        app.storage.download(&records[1].storage_path).await.unwrap(),
        dicom_bytes(300)
    );
}

#[tokio::test]
async fn test_upload_rejects_batch_with_invalid_files() {
    let app = setup_test_app().await;

    let response = upload_whole_files(
        app.client(),
        &app.doctor,
        app.patient.id,
        vec![
            ("ok.dcm", dicom_bytes(200)),
            ("notes.txt", dicom_bytes(200)),
            ("short.dcm", vec![0u8; 20]),
        ],
    )
    .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "INVALID_INPUT");
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("notes.txt"));
    assert!(message.contains("short.dcm"));
    assert!(!message.contains("ok.dcm"));
    assert!(app.medical_files.all().await.is_empty());
}

#[tokio::test]
async fn test_upload_applies_single_file_cap() {
    let app = setup_test_app_with(|config| config.max_single_upload_size_bytes = 1024).await;

    let response = upload_whole_files(
        app.client(),
        &app.doctor,
        app.patient.id,
        vec![("big.dcm", dicom_bytes(2048))],
    )
    .await;

    assert_eq!(response.status_code(), 400);
    assert!(app.medical_files.all().await.is_empty());
}

#[tokio::test]
async fn test_upload_rejects_oversized_part_while_streaming() {
    let app = setup_test_app_with(|config| config.max_single_upload_size_bytes = 1024).await;

    let response = upload_whole_files(
        app.client(),
        &app.doctor,
        app.patient.id,
        vec![("ok.dcm", dicom_bytes(512)), ("big.dcm", dicom_bytes(1025))],
    )
    .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    // Part reader rejects it, before any file validation runs
    assert_eq!(body["code"], "BAD_REQUEST");
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("big.dcm"), "{}", message);
    assert!(message.contains("1024 bytes"), "{}", message);
    assert!(app.medical_files.all().await.is_empty());
}

#[tokio::test]
async fn test_upload_file_count_limit() {
    let app = setup_test_app_with(|config| config.max_files_per_request = 2).await;

    let response = upload_whole_files(
        app.client(),
        &app.doctor,
        app.patient.id,
        vec![
            ("1.dcm", dicom_bytes(140)),
            ("2.dcm", dicom_bytes(140)),
            ("3.dcm", dicom_bytes(140)),
        ],
    )
    .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "BAD_REQUEST");
    assert!(body["details"].is_string());
    assert!(app.medical_files.all().await.is_empty());
}

#[tokio::test]
async fn test_upload_part_size_limit() {
    let app = setup_test_app_with(|config| config.max_chunk_file_size_bytes = 512).await;

    let response = upload_whole_files(
        app.client(),
        &app.doctor,
        app.patient.id,
        vec![("big.dcm", dicom_bytes(4096))],
    )
    .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_upload_unknown_patient_is_not_found() {
    let app = setup_test_app().await;

    let response = upload_whole_files(
        app.client(),
        &app.doctor,
        Uuid::new_v4(),
        vec![("1.dcm", dicom_bytes(200))],
    )
    .await;

    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn test_upload_without_files_is_invalid() {
    let app = setup_test_app().await;

    let response = upload_whole_files(app.client(), &app.doctor, app.patient.id, vec![]).await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_upload_requires_doctor() {
    let app = setup_test_app().await;

    let response = upload_whole_files(
        app.client(),
        &app.patient,
        app.patient.id,
        vec![("1.dcm", dicom_bytes(200))],
    )
    .await;

    assert_eq!(response.status_code(), 403);
}
