//! Authentication and role checks on the /dicom routes.

mod helpers;

use helpers::auth::{expired_token_for, sign, token_for};
use helpers::setup_test_app;
use serde_json::{json, Value};

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = setup_test_app().await;

    let response = app.client().get("/dicom/orders").await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_malformed_and_expired_tokens_are_unauthorized() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .get("/dicom/orders")
        .add_header("Authorization", "Token abc")
        .await;
    assert_eq!(response.status_code(), 401);

    let expired = expired_token_for(app.doctor.id, "doctor");
    let response = client
        .get("/dicom/orders")
        .add_header("Authorization", format!("Bearer {}", expired))
        .await;
    assert_eq!(response.status_code(), 401);

    let foreign = sign(
        app.doctor.id,
        "doctor",
        chrono::Duration::hours(1),
        "a-completely-different-secret-of-32-chars",
    );
    let response = client
        .get("/dicom/orders")
        .add_header("Authorization", format!("Bearer {}", foreign))
        .await;
    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_unknown_role_is_unauthorized() {
    let app = setup_test_app().await;

    let token = token_for(app.doctor.id, "nurse");
    let response = app
        .client()
        .get("/dicom/orders")
        .add_header("Authorization", format!("Bearer {}", token))
        .await;

    assert_eq!(response.status_code(), 401);
}

#[tokio::test]
async fn test_patient_may_read_but_not_write() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .get("/dicom/orders")
        .add_header("Authorization", app.patient.bearer())
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body, json!([]));

    let response = client
        .post("/dicom/folder-structure")
        .add_header("Authorization", app.patient.bearer())
        .json(&json!({ "patientId": app.patient.id, "structure": ["A"] }))
        .await;
    assert_eq!(response.status_code(), 403);
    let body: Value = response.json();
    assert_eq!(body["code"], "FORBIDDEN");

    let response = client
        .patch(&format!("/dicom/orders/{}/status", uuid::Uuid::new_v4()))
        .add_header("Authorization", app.patient.bearer())
        .json(&json!({ "status": "COMPLETED", "progress": 100 }))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn test_public_routes_need_no_token() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client.get("/live").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "alive");

    let response = client.get("/health").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["database"], "not_configured");
    assert_eq!(body["storage"], "healthy");

    let response = client.get("/api/openapi.json").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body["paths"]["/dicom/chunks"].is_object());
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/live")
        .add_header("X-Request-ID", "req-123")
        .await;

    assert_eq!(response.header("X-Request-ID"), "req-123");
    assert_eq!(response.header("X-Content-Type-Options"), "nosniff");
}
