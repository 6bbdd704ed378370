//! OpenAPI documentation, served at `/api/openapi.json` and rendered at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error;
use crate::handlers;
use dicomflow_core::models;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "dicomflow API",
        version = "0.1.0",
        description = "Large-folder DICOM upload pipeline: folder registration, chunked upload with server-side reassembly, whole-file upload, and order tracking. Every /dicom route requires a bearer token; writes require the doctor role."
    ),
    paths(
        // Uploads
        handlers::folder_structure::register_folder_structure,
        handlers::chunks::upload_chunk,
        handlers::upload::upload_files,
        // Orders
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::update_order_status,
        handlers::orders::add_collaborator,
    ),
    components(
        schemas(
            models::RegisterFolderStructureRequest,
            models::RegisterFolderStructureResponse,
            models::ChunkReceipt,
            models::UploadResponse,
            models::MedicalFileResponse,
            models::FileType,
            models::OrderStatus,
            models::OrderBucket,
            models::OrderSummary,
            models::OrderDetail,
            models::OrderFileEntry,
            models::DoctorRef,
            models::UpdateOrderStatusRequest,
            models::UpdateOrderStatusResponse,
            models::AddCollaboratorRequest,
            models::CollaboratorsResponse,
            error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "uploads", description = "Folder and file uploads"),
        (name = "orders", description = "Orders formed by uploaded files")
    )
)]
pub struct ApiDoc;
