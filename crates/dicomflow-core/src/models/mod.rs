//! Data models for the application
//!
//! Persisted records, the order views derived from them, and the request/response
//! DTOs exchanged over `/dicom/*`.

mod medical_file;
pub mod order;
mod upload;
mod user;

pub use medical_file::{FileType, MedicalFile, MedicalFileResponse, NewMedicalFile, OrderStatus};
pub use order::{
    AddCollaboratorRequest, CollaboratorsResponse, DoctorRef, ListOrdersQuery, OrderBucket,
    OrderDetail, OrderFileEntry, OrderGroup, OrderSummary, UpdateOrderStatusRequest,
    UpdateOrderStatusResponse,
};
pub use upload::{
    sanitize_key_segment, ChunkReceipt, ChunkSession, NewChunkSession, RegisterFolderStructureRequest,
    RegisterFolderStructureResponse, UploadBatch, UploadResponse,
};
pub use user::{User, UserRole};
