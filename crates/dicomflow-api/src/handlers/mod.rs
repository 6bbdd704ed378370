pub mod chunks;
pub mod folder_structure;
mod multipart;
pub mod orders;
pub mod upload;
