//! Helpers shared by the multipart upload routes

use crate::error::HttpAppError;
use axum::extract::multipart::Field;
use bytes::{Bytes, BytesMut};
use dicomflow_core::AppError;

/// Read a binary part, failing as soon as it grows past `max_bytes`.
pub async fn read_part_limited(mut field: Field<'_>, max_bytes: u64) -> Result<Bytes, HttpAppError> {
    let name = field
        .file_name()
        .or(field.name())
        .unwrap_or("part")
        .to_string();
    let mut buf = BytesMut::new();

    while let Some(piece) = field.chunk().await? {
        if (buf.len() + piece.len()) as u64 > max_bytes {
            return Err(AppError::BadRequest(format!(
                "Part '{}' exceeds the maximum size of {} bytes",
                name,
                max_bytes
            ))
            .into());
        }
        buf.extend_from_slice(&piece);
    }

    Ok(buf.freeze())
}

pub async fn read_text(field: Field<'_>) -> Result<String, HttpAppError> {
    Ok(field.text().await?.trim().to_string())
}

/// Parse a text field, naming it in the error
pub fn parse_field<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Result<T, AppError> {
    let raw = raw.ok_or_else(|| AppError::InvalidInput(format!("Missing field '{}'", name)))?;
    raw.parse::<T>()
        .map_err(|_| AppError::InvalidInput(format!("Invalid value '{}' for field '{}'", raw, name)))
}
