use crate::AppError;

pub const MAX_FOLDER_PATH_LENGTH: usize = 1024;

/// Normalize a folder path relative to the upload root.
///
/// Backslashes become `/`, surrounding slashes and whitespace are trimmed, and
/// the empty string stands for the root. Absolute paths, `.`/`..` segments and
/// empty inner segments are rejected.
pub fn normalize_folder_path(raw: &str) -> Result<String, AppError> {
    let unified = raw.trim().replace('\\', "/");
    if unified.starts_with('/') {
        return Err(AppError::InvalidInput(format!(
            "Folder path '{}' must be relative to the upload root",
            raw
        )));
    }

    let trimmed = unified.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    if trimmed.len() > MAX_FOLDER_PATH_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Folder path exceeds {} characters",
            MAX_FOLDER_PATH_LENGTH
        )));
    }

    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(AppError::InvalidInput(format!(
                "Folder path '{}' contains an invalid segment",
                raw
            )));
        }
    }

    Ok(trimmed.to_string())
}

/// Parent folder of a relative path given as segments (last segment = file name).
pub fn folder_path_of(relative_path: &[String]) -> String {
    match relative_path.split_last() {
        Some((_, parents)) => parents.join("/"),
        None => String::new(),
    }
}
