use crate::error::AppError;
use media_feed::UploadFile;
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "heic", "heif"];

/// Declared MIME type of a picked file, from its extension
pub fn guess_mime_from_ext(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("heic") | Some("heif") => "image/heic",
        Some("mp4") => "video/mp4",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Opens the native picker and reads the chosen image; `None` when cancelled
pub async fn pick_image() -> Result<Option<UploadFile>, AppError> {
    let Some(handle) = rfd::AsyncFileDialog::new()
        .set_title("Upload photo")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file()
        .await
    else {
        return Ok(None);
    };

    let name = handle.file_name();
    let content_type = guess_mime_from_ext(Path::new(&name));
    let bytes = handle.read().await;
    if bytes.is_empty() {
        return Err(AppError::Picker(format!("{} is empty", name)));
    }
    log::debug!("Picked {} ({}, {} bytes)", name, content_type, bytes.len());

    Ok(Some(UploadFile::new(name, content_type, bytes)))
}
