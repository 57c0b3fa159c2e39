use std::path::Path;

use crate::core::models::ImageUpload;

/// Guess a MIME type from the file extension.
pub fn mime_from_ext(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        Some("avif") => "image/avif",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

/// Read an image from disk for attaching to a post.
///
/// Non-image types and oversized files are rejected here, before any upload.
pub async fn load_image(path: &Path) -> Result<ImageUpload, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".into());
    let upload = ImageUpload {
        file_name,
        mime_type: mime_from_ext(path).to_owned(),
        bytes,
    };
    upload.validate().map_err(|e| e.message)?;
    Ok(upload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(mime_from_ext(Path::new("cat.PNG")), "image/png");
        assert_eq!(mime_from_ext(Path::new("a/b/photo.jpeg")), "image/jpeg");
        assert_eq!(mime_from_ext(Path::new("README")), "application/octet-stream");
    }

    #[tokio::test]
    async fn loads_image_from_disk() {
        let path = std::env::temp_dir().join(format!("timeline-{}.gif", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"GIF89a").await.unwrap();

        let upload = load_image(&path).await.unwrap();
        assert_eq!(upload.mime_type, "image/gif");
        assert_eq!(upload.bytes, b"GIF89a");
        assert!(upload.file_name.ends_with(".gif"));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_non_images() {
        let path = std::env::temp_dir().join(format!("timeline-{}.txt", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"hello").await.unwrap();

        let err = load_image(&path).await.unwrap_err();
        assert!(err.contains("not an image"));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_reports_path() {
        let err = load_image(Path::new("/nonexistent/cat.png")).await.unwrap_err();
        assert!(err.contains("/nonexistent/cat.png"));
    }
}
