use crate::adapters::atomic_write_bytes;
use crate::config::MAX_UPLOAD_BYTES;

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use time::OffsetDateTime;

pub(crate) const UPLOADS_DIR: &str = "uploads";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileKind {
    Pdf,
    Png,
    Jpeg,
    Gif,
    Webp,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Ppt,
    Pptx,
    Txt,
}

impl FileKind {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::Webp),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "xls" => Some(Self::Xls),
            "xlsx" => Some(Self::Xlsx),
            "ppt" => Some(Self::Ppt),
            "pptx" => Some(Self::Pptx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        [
            Self::Pdf,
            Self::Png,
            Self::Jpeg,
            Self::Gif,
            Self::Webp,
            Self::Doc,
            Self::Docx,
            Self::Xls,
            Self::Xlsx,
            Self::Ppt,
            Self::Pptx,
            Self::Txt,
        ]
        .into_iter()
        .find(|kind| kind.content_type() == content_type)
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Ppt => "ppt",
            Self::Pptx => "pptx",
            Self::Txt => "txt",
        }
    }

    pub(crate) fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
            Self::Doc => "application/msword",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Xls => "application/vnd.ms-excel",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Ppt => "application/vnd.ms-powerpoint",
            Self::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Txt => "text/plain",
        }
    }

    /// Kinds whose magic bytes are checked against the claimed type.
    fn is_sniffable(self) -> bool {
        matches!(
            self,
            Self::Pdf | Self::Png | Self::Jpeg | Self::Gif | Self::Webp
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid upload path")]
    BadPath,
    #[error("file not found")]
    NotFound,
    #[error("uploaded file is empty")]
    EmptyBody,
    #[error("uploaded file exceeds {MAX_UPLOAD_BYTES} bytes")]
    TooLarge,
    #[error("unsupported file type")]
    UnsupportedType,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug)]
pub(crate) struct StoredUpload {
    pub(crate) rel_path: String,
}

/// Writes `bytes` to `uploads/YYYY/MM/` under `root` and returns the relative path.
pub(crate) fn store_upload(
    root: &Path,
    bytes: &[u8],
    content_type: Option<&str>,
    filename: Option<&str>,
    now: OffsetDateTime,
) -> Result<StoredUpload, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::EmptyBody);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge);
    }

    let kind = detect_file_kind(content_type, filename, bytes)?;
    let year = now.year();
    let month = u8::from(now.month());

    let base = sanitize_base_name(filename);
    let dir = format!("{}/{:04}/{:02}", UPLOADS_DIR, year, month);

    for _ in 0..10 {
        let file_name = format!(
            "{}-{:04}{:02}{:02}-{:02}{:02}{:02}-{}.{}",
            base,
            year,
            month,
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            random_suffix(),
            kind.extension()
        );
        let rel_path = format!("{dir}/{file_name}");
        let rel_path_buf = Path::new(&rel_path);
        ensure_parent_dirs(root, rel_path_buf)?;
        let target = root.join(rel_path_buf);
        if target.exists() {
            continue;
        }
        atomic_write_bytes(&target, bytes)?;
        return Ok(StoredUpload { rel_path });
    }

    Err(UploadError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate upload name",
    )))
}

/// Resolves a stored `fileRef` to a regular file inside `root`, refusing symlinks and traversal.
pub(crate) fn resolve_file_path(root: &Path, rel_path: &str) -> Result<PathBuf, UploadError> {
    let safe_path = relative_path_to_path(rel_path).ok_or(UploadError::BadPath)?;
    if !safe_path.starts_with(UPLOADS_DIR) {
        return Err(UploadError::BadPath);
    }
    let root = std::fs::canonicalize(root)?;
    let mut current = root.clone();

    for component in safe_path.components() {
        let Component::Normal(component) = component else {
            return Err(UploadError::BadPath);
        };
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(metadata) => {
                if metadata.file_type().is_symlink() {
                    return Err(UploadError::BadPath);
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => return Err(UploadError::NotFound),
            Err(err) => return Err(UploadError::Io(err)),
        }
    }

    let resolved = std::fs::canonicalize(&current).map_err(not_found_or_io)?;
    if !resolved.starts_with(&root) {
        return Err(UploadError::BadPath);
    }
    let metadata = std::fs::metadata(&resolved).map_err(not_found_or_io)?;
    if !metadata.is_file() {
        return Err(UploadError::NotFound);
    }
    Ok(resolved)
}

pub(crate) fn content_type_for_path(rel_path: &str) -> &'static str {
    Path::new(rel_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(FileKind::from_extension)
        .map(FileKind::content_type)
        .unwrap_or("application/octet-stream")
}

/// File name offered to the browser on download.
pub(crate) fn download_name(title: &str, rel_path: &str) -> String {
    let base = sanitize_base_name(Some(title));
    match Path::new(rel_path).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

fn not_found_or_io(err: std::io::Error) -> UploadError {
    match err.kind() {
        ErrorKind::NotFound => UploadError::NotFound,
        _ => UploadError::Io(err),
    }
}

fn detect_file_kind(
    content_type: Option<&str>,
    filename: Option<&str>,
    bytes: &[u8],
) -> Result<FileKind, UploadError> {
    let from_header = content_type
        .filter(|value| *value != "application/octet-stream")
        .map(|value| FileKind::from_content_type(value).ok_or(UploadError::UnsupportedType))
        .transpose()?;
    let from_name = filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .and_then(FileKind::from_extension);
    let sniffed = sniff_file_kind(bytes);

    let claimed = from_header.or(from_name).or(sniffed);
    let Some(kind) = claimed else {
        return Err(UploadError::UnsupportedType);
    };
    if kind.is_sniffable() && sniffed != Some(kind) {
        return Err(UploadError::UnsupportedType);
    }
    Ok(kind)
}

fn sniff_file_kind(bytes: &[u8]) -> Option<FileKind> {
    if bytes.starts_with(b"%PDF-") {
        return Some(FileKind::Pdf);
    }
    if bytes.len() >= 8 && bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return Some(FileKind::Png);
    }
    if bytes.len() >= 3 && bytes[0] == 0xFF && bytes[1] == 0xD8 && bytes[2] == 0xFF {
        return Some(FileKind::Jpeg);
    }
    if bytes.len() >= 6 && (bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a")) {
        return Some(FileKind::Gif);
    }
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        return Some(FileKind::Webp);
    }
    None
}

fn sanitize_base_name(filename: Option<&str>) -> String {
    let base = filename
        .and_then(|name| Path::new(name).file_stem().and_then(|stem| stem.to_str()))
        .unwrap_or("document");
    let mut out = String::with_capacity(base.len());
    let mut last_dash = false;

    for ch in base.chars() {
        if ch.is_ascii_alphanumeric() {
            last_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else if !last_dash && !out.is_empty() {
            last_dash = true;
            out.push('-');
        }
    }

    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "document".to_string()
    } else if trimmed.len() > 40 {
        trimmed[..40].trim_end_matches('-').to_string()
    } else {
        trimmed.to_string()
    }
}

fn random_suffix() -> String {
    let value: u16 = rand::random();
    format!("{:04x}", value)
}

fn relative_path_to_path(rel_path: &str) -> Option<PathBuf> {
    if rel_path.is_empty() {
        return None;
    }
    let path = Path::new(rel_path);
    if path.is_absolute() {
        return None;
    }
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => components.push(part),
            _ => return None,
        }
    }
    if components.is_empty() {
        return None;
    }
    Some(components.iter().collect())
}

fn ensure_parent_dirs(root: &Path, rel_path: &Path) -> Result<(), UploadError> {
    let Some(parent) = rel_path.parent() else {
        return Ok(());
    };
    let mut current = root.to_path_buf();
    for component in parent.components() {
        let Component::Normal(component) = component else {
            return Err(UploadError::BadPath);
        };
        current.push(component);
        match std::fs::symlink_metadata(&current) {
            Ok(metadata) => {
                if metadata.file_type().is_symlink() || !metadata.is_dir() {
                    return Err(UploadError::BadPath);
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                std::fs::create_dir(&current)?;
            }
            Err(err) => return Err(UploadError::Io(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const PDF: &[u8] = b"%PDF-1.7\n%fake body";

    #[test]
    fn store_upload__should_write_dated_file_under_root() {
        // Given
        let root = create_temp_root("upload-store");
        let now = datetime!(2025-03-10 12:00 UTC);

        // When
        let stored = store_upload(&root, PDF, Some("application/pdf"), Some("Budget.pdf"), now)
            .expect("store upload");
        let target = root.join(&stored.rel_path);

        // Then
        assert!(stored.rel_path.starts_with("uploads/2025/03/budget-20250310-120000-"));
        assert!(stored.rel_path.ends_with(".pdf"));
        assert_eq!(std::fs::read(target).expect("read"), PDF);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn store_upload__should_reject_mismatched_magic_bytes() {
        // Given
        let root = create_temp_root("upload-mismatch");
        let now = datetime!(2025-03-10 12:00 UTC);

        // When
        let result = store_upload(&root, b"not a pdf", None, Some("fake.pdf"), now);

        // Then
        assert!(matches!(result, Err(UploadError::UnsupportedType)));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn store_upload__should_accept_office_documents_by_extension() {
        // Given
        let root = create_temp_root("upload-office");
        let now = datetime!(2025-03-10 12:00 UTC);

        // When
        let stored = store_upload(&root, b"PK\x03\x04", None, Some("Minutes.docx"), now)
            .expect("store upload");

        // Then
        assert!(stored.rel_path.ends_with(".docx"));
        assert_eq!(
            content_type_for_path(&stored.rel_path),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn store_upload__should_refuse_empty_and_unknown_files() {
        // Given
        let root = create_temp_root("upload-refuse");
        let now = datetime!(2025-03-10 12:00 UTC);

        // When
        let empty = store_upload(&root, b"", None, Some("a.pdf"), now);
        let unknown = store_upload(&root, b"MZ", None, Some("tool.exe"), now);

        // Then
        assert!(matches!(empty, Err(UploadError::EmptyBody)));
        assert!(matches!(unknown, Err(UploadError::UnsupportedType)));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn store_upload__should_refuse_files_over_limit() {
        // Given
        let root = create_temp_root("upload-too-large");
        let now = datetime!(2025-03-10 12:00 UTC);
        let mut bytes = PDF.to_vec();
        bytes.resize(MAX_UPLOAD_BYTES + 1, b' ');

        // When
        let result = store_upload(&root, &bytes, Some("application/pdf"), Some("big.pdf"), now);

        // Then
        assert!(matches!(result, Err(UploadError::TooLarge)));
        assert!(!root.join(UPLOADS_DIR).exists());

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn resolve_file_path__should_find_stored_upload() {
        // Given
        let root = create_temp_root("upload-resolve");
        let now = datetime!(2025-03-10 12:00 UTC);
        let stored = store_upload(&root, PDF, None, Some("a.pdf"), now).expect("store");

        // When
        let resolved = resolve_file_path(&root, &stored.rel_path).expect("resolve");

        // Then
        assert_eq!(std::fs::read(resolved).expect("read"), PDF);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn resolve_file_path__should_reject_traversal_and_blobs() {
        // Given
        let root = create_temp_root("upload-traversal");
        std::fs::write(root.join("users.json"), "[]").expect("write");

        // When
        let traversal = resolve_file_path(&root, "../outside.pdf");
        let blob = resolve_file_path(&root, "users.json");

        // Then
        assert!(matches!(traversal, Err(UploadError::BadPath)));
        assert!(matches!(blob, Err(UploadError::BadPath)));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn download_name__should_sanitize_title_and_keep_extension() {
        assert_eq!(
            download_name("Budget 2025 (final)", "uploads/2025/03/x.pdf"),
            "budget-2025-final.pdf"
        );
    }

    fn create_temp_root(test_name: &str) -> PathBuf {
        let mut root = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        root.push(format!("libraryconnect-{}-{}", test_name, nanos));
        std::fs::create_dir_all(&root).expect("create temp dir");
        root
    }
}
