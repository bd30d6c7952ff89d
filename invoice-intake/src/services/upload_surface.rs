//! Upload surface screening
//!
//! Files dropped on the upload surface are screened before they become batch
//! items. Only PDF, PNG and JPEG are accepted. The content type comes from the
//! magic bytes; only when the bytes match no known format does the extension
//! decide.
//! Rejected files are reported back and never enter the batch.

use thiserror::Error;

use crate::models::{ContentType, SourceFile};

/// Reasons a file is turned away at the upload surface
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("{name}: unsupported file type (only PDF, PNG and JPEG are accepted)")]
    UnsupportedType { name: String },

    #[error("{name}: file is empty")]
    Empty { name: String },

    #[error("{name}: {size} bytes exceeds the {max} byte limit")]
    TooLarge { name: String, size: usize, max: usize },
}

impl UploadError {
    /// Name of the rejected file
    pub fn file_name(&self) -> &str {
        match self {
            UploadError::UnsupportedType { name }
            | UploadError::Empty { name }
            | UploadError::TooLarge { name, .. } => name,
        }
    }
}

/// A file as received from the client, before screening
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// Result of screening one upload
#[derive(Debug, Default)]
pub struct Screened {
    /// Accepted files, in the order they were received
    pub accepted: Vec<SourceFile>,
    pub rejected: Vec<UploadError>,
}

/// Split `files` into accepted source files and rejections
pub fn screen(files: Vec<IncomingFile>, max_bytes: usize) -> Screened {
    let mut screened = Screened::default();

    for file in files {
        match screen_one(file, max_bytes) {
            Ok(source) => screened.accepted.push(source),
            Err(e) => {
                tracing::info!(reason = %e, "Upload rejected");
                screened.rejected.push(e);
            }
        }
    }

    screened
}

fn screen_one(file: IncomingFile, max_bytes: usize) -> Result<SourceFile, UploadError> {
    if file.bytes.is_empty() {
        return Err(UploadError::Empty { name: file.name });
    }

    if file.bytes.len() > max_bytes {
        return Err(UploadError::TooLarge {
            size: file.bytes.len(),
            max: max_bytes,
            name: file.name,
        });
    }

    let content_type = detect_content_type(&file.name, &file.bytes)
        .ok_or_else(|| UploadError::UnsupportedType {
            name: file.name.clone(),
        })?;

    Ok(SourceFile::new(file.name, content_type, file.bytes))
}

/// Content type from magic bytes, falling back to the file extension
///
/// Bytes recognised as some other format (a GIF renamed to `.png`) are
/// refused rather than trusted by extension.
pub fn detect_content_type(name: &str, bytes: &[u8]) -> Option<ContentType> {
    match infer::get(bytes) {
        Some(kind) => from_mime(kind.mime_type()),
        None => from_extension(name),
    }
}

fn from_mime(mime: &str) -> Option<ContentType> {
    match mime {
        "application/pdf" => Some(ContentType::Pdf),
        "image/png" => Some(ContentType::Png),
        "image/jpeg" => Some(ContentType::Jpeg),
        _ => None,
    }
}

fn from_extension(name: &str) -> Option<ContentType> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => Some(ContentType::Pdf),
        "png" => Some(ContentType::Png),
        "jpg" | "jpeg" => Some(ContentType::Jpeg),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn test_magic_bytes_win_over_extension() {
        assert_eq!(
            detect_content_type("scan.pdf", &PNG_HEADER),
            Some(ContentType::Png)
        );
        assert_eq!(
            detect_content_type("noext", b"%PDF-1.4"),
            Some(ContentType::Pdf)
        );
    }

    #[test]
    fn test_extension_fallback_is_case_insensitive() {
        assert_eq!(
            detect_content_type("Receipt.JPEG", b"not sniffable"),
            Some(ContentType::Jpeg)
        );
        assert_eq!(detect_content_type("notes.txt", b"hello"), None);
        assert_eq!(detect_content_type("README", b"hello"), None);
    }

    #[test]
    fn test_other_known_format_is_refused_despite_extension() {
        assert_eq!(detect_content_type("receipt.png", b"GIF89a\x01\x00"), None);
    }

    #[test]
    fn test_screen_keeps_order_and_reports_rejections() {
        let screened = screen(
            vec![
                IncomingFile::new("a.pdf", b"%PDF-1.7".to_vec()),
                IncomingFile::new("notes.txt", b"hello".to_vec()),
                IncomingFile::new("b.png", PNG_HEADER.to_vec()),
                IncomingFile::new("empty.pdf", Vec::new()),
            ],
            1024,
        );

        let names: Vec<&str> = screened.accepted.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a.pdf", "b.png"]);
        assert_eq!(
            screened.rejected,
            vec![
                UploadError::UnsupportedType {
                    name: "notes.txt".to_string()
                },
                UploadError::Empty {
                    name: "empty.pdf".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_oversized_file_is_rejected() {
        let screened = screen(vec![IncomingFile::new("big.pdf", vec![b'%'; 16])], 8);
        assert!(screened.accepted.is_empty());
        assert!(matches!(
            screened.rejected[0],
            UploadError::TooLarge { size: 16, max: 8, .. }
        ));
    }
}
