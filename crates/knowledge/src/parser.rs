//! Source file classification and text splitting.

use sage_core::{AppError, AppResult};
use std::fs;
use std::path::Path;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Markdown,
    PlainText,
    Image,
    Unsupported,
}

impl ContentType {
    /// Detect content type from file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match ext.as_deref() {
            Some("md") | Some("markdown") => Self::Markdown,
            Some("txt") => Self::PlainText,
            Some("png") | Some("jpg") | Some("jpeg") | Some("gif") | Some("bmp")
            | Some("webp") | Some("tif") | Some("tiff") => Self::Image,
            _ => Self::Unsupported,
        }
    }

    /// Whether files of this type are ingested as text.
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Markdown | Self::PlainText)
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::PlainText => "text",
            Self::Image => "image",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Read a text source file.
pub fn read_text_file(path: &Path) -> AppResult<String> {
    let raw = fs::read_to_string(path)?;
    if raw.contains('\0') {
        tracing::warn!("Skipping likely binary file: {:?}", path);
        return Err(AppError::Validation(format!(
            "{:?} does not look like a text file",
            path
        )));
    }
    Ok(raw)
}

/// Split text into documents on blank lines.
///
/// Each piece is trimmed and empty pieces are dropped, so runs of blank
/// lines never produce empty documents.
pub fn split_documents(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_type_detection() {
        assert_eq!(ContentType::from_path(Path::new("notes.md")), ContentType::Markdown);
        assert_eq!(ContentType::from_path(Path::new("report.txt")), ContentType::PlainText);
        assert_eq!(ContentType::from_path(Path::new("chart.PNG")), ContentType::Image);
        assert_eq!(ContentType::from_path(Path::new("scan.jpeg")), ContentType::Image);
        assert_eq!(ContentType::from_path(Path::new("deck.pdf")), ContentType::Unsupported);
        assert_eq!(ContentType::from_path(Path::new("README")), ContentType::Unsupported);
        assert!(ContentType::Markdown.is_text());
        assert!(!ContentType::Image.is_text());
    }

    #[test]
    fn test_split_documents() {
        let text = "First paragraph.\nStill first.\n\n\n  Second paragraph.  \n\n\n\nThird.\n";
        assert_eq!(
            split_documents(text),
            vec!["First paragraph.\nStill first.", "Second paragraph.", "Third."]
        );
    }

    #[test]
    fn test_split_windows_line_endings() {
        assert_eq!(split_documents("a\r\n\r\nb"), vec!["a", "b"]);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_documents("\n\n  \n\n").is_empty());
    }

    #[test]
    fn test_read_binary_file_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("blob.txt");
        fs::write(&path, b"abc\0def").unwrap();
        assert!(read_text_file(&path).is_err());
    }
}
