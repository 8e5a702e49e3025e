//! Text extraction for ingestible files.
//!
//! PDFs are extracted page by page with `pdf-extract`; pages are joined with
//! blank lines so page breaks read as paragraph boundaries to the chunker.
//! Plain-text formats are read as UTF-8 and count as a single page.

use std::path::Path;

use thiserror::Error;

/// Extensions handled as plain UTF-8 text.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported file type: '{0}'")]
    Unsupported(String),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("file is not valid UTF-8 text")]
    InvalidUtf8,

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::Unsupported(_) => "unsupported_file",
            ExtractError::Io { .. } => "io_error",
            _ => "extraction_error",
        }
    }
}

/// Raw document text plus its page count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub page_count: u32,
}

/// Lowercased extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Extract text from in-memory bytes, dispatching on a lowercase extension.
pub fn extract_bytes(bytes: &[u8], extension: &str) -> Result<ExtractedDocument, ExtractError> {
    match extension {
        "pdf" => extract_pdf(bytes),
        ext if TEXT_EXTENSIONS.contains(&ext) => {
            let text = std::str::from_utf8(bytes).map_err(|_| ExtractError::InvalidUtf8)?;
            Ok(ExtractedDocument {
                text: text.to_string(),
                page_count: 1,
            })
        }
        other => Err(ExtractError::Unsupported(other.to_string())),
    }
}

/// Read and extract a file from disk.
pub fn extract_file(path: &Path) -> Result<ExtractedDocument, ExtractError> {
    let extension = extension_of(path);
    if extension != "pdf" && !TEXT_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ExtractError::Unsupported(extension));
    }
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extract_bytes(&bytes, &extension)
}

/// Extract a PDF's text, one entry per page, joined with blank lines.
pub fn extract_pdf(bytes: &[u8]) -> Result<ExtractedDocument, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(ExtractedDocument {
        page_count: pages.len() as u32,
        text: pages.join("\n\n"),
    })
}
