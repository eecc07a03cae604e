//! Submitted documents.
//!
//! A [`SourceDocument`] is an opaque byte buffer plus a declared media kind,
//! immutable once constructed. Kind validation happens here, before any job
//! exists, so unsupported submissions are rejected synchronously.

use crate::error::{Error, Result};

/// Media kind of a submitted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A paginated document (PDF)
    Paged,
    /// A single raster image (PNG, JPEG, TIFF, BMP, GIF)
    SingleImage,
}

/// Extensions accepted at submission. Anything else is rejected before a
/// job record is created.
const SUPPORTED_EXTENSIONS: &[(&str, DocumentKind)] = &[
    ("pdf", DocumentKind::Paged),
    ("png", DocumentKind::SingleImage),
    ("jpg", DocumentKind::SingleImage),
    ("jpeg", DocumentKind::SingleImage),
    ("tiff", DocumentKind::SingleImage),
    ("bmp", DocumentKind::SingleImage),
    ("gif", DocumentKind::SingleImage),
];

/// An immutable submitted document: name, declared kind, and raw bytes.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    name: String,
    kind: DocumentKind,
    bytes: Vec<u8>,
}

impl SourceDocument {
    /// Validate and wrap a submitted payload.
    ///
    /// The kind is declared by the filename extension against the supported
    /// allow-list. Unsupported kinds and empty payloads are rejected here,
    /// synchronously, so no job is ever created for them.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<SourceDocument> {
        let name = name.into();
        let extension = name
            .rsplit('.')
            .next()
            .filter(|ext| ext.len() < name.len())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let kind = DocumentKind::for_extension(&extension)
            .ok_or_else(|| Error::UnsupportedKind(format!(".{extension}")))?;

        if bytes.is_empty() {
            return Err(Error::UnreadableDocument("empty payload".to_string()));
        }

        Ok(SourceDocument { name, kind, bytes })
    }

    /// Original document name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared media kind.
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Raw document bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl DocumentKind {
    /// Look up the kind for a lowercase filename extension.
    pub fn for_extension(extension: &str) -> Option<DocumentKind> {
        SUPPORTED_EXTENSIONS
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, kind)| *kind)
    }
}
