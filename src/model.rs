//! Data model for extraction artifacts and processing jobs.
//!
//! Everything here is serde-serializable so the transport collaborator can
//! expose results directly. `ExtractionResult` is immutable once produced;
//! `Job` records are mutated only by the orchestrator that owns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::DocumentKind;

/// Lifecycle state of a processing job.
///
/// Transitions: `Pending → Processing → {Completed | Failed}`. Terminal
/// states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created and scheduled, not yet picked up by a worker
    Pending,
    /// Pipeline execution in progress
    Processing,
    /// Pipeline finished and the result is stored on the job
    Completed,
    /// Pipeline failed; the job carries a human-readable error
    Failed,
}

impl JobStatus {
    /// Whether this status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Text extraction strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Resolve to a concrete method from the document kind
    Auto,
    /// Structure-preserving conversion (tables and headings kept as text)
    Structural,
    /// Embedded text layer, flat dump; near-instant
    FastText,
    /// Rasterize pages and run optical character recognition
    Ocr,
    /// Describe page images with a vision-capable language model
    Vision,
}

impl ExtractionMethod {
    /// Resolve `Auto` to a concrete method: `Ocr` for single-image
    /// documents, `Structural` for paged documents. Concrete methods
    /// resolve to themselves.
    pub fn resolve(self, kind: DocumentKind) -> ExtractionMethod {
        match self {
            ExtractionMethod::Auto => match kind {
                DocumentKind::SingleImage => ExtractionMethod::Ocr,
                DocumentKind::Paged => ExtractionMethod::Structural,
            },
            concrete => concrete,
        }
    }
}

/// Which facets the pipeline should extract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExtractionFlags {
    /// Run the table extractor per page
    pub extract_tables: bool,
    /// Run the signature detector per page
    pub extract_signatures: bool,
    /// Run the key-value extractor over the aggregated text
    pub extract_key_values: bool,
}

impl Default for ExtractionFlags {
    fn default() -> Self {
        Self {
            extract_tables: true,
            extract_signatures: true,
            extract_key_values: true,
        }
    }
}

/// Signature validation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    /// Confidence at or above the review gate
    Valid,
    /// Confidence below the gate but above the review floor
    NeedsReview,
    /// Confidence below the review floor
    Invalid,
}

/// Bounding box normalized to `[0, 1]` relative to full page dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge as a fraction of page width
    pub left: f32,
    /// Top edge as a fraction of page height
    pub top: f32,
    /// Width as a fraction of page width
    pub width: f32,
    /// Height as a fraction of page height
    pub height: f32,
}

/// A detected signature mark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Identifier, unique within its page (`sig_1`, `sig_2`, ...)
    pub id: String,
    /// Detection confidence in `[0, 1]`
    pub confidence: f32,
    /// Normalized bounding box on the full page
    pub location: BoundingBox,
    /// Classification against the review gate
    pub status: SignatureStatus,
    /// Page number (1-based) for multi-page documents
    pub page: Option<u32>,
}

/// An extracted field/value pair.
///
/// Keys are not unique; discovery order is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValuePair {
    /// Field label
    pub key: String,
    /// Field value
    pub value: String,
    /// Extraction confidence in `[0, 1]`
    pub confidence: f32,
    /// Page number (1-based) when known
    pub page: Option<u32>,
}

/// An extracted table.
///
/// Rows need not have matching cell counts; malformed grids are preserved
/// rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table identifier, unique within its page
    pub id: String,
    /// Rows in reading order, each an ordered sequence of cell text
    pub rows: Vec<Vec<String>>,
    /// Header row when the extractor could separate it
    pub headers: Option<Vec<String>>,
    /// Page number (1-based) when known
    pub page: Option<u32>,
}

/// Category of an item flagged for human review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    /// A signature mark below the review gate
    Signature,
    /// A key-value field below the review gate
    Field,
    /// A table below the review gate
    Table,
}

/// An item flagged for human review.
///
/// Always derived from an extracted item that failed a confidence gate;
/// never created independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    /// Category of the referenced item
    pub kind: ReviewKind,
    /// Identifier of the referenced item
    pub id: String,
    /// Confidence of the referenced item
    pub confidence: f32,
    /// Why review is needed
    pub reason: String,
    /// Page number of the referenced item
    pub page: Option<u32>,
}

/// Detected document category, from content keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Invoices and bills
    Invoice,
    /// Contracts and agreements
    Contract,
    /// Payment receipts
    Receipt,
    /// Resumes and CVs
    Resume,
    /// Forms and applications
    Form,
}

impl DocumentType {
    /// Classify a document from its extracted text. Returns `None` when no
    /// keyword set matches.
    pub fn detect(text: &str) -> Option<DocumentType> {
        let lower = text.to_lowercase();
        let matches_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        if matches_any(&["invoice", "bill to", "amount due", "total due"]) {
            Some(DocumentType::Invoice)
        } else if matches_any(&["contract", "agreement", "hereby agree", "terms and conditions"]) {
            Some(DocumentType::Contract)
        } else if matches_any(&["receipt", "paid", "transaction"]) {
            Some(DocumentType::Receipt)
        } else if matches_any(&["resume", "curriculum vitae", "work experience", "education"]) {
            Some(DocumentType::Resume)
        } else if matches_any(&["form", "application", "please fill"]) {
            Some(DocumentType::Form)
        } else {
            None
        }
    }
}

/// The terminal extraction artifact for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Original document name
    pub document_source: String,
    /// Detected document category, if any
    pub document_type: Option<DocumentType>,
    /// Number of pages processed
    pub pages: u32,
    /// When processing finished
    pub processed_at: DateTime<Utc>,
    /// Wall-clock processing duration in seconds
    pub processing_time_seconds: f64,
    /// Global extracted text, prefix-truncated to the configured limit
    pub text: String,
    /// Per-page text when the strategy produced it
    pub text_by_page: Option<Vec<String>>,
    /// All extracted key-value pairs, discovery order preserved
    pub key_values: Vec<KeyValuePair>,
    /// All extracted tables
    pub tables: Vec<Table>,
    /// All detected signatures
    pub signatures: Vec<Signature>,
    /// True exactly when `human_review_items` is non-empty
    pub human_review_required: bool,
    /// Items that failed a confidence gate
    pub human_review_items: Vec<ReviewItem>,
    /// Aggregate confidence over signature and key-value evidence
    pub overall_confidence: f32,
    /// Non-fatal degradations encountered during extraction
    pub warnings: Vec<String>,
}

/// A document processing job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub id: Uuid,
    /// Current lifecycle state
    pub status: JobStatus,
    /// Original filename as submitted
    pub filename: String,
    /// Submitted payload size in bytes
    pub file_size: u64,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When pipeline execution began
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Progress percent, monotonically non-decreasing in `[0, 100]`
    pub progress: u8,
    /// Label of the current pipeline step
    pub current_step: Option<String>,
    /// Extraction result; present only when `status` is `Completed`
    pub result: Option<ExtractionResult>,
    /// Failure message; present only when `status` is `Failed`
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_resolves_by_kind() {
        assert_eq!(
            ExtractionMethod::Auto.resolve(DocumentKind::SingleImage),
            ExtractionMethod::Ocr
        );
        assert_eq!(
            ExtractionMethod::Auto.resolve(DocumentKind::Paged),
            ExtractionMethod::Structural
        );
    }

    #[test]
    fn test_concrete_methods_resolve_to_themselves() {
        for method in [
            ExtractionMethod::Structural,
            ExtractionMethod::FastText,
            ExtractionMethod::Ocr,
            ExtractionMethod::Vision,
        ] {
            assert_eq!(method.resolve(DocumentKind::Paged), method);
            assert_eq!(method.resolve(DocumentKind::SingleImage), method);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_document_type_detection() {
        assert_eq!(
            DocumentType::detect("INVOICE #42\nBill To: Acme"),
            Some(DocumentType::Invoice)
        );
        assert_eq!(
            DocumentType::detect("This Agreement is entered into..."),
            Some(DocumentType::Contract)
        );
        assert_eq!(DocumentType::detect("quarterly penguin census"), None);
    }

    #[test]
    fn test_document_type_priority_order() {
        // Invoice keywords win over receipt keywords; the first matching
        // keyword set decides.
        let text = "invoice for transaction paid in full";
        assert_eq!(DocumentType::detect(text), Some(DocumentType::Invoice));
    }

    #[test]
    fn test_result_round_trips_through_json() {
        let result = ExtractionResult {
            document_source: "doc.pdf".to_string(),
            document_type: Some(DocumentType::Invoice),
            pages: 2,
            processed_at: Utc::now(),
            processing_time_seconds: 1.25,
            text: "Total Due: $10".to_string(),
            text_by_page: None,
            key_values: vec![KeyValuePair {
                key: "Total Due".to_string(),
                value: "$10".to_string(),
                confidence: 0.8,
                page: None,
            }],
            tables: vec![],
            signatures: vec![],
            human_review_required: false,
            human_review_items: vec![],
            overall_confidence: 0.8,
            warnings: vec![],
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"document_type\":\"invoice\""));
        let back: ExtractionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key_values, result.key_values);
        assert_eq!(back.pages, 2);
    }
}
