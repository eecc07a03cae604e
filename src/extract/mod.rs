//! Facet extractors: text strategies, tables, signatures, key-value pairs.

pub mod key_values;
pub mod signatures;
pub mod tables;
pub mod text;

pub use key_values::KeyValueExtractor;
pub use signatures::{SignatureDetector, SignatureFindings};
pub use tables::TableExtractor;
pub use text::{TextOutcome, TextStrategy};
