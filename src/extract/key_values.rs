//! Key-value pair extraction.
//!
//! A stateless pattern miner: a label of letters and spaces followed by a
//! colon and a value that runs to the next colon or line break. Every match
//! gets the same fixed confidence; the extractor does not differentiate by
//! match quality.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::KeyValuePair;

lazy_static! {
    // Label of 3-31 letters/spaces, colon, then up to 100 characters with
    // no further colon or newline.
    static ref KEY_VALUE: Regex =
        Regex::new(r"([A-Za-z][A-Za-z\s]{2,30}):\s*([^\n:]{1,100})").expect("static pattern");
}

/// Pattern-based field/value miner. Pure and stateless; running it twice on
/// the same text yields identical ordered output.
#[derive(Debug, Clone, Copy)]
pub struct KeyValueExtractor {
    confidence: f32,
}

impl KeyValueExtractor {
    /// Create an extractor assigning the given fixed confidence per pair.
    pub fn new(confidence: f32) -> KeyValueExtractor {
        KeyValueExtractor { confidence }
    }

    /// Extract all pairs from `text`, in discovery order, untagged by page.
    pub fn extract(&self, text: &str) -> Vec<KeyValuePair> {
        self.extract_tagged(text, None)
    }

    /// Extract all pairs from one page's text, tagging each with the page.
    pub fn extract_for_page(&self, text: &str, page: u32) -> Vec<KeyValuePair> {
        self.extract_tagged(text, Some(page))
    }

    fn extract_tagged(&self, text: &str, page: Option<u32>) -> Vec<KeyValuePair> {
        KEY_VALUE
            .captures_iter(text)
            .map(|caps| KeyValuePair {
                key: caps[1].trim().to_string(),
                value: caps[2].trim().to_string(),
                confidence: self.confidence,
                page,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> KeyValueExtractor {
        KeyValueExtractor::new(0.8)
    }

    #[test]
    fn test_simple_pairs() {
        let pairs = extractor().extract("Invoice Number: 12345\nDue Date: 2024-06-01");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].key, "Invoice Number");
        assert_eq!(pairs[0].value, "12345");
        assert_eq!(pairs[1].key, "Due Date");
        assert_eq!(pairs[1].value, "2024-06-01");
        assert!(pairs.iter().all(|p| p.confidence == 0.8));
    }

    #[test]
    fn test_value_stops_at_colon_or_newline() {
        let pairs = extractor().extract("Shipping Address: 5 Elm St\nNote: a:b");
        assert_eq!(pairs[0].value, "5 Elm St");
        // Second value ends before the embedded colon.
        assert_eq!(pairs[1].key, "Note");
        assert_eq!(pairs[1].value, "a");
    }

    #[test]
    fn test_short_labels_are_ignored() {
        // Two-character labels fall below the 3-letter minimum.
        let pairs = extractor().extract("ID: 7");
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_duplicate_keys_preserved_in_order() {
        let pairs = extractor().extract("Item: hammer\nItem: nails");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].value, "hammer");
        assert_eq!(pairs[1].value, "nails");
    }

    #[test]
    fn test_idempotent() {
        let text = "Total Due: $512.00\nAccount Name: Jane Doe\nReference: A-99";
        let first = extractor().extract(text);
        let second = extractor().extract(text);
        assert_eq!(first, second);
    }

    #[test]
    fn test_page_tagging() {
        let pairs = extractor().extract_for_page("Order Number: 42", 3);
        assert_eq!(pairs[0].page, Some(3));
    }

    #[test]
    fn test_no_pairs_in_plain_prose() {
        let pairs = extractor().extract("The quick brown fox jumps over the lazy dog.");
        assert!(pairs.is_empty());
    }
}
