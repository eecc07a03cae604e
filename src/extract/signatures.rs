//! Signature detection.
//!
//! A contour-based heuristic over the bottom band of a page: adaptive
//! thresholding isolates ink strokes, external contours are filtered by
//! area, aspect ratio, width, and ink density, and the survivors are ranked
//! and classified against the review gate.
//!
//! The confidence mapping `min(0.9, density * 2 + 0.3)` is a deliberately
//! simple linear clamp, not a calibrated probability.

use image::{DynamicImage, GrayImage};
use imageproc::contours::{find_contours, BorderType, Contour};

use crate::config::ProcessingConfig;
use crate::model::{BoundingBox, ReviewItem, ReviewKind, Signature, SignatureStatus};

/// Fraction of page height where signature analysis begins (bottom 40%).
const BAND_START: f32 = 0.6;

/// Contour area gates in square pixels; filters speckle noise below and
/// large scanned artifacts above.
const MIN_AREA: f64 = 500.0;
const MAX_AREA: f64 = 50_000.0;

/// Aspect ratio gates; signatures are wide, not square or tower-shaped.
const MIN_ASPECT: f32 = 1.5;
const MAX_ASPECT: f32 = 10.0;

/// Minimum candidate width in pixels.
const MIN_WIDTH: u32 = 50;

/// Ink density gates; too sparse is a stray mark, too dense is a solid
/// block or scan noise.
const MIN_DENSITY: f32 = 0.05;
const MAX_DENSITY: f32 = 0.5;

/// Block radius for adaptive thresholding (11x11 neighborhood).
const THRESHOLD_BLOCK_RADIUS: u32 = 5;

/// What signature detection found on one page.
#[derive(Debug, Default)]
pub struct SignatureFindings {
    /// Detected signatures, ranked by confidence descending
    pub signatures: Vec<Signature>,
    /// Review items for signatures classified `needs_review`
    pub review_items: Vec<ReviewItem>,
    /// How many of the detected signatures classified `valid`
    pub valid_count: usize,
}

/// Heuristic ink-mark detector for one raster page.
#[derive(Debug, Clone)]
pub struct SignatureDetector {
    threshold: f32,
    review_floor: f32,
    max_per_page: usize,
}

struct Candidate {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    confidence: f32,
}

impl SignatureDetector {
    /// Build a detector from the processing configuration.
    pub fn new(config: &ProcessingConfig) -> SignatureDetector {
        SignatureDetector {
            threshold: config.signature_threshold,
            review_floor: config.review_floor,
            max_per_page: config.max_signatures_per_page,
        }
    }

    /// Detect signatures on one page.
    ///
    /// Never fails outward: an undersized page simply yields no findings.
    /// Returned bounding boxes are normalized to the full page, not the
    /// analyzed band.
    pub fn detect(&self, page: &DynamicImage) -> SignatureFindings {
        let gray = page.to_luma8();
        let (page_width, page_height) = gray.dimensions();
        let band_top = (page_height as f32 * BAND_START) as u32;
        if page_width == 0 || page_height.saturating_sub(band_top) < 2 {
            return SignatureFindings::default();
        }

        let band = image::imageops::crop_imm(&gray, 0, band_top, page_width, page_height - band_top)
            .to_image();
        let binary = binarize_ink(&band);

        let mut candidates = Vec::new();
        for contour in find_contours::<u32>(&binary) {
            if contour.border_type != BorderType::Outer {
                continue;
            }
            if let Some(candidate) = self.evaluate(&contour, &binary) {
                candidates.push(candidate);
            }
        }

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates.truncate(self.max_per_page);

        let mut findings = SignatureFindings::default();
        for (index, candidate) in candidates.iter().enumerate() {
            let confidence = candidate.confidence;
            let status = if confidence >= self.threshold {
                SignatureStatus::Valid
            } else if confidence >= self.review_floor {
                SignatureStatus::NeedsReview
            } else {
                SignatureStatus::Invalid
            };

            let signature = Signature {
                id: format!("sig_{}", index + 1),
                confidence,
                location: BoundingBox {
                    left: candidate.x as f32 / page_width as f32,
                    top: (candidate.y + band_top) as f32 / page_height as f32,
                    width: candidate.width as f32 / page_width as f32,
                    height: candidate.height as f32 / page_height as f32,
                },
                status,
                page: None,
            };

            if status == SignatureStatus::Valid {
                findings.valid_count += 1;
            }
            if status == SignatureStatus::NeedsReview {
                findings.review_items.push(ReviewItem {
                    kind: ReviewKind::Signature,
                    id: signature.id.clone(),
                    confidence,
                    reason: format!(
                        "Confidence {:.0}% below {:.0}% threshold",
                        confidence * 100.0,
                        self.threshold * 100.0
                    ),
                    page: None,
                });
            }
            findings.signatures.push(signature);
        }

        findings
    }

    fn evaluate(&self, contour: &Contour<u32>, binary: &GrayImage) -> Option<Candidate> {
        let area = contour_area(contour);
        if area < MIN_AREA || area > MAX_AREA {
            return None;
        }

        let (x, y, width, height) = bounding_rect(contour)?;
        if height == 0 || width <= MIN_WIDTH {
            return None;
        }
        let aspect = width as f32 / height as f32;
        if aspect <= MIN_ASPECT || aspect >= MAX_ASPECT {
            return None;
        }

        let density = ink_density(binary, x, y, width, height);
        if density <= MIN_DENSITY || density >= MAX_DENSITY {
            return None;
        }

        Some(Candidate {
            x,
            y,
            width,
            height,
            confidence: round_to_millis(confidence_for_density(density)),
        })
    }
}

/// The confidence mapping: `min(0.9, density * 2 + 0.3)`.
pub fn confidence_for_density(density: f32) -> f32 {
    (density * 2.0 + 0.3).min(0.9)
}

/// Confidences are reported to three decimals.
fn round_to_millis(value: f32) -> f32 {
    (value * 1000.0).round() / 1000.0
}

/// Adaptive threshold and invert so ink strokes become foreground (255).
fn binarize_ink(band: &GrayImage) -> GrayImage {
    let mut binary = imageproc::contrast::adaptive_threshold(band, THRESHOLD_BLOCK_RADIUS);
    for pixel in binary.pixels_mut() {
        pixel.0[0] = 255 - pixel.0[0];
    }
    binary
}

/// Polygon area of a traced contour (shoelace formula).
fn contour_area(contour: &Contour<u32>) -> f64 {
    let points = &contour.points;
    if points.len() < 3 {
        return 0.0;
    }
    let mut doubled = 0i64;
    for i in 0..points.len() {
        let a = points[i];
        let b = points[(i + 1) % points.len()];
        doubled += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
    }
    doubled.abs() as f64 / 2.0
}

fn bounding_rect(contour: &Contour<u32>) -> Option<(u32, u32, u32, u32)> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in &contour.points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    Some((min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}

/// Fraction of foreground pixels inside a bounding box.
fn ink_density(binary: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> f32 {
    let (image_width, image_height) = binary.dimensions();
    let mut foreground = 0u32;
    for yy in y..(y + height).min(image_height) {
        for xx in x..(x + width).min(image_width) {
            if binary.get_pixel(xx, yy).0[0] > 0 {
                foreground += 1;
            }
        }
    }
    foreground as f32 / (width * height) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_formula() {
        // A 0.3 ink density maps to min(0.9, 0.3*2 + 0.3) = 0.9.
        assert_eq!(confidence_for_density(0.3), 0.9);
        // Above 0.3 the clamp holds.
        assert_eq!(confidence_for_density(0.45), 0.9);
        // Below it the linear mapping applies.
        assert!((confidence_for_density(0.1) - 0.5).abs() < 1e-6);
        // The minimum surviving density (just above 0.05) maps near 0.4, so
        // every surviving candidate lands at or above the review floor.
        assert!(confidence_for_density(0.051) > 0.4);
    }

    #[test]
    fn test_confidence_reported_to_three_decimals() {
        assert!((round_to_millis(0.51234) - 0.512).abs() < 1e-6);
        assert!((round_to_millis(0.8996) - 0.9).abs() < 1e-6);
        // The formula for an awkward density lands on a rounded value.
        let rounded = round_to_millis(confidence_for_density(0.1234));
        assert!((rounded - 0.547).abs() < 1e-6, "{rounded}");
    }

    #[test]
    fn test_contour_area_of_filled_square() {
        // 20x20 white square on black; the traced outer boundary encloses
        // close to the filled area.
        let mut img = GrayImage::new(60, 60);
        for y in 20..40 {
            for x in 20..40 {
                img.put_pixel(x, y, image::Luma([255]));
            }
        }
        let contours = find_contours::<u32>(&img);
        let outer = contours
            .iter()
            .find(|c| c.border_type == BorderType::Outer)
            .unwrap();
        let area = contour_area(outer);
        assert!(area > 300.0 && area < 450.0, "area = {area}");
    }

    #[test]
    fn test_blank_page_has_no_signatures() {
        let page = DynamicImage::new_luma8(400, 300);
        let config = ProcessingConfig::default();
        let findings = SignatureDetector::new(&config).detect(&page);
        assert!(findings.signatures.is_empty());
        assert!(findings.review_items.is_empty());
    }
}
