//! Table extraction.
//!
//! The primary path recovers a ruled grid from the page's line network and
//! separates the header row from body rows. When no grid can be recovered,
//! a geometric fallback clusters the line network's enclosed cells into
//! rows by vertical position. Neither path fails outward; internal errors
//! degrade to an empty table list plus a warning.

use std::sync::Arc;

use image::{DynamicImage, GrayImage};
use imageproc::contours::{find_contours, BorderType};

use crate::model::Table;
use crate::ocr::OcrEngine;

/// Length of the line-isolation kernels in pixels (wide horizontal / tall
/// vertical morphological opening).
const LINE_KERNEL: u32 = 40;

/// Minimum cell dimensions; smaller contour boxes are noise.
const MIN_CELL_WIDTH: u32 = 30;
const MIN_CELL_HEIGHT: u32 = 15;

/// Minimum contour count for the fallback to conclude a table is present.
const MIN_CONTOURS: usize = 5;

/// Vertical band height used to bucket cells into rows.
const ROW_BAND: u32 = 20;

/// Vertical distance from the current row anchor that starts a new row.
const ROW_BREAK: i64 = 15;

/// Fraction of the table extent a line must span to count as a separator.
const SEPARATOR_FILL: f32 = 0.6;

/// Inset applied when cropping cell interiors, to keep ruling pixels out
/// of the OCR input.
const CELL_INSET: u32 = 2;

/// Structured table recovery over one raster page.
pub struct TableExtractor {
    ocr: Arc<dyn OcrEngine>,
}

#[derive(Debug, Clone, PartialEq)]
struct CellBox {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    text: String,
}

impl TableExtractor {
    /// Build an extractor using the given OCR engine for cell text.
    pub fn new(ocr: Arc<dyn OcrEngine>) -> TableExtractor {
        TableExtractor { ocr }
    }

    /// Extract tables from one page.
    ///
    /// Returns the tables found plus any degradation warnings. Never fails
    /// outward.
    pub fn extract(&self, page: &DynamicImage) -> (Vec<Table>, Vec<String>) {
        let gray = page.to_luma8();
        let ink = ink_mask(&gray);

        let horizontal = open_line(&ink, LINE_KERNEL, true);
        let vertical = open_line(&ink, LINE_KERNEL, false);
        let combined = combine_masks(&horizontal, &vertical);

        let mut warnings = Vec::new();

        if let Some(table) = self.recover_grid(page, &horizontal, &vertical, &combined, &mut warnings)
        {
            return (vec![table], warnings);
        }

        let tables = self.fallback(page, &combined, &mut warnings);
        (tables, warnings)
    }

    /// Primary path: locate full-span horizontal and vertical separators and
    /// read the cells between them. The first row becomes the header row.
    fn recover_grid(
        &self,
        page: &DynamicImage,
        horizontal: &GrayImage,
        vertical: &GrayImage,
        combined: &GrayImage,
        warnings: &mut Vec<String>,
    ) -> Option<Table> {
        let extent = foreground_extent(combined)?;

        let row_seps = separator_positions(horizontal, &extent, true);
        let col_seps = separator_positions(vertical, &extent, false);

        // A grid needs a header row and at least one body row.
        if row_seps.len() < 3 || col_seps.len() < 2 {
            return None;
        }
        if row_seps.windows(2).any(|w| w[1] - w[0] < MIN_CELL_HEIGHT)
            || col_seps.windows(2).any(|w| w[1] - w[0] < MIN_CELL_WIDTH)
        {
            return None;
        }

        let mut rows = Vec::new();
        let mut degraded = false;
        for band in row_seps.windows(2) {
            let mut row = Vec::new();
            for span in col_seps.windows(2) {
                let x = span[0] + CELL_INSET;
                let y = band[0] + CELL_INSET;
                let width = (span[1] - span[0]).saturating_sub(2 * CELL_INSET);
                let height = (band[1] - band[0]).saturating_sub(2 * CELL_INSET);
                row.push(self.cell_text(page, x, y, width, height, &mut degraded));
            }
            rows.push(row);
        }
        if degraded {
            warnings.push("table cell recognition unavailable; cell text degraded".to_string());
        }

        let headers = rows.first().cloned();
        Some(Table {
            id: "table_1".to_string(),
            rows,
            headers,
            page: None,
        })
    }

    /// Geometric fallback: treat the enclosed regions of the line network
    /// as cells and cluster them into rows by vertical position.
    fn fallback(
        &self,
        page: &DynamicImage,
        combined: &GrayImage,
        warnings: &mut Vec<String>,
    ) -> Vec<Table> {
        let contours = find_contours::<u32>(combined);
        if contours.len() < MIN_CONTOURS {
            return Vec::new();
        }

        let mut degraded = false;
        let mut cells = Vec::new();
        for contour in &contours {
            // Cell interiors are the holes of the ruling network; the outer
            // contour is the network itself.
            if contour.border_type != BorderType::Hole {
                continue;
            }
            let Some((x, y, width, height)) = bounding_rect_of(&contour.points) else {
                continue;
            };
            if width <= MIN_CELL_WIDTH || height <= MIN_CELL_HEIGHT {
                continue;
            }
            let text = self.cell_text(page, x, y, width, height, &mut degraded);
            cells.push(CellBox {
                x,
                y,
                width,
                height,
                text,
            });
        }
        if degraded {
            warnings.push("table cell recognition unavailable; cell text degraded".to_string());
        }
        if cells.is_empty() {
            return Vec::new();
        }

        let rows: Vec<Vec<String>> = cluster_rows(cells)
            .into_iter()
            .map(|row| row.into_iter().map(|cell| cell.text).collect())
            .collect();

        vec![Table {
            id: "table_1".to_string(),
            rows,
            headers: None,
            page: None,
        }]
    }

    fn cell_text(
        &self,
        page: &DynamicImage,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        degraded: &mut bool,
    ) -> String {
        if width == 0 || height == 0 {
            return String::new();
        }
        let crop = page.crop_imm(x, y, width, height);
        match self.ocr.recognize(&crop) {
            Ok(spans) => spans
                .iter()
                .map(|span| span.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            Err(e) => {
                log::debug!("cell OCR failed at ({x}, {y}): {e}");
                *degraded = true;
                String::new()
            }
        }
    }
}

/// Cluster cell boxes into rows: sort by 20 px vertical band then by
/// horizontal position, starting a new row whenever a cell's vertical
/// position drifts more than 15 px from the current row's anchor.
fn cluster_rows(mut cells: Vec<CellBox>) -> Vec<Vec<CellBox>> {
    cells.sort_by_key(|cell| (cell.y / ROW_BAND, cell.x));

    let mut rows: Vec<Vec<CellBox>> = Vec::new();
    let mut current: Vec<CellBox> = Vec::new();
    let mut anchor: i64 = -100;

    for cell in cells {
        if (cell.y as i64 - anchor).abs() > ROW_BREAK {
            if !current.is_empty() {
                rows.push(std::mem::take(&mut current));
            }
            anchor = cell.y as i64;
        }
        current.push(cell);
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}

/// Binarize so ink (dark pixels) becomes foreground (255).
fn ink_mask(gray: &GrayImage) -> GrayImage {
    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel.0[0] < 128 {
            mask.put_pixel(x, y, image::Luma([255]));
        }
    }
    mask
}

/// Morphological opening with a 1-D structuring element along one axis
/// (wide horizontal or tall vertical kernel). Isolates long straight runs.
fn open_line(mask: &GrayImage, len: u32, horizontal: bool) -> GrayImage {
    dilate_line(&erode_line(mask, len, horizontal), len, horizontal)
}

fn erode_line(mask: &GrayImage, len: u32, horizontal: bool) -> GrayImage {
    line_filter(mask, len, horizontal, true)
}

fn dilate_line(mask: &GrayImage, len: u32, horizontal: bool) -> GrayImage {
    line_filter(mask, len, horizontal, false)
}

/// 1-D min (erode) or max (dilate) filter over a centered window, using a
/// per-line prefix sum of foreground pixels.
fn line_filter(mask: &GrayImage, len: u32, horizontal: bool, erode: bool) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);
    let half = (len / 2) as i64;
    let span = len as i64;

    let (outer, inner) = if horizontal {
        (height, width)
    } else {
        (width, height)
    };

    for o in 0..outer {
        // prefix[i] = count of foreground pixels in positions [0, i)
        let mut prefix = vec![0u32; inner as usize + 1];
        for i in 0..inner {
            let value = if horizontal {
                mask.get_pixel(i, o).0[0]
            } else {
                mask.get_pixel(o, i).0[0]
            };
            prefix[i as usize + 1] = prefix[i as usize] + u32::from(value > 0);
        }

        for i in 0..inner as i64 {
            let lo = (i - half).max(0) as usize;
            let hi = ((i - half + span).min(inner as i64)) as usize;
            let covered = prefix[hi] - prefix[lo];
            let keep = if erode {
                // Erosion with zero padding: the full window must be foreground.
                i - half >= 0 && i - half + span <= inner as i64 && covered == (hi - lo) as u32
            } else {
                covered > 0
            };
            if keep {
                let value = image::Luma([255]);
                if horizontal {
                    out.put_pixel(i as u32, o, value);
                } else {
                    out.put_pixel(o, i as u32, value);
                }
            }
        }
    }
    out
}

/// Equal-weight combination of the two line masks, binarized.
fn combine_masks(horizontal: &GrayImage, vertical: &GrayImage) -> GrayImage {
    let (width, height) = horizontal.dimensions();
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let blended = (horizontal.get_pixel(x, y).0[0] as u16
                + vertical.get_pixel(x, y).0[0] as u16)
                / 2;
            if blended >= 120 {
                out.put_pixel(x, y, image::Luma([255]));
            }
        }
    }
    out
}

/// Bounding extent (x0, y0, x1, y1) of all foreground pixels, inclusive.
fn foreground_extent(mask: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let mut extent: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] == 0 {
            continue;
        }
        extent = Some(match extent {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    extent
}

/// Positions (run centers) of lines spanning most of the table extent.
fn separator_positions(
    mask: &GrayImage,
    extent: &(u32, u32, u32, u32),
    horizontal: bool,
) -> Vec<u32> {
    let (x0, y0, x1, y1) = *extent;
    let (range, span_lo, span_hi) = if horizontal {
        (y0..=y1, x0, x1)
    } else {
        (x0..=x1, y0, y1)
    };
    let span_len = (span_hi - span_lo + 1) as f32;

    let mut separator_rows = Vec::new();
    for pos in range {
        let mut covered = 0u32;
        for s in span_lo..=span_hi {
            let value = if horizontal {
                mask.get_pixel(s, pos).0[0]
            } else {
                mask.get_pixel(pos, s).0[0]
            };
            covered += u32::from(value > 0);
        }
        if covered as f32 / span_len > SEPARATOR_FILL {
            separator_rows.push(pos);
        }
    }

    // Collapse adjacent separator rows into one position per ruling line.
    let mut centers = Vec::new();
    let mut run: Option<(u32, u32)> = None;
    for pos in separator_rows {
        run = match run {
            Some((start, end)) if pos == end + 1 => Some((start, pos)),
            Some((start, end)) => {
                centers.push((start + end) / 2);
                Some((pos, pos))
            }
            None => Some((pos, pos)),
        };
    }
    if let Some((start, end)) = run {
        centers.push((start + end) / 2);
    }
    centers
}

fn bounding_rect_of(points: &[imageproc::point::Point<u32>]) -> Option<(u32, u32, u32, u32)> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
    for point in points {
        min_x = min_x.min(point.x);
        min_y = min_y.min(point.y);
        max_x = max_x.max(point.x);
        max_y = max_y.max(point.y);
    }
    Some((min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}
