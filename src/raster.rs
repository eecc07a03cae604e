//! Page rasterization and embedded text layer access.
//!
//! Paged documents are rendered through pdfium; single-image documents are
//! decoded directly. Rasterized pages are owned by the [`RasterSet`] handed
//! to the pipeline invocation that requested them and are released when it
//! is dropped, on every exit path.

use image::DynamicImage;
use pdfium_render::prelude::*;

use crate::document::{DocumentKind, SourceDocument};
use crate::error::{Error, Result};

/// One rasterized page.
pub struct PageRaster {
    /// 1-based page number
    pub number: u32,
    /// Rendered page pixels
    pub image: DynamicImage,
}

/// All rasterized pages of one document, capped at the configured limit.
pub struct RasterSet {
    /// Pages in document order, at most `page_cap` of them
    pub pages: Vec<PageRaster>,
    /// Number of pages beyond the cap that were not rendered
    pub excluded: usize,
}

/// Rasterize a document at the given target pixel width.
///
/// At most `page_cap` pages are rendered; the remainder is reported in
/// [`RasterSet::excluded`] so the caller can surface the exclusion rather
/// than lose data silently. Failure here means the document itself cannot
/// be read and is fatal to the pipeline run.
pub fn rasterize(
    document: &SourceDocument,
    target_width: u32,
    page_cap: usize,
) -> Result<RasterSet> {
    match document.kind() {
        DocumentKind::SingleImage => {
            let image = image::load_from_memory(document.bytes())?;
            Ok(RasterSet {
                pages: vec![PageRaster { number: 1, image }],
                excluded: 0,
            })
        }
        DocumentKind::Paged => rasterize_paged(document.bytes(), target_width, page_cap),
    }
}

/// Extract the embedded text layer of a paged document, one string per
/// page. Returns garbled or empty strings for scanned pages; that is the
/// caller's problem to detect.
pub fn text_layer(document: &SourceDocument) -> Result<Vec<String>> {
    let pdfium = bind_pdfium()?;
    let pdf = pdfium
        .load_pdf_from_byte_slice(document.bytes(), None)
        .map_err(|e| Error::UnreadableDocument(format!("{e:?}")))?;

    let mut pages = Vec::new();
    for page in pdf.pages().iter() {
        let text = page
            .text()
            .map(|t| t.all())
            .map_err(|e| Error::Render(format!("text layer: {e:?}")))?;
        pages.push(text);
    }
    Ok(pages)
}

fn rasterize_paged(bytes: &[u8], target_width: u32, page_cap: usize) -> Result<RasterSet> {
    let pdfium = bind_pdfium()?;
    let pdf = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| Error::UnreadableDocument(format!("{e:?}")))?;

    let total = pdf.pages().len() as usize;
    let render_config = PdfRenderConfig::new().set_target_width(target_width as i32);

    let rendered = pdf.pages().iter().enumerate().map(|(index, page)| {
        page.render_with_config(&render_config)
            .map(|bitmap| bitmap.as_image())
            .map_err(|e| Error::Render(format!("page {}: {e:?}", index + 1)))
    });
    let set = collect_capped(rendered, total, page_cap)?;
    log::debug!("rasterized {} of {} pages", set.pages.len(), total);
    Ok(set)
}

/// Collect rendered pages up to the cap, counting the remainder as
/// excluded. Pages are numbered 1-based in render order.
fn collect_capped<I>(rendered: I, total: usize, page_cap: usize) -> Result<RasterSet>
where
    I: Iterator<Item = Result<DynamicImage>>,
{
    let mut pages = Vec::new();
    for (index, image) in rendered.take(page_cap).enumerate() {
        pages.push(PageRaster {
            number: index as u32 + 1,
            image: image?,
        });
    }
    let excluded = total.saturating_sub(pages.len());
    Ok(RasterSet { pages, excluded })
}

fn bind_pdfium() -> Result<Pdfium> {
    Pdfium::bind_to_system_library()
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        })
        .map(Pdfium::new)
        .map_err(|e| Error::Render(format!("pdfium unavailable: {e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([255, 255, 255]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_single_image_rasterizes_to_one_page() {
        let doc = SourceDocument::new("scan.png", png_bytes(64, 48)).unwrap();
        let set = rasterize(&doc, 1700, 20).unwrap();
        assert_eq!(set.pages.len(), 1);
        assert_eq!(set.pages[0].number, 1);
        assert_eq!(set.excluded, 0);
        assert_eq!(set.pages[0].image.width(), 64);
    }

    #[test]
    fn test_corrupt_image_is_unreadable() {
        let doc = SourceDocument::new("scan.png", vec![0xde, 0xad, 0xbe, 0xef]).unwrap();
        assert!(rasterize(&doc, 1700, 20).is_err());
    }

    #[test]
    fn test_garbage_pdf_is_unreadable() {
        let doc = SourceDocument::new("doc.pdf", b"not a pdf at all".to_vec()).unwrap();
        // Fails either at library binding or at parse; both are fatal.
        assert!(rasterize(&doc, 1700, 20).is_err());
    }

    #[test]
    fn test_page_cap_excludes_pages_beyond_twenty() {
        let rendered = (0..21).map(|_| Ok(DynamicImage::new_luma8(4, 4)));
        let set = collect_capped(rendered, 21, 20).unwrap();
        assert_eq!(set.pages.len(), 20);
        assert_eq!(set.excluded, 1);
        assert_eq!(set.pages[0].number, 1);
        assert_eq!(set.pages[19].number, 20);
    }

    #[test]
    fn test_documents_under_the_cap_exclude_nothing() {
        let rendered = (0..3).map(|_| Ok(DynamicImage::new_luma8(4, 4)));
        let set = collect_capped(rendered, 3, 20).unwrap();
        assert_eq!(set.pages.len(), 3);
        assert_eq!(set.excluded, 0);
    }

    #[test]
    fn test_render_failure_within_the_cap_is_fatal() {
        let rendered = (0..2).map(|index| {
            if index == 1 {
                Err(Error::Render("page 2".to_string()))
            } else {
                Ok(DynamicImage::new_luma8(4, 4))
            }
        });
        assert!(collect_capped(rendered, 2, 20).is_err());
    }
}
