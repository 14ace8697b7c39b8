//! Page rasterization with PDFium

use crate::error::{Error, Result};
use image::DynamicImage;
use pdfium_render::prelude::*;

/// PostScript points per inch, the unit PDFium reports page sizes in
const POINTS_PER_INCH: f32 = 72.0;

/// One rendered page, ready for recognition
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Page number (1-indexed)
    pub page: u32,
    /// Grayscale bitmap of the page
    pub image: DynamicImage,
}

impl PageImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Converts document bytes into page images in document order
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, data: &[u8]) -> Result<Vec<PageImage>>;
}

/// Rendering limits for the PDFium rasterizer
#[derive(Debug, Clone)]
pub struct RasterConfig {
    /// Fixed render resolution. Record cards use a small typewriter face, 300 reads reliably.
    pub dpi: u16,
    /// Reject documents with more pages than this
    pub max_pages: u16,
    /// Reject pages whose rendered area exceeds this many pixels
    pub max_page_pixels: u64,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_pages: 12,
            max_page_pixels: 40_000_000,
        }
    }
}

/// Rasterizer backed by PDFium. All rendering happens in memory.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    config: RasterConfig,
}

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Reject anything that does not start with the PDF magic bytes
pub fn check_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::UnsupportedDocument {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

impl PdfiumRasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    fn scale(&self) -> f32 {
        self.config.dpi as f32 / POINTS_PER_INCH
    }

    fn map_load_error(err: PdfiumError) -> Error {
        match err {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                Error::UnsupportedDocument {
                    reason: "PDF is password protected".to_string(),
                }
            }
            _ => Error::UnsupportedDocument {
                reason: format!("{}", err),
            },
        }
    }

    fn render_page(&self, page: &PdfPage, page_num: u32) -> Result<DynamicImage> {
        let scale = self.scale();
        let pixels = (page.width().value * scale) as u64 * (page.height().value * scale) as u64;
        if pixels > self.config.max_page_pixels {
            return Err(Error::UnsupportedDocument {
                reason: format!(
                    "page {} renders to {} pixels (max: {})",
                    page_num, pixels, self.config.max_page_pixels
                ),
            });
        }

        let config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| Error::UnsupportedDocument {
                reason: format!("Failed to render page {}: {}", page_num, e),
            })?;

        Ok(bitmap.as_image().grayscale())
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, data: &[u8]) -> Result<Vec<PageImage>> {
        check_pdf_header(data)?;

        let pdfium = create_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(data, None)
            .map_err(Self::map_load_error)?;

        let pages = document.pages();
        let page_count = pages.len();
        if page_count == 0 {
            return Err(Error::UnsupportedDocument {
                reason: "PDF has no pages".to_string(),
            });
        }
        if page_count > self.config.max_pages {
            return Err(Error::UnsupportedDocument {
                reason: format!(
                    "PDF has {} pages (max: {})",
                    page_count, self.config.max_pages
                ),
            });
        }

        let mut rendered = Vec::with_capacity(page_count as usize);
        for index in 0..page_count {
            let page_num = index as u32 + 1;
            let page = pages.get(index).map_err(|e| Error::UnsupportedDocument {
                reason: format!("Failed to get page {}: {}", page_num, e),
            })?;

            let image = self.render_page(&page, page_num)?;
            tracing::debug!(
                page = page_num,
                width = image.width(),
                height = image.height(),
                dpi = self.config.dpi,
                "rasterized page"
            );
            rendered.push(PageImage {
                page: page_num,
                image,
            });
        }

        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pdf_detection() {
        let result = PdfiumRasterizer::default().rasterize(b"not a pdf");
        assert!(matches!(result, Err(Error::UnsupportedDocument { .. })));
    }

    #[test]
    fn test_truncated_header_rejected() {
        assert!(check_pdf_header(b"%PD").is_err());
        assert!(check_pdf_header(b"").is_err());
        assert!(check_pdf_header(b"%PDF-1.7\n").is_ok());
    }

    #[test]
    fn test_scale_follows_fixed_dpi() {
        let rasterizer = PdfiumRasterizer::new(RasterConfig {
            dpi: 144,
            ..RasterConfig::default()
        });
        assert!((rasterizer.scale() - 2.0).abs() < f32::EPSILON);
        assert_eq!(PdfiumRasterizer::default().config().dpi, 300);
    }
}
