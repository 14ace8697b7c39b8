//! PDF processing layer
//!
//! This module turns uploaded PDF bytes into page images using PDFium.

mod rasterizer;

pub use rasterizer::{check_pdf_header, PageImage, PdfiumRasterizer, RasterConfig, Rasterizer};
