//! Text extraction layer
//!
//! Page images go in, reading-order lines with word boxes come out.

pub mod layout;
mod recognizer;
mod tesseract;

pub use recognizer::{OcrLine, OcrWord, PageText, Recognizer, Transcript, PAGE_BREAK};
pub use tesseract::{parse_tsv, TesseractCli, TesseractConfig};
