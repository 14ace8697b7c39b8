//! Tesseract command-line recognizer
//!
//! The page image is piped to `tesseract stdin stdout ... tsv` and the TSV word
//! table is read back from stdout, so no page image ever touches the filesystem.

use crate::error::{Error, Result};
use crate::ocr::recognizer::{OcrWord, PageText, Recognizer};
use crate::pdf::PageImage;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// TSV row level for individual words
const WORD_LEVEL: &str = "5";

/// Tesseract invocation settings
#[derive(Debug, Clone)]
pub struct TesseractConfig {
    /// Binary to execute (looked up on PATH when relative)
    pub binary: PathBuf,
    /// Language pack(s), e.g. "eng"
    pub language: String,
    /// Page segmentation mode. 6 = single uniform block, which keeps table rows intact.
    pub page_seg_mode: u8,
    /// Resolution hint matching the rasterizer DPI
    pub dpi: u16,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            page_seg_mode: 6,
            dpi: 300,
        }
    }
}

/// Recognizer that shells out to the Tesseract CLI
#[derive(Debug, Clone, Default)]
pub struct TesseractCli {
    config: TesseractConfig,
}

impl TesseractCli {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Check whether the configured binary can be executed
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn failure(page: u32, reason: impl Into<String>) -> Error {
        Error::Recognition {
            page,
            reason: reason.into(),
        }
    }

    fn encode_png(page: &PageImage) -> Result<Vec<u8>> {
        let mut png_bytes = Vec::new();
        page.image
            .write_to(
                &mut std::io::Cursor::new(&mut png_bytes),
                image::ImageFormat::Png,
            )
            .map_err(|e| Self::failure(page.page, format!("failed to encode page as PNG: {}", e)))?;
        Ok(png_bytes)
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.config.binary);
        command
            .arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(self.config.page_seg_mode.to_string())
            .arg("--dpi")
            .arg(self.config.dpi.to_string())
            .arg("tsv")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

impl Recognizer for TesseractCli {
    fn recognize(&self, page: &PageImage) -> Result<PageText> {
        let png = Self::encode_png(page)?;

        let mut child = self
            .command()
            .spawn()
            .map_err(|e| Self::failure(page.page, format!("failed to run tesseract: {}", e)))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Self::failure(page.page, "tesseract stdin unavailable"))?;

        // Feed stdin from a second thread so a full stdout pipe cannot deadlock us
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(&png));
            let output = child.wait_with_output();
            (writer.join(), output)
        });

        let output = output.map_err(|e| {
            Self::failure(page.page, format!("failed to wait for tesseract: {}", e))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::failure(
                page.page,
                format!("tesseract exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(Self::failure(
                    page.page,
                    format!("failed to stream page image: {}", e),
                ))
            }
            Err(_) => return Err(Self::failure(page.page, "page writer thread panicked")),
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        let words = parse_tsv(&tsv);
        tracing::debug!(page = page.page, words = words.len(), "recognized page");

        Ok(PageText::from_words(page.page, words))
    }
}

/// Parse Tesseract TSV output into word boxes.
///
/// Columns: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Only word rows with a
/// non-negative confidence and non-blank text are kept.
pub fn parse_tsv(tsv: &str) -> Vec<OcrWord> {
    tsv.lines()
        .filter_map(|row| {
            let cols: Vec<&str> = row.split('\t').collect();
            if cols.len() < 12 || cols[0] != WORD_LEVEL {
                return None;
            }

            let confidence: f32 = cols[10].trim().parse().ok()?;
            let text = cols[11].trim();
            if confidence < 0.0 || text.is_empty() {
                return None;
            }

            Some(OcrWord {
                text: text.to_string(),
                left: cols[6].trim().parse().ok()?,
                top: cols[7].trim().parse().ok()?,
                width: cols[8].trim().parse().ok()?,
                height: cols[9].trim().parse().ok()?,
                confidence,
            })
        })
        .collect()
}
