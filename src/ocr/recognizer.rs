//! Recognized text types and the recognizer seam

use crate::error::Result;
use crate::ocr::layout::group_into_lines;
use crate::pdf::PageImage;

/// Marker placed between pages of a transcript. Extraction never matches across it.
pub const PAGE_BREAK: char = '\u{0C}';

/// A single recognized word with its bounding box in page pixels
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    /// Engine confidence, 0-100
    pub confidence: f32,
}

impl OcrWord {
    pub fn center_y(&self) -> f32 {
        self.top as f32 + self.height as f32 / 2.0
    }

    pub fn right(&self) -> u32 {
        self.left + self.width
    }
}

/// Words sharing a visual baseline, ordered left to right
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLine {
    pub words: Vec<OcrWord>,
    /// Topmost pixel row of the line
    pub top: u32,
    /// Average word height (font size proxy)
    pub avg_height: f32,
}

impl OcrLine {
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn mean_confidence(&self) -> f32 {
        if self.words.is_empty() {
            return 0.0;
        }
        self.words.iter().map(|w| w.confidence).sum::<f32>() / self.words.len() as f32
    }
}

/// Recognized text of one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// Page number (1-indexed)
    pub page: u32,
    pub lines: Vec<OcrLine>,
}

impl PageText {
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            lines: Vec::new(),
        }
    }

    /// Build a page from loose word boxes, regrouping them into reading-order lines
    pub fn from_words(page: u32, words: Vec<OcrWord>) -> Self {
        Self {
            page,
            lines: group_into_lines(words),
        }
    }

    /// Build a page from plain text, one synthetic line per text line.
    /// Used by recognizers that report no geometry.
    pub fn from_plain_text(page: u32, text: &str) -> Self {
        const LINE_HEIGHT: u32 = 40;
        const CHAR_WIDTH: u32 = 20;

        let lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(row, line)| {
                let top = row as u32 * LINE_HEIGHT;
                let mut column = 0u32;
                let mut words = Vec::new();
                for token in line.split_whitespace() {
                    let width = token.chars().count() as u32 * CHAR_WIDTH;
                    words.push(OcrWord {
                        text: token.to_string(),
                        left: column,
                        top,
                        width,
                        height: LINE_HEIGHT / 2,
                        confidence: 100.0,
                    });
                    column += width + CHAR_WIDTH;
                }
                OcrLine {
                    words,
                    top,
                    avg_height: (LINE_HEIGHT / 2) as f32,
                }
            })
            .collect();

        Self { page, lines }
    }

    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(OcrLine::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.words.is_empty())
    }

    pub fn word_count(&self) -> usize {
        self.lines.iter().map(|l| l.words.len()).sum()
    }
}

/// Recognized text of a whole document, pages in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pages: Vec<PageText>,
}

impl Transcript {
    pub fn new(mut pages: Vec<PageText>) -> Self {
        pages.sort_by_key(|p| p.page);
        Self { pages }
    }

    pub fn pages(&self) -> &[PageText] {
        &self.pages
    }

    /// Concatenated text with a page-break marker between pages
    pub fn to_text(&self) -> String {
        let separator = format!("\n{}\n", PAGE_BREAK);
        self.pages
            .iter()
            .map(PageText::text)
            .collect::<Vec<_>>()
            .join(&separator)
    }

    /// True when no page produced any words
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(PageText::is_empty)
    }

    pub fn word_count(&self) -> usize {
        self.pages.iter().map(PageText::word_count).sum()
    }
}

/// Runs character recognition over a single page image
pub trait Recognizer: Send + Sync {
    fn recognize(&self, page: &PageImage) -> Result<PageText>;
}
