//! Reading-order reconstruction from word boxes
//!
//! Tesseract often splits a record card's label column and value column into
//! separate blocks. Regrouping words by vertical position puts a label and the
//! value printed to its right back on the same line.

use crate::ocr::recognizer::{OcrLine, OcrWord};

/// Vertical tolerance for same-line detection, derived from the median word height
pub fn line_tolerance(words: &[OcrWord]) -> f32 {
    let mut heights: Vec<f32> = words
        .iter()
        .filter(|w| w.height > 0)
        .map(|w| w.height as f32)
        .collect();

    if heights.is_empty() {
        return 5.0;
    }

    heights.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_height = heights[heights.len() / 2];

    // Half a glyph height absorbs baseline jitter from skewed scans
    (median_height * 0.5).max(2.0)
}

/// Group words into lines by vertical center, top to bottom, each line left to right
pub fn group_into_lines(words: Vec<OcrWord>) -> Vec<OcrLine> {
    if words.is_empty() {
        return Vec::new();
    }

    let tolerance = line_tolerance(&words);

    // Image coordinates: y grows downward, so ascending y is reading order
    let mut sorted = words;
    sorted.sort_by(|a, b| {
        let y_cmp = a
            .center_y()
            .partial_cmp(&b.center_y())
            .unwrap_or(std::cmp::Ordering::Equal);
        if y_cmp == std::cmp::Ordering::Equal {
            a.left.cmp(&b.left)
        } else {
            y_cmp
        }
    });

    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current: Vec<OcrWord> = Vec::new();
    let mut current_y: Option<f32> = None;

    for word in sorted {
        match current_y {
            Some(y) if (word.center_y() - y).abs() <= tolerance => current.push(word),
            _ => {
                if !current.is_empty() {
                    lines.push(create_line(current));
                }
                current_y = Some(word.center_y());
                current = vec![word];
            }
        }
    }

    if !current.is_empty() {
        lines.push(create_line(current));
    }

    lines
}

fn create_line(mut words: Vec<OcrWord>) -> OcrLine {
    words.sort_by_key(|w| w.left);

    let avg_height = words.iter().map(|w| w.height as f32).sum::<f32>() / words.len() as f32;
    let top = words.iter().map(|w| w.top).min().unwrap_or(0);

    OcrLine {
        words,
        top,
        avg_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, left: u32, top: u32) -> OcrWord {
        OcrWord {
            text: text.to_string(),
            left,
            top,
            width: 20 * text.len() as u32,
            height: 30,
            confidence: 90.0,
        }
    }

    #[test]
    fn test_label_and_value_from_separate_blocks_share_a_line() {
        // Value column recognized before the label column, slightly lower baseline
        let words = vec![
            word("$145,200", 900, 404),
            word("$132,000", 900, 455),
            word("S.E.V.", 100, 400),
            word("Taxable", 100, 450),
            word("Value:", 260, 451),
        ];

        let lines = group_into_lines(words);
        let texts: Vec<String> = lines.iter().map(OcrLine::text).collect();
        assert_eq!(texts, vec!["S.E.V. $145,200", "Taxable Value: $132,000"]);
        assert_eq!(lines[0].top, 400);
    }

    #[test]
    fn test_tolerance_uses_median_height() {
        let words = vec![word("a", 0, 0), word("b", 0, 100), word("c", 0, 200)];
        assert_eq!(line_tolerance(&words), 15.0);
        assert_eq!(line_tolerance(&[]), 5.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(group_into_lines(Vec::new()).is_empty());
    }
}
