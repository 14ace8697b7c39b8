//! Field extraction from recognized text
//!
//! Each field has an ordered list of strategies (label variants, raw
//! patterns, or builtins over the assessment history). The first strategy
//! whose value parses wins; the rest are never consulted.

mod currency;
mod extractor;
mod field;
mod history;
mod profile;

pub use currency::{parse_currency, Currency};
pub use extractor::{FieldExtraction, FieldExtractor, FieldOutcome};
pub use field::{Field, FieldValue, ValueShape};
pub use history::{scan_history, AssessmentHistory, AssessmentYear};
pub use profile::{
    Builtin, ExtractionProfile, Matcher, OverlayStrategy, Position, ProfileOverlay, Strategy,
};
