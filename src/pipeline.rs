//! End-to-end extraction: rasterize, recognize, extract, resolve

use crate::error::{Error, Result};
use crate::extract::{ExtractionProfile, Field, FieldExtractor, FieldOutcome};
use crate::ocr::{PageText, Recognizer, TesseractCli, TesseractConfig, Transcript};
use crate::pdf::{PageImage, PdfiumRasterizer, RasterConfig, Rasterizer};
use crate::record::PropertyData;
use crate::resolve::{resolve, Degradation, ExtractionReport};
use serde::Serialize;
use std::collections::BTreeMap;

/// Pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub raster: RasterConfig,
    /// Recognizer settings. The DPI hint is overridden by `raster.dpi`.
    pub tesseract: TesseractConfig,
    /// Recognize pages on separate threads
    pub parallel_pages: bool,
    pub profile: ExtractionProfile,
}

/// Everything one pipeline run produces
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub record: PropertyData,
    pub report: ExtractionReport,
    pub outcomes: BTreeMap<Field, FieldOutcome>,
    pub warnings: Vec<Degradation>,
    #[serde(skip)]
    pub transcript: Transcript,
    /// RFC 3339 timestamp of when extraction finished
    pub extracted_at: String,
}

/// Runs one document through every stage. Holds no per-document state.
pub struct Pipeline {
    rasterizer: Box<dyn Rasterizer>,
    recognizer: Box<dyn Recognizer>,
    extractor: FieldExtractor,
    parallel_pages: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("extractor", &self.extractor)
            .field("parallel_pages", &self.parallel_pages)
            .finish()
    }
}

impl Pipeline {
    /// PDFium rasterizer and Tesseract recognizer
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let mut tesseract = config.tesseract;
        tesseract.dpi = config.raster.dpi;

        let pipeline = Self::with_components(
            PdfiumRasterizer::new(config.raster),
            TesseractCli::new(tesseract),
            &config.profile,
        )?;
        Ok(pipeline.parallel_pages(config.parallel_pages))
    }

    pub fn with_components<R, O>(rasterizer: R, recognizer: O, profile: &ExtractionProfile) -> Result<Self>
    where
        R: Rasterizer + 'static,
        O: Recognizer + 'static,
    {
        Ok(Self {
            rasterizer: Box::new(rasterizer),
            recognizer: Box::new(recognizer),
            extractor: FieldExtractor::new(profile)?,
            parallel_pages: false,
        })
    }

    pub fn parallel_pages(mut self, enabled: bool) -> Self {
        self.parallel_pages = enabled;
        self
    }

    /// Run the whole pipeline over PDF bytes.
    ///
    /// Only an unreadable document is an error. Failed pages, blank scans and
    /// unparseable values come back as warnings on a partial or empty record.
    pub fn run(&self, data: &[u8]) -> Result<Extraction> {
        tracing::info!(bytes = data.len(), "starting record card extraction");

        let pages = self.rasterizer.rasterize(data)?;
        tracing::debug!(pages = pages.len(), "document rasterized");

        let (transcript, warnings) = self.recognize_pages(pages);
        let extraction = self.extract_transcript(transcript, warnings);

        tracing::info!(
            status = ?extraction.report.status,
            missing = extraction.report.missing_fields.len(),
            warnings = extraction.warnings.len(),
            "record card extraction finished"
        );
        Ok(extraction)
    }

    /// Recognize every page. Page images are consumed and dropped as soon as
    /// they have been read.
    pub fn recognize_pages(&self, pages: Vec<PageImage>) -> (Transcript, Vec<Degradation>) {
        let results: Vec<(u32, Result<PageText>)> = if self.parallel_pages && pages.len() > 1 {
            std::thread::scope(|scope| {
                let handles: Vec<_> = pages
                    .into_iter()
                    .map(|page| {
                        let number = page.page;
                        let handle = scope.spawn(move || self.recognizer.recognize(&page));
                        (number, handle)
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(number, handle)| {
                        let result = handle.join().unwrap_or_else(|_| {
                            Err(Error::Recognition {
                                page: number,
                                reason: "recognizer panicked".to_string(),
                            })
                        });
                        (number, result)
                    })
                    .collect()
            })
        } else {
            pages
                .into_iter()
                .map(|page| (page.page, self.recognizer.recognize(&page)))
                .collect()
        };

        let mut texts = Vec::with_capacity(results.len());
        let mut warnings = Vec::new();
        for (number, result) in results {
            match result {
                Ok(text) if !text.is_empty() => texts.push(text),
                Ok(_) => {
                    tracing::warn!(page = number, "no text recognized on page");
                    warnings.push(Degradation::PageUnreadable {
                        page: number,
                        reason: "no text recognized".to_string(),
                    });
                    texts.push(PageText::empty(number));
                }
                Err(e) => {
                    tracing::warn!(page = number, error = %e, "page recognition failed");
                    warnings.push(Degradation::PageUnreadable {
                        page: number,
                        reason: e.to_string(),
                    });
                    texts.push(PageText::empty(number));
                }
            }
        }

        let transcript = Transcript::new(texts);
        if transcript.is_blank() {
            tracing::warn!("no text recognized in document");
            warnings.push(Degradation::RecognitionEmpty);
        }
        tracing::debug!(words = transcript.word_count(), "recognition finished");
        (transcript, warnings)
    }

    /// Extract and resolve fields from an already recognized transcript
    pub fn extract_transcript(&self, transcript: Transcript, mut warnings: Vec<Degradation>) -> Extraction {
        let fields = self.extractor.extract(&transcript.to_text());
        warnings.extend(fields.warnings);
        let report = resolve(&fields.record);

        Extraction {
            record: fields.record,
            report,
            outcomes: fields.outcomes,
            warnings,
            transcript,
            extracted_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Currency;
    use crate::resolve::ExtractionStatus;
    use image::DynamicImage;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Produces one blank image per page
    struct FakeRasterizer {
        pages: u32,
    }

    impl Rasterizer for FakeRasterizer {
        fn rasterize(&self, data: &[u8]) -> Result<Vec<PageImage>> {
            crate::pdf::check_pdf_header(data)?;
            Ok((1..=self.pages)
                .map(|page| PageImage {
                    page,
                    image: DynamicImage::new_luma8(8, 8),
                })
                .collect())
        }
    }

    /// Returns canned text per page; pages without text fail
    struct FakeRecognizer {
        pages: HashMap<u32, &'static str>,
    }

    impl Recognizer for FakeRecognizer {
        fn recognize(&self, page: &PageImage) -> Result<PageText> {
            match self.pages.get(&page.page) {
                Some(text) => Ok(PageText::from_plain_text(page.page, text)),
                None => Err(Error::Recognition {
                    page: page.page,
                    reason: "engine crashed".to_string(),
                }),
            }
        }
    }

    fn pipeline(pages: u32, texts: &[(u32, &'static str)]) -> Pipeline {
        Pipeline::with_components(
            FakeRasterizer { pages },
            FakeRecognizer {
                pages: texts.iter().copied().collect(),
            },
            &ExtractionProfile::default(),
        )
        .unwrap()
    }

    const PDF: &[u8] = b"%PDF-1.7 fake";

    #[test]
    fn test_clean_document_is_complete() {
        let extraction = pipeline(1, &[(1, "Area Code: 14B\nS.E.V. $145,200")])
            .run(PDF)
            .unwrap();
        assert_eq!(extraction.report.status, ExtractionStatus::Complete);
        assert_eq!(extraction.record.area_code.as_deref(), Some("14B"));
        assert_eq!(
            extraction.record.current_year_sev,
            Some(Currency::from_dollars(145_200))
        );
        assert!(extraction.warnings.is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(&extraction.extracted_at).is_ok());
    }

    #[test]
    fn test_failed_page_degrades_instead_of_aborting() {
        let extraction = pipeline(2, &[(2, "S.E.V. $145,200")]).run(PDF).unwrap();

        assert_eq!(extraction.report.status, ExtractionStatus::Partial);
        assert_eq!(
            extraction.warnings,
            vec![Degradation::PageUnreadable {
                page: 1,
                reason: "Recognition failed on page 1: engine crashed".to_string(),
            }]
        );
        assert_eq!(extraction.transcript.pages().len(), 2);
    }

    #[test]
    fn test_blank_document_is_empty() {
        let extraction = pipeline(1, &[(1, "   ")]).run(PDF).unwrap();
        assert_eq!(extraction.report.status, ExtractionStatus::Empty);
        assert!(extraction.warnings.contains(&Degradation::RecognitionEmpty));
        for field in Field::ALL {
            assert!(!extraction.record.is_resolved(field));
        }
    }

    #[test]
    fn test_unsupported_document_aborts() {
        let result = pipeline(1, &[(1, "S.E.V. $1")]).run(b"GIF89a");
        assert!(matches!(result, Err(Error::UnsupportedDocument { .. })));
    }

    #[test]
    fn test_values_never_cross_pages() {
        let extraction = pipeline(2, &[(1, "Area Code:"), (2, "14B\nS.E.V. $145,200")])
            .run(PDF)
            .unwrap();
        assert_eq!(extraction.record.area_code, None);
        assert_eq!(extraction.report.status, ExtractionStatus::Partial);
    }

    #[test]
    fn test_parallel_pages_keep_document_order() {
        let texts = [
            (1, "|2025 48,900 192,337 241,237 231,890c"),
            (2, "Area Code: 14B"),
            (3, "|2025 50,000 195,000 245,000 235,000c"),
        ];
        let sequential = pipeline(3, &texts).run(PDF).unwrap();
        let parallel = pipeline(3, &texts).parallel_pages(true).run(PDF).unwrap();

        assert_eq!(sequential.record, parallel.record);
        assert_eq!(sequential.transcript, parallel.transcript);
        assert_eq!(
            parallel.record.current_year_sev,
            Some(Currency::from_dollars(245_000))
        );
    }

    #[test]
    fn test_invalid_profile_fails_construction() {
        let mut config = PipelineConfig::default();
        config.profile = ExtractionProfile::empty();
        config
            .profile
            .append(Field::AreaCode, crate::extract::Strategy::pattern("bad", "Area"));
        assert!(matches!(
            Pipeline::new(config),
            Err(Error::InvalidProfile { .. })
        ));
    }
}
