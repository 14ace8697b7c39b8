//! Integration tests for Record Card MCP Server
//!
//! PDFium and Tesseract are replaced by in-memory fakes so the tests exercise
//! everything from page text to the session without native dependencies.

use pretty_assertions::assert_eq;
use record_card_mcp_server::extract::{Currency, ExtractionProfile, Field, FieldOutcome};
use record_card_mcp_server::ocr::{parse_tsv, PageText, Recognizer};
use record_card_mcp_server::pdf::{check_pdf_header, PageImage, PdfiumRasterizer, Rasterizer};
use record_card_mcp_server::{
    Commit, Degradation, Error, ExtractionStatus, ManualEntry, Pipeline, RecordSource, Session,
};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("Failed to read fixture")
}

const PDF: &[u8] = b"%PDF-1.7 scanned record card";

/// One blank image per page
struct ScanRasterizer {
    pages: u32,
}

impl Rasterizer for ScanRasterizer {
    fn rasterize(&self, data: &[u8]) -> record_card_mcp_server::Result<Vec<PageImage>> {
        check_pdf_header(data)?;
        Ok((1..=self.pages)
            .map(|page| PageImage {
                page,
                image: image::DynamicImage::new_luma8(16, 16),
            })
            .collect())
    }
}

/// Returns fixed text per page, like an OCR engine that always reads the same scan
struct ScriptedRecognizer {
    pages: HashMap<u32, String>,
}

impl Recognizer for ScriptedRecognizer {
    fn recognize(&self, page: &PageImage) -> record_card_mcp_server::Result<PageText> {
        let text = self.pages.get(&page.page).map(String::as_str).unwrap_or("");
        Ok(PageText::from_plain_text(page.page, text))
    }
}

fn pipeline_for(pages: Vec<String>, profile: &ExtractionProfile) -> Pipeline {
    let recognizer = ScriptedRecognizer {
        pages: pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| (i as u32 + 1, text))
            .collect(),
    };
    let count = recognizer.pages.len().max(1) as u32;
    Pipeline::with_components(ScanRasterizer { pages: count }, recognizer, profile)
        .expect("default profile compiles")
}

fn pittsfield_pages() -> Vec<String> {
    vec![
        load_fixture("pittsfield_page1.txt"),
        load_fixture("pittsfield_page2.txt"),
    ]
}

#[test]
fn test_pittsfield_card_end_to_end() {
    let extraction = pipeline_for(pittsfield_pages(), &ExtractionProfile::default())
        .run(PDF)
        .expect("pipeline run");
    let record = &extraction.record;

    assert_eq!(extraction.report.status, ExtractionStatus::Complete);
    assert!(extraction.report.missing_fields.is_empty());
    assert_eq!(record.source, RecordSource::OcrExtracted);
    assert_eq!(record.parcel_id.as_deref(), Some("L-12-02-305-018"));
    assert_eq!(record.address.as_deref(), Some("4512 MEADOW VIEW DR"));
    assert_eq!(record.area_code.as_deref(), Some("AR-4"));
    assert_eq!(record.subdivision.as_deref(), Some("MEADOWS OF ARBOR RIDGE"));
    assert_eq!(record.property_class.as_deref(), Some("401"));
    assert_eq!(record.tax_year, Some(2026));
    assert_eq!(record.current_year_sev, Some(Currency::from_dollars(242_732)));
    assert_eq!(record.current_year_taxable, Some(Currency::from_dollars(213_794)));
    assert_eq!(record.true_cash_value, Some(Currency::from_dollars(485_465)));
    assert_eq!(record.land_value, Some(Currency::from_dollars(49_600)));
    assert_eq!(record.history.len(), 3);
    assert_eq!(record.building.style.as_deref(), Some("TWO-STORY"));
    assert_eq!(record.building.condition.as_deref(), Some("Good"));
    assert_eq!(record.building.year_built, Some(1998));
    assert_eq!(record.building.effective_age, Some(22));
    assert_eq!(record.building.floor_area, Some(2412));
    assert_eq!(record.building.ground_area, Some(1206));
    assert_eq!(record.building.basement_area, Some(1104));
    assert_eq!(record.building.ecf, Some(0.802));
    assert_eq!(
        record.cost_approach.total_base_new,
        Some(Currency::from_dollars(312_540))
    );
    assert_eq!(
        record.cost_approach.total_depreciated_cost,
        Some(Currency::from_dollars(243_781))
    );
    assert_eq!(
        record.cost_approach.estimated_tcv,
        Some(Currency::from_dollars(195_512))
    );
}

#[test]
fn test_clean_card_text_is_complete() {
    let extraction = pipeline_for(vec![load_fixture("clean_card.txt")], &ExtractionProfile::default())
        .run(PDF)
        .expect("pipeline run");

    assert_eq!(extraction.report.status, ExtractionStatus::Complete);
    assert_eq!(
        extraction.record.current_year_sev,
        Some(Currency::from_dollars(145_200))
    );
    assert_eq!(
        extraction.record.current_year_taxable,
        Some(Currency::from_dollars(132_000))
    );
    assert_eq!(extraction.record.area_code.as_deref(), Some("14B"));
}

#[test]
fn test_misread_area_code_label_is_partial() {
    let text = load_fixture("clean_card.txt").replace("Area Code: 14B", "Aroa Codo: 14B");
    let extraction = pipeline_for(vec![text], &ExtractionProfile::default())
        .run(PDF)
        .expect("pipeline run");

    assert_eq!(extraction.report.status, ExtractionStatus::Partial);
    assert_eq!(
        extraction.report.missing_fields,
        BTreeSet::from([Field::AreaCode])
    );
    assert_eq!(extraction.record.area_code, None);
    assert_eq!(
        extraction.record.current_year_sev,
        Some(Currency::from_dollars(145_200))
    );
    assert_eq!(
        extraction.record.current_year_taxable,
        Some(Currency::from_dollars(132_000))
    );
    assert_eq!(extraction.record.parcel_id.as_deref(), Some("L-12-02-305-018"));
}

#[test]
fn test_unreadable_current_row_keeps_current_year() {
    let mut pages = pittsfield_pages();
    pages[0] = pages[0].replace("|2026 49,600 193,132 242,732 213,794c\n", "");

    let extraction = pipeline_for(pages, &ExtractionProfile::default())
        .run(PDF)
        .expect("pipeline run");
    let record = &extraction.record;

    assert_eq!(record.tax_year, Some(2026));
    assert_eq!(record.history.len(), 2);
    assert_eq!(record.current_year_sev, Some(Currency::from_dollars(242_732)));
    assert_eq!(record.current_year_taxable, None);
    assert_eq!(
        extraction.outcomes[&Field::CurrentYearSev],
        FieldOutcome::Resolved {
            strategy: "half-estimated-tcv".to_string()
        }
    );
    assert_eq!(extraction.report.status, ExtractionStatus::Complete);
}

#[test]
fn test_corrupted_area_code_needs_manual_entry() {
    let mut pages = pittsfield_pages();
    pages[0] = pages[0].replace("Land Table AR-4.", "Land Tab1e AR~4,");

    let extraction = pipeline_for(pages, &ExtractionProfile::default())
        .run(PDF)
        .expect("pipeline run");

    assert_eq!(extraction.report.status, ExtractionStatus::Partial);
    assert_eq!(
        extraction.report.missing_fields,
        BTreeSet::from([Field::AreaCode])
    );
    assert_eq!(extraction.record.area_code, None);
    assert_eq!(
        extraction.record.current_year_sev,
        Some(Currency::from_dollars(242_732))
    );
    match &extraction.outcomes[&Field::AreaCode] {
        FieldOutcome::Unresolved { attempted } => {
            assert_eq!(attempted, &vec!["area-code-label", "land-table-code"]);
        }
        other => panic!("area code should be unresolved, got {:?}", other),
    }
}

#[test]
fn test_blank_scan_is_empty() {
    let extraction = pipeline_for(vec![String::new(), String::new()], &ExtractionProfile::default())
        .run(PDF)
        .expect("blank scans are not an error");

    assert_eq!(extraction.report.status, ExtractionStatus::Empty);
    assert_eq!(
        extraction.report.missing_fields,
        BTreeSet::from([Field::AreaCode, Field::CurrentYearSev])
    );
    assert!(extraction.warnings.contains(&Degradation::RecognitionEmpty));
    for field in Field::ALL {
        assert!(!extraction.record.is_resolved(field));
    }
    assert!(extraction.record.history.is_empty());
}

#[test]
fn test_stale_upload_is_discarded() {
    let pipeline = pipeline_for(pittsfield_pages(), &ExtractionProfile::default());
    let session = Session::new();

    let (first, first_doc) = session.begin_upload(PDF.to_vec());
    let (second, second_doc) = session.begin_upload(PDF.to_vec());

    // The first run finishes after the second upload was registered
    let late = pipeline.run(first_doc.as_slice()).expect("pipeline run");
    assert!(matches!(session.complete(first, late), Commit::Stale));
    assert!(session.snapshot().is_none());

    let fresh = pipeline.run(second_doc.as_slice()).expect("pipeline run");
    match session.complete(second, fresh) {
        Commit::Accepted(current) => {
            assert_eq!(current.upload_id, Some(second.upload_id()));
            assert_eq!(current.report().status, ExtractionStatus::Complete);
        }
        Commit::Stale => panic!("latest upload must be accepted"),
    }
}

#[test]
fn test_manual_entry_completes_partial_record() {
    let session = Session::new();
    let pipeline = pipeline_for(
        vec!["S.E.V. $145,200\nTaxable Value $132,000".to_string()],
        &ExtractionProfile::default(),
    );

    let (ticket, document) = session.begin_upload(PDF.to_vec());
    let extraction = pipeline.run(document.as_slice()).expect("pipeline run");
    assert_eq!(extraction.report.status, ExtractionStatus::Partial);
    assert!(matches!(session.complete(ticket, extraction), Commit::Accepted(_)));

    let rejected = session.apply_manual(&ManualEntry {
        area_code: Some("14B".to_string()),
        current_year_sev: Some("abc".to_string()),
        ..ManualEntry::default()
    });
    assert!(matches!(rejected, Err(Error::InvalidManualValue { .. })));

    let updated = session
        .apply_manual(&ManualEntry {
            area_code: Some("14B".to_string()),
            ..ManualEntry::default()
        })
        .expect("valid entry");
    assert_eq!(updated.report().status, ExtractionStatus::Complete);
    assert_eq!(updated.record.source, RecordSource::OcrWithManualOverrides);
    assert_eq!(
        updated.record.current_year_taxable,
        Some(Currency::from_dollars(132_000))
    );
}

#[test]
fn test_profile_overlay_from_file() {
    let profile = ExtractionProfile::load(fixture_path("profile_overlay.toml")).expect("overlay");
    assert_eq!(profile.tax_year, Some(2025));

    let mut pages = pittsfield_pages();
    pages[0].push_str("\nNbhd. 22C");
    let extraction = pipeline_for(pages, &profile).run(PDF).expect("pipeline run");

    assert_eq!(extraction.record.area_code.as_deref(), Some("22C"));
    assert_eq!(extraction.record.tax_year, Some(2025));
    assert_eq!(
        extraction.record.current_year_sev,
        Some(Currency::from_dollars(241_237))
    );
    assert_eq!(
        extraction.record.current_year_taxable,
        Some(Currency::from_dollars(203_613))
    );
}

#[test]
fn test_tesseract_tsv_columns_are_regrouped() {
    // Label and value land in different Tesseract blocks on the same baseline
    let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
5\t1\t1\t1\t1\t1\t100\t300\t90\t40\t93.1\tArea
5\t1\t1\t1\t1\t2\t200\t302\t110\t40\t92.4\tCode:
5\t1\t4\t1\t1\t1\t900\t305\t80\t40\t90.0\t14B
5\t1\t2\t1\t1\t1\t100\t400\t150\t40\t91.0\tS.E.V.
5\t1\t5\t1\t1\t1\t900\t398\t190\t40\t88.7\t$145,200
";
    let page = PageText::from_words(1, parse_tsv(tsv));
    assert_eq!(page.text(), "Area Code: 14B\nS.E.V. $145,200");

    let extraction = pipeline_for(vec![page.text()], &ExtractionProfile::default())
        .run(PDF)
        .expect("pipeline run");
    assert_eq!(extraction.report.status, ExtractionStatus::Complete);
}

#[test]
fn test_extraction_json_shape() {
    let extraction = pipeline_for(pittsfield_pages(), &ExtractionProfile::default())
        .run(PDF)
        .expect("pipeline run");
    let json = serde_json::to_value(&extraction).expect("serializable");

    assert_eq!(json["report"]["status"], "complete");
    assert_eq!(json["record"]["area_code"], "AR-4");
    assert_eq!(json["record"]["current_year_sev"], 242732.0);
    assert_eq!(json["record"]["history"][0]["year"], 2024);
    assert_eq!(json["record"]["cost_approach"]["estimated_tcv"], 195512.0);
    assert_eq!(json["outcomes"]["area_code"]["state"], "resolved");
    assert_eq!(json["outcomes"]["area_code"]["strategy"], "land-table-code");
    assert!(json.get("transcript").is_none());
}

#[test]
fn test_pdfium_rasterizer_rejects_non_pdf() {
    let result = PdfiumRasterizer::default().rasterize(b"GIF89a not a card");
    assert!(matches!(result, Err(Error::UnsupportedDocument { .. })));
}
