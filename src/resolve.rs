//! Completeness check over an extracted record

use crate::extract::Field;
use crate::record::PropertyData;
use serde::Serialize;
use std::collections::BTreeSet;

/// How much of the mandatory data was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// All mandatory fields resolved
    Complete,
    /// Some mandatory fields resolved
    Partial,
    /// No mandatory field resolved
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    pub status: ExtractionStatus,
    /// Mandatory fields the user must supply
    pub missing_fields: BTreeSet<Field>,
    /// Other fields that could not be read
    pub unresolved_optional: BTreeSet<Field>,
}

impl ExtractionReport {
    pub fn needs_manual_entry(&self) -> bool {
        self.status != ExtractionStatus::Complete
    }
}

/// Something that went wrong without stopping the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// No page produced any text
    RecognitionEmpty,
    /// A page failed to recognize and contributed no text
    PageUnreadable { page: u32, reason: String },
    /// A label matched but its value did not parse
    MalformedValue {
        field: Field,
        strategy: String,
        token: String,
        reason: String,
    },
}

/// Classify a record by its mandatory fields. Never alters the record.
pub fn resolve(record: &PropertyData) -> ExtractionReport {
    let mut missing_fields = BTreeSet::new();
    let mut unresolved_optional = BTreeSet::new();

    for field in Field::ALL {
        if record.is_resolved(field) {
            continue;
        }
        if field.is_mandatory() {
            missing_fields.insert(field);
        } else {
            unresolved_optional.insert(field);
        }
    }

    let status = if missing_fields.is_empty() {
        ExtractionStatus::Complete
    } else if missing_fields.len() == Field::MANDATORY.len() {
        ExtractionStatus::Empty
    } else {
        ExtractionStatus::Partial
    };

    ExtractionReport {
        status,
        missing_fields,
        unresolved_optional,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Currency;
    use crate::record::RecordSource;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_complete_record() {
        let mut record = PropertyData::new(RecordSource::OcrExtracted);
        record.area_code = Some("14B".to_string());
        record.current_year_sev = Some(Currency::from_dollars(145_200));

        let report = resolve(&record);
        assert_eq!(report.status, ExtractionStatus::Complete);
        assert!(report.missing_fields.is_empty());
        assert!(report.unresolved_optional.contains(&Field::ParcelId));
        assert!(!report.needs_manual_entry());
    }

    #[test]
    fn test_partial_record() {
        let mut record = PropertyData::new(RecordSource::OcrExtracted);
        record.current_year_sev = Some(Currency::from_dollars(145_200));

        let report = resolve(&record);
        assert_eq!(report.status, ExtractionStatus::Partial);
        assert_eq!(report.missing_fields, BTreeSet::from([Field::AreaCode]));
    }

    #[test]
    fn test_empty_record() {
        let record = PropertyData::new(RecordSource::OcrExtracted);
        let report = resolve(&record);
        assert_eq!(report.status, ExtractionStatus::Empty);
        assert_eq!(
            report.missing_fields,
            BTreeSet::from([Field::AreaCode, Field::CurrentYearSev])
        );
        assert_eq!(
            report.unresolved_optional.len(),
            Field::ALL.len() - Field::MANDATORY.len()
        );
    }

    #[test]
    fn test_report_serializes_snake_case() {
        let record = PropertyData::new(RecordSource::OcrExtracted);
        let json = serde_json::to_value(resolve(&record)).unwrap();
        assert_eq!(json["status"], "empty");
        assert_eq!(
            json["missing_fields"],
            serde_json::json!(["area_code", "current_year_sev"])
        );
    }

    #[test]
    fn test_degradation_tags() {
        let warning = Degradation::PageUnreadable {
            page: 2,
            reason: "timeout".to_string(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "page_unreadable");
        assert_eq!(json["page"], 2);
    }
}
