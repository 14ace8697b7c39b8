//! Record Card MCP Server Library
//!
//! Reads scanned township assessment Record Card PDFs and turns them into
//! structured property records:
//! - `pdf`: rasterize pages in memory at a fixed DPI
//! - `ocr`: recognize words and regroup them into reading-order lines
//! - `extract`: strategy-ordered field extraction and the assessment history
//! - `resolve`: classify records as complete, partial or empty
//! - `session`: ephemeral per-session state with stale-result protection
//!
//! MCP tools:
//! - `parse_record_card`: OCR a card and replace the session's record
//! - `get_property_record`: current record and completeness report
//! - `apply_manual_entry`: fill in values OCR could not read
//! - `clear_session`: discard everything the session holds

pub mod error;
pub mod extract;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod record;
pub mod resolve;
pub mod server;
pub mod session;
pub mod source;

pub use error::{Error, Result};
pub use extract::{Currency, ExtractionProfile, Field, FieldExtractor};
pub use pipeline::{Extraction, Pipeline, PipelineConfig};
pub use record::{ManualEntry, PropertyData, RecordSource};
pub use resolve::{resolve, Degradation, ExtractionReport, ExtractionStatus};
pub use server::{
    run_server, run_server_with_config, ApplyManualEntryParams, DocumentSource,
    ParseRecordCardParams, RecordCardServer, RecordResult, ServerConfig,
};
pub use session::{Commit, Session, SessionRecord, UploadTicket};
