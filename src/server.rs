//! MCP Server implementation using rmcp

use crate::error::Error;
use crate::extract::{Field, FieldOutcome};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::record::{ManualEntry, PropertyData};
use crate::resolve::{Degradation, ExtractionReport};
use crate::session::{Commit, Session, SessionRecord};
use crate::source::{resolve_base64, resolve_path, ResolvedDocument};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Where to read a Record Card from
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum DocumentSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the Record Card PDF
        path: String,
    },
    /// Base64 encoded PDF data
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
}

impl<'de> serde::Deserialize<'de> for DocumentSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        if let Some(obj) = value.as_object() {
            if let Some(v) = obj.get("path") {
                if let Some(s) = v.as_str() {
                    return Ok(DocumentSource::Path {
                        path: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"path\" must be a string"));
            }
            if let Some(v) = obj.get("base64") {
                if let Some(s) = v.as_str() {
                    return Ok(DocumentSource::Base64 {
                        base64: s.to_string(),
                    });
                }
                return Err(serde::de::Error::custom("\"base64\" must be a string"));
            }
            let keys: Vec<&String> = obj.keys().collect();
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\" or \"base64\", but got keys: {:?}",
                keys
            )))
        } else {
            Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\" or \"base64\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )))
        }
    }
}

/// Security and resource configuration for the Record Card server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories path sources must live in. Empty allows any path.
    pub resource_dirs: Vec<String>,
    /// Maximum accepted document size in bytes (default: 20MB)
    pub max_document_bytes: u64,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            max_document_bytes: 20 * 1024 * 1024, // 20MB
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Record Card MCP Server. One instance serves one session.
#[derive(Clone)]
pub struct RecordCardServer {
    session: Arc<Session>,
    pipeline: Arc<Pipeline>,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ParseRecordCardParams {
    /// Record Card PDF to read
    pub source: DocumentSource,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ApplyManualEntryParams {
    /// Values to set. Omitted or blank values are left unchanged.
    pub entry: ManualEntry,
}

/// Tool response describing the session's property record
#[derive(Debug, Serialize)]
pub struct RecordResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<Uuid>,
    /// A newer upload or manual entry replaced this result before it finished
    pub superseded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<PropertyData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ExtractionReport>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outcomes: BTreeMap<Field, FieldOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Degradation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RecordResult {
    fn from_session(source: Option<String>, current: SessionRecord) -> Self {
        Self {
            source,
            upload_id: current.upload_id,
            superseded: false,
            report: Some(current.report()),
            record: Some(current.record),
            outcomes: current.outcomes,
            warnings: current.warnings,
            extracted_at: current.extracted_at,
            error: None,
        }
    }

    fn empty(source: Option<String>) -> Self {
        Self {
            source,
            upload_id: None,
            superseded: false,
            record: None,
            report: None,
            outcomes: BTreeMap::new(),
            warnings: Vec::new(),
            extracted_at: None,
            error: None,
        }
    }

    fn superseded(source: Option<String>) -> Self {
        Self {
            superseded: true,
            ..Self::empty(source)
        }
    }

    fn failed(source: Option<String>, error: &Error) -> Self {
        Self {
            error: Some(error.client_message()),
            ..Self::empty(source)
        }
    }
}

fn respond(result: RecordResult) -> String {
    let response = serde_json::json!({ "results": [result] });
    serde_json::to_string_pretty(&response).unwrap_or_default()
}

#[tool_router]
impl RecordCardServer {
    pub fn new() -> crate::error::Result<Self> {
        Self::with_config(ServerConfig::default())
    }

    /// Create a server with PDFium and Tesseract as configured
    pub fn with_config(config: ServerConfig) -> crate::error::Result<Self> {
        let pipeline = Pipeline::new(config.pipeline.clone())?;
        Ok(Self::with_pipeline(config, pipeline))
    }

    /// Create a server around an already built pipeline
    pub fn with_pipeline(config: ServerConfig, pipeline: Pipeline) -> Self {
        Self {
            session: Arc::new(Session::new()),
            pipeline: Arc::new(pipeline),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Read a Record Card and replace the session's property record
    #[tool(
        description = "Read a scanned property Record Card PDF with OCR and extract the parcel's assessment data (area code, current-year SEV and taxable value, assessment history, building details).

Source format: {\"path\": \"/absolute/path.pdf\"} or {\"base64\": \"...\"}

Returns the record, a report with status complete/partial/empty and the mandatory fields that still need manual entry, and any warnings. Nothing is written to disk; the document is discarded after extraction."
    )]
    async fn parse_record_card(&self, Parameters(params): Parameters<ParseRecordCardParams>) -> String {
        let source_name = Self::source_name(&params.source);
        let result = self
            .process_parse_record_card(&params.source)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "parse_record_card failed");
                RecordResult::failed(Some(source_name), &e)
            });
        respond(result)
    }

    /// Return the session's current property record
    #[tool(
        description = "Get the property record held by this session, with a freshly computed completeness report."
    )]
    async fn get_property_record(&self) -> String {
        let result = self.process_get_property_record().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "get_property_record failed");
            RecordResult::failed(None, &e)
        });
        respond(result)
    }

    /// Merge user-entered values into the session's record
    #[tool(
        description = "Fill in or correct property record values by hand, e.g. when OCR could not read the area code or SEV. Money values accept \"$145,200\" style strings. Creates a manual record if no card has been read."
    )]
    async fn apply_manual_entry(&self, Parameters(params): Parameters<ApplyManualEntryParams>) -> String {
        let result = self
            .process_apply_manual_entry(&params.entry)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "apply_manual_entry failed");
                RecordResult::failed(None, &e)
            });
        respond(result)
    }

    /// Drop all session state
    #[tool(description = "Discard the session's document and property record.")]
    async fn clear_session(&self) -> String {
        self.session.clear();
        let response = serde_json::json!({ "results": [{ "cleared": true }] });
        serde_json::to_string_pretty(&response).unwrap_or_default()
    }
}

impl RecordCardServer {
    fn source_name(source: &DocumentSource) -> String {
        match source {
            DocumentSource::Path { path } => std::path::Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "<file>".to_string()),
            DocumentSource::Base64 { .. } => "<base64>".to_string(),
        }
    }

    fn resolve_source(&self, source: &DocumentSource) -> crate::error::Result<ResolvedDocument> {
        match source {
            DocumentSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                resolve_path(path, self.config.max_document_bytes)
            }
            DocumentSource::Base64 { base64 } => {
                resolve_base64(base64, self.config.max_document_bytes)
            }
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<std::path::PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(std::path::PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        for dir in &self.config.resource_dirs {
            if let Ok(canonical_dir) = std::fs::canonicalize(dir) {
                if canonical.starts_with(&canonical_dir) {
                    return Ok(canonical);
                }
            }
        }

        Err(Error::PathAccessDenied {
            path: path.to_string(),
        })
    }

    pub async fn process_parse_record_card(
        &self,
        source: &DocumentSource,
    ) -> crate::error::Result<RecordResult> {
        let resolved = self.resolve_source(source)?;
        let source_name = Some(resolved.source_name.clone());

        let (ticket, document) = self.session.begin_upload(resolved.data);
        tracing::info!(upload = %ticket.upload_id(), "record card upload received");

        // Rasterizing and OCR are CPU-bound and spawn subprocesses
        let pipeline = Arc::clone(&self.pipeline);
        let run = tokio::task::spawn_blocking(move || pipeline.run(document.as_slice()))
            .await
            .map_err(|e| Error::Pdfium {
                reason: format!("Task join error: {}", e),
            })
            .and_then(|run| run);

        let extraction = match run {
            Ok(extraction) => extraction,
            Err(e) => {
                self.session.abandon(ticket);
                return Err(e);
            }
        };

        match self.session.complete(ticket, extraction) {
            Commit::Accepted(current) => Ok(RecordResult::from_session(source_name, current)),
            Commit::Stale => {
                tracing::info!(upload = %ticket.upload_id(), "extraction superseded by newer input");
                Ok(RecordResult::superseded(source_name))
            }
        }
    }

    pub fn process_get_property_record(&self) -> crate::error::Result<RecordResult> {
        let current = self.session.snapshot().ok_or(Error::NoActiveRecord)?;
        Ok(RecordResult::from_session(None, current))
    }

    pub fn process_apply_manual_entry(&self, entry: &ManualEntry) -> crate::error::Result<RecordResult> {
        let current = self.session.apply_manual(entry)?;
        Ok(RecordResult::from_session(None, current))
    }
}

#[tool_handler]
impl ServerHandler for RecordCardServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Record Card server reads scanned property Record Card PDFs and extracts assessment \
                 data for an appeal analysis. When a report lists missing_fields, ask the user for \
                 those values and submit them with apply_manual_entry."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    let server = RecordCardServer::with_config(config)?;

    tracing::info!(
        session = %server.session.id(),
        "Record Card MCP Server ready, waiting for connections..."
    );

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
