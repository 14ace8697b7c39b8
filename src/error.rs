//! Error types for the Record Card extraction server

use thiserror::Error;

/// Result type alias for the Record Card extraction server
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the Record Card extraction server
#[derive(Error, Debug)]
pub enum Error {
    /// Input is not a PDF we can rasterize. The only condition that aborts a pipeline run.
    #[error("Unsupported document: {reason}")]
    UnsupportedDocument { reason: String },

    /// PDF file not found
    #[error("PDF not found: {path}")]
    PdfNotFound { path: String },

    /// Uploaded document exceeds the configured size limit
    #[error("Document too large: {size} bytes (max: {max_size} bytes)")]
    DocumentTooLarge { size: u64, max_size: u64 },

    /// PDFium library could not be bound or failed internally
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// OCR engine failed on a single page
    #[error("Recognition failed on page {page}: {reason}")]
    Recognition { page: u32, reason: String },

    /// A value token next to a matched label could not be parsed as currency
    #[error("Malformed currency token: {token:?}")]
    MalformedCurrency { token: String },

    /// Extraction profile could not be compiled
    #[error("Invalid extraction profile: {reason}")]
    InvalidProfile { reason: String },

    /// A manually entered value was rejected
    #[error("Invalid value for {field}: {reason}")]
    InvalidManualValue { field: String, reason: String },

    /// The session holds no property record yet
    #[error("No property record in this session")]
    NoActiveRecord,

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Profile TOML could not be parsed
    #[error("Profile parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, OCR output) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::UnsupportedDocument { .. } => {
                "This document could not be read as a Record Card PDF; please enter the values manually"
                    .to_string()
            }
            Error::PdfNotFound { .. } => "PDF not found".to_string(),
            Error::DocumentTooLarge { max_size, .. } => {
                format!("Document exceeds maximum size of {} bytes", max_size)
            }
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Recognition { page, .. } => format!("Text recognition failed on page {}", page),
            Error::MalformedCurrency { .. } => "Malformed currency value".to_string(),
            Error::InvalidProfile { .. } => "Invalid extraction profile".to_string(),
            Error::InvalidManualValue { field, reason } => {
                format!("Invalid value for {}: {}", field, reason)
            }
            Error::NoActiveRecord => "No property record in this session".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
            Error::Toml(_) => "Invalid extraction profile".to_string(),
        }
    }
}
