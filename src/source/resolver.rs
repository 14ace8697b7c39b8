//! Source resolution for uploaded documents
//!
//! Documents are read fully into memory and never copied elsewhere on disk.

use crate::error::{Error, Result};
use crate::pdf::check_pdf_header;
use base64::Engine;
use std::path::Path;

/// Resolved document data
pub struct ResolvedDocument {
    pub data: Vec<u8>,
    pub source_name: String,
}

impl std::fmt::Debug for ResolvedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedDocument")
            .field("bytes", &self.data.len())
            .field("source_name", &self.source_name)
            .finish()
    }
}

fn check_size(size: u64, max_bytes: u64) -> Result<()> {
    if size > max_bytes {
        return Err(Error::DocumentTooLarge {
            size,
            max_size: max_bytes,
        });
    }
    Ok(())
}

/// Resolve a file path to document data
pub fn resolve_path<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<ResolvedDocument> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    check_size(std::fs::metadata(path)?.len(), max_bytes)?;
    let data = std::fs::read(path)?;
    check_size(data.len() as u64, max_bytes)?;
    check_pdf_header(&data)?;

    Ok(ResolvedDocument {
        data,
        source_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<file>".to_string()),
    })
}

/// Resolve base64 encoded data to document data
pub fn resolve_base64(base64_data: &str, max_bytes: u64) -> Result<ResolvedDocument> {
    let trimmed = base64_data.trim();
    // Reject before decoding when the payload is obviously too large
    check_size(trimmed.len() as u64 / 4 * 3, max_bytes)?;

    let data = base64::engine::general_purpose::STANDARD.decode(trimmed)?;
    check_size(data.len() as u64, max_bytes)?;
    check_pdf_header(&data)?;

    Ok(ResolvedDocument {
        data,
        source_name: "<base64>".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MAX: u64 = 1024;

    #[test]
    fn test_resolve_base64_not_pdf() {
        let result = resolve_base64("SGVsbG8gV29ybGQ=", MAX); // "Hello World"
        assert!(matches!(result, Err(Error::UnsupportedDocument { .. })));
    }

    #[test]
    fn test_resolve_base64_invalid_base64() {
        let result = resolve_base64("not valid base64!!!", MAX);
        assert!(matches!(result, Err(Error::Base64Decode(_))));
    }

    #[test]
    fn test_resolve_base64_pdf() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"%PDF-1.7 card");
        let resolved = resolve_base64(&format!("  {}\n", encoded), MAX).unwrap();
        assert_eq!(resolved.data, b"%PDF-1.7 card");
        assert_eq!(resolved.source_name, "<base64>");
    }

    #[test]
    fn test_resolve_base64_too_large() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(vec![b'%'; 2048]);
        let result = resolve_base64(&encoded, MAX);
        assert!(matches!(result, Err(Error::DocumentTooLarge { .. })));
    }

    #[test]
    fn test_resolve_path_not_found() {
        let result = resolve_path("/nonexistent/path/file.pdf", MAX);
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }

    #[test]
    fn test_resolve_path_reads_pdf() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"%PDF-1.4 record card").unwrap();

        let resolved = resolve_path(file.path(), MAX).unwrap();
        assert_eq!(resolved.data, b"%PDF-1.4 record card");
        assert!(resolved.source_name.ends_with(".pdf"));
        assert!(!format!("{:?}", resolved).contains("record card"));
    }

    #[test]
    fn test_resolve_path_too_large() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'%'; 2048]).unwrap();
        let result = resolve_path(file.path(), MAX);
        assert!(matches!(result, Err(Error::DocumentTooLarge { size: 2048, .. })));
    }
}
