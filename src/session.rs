//! Session-scoped record state
//!
//! A session holds at most one uploaded document and one property record,
//! both in memory only. Every upload is issued a ticket; a pipeline result is
//! committed only if its ticket is still the newest when it finishes.

use crate::error::{Error, Result};
use crate::extract::{Field, FieldOutcome};
use crate::pipeline::Extraction;
use crate::record::{ManualEntry, PropertyData};
use crate::resolve::{resolve, Degradation, ExtractionReport};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;
use zeroize::Zeroize;

/// Uploaded document bytes, zeroed when the last holder drops them
pub struct DocumentBytes(Vec<u8>);

impl DocumentBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Zero the buffer, spare capacity included, and truncate it
    fn scrub(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for DocumentBytes {
    fn drop(&mut self) {
        self.scrub();
    }
}

impl std::fmt::Debug for DocumentBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DocumentBytes({} bytes)", self.0.len())
    }
}

/// Proof of which upload a pipeline run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadTicket {
    generation: u64,
    upload_id: Uuid,
}

impl UploadTicket {
    pub fn upload_id(&self) -> Uuid {
        self.upload_id
    }
}

/// Outcome of handing a finished extraction to the session
#[derive(Debug)]
pub enum Commit {
    Accepted(SessionRecord),
    /// A newer upload, manual entry or clear happened meanwhile; the result was dropped
    Stale,
}

/// The record currently held by a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    /// Upload the record was extracted from; `None` for purely manual records
    pub upload_id: Option<Uuid>,
    pub record: PropertyData,
    pub warnings: Vec<Degradation>,
    pub outcomes: BTreeMap<Field, FieldOutcome>,
    pub extracted_at: Option<String>,
}

impl SessionRecord {
    /// Completeness of the record as it stands now
    pub fn report(&self) -> ExtractionReport {
        resolve(&self.record)
    }
}

#[derive(Default)]
struct SessionState {
    generation: u64,
    pending: Option<(UploadTicket, Arc<DocumentBytes>)>,
    current: Option<SessionRecord>,
}

/// One user's ephemeral working state
pub struct Session {
    id: Uuid,
    state: Mutex<SessionState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Register a new upload. Any previous document and record are released
    /// and every earlier ticket becomes stale.
    pub fn begin_upload(&self, data: Vec<u8>) -> (UploadTicket, Arc<DocumentBytes>) {
        let document = Arc::new(DocumentBytes::new(data));
        let mut state = self.state.lock();
        state.generation += 1;
        let ticket = UploadTicket {
            generation: state.generation,
            upload_id: Uuid::new_v4(),
        };
        state.pending = Some((ticket, Arc::clone(&document)));
        state.current = None;
        tracing::debug!(
            session = %self.id,
            upload = %ticket.upload_id,
            bytes = document.len(),
            "upload started"
        );
        (ticket, document)
    }

    /// Commit a finished extraction if its upload is still the newest
    pub fn complete(&self, ticket: UploadTicket, extraction: Extraction) -> Commit {
        let mut state = self.state.lock();
        if state.generation != ticket.generation {
            tracing::debug!(upload = %ticket.upload_id, "discarding stale extraction");
            return Commit::Stale;
        }

        state.pending = None;
        let record = SessionRecord {
            upload_id: Some(ticket.upload_id),
            record: extraction.record,
            warnings: extraction.warnings,
            outcomes: extraction.outcomes,
            extracted_at: Some(extraction.extracted_at),
        };
        state.current = Some(record.clone());
        Commit::Accepted(record)
    }

    /// Release the document of a failed upload. Returns false if the ticket was already stale.
    pub fn abandon(&self, ticket: UploadTicket) -> bool {
        let mut state = self.state.lock();
        if state.generation != ticket.generation {
            return false;
        }
        state.pending = None;
        true
    }

    pub fn is_current(&self, ticket: UploadTicket) -> bool {
        self.state.lock().generation == ticket.generation
    }

    pub fn has_pending_upload(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub fn snapshot(&self) -> Option<SessionRecord> {
        self.state.lock().current.clone()
    }

    /// Merge user-entered values into the current record, creating a manual
    /// record when there is none. Invalidates any upload still in flight.
    pub fn apply_manual(&self, entry: &ManualEntry) -> Result<SessionRecord> {
        let mut state = self.state.lock();

        let updated = match &state.current {
            Some(existing) => {
                let mut updated = existing.clone();
                if !updated.record.apply_manual(entry)? {
                    return Ok(updated);
                }
                updated
            }
            None => {
                if entry.is_empty() {
                    return Err(Error::NoActiveRecord);
                }
                SessionRecord {
                    upload_id: None,
                    record: PropertyData::from_manual(entry)?,
                    warnings: Vec::new(),
                    outcomes: BTreeMap::new(),
                    extracted_at: None,
                }
            }
        };

        state.generation += 1;
        state.pending = None;
        state.current = Some(updated.clone());
        tracing::debug!(session = %self.id, "manual entry applied");
        Ok(updated)
    }

    /// Drop everything this session holds
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.pending = None;
        state.current = None;
        tracing::debug!(session = %self.id, "session cleared");
    }
}
