//! Estimation flow state machine.
//!
//! The flow owns the session cache and decides which transitions are legal.
//! Pages drive it from event handlers and mirror `state()` into a signal.

use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{KeyValueStore, SessionCache};
use crate::types::{CachedDocument, CachedResult, RefundEstimate};

/// File types the backend can read.
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "application/pdf"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FlowError {
    #[error("Unsupported file type \"{0}\". Please choose a JPEG, PNG, or PDF.")]
    UnsupportedFileType(String),
    #[error("The selected file is empty.")]
    EmptyDocument,
    #[error("{0} is required.")]
    MissingAmount(&'static str),
    #[error("{0} must be a non-negative number.")]
    InvalidAmount(&'static str),
}

/// Identity of one submit request. Responses carrying an older ticket are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Issues tickets and remembers which one, if any, is still awaited.
#[derive(Debug, Default)]
pub struct RequestTickets {
    last: u64,
    in_flight: Option<Ticket>,
}

impl RequestTickets {
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a request, superseding any earlier one.
    pub fn issue(&mut self) -> Ticket {
        self.last += 1;
        let ticket = Ticket(self.last);
        self.in_flight = Some(ticket);
        ticket
    }

    /// Forget the awaited request so its response is dropped.
    pub fn invalidate(&mut self) {
        self.in_flight = None;
    }

    /// Accept a response. Returns `false` when `ticket` is no longer awaited.
    pub fn finish(&mut self, ticket: Ticket) -> bool {
        if self.in_flight != Some(ticket) {
            debug!("Ignoring stale response for {:?}", ticket);
            return false;
        }
        self.in_flight = None;
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    /// Waiting for a document
    Idle,
    /// Document picked, ready to submit
    DocumentSelected(CachedDocument),
    /// Upload in progress
    Submitting(CachedDocument),
    /// Estimate available
    ResultReady(CachedResult),
    /// Upload failed; the document is kept for a retry
    Failed {
        document: CachedDocument,
        message: String,
    },
}

impl FlowState {
    pub fn document(&self) -> Option<&CachedDocument> {
        match self {
            FlowState::DocumentSelected(doc)
            | FlowState::Submitting(doc)
            | FlowState::Failed { document: doc, .. } => Some(doc),
            FlowState::Idle | FlowState::ResultReady(_) => None,
        }
    }
}

pub struct EstimationFlow<S, D> {
    cache: SessionCache<S, D>,
    state: FlowState,
    tickets: RequestTickets,
}

impl<S: KeyValueStore, D: KeyValueStore> EstimationFlow<S, D> {
    pub fn new(cache: SessionCache<S, D>) -> Self {
        Self {
            cache,
            state: FlowState::Idle,
            tickets: RequestTickets::default(),
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    /// Restore whatever the cache still holds for this session.
    pub fn restore(&mut self) -> &FlowState {
        self.state = if let Some(result) = self.cache.load_result() {
            debug!("Restored cached result");
            FlowState::ResultReady(result)
        } else if let Some(document) = self.cache.load_document() {
            debug!("Restored cached document '{}'", document.file_name);
            FlowState::DocumentSelected(document)
        } else {
            FlowState::Idle
        };
        &self.state
    }

    /// Accept a newly picked file. An unsupported file clears the selection;
    /// the cache is only touched when an earlier document has to be forgotten.
    pub fn select_document(&mut self, document: CachedDocument) -> Result<(), FlowError> {
        self.tickets.invalidate();

        if let Err(e) = validate_document(&document) {
            if self.state.document().is_some() {
                self.cache.clear_document();
            }
            self.state = FlowState::Idle;
            return Err(e);
        }

        info!(
            "Selected '{}' ({}, {} bytes)",
            document.file_name,
            document.mime_type,
            document.bytes.len()
        );
        self.cache.clear_result();
        self.cache.save_document(&document);
        self.state = FlowState::DocumentSelected(document);
        Ok(())
    }

    /// Move to `Submitting` and hand out the ticket and document to upload.
    /// Returns `None` when nothing is selected or a request is already running.
    pub fn begin_submit(&mut self) -> Option<(Ticket, CachedDocument)> {
        if self.tickets.is_busy() {
            return None;
        }
        let document = match &self.state {
            FlowState::DocumentSelected(doc) | FlowState::Failed { document: doc, .. } => {
                doc.clone()
            }
            _ => return None,
        };

        let ticket = self.tickets.issue();
        self.state = FlowState::Submitting(document.clone());
        Some((ticket, document))
    }

    /// Apply the outcome of a submit. Returns `false` when the ticket is stale
    /// and the outcome was dropped.
    pub fn complete(&mut self, ticket: Ticket, outcome: Result<RefundEstimate, String>) -> bool {
        if !self.tickets.finish(ticket) {
            return false;
        }

        let FlowState::Submitting(document) = std::mem::replace(&mut self.state, FlowState::Idle)
        else {
            return false;
        };

        self.state = match outcome {
            Ok(estimate) => {
                let result = CachedResult::new(estimate, Some(document.file_name.clone()));
                self.cache.save_result(&result);
                FlowState::ResultReady(result)
            }
            Err(message) => FlowState::Failed { document, message },
        };
        true
    }

    /// Back to `Idle` from anywhere, forgetting the cached document and result.
    pub fn reset(&mut self) {
        self.tickets.invalidate();
        self.cache.clear_result();
        self.cache.clear_document();
        self.state = FlowState::Idle;
    }
}

pub fn is_accepted_mime_type(mime_type: &str) -> bool {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    ACCEPTED_MIME_TYPES.contains(&mime_type.as_str())
}

pub fn validate_document(document: &CachedDocument) -> Result<(), FlowError> {
    if !is_accepted_mime_type(&document.mime_type) {
        return Err(FlowError::UnsupportedFileType(document.mime_type.clone()));
    }
    if document.bytes.is_empty() {
        return Err(FlowError::EmptyDocument);
    }
    Ok(())
}

/// Parse one manually entered withholding amount.
pub fn parse_amount(input: &str, label: &'static str) -> Result<f64, FlowError> {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return Err(FlowError::MissingAmount(label));
    }

    let value: f64 = cleaned
        .parse()
        .map_err(|_| FlowError::InvalidAmount(label))?;
    if !value.is_finite() || value < 0.0 {
        return Err(FlowError::InvalidAmount(label));
    }
    Ok(value)
}

/// Parse both manual-entry fields as `(federal, state)`.
pub fn parse_manual_input(federal: &str, state: &str) -> Result<(f64, f64), FlowError> {
    Ok((
        parse_amount(federal, "Federal withholding (Box 2)")?,
        parse_amount(state, "State withholding (Box 17)")?,
    ))
}
