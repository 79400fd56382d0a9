//! Session-scoped persistence for the last result and the last document.
//!
//! Results live in the session-lifetime store. Documents live in the durable
//! store so large files survive reloads, but a sentinel in the session store
//! gates every access: when it is missing the tab is new, and anything left in
//! the durable store from an earlier session is purged before it can be read.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::store::{KeyValueStore, StorageError, WebStorage};
use crate::types::{CachedDocument, CachedResult};

pub const SENTINEL_KEY: &str = "w2-refund:session-started";
pub const RESULT_KEY: &str = "w2-refund:result";
pub const DOCUMENT_KEY: &str = "w2-refund:document";
pub const PURGE_PENDING_KEY: &str = "w2-refund:purge-pending";

pub const DEFAULT_DOCUMENT_NAME: &str = "w2-upload";
pub const DEFAULT_DOCUMENT_TYPE: &str = "image/jpeg";

/// Durable representation of a `CachedDocument`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentEnvelope {
    data: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    last_modified: Option<f64>,
}

pub struct SessionCache<S, D> {
    session: S,
    durable: D,
}

impl SessionCache<WebStorage, WebStorage> {
    /// Cache over the browser's `sessionStorage` and `localStorage`.
    pub fn browser() -> Self {
        Self::new(WebStorage::session(), WebStorage::local())
    }
}

impl<S: KeyValueStore, D: KeyValueStore> SessionCache<S, D> {
    pub fn new(session: S, durable: D) -> Self {
        Self { session, durable }
    }

    pub fn save_result(&self, result: &CachedResult) {
        let outcome = self.reset_if_new_session().and_then(|_| {
            let json = serde_json::to_string(result)
                .map_err(|e| StorageError::Malformed(e.to_string()))?;
            self.session.set(RESULT_KEY, &json)
        });
        if let Err(e) = outcome {
            debug!("Failed to save result: {}", e);
        }
    }

    pub fn load_result(&self) -> Option<CachedResult> {
        let outcome = self.reset_if_new_session().and_then(|_| {
            // Earlier builds kept results in the durable store.
            if let Err(e) = self.durable.remove(RESULT_KEY) {
                debug!("Failed to remove legacy result: {}", e);
            }
            let Some(json) = self.session.get(RESULT_KEY)? else {
                return Ok(None);
            };
            serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StorageError::Malformed(e.to_string()))
        });
        match outcome {
            Ok(result) => result,
            Err(e) => {
                debug!("Failed to load result: {}", e);
                None
            }
        }
    }

    pub fn clear_result(&self) {
        if let Err(e) = self.session.remove(RESULT_KEY) {
            debug!("Failed to clear result: {}", e);
        }
    }

    pub fn save_document(&self, document: &CachedDocument) {
        let outcome = self.durable_ready().and_then(|ready| {
            if !ready {
                debug!("Skipping document save until the durable store is purged");
                return Ok(());
            }
            let envelope = DocumentEnvelope {
                data: STANDARD.encode(&document.bytes),
                file_name: Some(document.file_name.clone()),
                mime_type: Some(document.mime_type.clone()),
                last_modified: Some(document.last_modified),
            };
            let json = serde_json::to_string(&envelope)
                .map_err(|e| StorageError::Malformed(e.to_string()))?;
            self.durable.set(DOCUMENT_KEY, &json)
        });
        if let Err(e) = outcome {
            debug!("Failed to save document: {}", e);
        }
    }

    pub fn load_document(&self) -> Option<CachedDocument> {
        let outcome = self.durable_ready().and_then(|ready| {
            if !ready {
                return Ok(None);
            }
            let Some(json) = self.durable.get(DOCUMENT_KEY)? else {
                return Ok(None);
            };
            decode_document(&json).map(Some)
        });
        match outcome {
            Ok(document) => document,
            Err(e) => {
                debug!("Failed to load document: {}", e);
                None
            }
        }
    }

    pub fn clear_document(&self) {
        if let Err(e) = self.durable.remove(DOCUMENT_KEY) {
            debug!("Failed to clear document: {}", e);
        }
    }

    /// Purge both records the first time this tab touches the cache.
    ///
    /// Only session-store failures are returned. A durable store that cannot
    /// be purged leaves a pending marker; the purge is retried on each call and
    /// the durable slot stays unused until it succeeds.
    fn reset_if_new_session(&self) -> Result<(), StorageError> {
        if self.session.get(SENTINEL_KEY)?.is_none() {
            self.session.set(SENTINEL_KEY, &Utc::now().to_rfc3339())?;
            debug!("New session detected, purging cached document and result");
            self.session.remove(RESULT_KEY)?;
            self.session.set(PURGE_PENDING_KEY, "1")?;
        }

        if self.session.get(PURGE_PENDING_KEY)?.is_some() {
            match self.purge_durable() {
                Ok(()) => self.session.remove(PURGE_PENDING_KEY)?,
                Err(e) => debug!("Deferring durable purge: {}", e),
            }
        }
        Ok(())
    }

    fn purge_durable(&self) -> Result<(), StorageError> {
        self.durable.remove(DOCUMENT_KEY)?;
        self.durable.remove(RESULT_KEY)
    }

    /// Run the guard and report whether the durable slot may be used.
    fn durable_ready(&self) -> Result<bool, StorageError> {
        self.reset_if_new_session()?;
        Ok(self.session.get(PURGE_PENDING_KEY)?.is_none())
    }
}

fn decode_document(json: &str) -> Result<CachedDocument, StorageError> {
    let envelope: DocumentEnvelope =
        serde_json::from_str(json).map_err(|e| StorageError::Malformed(e.to_string()))?;
    let bytes = STANDARD
        .decode(envelope.data.as_bytes())
        .map_err(|e| StorageError::Malformed(e.to_string()))?;

    Ok(CachedDocument {
        bytes,
        file_name: non_empty(envelope.file_name)
            .unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_string()),
        mime_type: non_empty(envelope.mime_type)
            .unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string()),
        last_modified: envelope.last_modified.unwrap_or(0.0),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::types::{ConfidenceTag, RefundEstimate};

    fn sample_result() -> CachedResult {
        CachedResult::new(
            RefundEstimate {
                box2_federal: 1000.0,
                box17_state: 500.0,
                estimated_refund: 1360.0,
                ocr_confidence: ConfidenceTag::AiExtracted,
            },
            Some("w2.png".to_string()),
        )
    }

    fn sample_document() -> CachedDocument {
        CachedDocument {
            bytes: vec![0x89, b'P', b'N', b'G', 0, 1, 2],
            file_name: "w2.png".to_string(),
            mime_type: "image/png".to_string(),
            last_modified: 1_700_000_000_000.0,
        }
    }

    fn stores() -> (MemoryStore, MemoryStore, SessionCache<MemoryStore, MemoryStore>) {
        let session = MemoryStore::new();
        let durable = MemoryStore::new();
        let cache = SessionCache::new(session.clone(), durable.clone());
        (session, durable, cache)
    }

    #[test]
    fn test_result_round_trip() {
        let (_, durable, cache) = stores();
        let result = sample_result();
        cache.save_result(&result);
        assert_eq!(cache.load_result(), Some(result));
        assert!(!durable.contains(RESULT_KEY));
    }

    #[test]
    fn test_document_round_trip() {
        let (_, durable, cache) = stores();
        let document = sample_document();
        cache.save_document(&document);
        assert!(durable.contains(DOCUMENT_KEY));
        assert_eq!(cache.load_document(), Some(document));
    }

    #[test]
    fn test_clear() {
        let (_, _, cache) = stores();
        cache.save_result(&sample_result());
        cache.save_document(&sample_document());
        cache.clear_result();
        cache.clear_document();
        assert_eq!(cache.load_result(), None);
        assert_eq!(cache.load_document(), None);
    }

    #[test]
    fn test_reset_is_idempotent_within_session() {
        let (session, _, cache) = stores();
        cache.reset_if_new_session().unwrap();
        let sentinel = session.get(SENTINEL_KEY).unwrap();
        assert!(sentinel.is_some());

        cache.save_document(&sample_document());
        cache.reset_if_new_session().unwrap();
        cache.reset_if_new_session().unwrap();
        assert_eq!(session.get(SENTINEL_KEY).unwrap(), sentinel);
        assert!(cache.load_document().is_some());
    }

    #[test]
    fn test_new_session_purges_leftovers() {
        let (_, durable, cache) = stores();
        cache.save_document(&sample_document());
        cache.save_result(&sample_result());

        // A new tab gets a fresh session store over the same durable store.
        let session = MemoryStore::new();
        session.set(RESULT_KEY, "{\"stale\":true}").unwrap();
        let next = SessionCache::new(session.clone(), durable.clone());

        assert_eq!(next.load_document(), None);
        assert!(!durable.contains(DOCUMENT_KEY));
        assert_eq!(next.load_result(), None);
        assert!(!session.contains(RESULT_KEY));
    }

    #[test]
    fn test_legacy_durable_result_is_discarded() {
        let (session, durable, cache) = stores();
        cache.reset_if_new_session().unwrap();
        let json = serde_json::to_string(&sample_result()).unwrap();
        durable.set(RESULT_KEY, &json).unwrap();

        assert_eq!(cache.load_result(), None);
        assert!(!durable.contains(RESULT_KEY));
        assert!(!session.contains(RESULT_KEY));
    }

    #[test]
    fn test_document_defaults_for_missing_metadata() {
        let (_, durable, cache) = stores();
        cache.reset_if_new_session().unwrap();
        durable
            .set(DOCUMENT_KEY, &format!("{{\"data\":\"{}\"}}", STANDARD.encode(b"abc")))
            .unwrap();

        let document = cache.load_document().unwrap();
        assert_eq!(document.bytes, b"abc");
        assert_eq!(document.file_name, DEFAULT_DOCUMENT_NAME);
        assert_eq!(document.mime_type, DEFAULT_DOCUMENT_TYPE);
    }

    #[test]
    fn test_corrupt_entries_load_as_none() {
        let (session, durable, cache) = stores();
        cache.reset_if_new_session().unwrap();
        session.set(RESULT_KEY, "not json").unwrap();
        durable.set(DOCUMENT_KEY, "{\"data\":\"%%%\"}").unwrap();

        assert_eq!(cache.load_result(), None);
        assert_eq!(cache.load_document(), None);
    }

    #[test]
    fn test_result_survives_unavailable_durable_store() {
        let (session, durable, cache) = stores();
        durable.set_failing(true);

        let result = sample_result();
        cache.save_result(&result);
        assert!(session.contains(RESULT_KEY));
        assert_eq!(cache.load_result(), Some(result));
    }

    #[test]
    fn test_durable_purge_retried_after_failure() {
        let (_, durable, cache) = stores();
        cache.save_document(&sample_document());

        let session = MemoryStore::new();
        let next = SessionCache::new(session.clone(), durable.clone());
        durable.set_failing(true);
        assert_eq!(next.load_document(), None);
        next.save_document(&sample_document());
        assert!(session.contains(PURGE_PENDING_KEY));

        durable.set_failing(false);
        assert!(durable.contains(DOCUMENT_KEY));
        assert_eq!(next.load_document(), None);
        assert!(!durable.contains(DOCUMENT_KEY));
        assert!(!session.contains(PURGE_PENDING_KEY));

        next.save_document(&sample_document());
        assert_eq!(next.load_document(), Some(sample_document()));
    }

    #[test]
    fn test_storage_failures_are_swallowed() {
        let (session, durable, cache) = stores();
        session.set_failing(true);
        durable.set_failing(true);

        cache.save_result(&sample_result());
        cache.save_document(&sample_document());
        cache.clear_result();
        cache.clear_document();
        assert_eq!(cache.load_result(), None);
        assert_eq!(cache.load_document(), None);
    }
}
