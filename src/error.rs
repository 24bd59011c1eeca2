// Failure taxonomy
//
// Every failure the pipeline or the store adapter can produce maps to one
// of these variants. They are caught at the boundary of the operation that
// triggered them and rendered as user-facing messages; none should crash
// the interactive session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The AI call did not succeed: network, auth/quota, or a
    /// capability-reported refusal. Scoped to one image.
    #[error("extraction failed: {reason}")]
    ExtractionFailure { reason: String },

    /// The extraction response was not interpretable as the expected
    /// schema. Zero records from that image; no partial salvage.
    #[error("no items found: response was not a structured item list ({reason})")]
    ParseFailure { reason: String },

    /// One candidate failed required-field validation or amount coercion.
    /// The rest of the batch proceeds.
    #[error("record rejected: {reason}")]
    RecordRejected { reason: String },

    /// A persistence/read/update/delete call failed. Not silently retried.
    #[error("store unavailable: {reason} (check credentials and connectivity)")]
    StoreUnavailable { reason: String },

    /// Update/delete referenced an id the store does not have, typically
    /// stale UI state. Callers should refresh their listing.
    #[error("item {id} no longer exists")]
    NotFound { id: i64 },

    /// A required credential or setting was missing at startup.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// An uploaded image could not be accepted (unsupported format,
    /// oversized, unreadable). Scoped to one image.
    #[error("image rejected: {reason}")]
    Intake { reason: String },
}

impl TrackerError {
    pub fn extraction(reason: impl Into<String>) -> Self {
        TrackerError::ExtractionFailure { reason: reason.into() }
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        TrackerError::ParseFailure { reason: reason.into() }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        TrackerError::StoreUnavailable { reason: reason.into() }
    }

    /// True when the operation that produced this error should prompt the
    /// caller to refresh its listing rather than report a hard failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TrackerError::NotFound { .. })
    }
}
