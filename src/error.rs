//! Error types for tab-eq.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`TabEqError`]): abort the call that produced them
//! - **Recoverable events**: runtime issues surfaced via
//!   [`EventCallback`](crate::EventCallback)
//!
//! Teardown never fails observably: releasing an already-released capture
//! handle or tearing down an already-torn-down pipeline is a no-op.

use crate::SourceId;

/// Fatal errors returned from pipeline construction and control calls.
///
/// Activation failures leave the registry unchanged: either a pipeline is
/// fully built and registered, or nothing is.
#[derive(Debug, thiserror::Error)]
pub enum TabEqError {
    /// A band layout with zero bands was passed to filter-bank construction.
    #[error("band layout is empty")]
    InvalidLayout,

    /// The host denied or failed to provide a capturable stream.
    ///
    /// Not retried automatically; the caller decides whether to retry.
    #[error("capture unavailable for {source_id}: {reason}")]
    CaptureUnavailable {
        /// Source the capture was requested for.
        source_id: SourceId,
        /// Host-level reason (permission revoked, source gone, timeout).
        reason: String,
    },

    /// An operation was requested against a torn-down pipeline.
    ///
    /// Read paths on the control surface map this to an empty result
    /// instead of propagating it.
    #[error("no active pipeline for {source_id}")]
    NotActive {
        /// Source with no active pipeline.
        source_id: SourceId,
    },

    /// A deactivation raced an in-flight activation for the same source
    /// and won; the acquired stream was released and nothing registered.
    #[error("activation for {source_id} cancelled by deactivation")]
    ActivationCancelled {
        /// Source whose activation was cancelled.
        source_id: SourceId,
    },

    /// No capture host was configured before building the engine.
    #[error("no capture host configured - provide one with capture_host()")]
    NoCaptureHost,

    /// An error from the underlying audio backend (CPAL).
    #[error("audio backend error: {0}")]
    Backend(String),
}

impl TabEqError {
    /// Creates a capture-unavailable error for the given source.
    pub fn capture_unavailable(source_id: SourceId, reason: impl Into<String>) -> Self {
        Self::CaptureUnavailable {
            source_id,
            reason: reason.into(),
        }
    }

    /// Creates a not-active error for the given source.
    pub fn not_active(source_id: SourceId) -> Self {
        Self::NotActive { source_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_unavailable_display() {
        let err = TabEqError::capture_unavailable(SourceId::for_tab(4), "permission revoked");
        assert_eq!(
            err.to_string(),
            "capture unavailable for tab:4: permission revoked"
        );
    }

    #[test]
    fn test_invalid_layout_display() {
        assert_eq!(TabEqError::InvalidLayout.to_string(), "band layout is empty");
    }

    #[test]
    fn test_not_active_display() {
        let err = TabEqError::not_active(SourceId::new("tab:1"));
        assert!(err.to_string().contains("tab:1"));
    }
}
