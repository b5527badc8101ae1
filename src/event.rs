//! Lifecycle events for monitoring pipeline health.
//!
//! Events are non-fatal notifications about pipeline lifecycle. They exist
//! for logging and UI state sync, not error handling; activation errors are
//! returned to the caller directly.

use std::sync::Arc;

use crate::SourceId;

/// Why a pipeline was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationReason {
    /// The caller asked for it.
    Explicit,
    /// The registry evicted it to make room under the capacity limit.
    Evicted,
    /// The host reported the source gone (tab closed, stream ended).
    SourceLost,
}

/// Lifecycle events emitted by the registry.
///
/// # Example
///
/// ```
/// use tab_eq::PipelineEvent;
///
/// fn handle_event(event: PipelineEvent) {
///     match event {
///         PipelineEvent::PipelineActivated { source_id } => {
///             eprintln!("EQ active on {source_id}");
///         }
///         PipelineEvent::PipelineDeactivated { source_id, reason } => {
///             eprintln!("EQ stopped on {source_id}: {reason:?}");
///         }
///         PipelineEvent::CaptureFailed { source_id, reason } => {
///             eprintln!("capture failed for {source_id}: {reason}");
///         }
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A pipeline was built and audio is flowing.
    PipelineActivated {
        /// Source the pipeline was built for.
        source_id: SourceId,
    },

    /// A pipeline was torn down and its capture released.
    PipelineDeactivated {
        /// Source whose pipeline was removed.
        source_id: SourceId,
        /// Why it went away.
        reason: DeactivationReason,
    },

    /// Capture acquisition failed during activation.
    ///
    /// The same failure is also returned synchronously to the activation
    /// caller; the event lets passive observers (UI badges) react too.
    CaptureFailed {
        /// Source the capture was requested for.
        source_id: SourceId,
        /// Host-level reason.
        reason: String,
    },
}

/// Callback type for receiving lifecycle events.
pub type EventCallback = Arc<dyn Fn(PipelineEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use tab_eq::{event_callback, PipelineEvent};
///
/// let callback = event_callback(|event| {
///     tracing::info!(?event, "pipeline event");
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(PipelineEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_debug() {
        let event = PipelineEvent::PipelineActivated {
            source_id: SourceId::for_tab(1),
        };
        let debug = format!("{event:?}");
        assert!(debug.contains("PipelineActivated"));
        assert!(debug.contains("tab:1"));
    }

    #[test]
    fn test_event_callback_helper() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();

        let callback = event_callback(move |_| {
            called_clone.store(true, Ordering::SeqCst);
        });

        callback(PipelineEvent::PipelineDeactivated {
            source_id: SourceId::for_tab(2),
            reason: DeactivationReason::Explicit,
        });
        assert!(called.load(Ordering::SeqCst));
    }
}
