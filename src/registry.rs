//! Pipeline registry: one pipeline per source, bounded by tier capacity.
//!
//! The registry is the single point of mutual exclusion for pipeline
//! lifecycle: every activate / deactivate / evict runs under one async
//! lock, so no two mutations interleave and no source can end up with two
//! pipelines. Read-side routing (gain writes, spectrum polls) goes through
//! a brief sync lock on the map and never waits on activations.
//!
//! Eviction is strictly insertion-ordered: when the free tier's single
//! slot is taken, the source activated longest ago loses its audio to the
//! new request. The consuming UI depends on that exact target, so this is
//! deliberately not LRU.

use std::collections::HashSet;
use std::sync::Arc;

use crate::capture::CaptureBroker;
use crate::event::{DeactivationReason, EventCallback, PipelineEvent};
use crate::pipeline::SignalPipeline;
use crate::sink::OutputSink;
use crate::{BandLayout, EngineConfig, SourceId, TabEqError, Tier};

struct RegistryInner {
    /// Active pipelines in activation (insertion) order.
    entries: Vec<(SourceId, Arc<SignalPipeline>)>,
    /// Sources whose in-flight activation should be abandoned.
    cancel_requested: HashSet<SourceId>,
}

/// Owns the source → pipeline map and enforces the capacity policy.
///
/// Constructed once and injected where needed (a process-wide instance is
/// fine, but it is always an explicit value, never a hidden global).
pub struct PipelineRegistry {
    broker: CaptureBroker,
    config: EngineConfig,
    sink: Arc<dyn OutputSink>,
    events: Option<EventCallback>,
    /// Serializes all lifecycle mutations, including the awaits inside them.
    activation: tokio::sync::Mutex<()>,
    inner: parking_lot::Mutex<RegistryInner>,
}

impl PipelineRegistry {
    /// Creates an empty registry.
    pub fn new(
        broker: CaptureBroker,
        config: EngineConfig,
        sink: Arc<dyn OutputSink>,
        events: Option<EventCallback>,
    ) -> Self {
        Self {
            broker,
            config,
            sink,
            events,
            activation: tokio::sync::Mutex::new(()),
            inner: parking_lot::Mutex::new(RegistryInner {
                entries: Vec::new(),
                cancel_requested: HashSet::new(),
            }),
        }
    }

    /// Activates a pipeline for a source, evicting under the tier's
    /// capacity limit if needed.
    ///
    /// Activating an already-active source returns the existing pipeline
    /// unchanged and acquires nothing. The tier is read here, at
    /// activation time only: upgrading to premium never resurrects
    /// previously evicted sources.
    ///
    /// # Errors
    ///
    /// - [`TabEqError::CaptureUnavailable`]: host denial or timeout; the
    ///   map is left as the eviction step left it, with no partial entry.
    /// - [`TabEqError::ActivationCancelled`]: a deactivation for this
    ///   source arrived while capture was being acquired; the acquired
    ///   stream was released and nothing was registered.
    pub async fn activate_source(
        &self,
        source_id: &SourceId,
        tier: Tier,
    ) -> Result<Arc<SignalPipeline>, TabEqError> {
        let _serialized = self.activation.lock().await;

        {
            let mut inner = self.inner.lock();
            // A fresh activation supersedes any stale cancel request.
            inner.cancel_requested.remove(source_id);
            if let Some((_, pipeline)) = inner.entries.iter().find(|(id, _)| id == source_id) {
                tracing::debug!(source = %source_id, "activation is idempotent, reusing pipeline");
                return Ok(pipeline.clone());
            }
        }

        if let Some(capacity) = tier.capacity() {
            self.evict_to_fit(capacity, source_id).await;
        }

        let capture = match self.broker.acquire(source_id).await {
            Ok(capture) => capture,
            Err(err) => {
                tracing::warn!(source = %source_id, %err, "capture acquisition failed");
                self.emit(PipelineEvent::CaptureFailed {
                    source_id: source_id.clone(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        // A deactivate may have raced us while we waited on the host; if
        // so, the result must not be left running.
        if self.take_cancel(source_id) {
            capture.release();
            tracing::info!(source = %source_id, "activation cancelled by deactivation");
            return Err(TabEqError::ActivationCancelled {
                source_id: source_id.clone(),
            });
        }

        let layout = BandLayout::for_tier(tier);
        let pipeline =
            SignalPipeline::activate(capture, layout, &self.config, self.sink.clone())?;

        self.inner
            .lock()
            .entries
            .push((source_id.clone(), pipeline.clone()));
        self.emit(PipelineEvent::PipelineActivated {
            source_id: source_id.clone(),
        });

        Ok(pipeline)
    }

    /// Tears down and removes the pipeline for a source; no-op if absent.
    pub async fn deactivate_source(&self, source_id: &SourceId) {
        self.deactivate_with_reason(source_id, DeactivationReason::Explicit)
            .await;
    }

    /// Handles a host notification that a source disappeared (tab closed,
    /// stream ended) by forcing deactivation.
    pub async fn notify_source_lost(&self, source_id: &SourceId) {
        tracing::info!(source = %source_id, "source lost, forcing deactivation");
        self.deactivate_with_reason(source_id, DeactivationReason::SourceLost)
            .await;
    }

    /// Returns the active pipeline for a source, if any.
    pub fn get(&self, source_id: &SourceId) -> Option<Arc<SignalPipeline>> {
        self.inner
            .lock()
            .entries
            .iter()
            .find(|(id, _)| id == source_id)
            .map(|(_, pipeline)| pipeline.clone())
    }

    /// Number of active pipelines.
    pub fn active_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Active source ids in activation order.
    pub fn active_sources(&self) -> Vec<SourceId> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Tears down every active pipeline.
    pub async fn shutdown(&self) {
        let _serialized = self.activation.lock().await;
        let entries = std::mem::take(&mut self.inner.lock().entries);
        for (source_id, pipeline) in entries {
            pipeline.teardown().await;
            self.emit(PipelineEvent::PipelineDeactivated {
                source_id,
                reason: DeactivationReason::Explicit,
            });
        }
    }

    async fn deactivate_with_reason(&self, source_id: &SourceId, reason: DeactivationReason) {
        // Flag first, outside the lifecycle lock: if an activation for
        // this source is mid-acquire it must see the cancel when it lands.
        self.inner
            .lock()
            .cancel_requested
            .insert(source_id.clone());

        let _serialized = self.activation.lock().await;

        let removed = {
            let mut inner = self.inner.lock();
            inner.cancel_requested.remove(source_id);
            inner
                .entries
                .iter()
                .position(|(id, _)| id == source_id)
                .map(|index| inner.entries.remove(index))
        };

        if let Some((source_id, pipeline)) = removed {
            pipeline.teardown().await;
            self.emit(PipelineEvent::PipelineDeactivated { source_id, reason });
        }
    }

    /// Evicts oldest-activated pipelines until `capacity` leaves room for
    /// one more. Called with the lifecycle lock held.
    async fn evict_to_fit(&self, capacity: usize, requested: &SourceId) {
        loop {
            let evicted = {
                let mut inner = self.inner.lock();
                if inner.entries.len() >= capacity {
                    Some(inner.entries.remove(0))
                } else {
                    None
                }
            };

            let Some((source_id, pipeline)) = evicted else {
                break;
            };
            tracing::info!(
                evicted = %source_id,
                requested = %requested,
                "at capacity, evicting oldest pipeline"
            );
            pipeline.teardown().await;
            self.emit(PipelineEvent::PipelineDeactivated {
                source_id,
                reason: DeactivationReason::Evicted,
            });
        }
    }

    fn take_cancel(&self, source_id: &SourceId) -> bool {
        self.inner.lock().cancel_requested.remove(source_id)
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(ref callback) = self.events {
            callback(event);
        }
    }
}

impl std::fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineRegistry")
            .field("active", &self.active_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureHost, MockCaptureHost};
    use crate::sink::NullSink;

    fn registry(host: &Arc<MockCaptureHost>) -> PipelineRegistry {
        let config = EngineConfig::default();
        let broker = CaptureBroker::new(
            host.clone() as Arc<dyn CaptureHost>,
            config.acquire_timeout,
        );
        PipelineRegistry::new(broker, config, Arc::new(NullSink), None)
    }

    #[tokio::test]
    async fn test_free_tier_capacity_is_one() {
        let host = Arc::new(MockCaptureHost::default());
        let reg = registry(&host);

        reg.activate_source(&SourceId::for_tab(1), Tier::Free)
            .await
            .unwrap();
        assert_eq!(reg.active_count(), 1);

        reg.activate_source(&SourceId::for_tab(2), Tier::Free)
            .await
            .unwrap();

        assert_eq!(reg.active_count(), 1);
        assert_eq!(reg.active_sources(), vec![SourceId::for_tab(2)]);
        assert!(host.stream_stopped(&SourceId::for_tab(1)));
    }

    #[tokio::test]
    async fn test_premium_tier_is_unbounded() {
        let host = Arc::new(MockCaptureHost::default());
        let reg = registry(&host);

        for tab in 1..=4 {
            reg.activate_source(&SourceId::for_tab(tab), Tier::Premium)
                .await
                .unwrap();
        }

        assert_eq!(reg.active_count(), 4);
    }

    #[tokio::test]
    async fn test_activation_is_idempotent() {
        let host = Arc::new(MockCaptureHost::default());
        let reg = registry(&host);
        let id = SourceId::for_tab(1);

        let first = reg.activate_source(&id, Tier::Free).await.unwrap();
        let second = reg.activate_source(&id, Tier::Free).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(host.acquire_count(&id), 1);
    }

    #[tokio::test]
    async fn test_capture_failure_leaves_registry_unchanged() {
        let host = Arc::new(MockCaptureHost::default());
        let reg = registry(&host);
        host.deny(SourceId::for_tab(9));

        let result = reg.activate_source(&SourceId::for_tab(9), Tier::Free).await;

        assert!(matches!(result, Err(TabEqError::CaptureUnavailable { .. })));
        assert_eq!(reg.active_count(), 0);
        assert!(reg.get(&SourceId::for_tab(9)).is_none());
    }

    #[tokio::test]
    async fn test_deactivate_twice_is_safe() {
        let host = Arc::new(MockCaptureHost::default());
        let reg = registry(&host);
        let id = SourceId::for_tab(1);

        reg.activate_source(&id, Tier::Free).await.unwrap();
        reg.deactivate_source(&id).await;
        reg.deactivate_source(&id).await;

        assert_eq!(reg.active_count(), 0);
    }

    #[tokio::test]
    async fn test_tier_upgrade_does_not_resurrect_evicted() {
        let host = Arc::new(MockCaptureHost::default());
        let reg = registry(&host);

        reg.activate_source(&SourceId::for_tab(1), Tier::Free)
            .await
            .unwrap();
        reg.activate_source(&SourceId::for_tab(2), Tier::Free)
            .await
            .unwrap();
        // tab:1 was evicted; going premium only raises the ceiling.
        reg.activate_source(&SourceId::for_tab(3), Tier::Premium)
            .await
            .unwrap();

        assert_eq!(
            reg.active_sources(),
            vec![SourceId::for_tab(2), SourceId::for_tab(3)]
        );
    }

    #[tokio::test]
    async fn test_eviction_order_is_insertion_order() {
        let host = Arc::new(MockCaptureHost::default());
        let reg = registry(&host);

        reg.activate_source(&SourceId::for_tab(1), Tier::Premium)
            .await
            .unwrap();
        reg.activate_source(&SourceId::for_tab(2), Tier::Premium)
            .await
            .unwrap();

        // Touch tab:1 last; insertion order must still evict it first.
        reg.get(&SourceId::for_tab(1)).unwrap().set_band_gain(0, 3.0);

        reg.activate_source(&SourceId::for_tab(3), Tier::Free)
            .await
            .unwrap();

        // Free capacity 1: both old entries go, oldest first.
        assert_eq!(reg.active_sources(), vec![SourceId::for_tab(3)]);
        assert!(host.stream_stopped(&SourceId::for_tab(1)));
        assert!(host.stream_stopped(&SourceId::for_tab(2)));
    }

    #[tokio::test]
    async fn test_notify_source_lost_deactivates() {
        let host = Arc::new(MockCaptureHost::default());
        let reg = registry(&host);
        let id = SourceId::for_tab(5);

        reg.activate_source(&id, Tier::Free).await.unwrap();
        reg.notify_source_lost(&id).await;

        assert_eq!(reg.active_count(), 0);
        assert!(host.stream_stopped(&id));
    }

    #[tokio::test]
    async fn test_shutdown_tears_down_everything() {
        let host = Arc::new(MockCaptureHost::default());
        let reg = registry(&host);

        for tab in 1..=3 {
            reg.activate_source(&SourceId::for_tab(tab), Tier::Premium)
                .await
                .unwrap();
        }
        reg.shutdown().await;

        assert_eq!(reg.active_count(), 0);
        for tab in 1..=3 {
            assert!(host.stream_stopped(&SourceId::for_tab(tab)));
        }
    }
}
