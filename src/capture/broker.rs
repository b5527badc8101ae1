//! Capture broker and handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ringbuf::HeapCons;

use crate::capture::{CaptureHost, CaptureStream, MediaStream};
use crate::{SourceId, TabEqError};

/// One exclusively-owned capture stream, tied to one source.
///
/// Exactly one pipeline owns a handle at any time. [`release`](Self::release)
/// stops the underlying stream; it must happen before the owning pipeline is
/// discarded, and calling it twice is safe because teardown paths can race
/// with source-loss notifications.
pub struct CaptureHandle {
    source_id: SourceId,
    sample_rate: u32,
    channels: u16,
    keepalive: Mutex<Option<CaptureStream>>,
    consumer: Mutex<Option<HeapCons<f32>>>,
    released: AtomicBool,
}

impl CaptureHandle {
    pub(crate) fn new(source_id: SourceId, stream: MediaStream) -> Self {
        Self {
            source_id,
            sample_rate: stream.sample_rate,
            channels: stream.channels,
            keepalive: Mutex::new(Some(stream.keepalive)),
            consumer: Mutex::new(Some(stream.consumer)),
            released: AtomicBool::new(false),
        }
    }

    /// Source this capture belongs to.
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Sample rate of the captured audio in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the captured audio.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Takes the sample consumer. Only the owning pipeline task does this;
    /// subsequent calls return `None`.
    pub(crate) fn take_consumer(&self) -> Option<HeapCons<f32>> {
        self.consumer.lock().take()
    }

    /// Stops the underlying stream.
    ///
    /// The second and later calls are no-ops.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            tracing::debug!(source = %self.source_id, "capture handle already released");
            return;
        }
        if let Some(mut stream) = self.keepalive.lock().take() {
            stream.stop();
        }
        tracing::debug!(source = %self.source_id, "capture released");
    }

    /// Returns `true` once the handle has been released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        // Backstop for abnormal exit paths; normal teardown released already.
        self.release();
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("source_id", &self.source_id)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Acquires and releases capture streams on behalf of the registry.
///
/// The broker is a pure resource factory/sink: it composes the host's two
/// primitives under a bounded wait and holds no pipeline references.
pub struct CaptureBroker {
    host: Arc<dyn CaptureHost>,
    acquire_timeout: Duration,
}

impl CaptureBroker {
    /// Creates a broker over the given host.
    pub fn new(host: Arc<dyn CaptureHost>, acquire_timeout: Duration) -> Self {
        Self {
            host,
            acquire_timeout,
        }
    }

    /// Obtains an exclusively-owned capture stream for a source.
    ///
    /// # Errors
    ///
    /// Returns [`TabEqError::CaptureUnavailable`] on host denial or when
    /// acquisition exceeds the bounded wait. Failures are not retried.
    pub async fn acquire(&self, source_id: &SourceId) -> Result<CaptureHandle, TabEqError> {
        let acquire = async {
            let token = self.host.request_capture(source_id).await?;
            self.host.open_stream(token).await
        };

        match tokio::time::timeout(self.acquire_timeout, acquire).await {
            Ok(Ok(stream)) => {
                tracing::debug!(
                    source = %source_id,
                    sample_rate = stream.sample_rate,
                    channels = stream.channels,
                    "capture acquired"
                );
                Ok(CaptureHandle::new(source_id.clone(), stream))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => Err(TabEqError::capture_unavailable(
                source_id.clone(),
                format!("acquisition timed out after {:?}", self.acquire_timeout),
            )),
        }
    }

    /// Stops a handle's underlying stream.
    ///
    /// Equivalent to [`CaptureHandle::release`]; provided so callers that
    /// treat the broker as the stream lifecycle owner have a matching sink.
    pub fn release(&self, handle: &CaptureHandle) {
        handle.release();
    }
}

impl std::fmt::Debug for CaptureBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureBroker")
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::MockCaptureHost;

    fn broker(host: &Arc<MockCaptureHost>) -> CaptureBroker {
        CaptureBroker::new(host.clone() as Arc<dyn CaptureHost>, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_acquire_returns_handle_with_format() {
        let host = Arc::new(MockCaptureHost::new(48000, 1));
        let handle = broker(&host).acquire(&SourceId::for_tab(1)).await.unwrap();

        assert_eq!(handle.source_id().as_str(), "tab:1");
        assert_eq!(handle.sample_rate(), 48000);
        assert_eq!(handle.channels(), 1);
        assert!(!handle.is_released());
    }

    #[tokio::test]
    async fn test_acquire_denied_source_fails() {
        let host = Arc::new(MockCaptureHost::new(48000, 1));
        host.deny(SourceId::for_tab(2));

        let result = broker(&host).acquire(&SourceId::for_tab(2)).await;
        assert!(matches!(
            result,
            Err(TabEqError::CaptureUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_double_release_is_safe() {
        let host = Arc::new(MockCaptureHost::new(48000, 1));
        let b = broker(&host);
        let handle = b.acquire(&SourceId::for_tab(3)).await.unwrap();

        handle.release();
        b.release(&handle);

        assert!(handle.is_released());
        assert!(host.stream_stopped(&SourceId::for_tab(3)));
    }

    #[tokio::test]
    async fn test_consumer_taken_once() {
        let host = Arc::new(MockCaptureHost::new(48000, 1));
        let handle = broker(&host).acquire(&SourceId::for_tab(4)).await.unwrap();

        assert!(handle.take_consumer().is_some());
        assert!(handle.take_consumer().is_none());
    }

    #[tokio::test]
    async fn test_drop_releases_stream() {
        let host = Arc::new(MockCaptureHost::new(48000, 1));
        let id = SourceId::for_tab(5);
        {
            let _handle = broker(&host).acquire(&id).await.unwrap();
        }
        assert!(host.stream_stopped(&id));
    }
}
