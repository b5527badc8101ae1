//! Host-environment capture interface.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ringbuf::HeapCons;

use crate::{SourceId, TabEqError};

/// A capture capability minted by the host for one source.
///
/// Tokens are single-use: [`CaptureHost::open_stream`] consumes one. The
/// capability string is host-defined and opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamToken {
    source_id: SourceId,
    capability: String,
}

impl StreamToken {
    /// Creates a token binding a capability string to a source.
    pub fn new(source_id: SourceId, capability: impl Into<String>) -> Self {
        Self {
            source_id,
            capability: capability.into(),
        }
    }

    /// Source the token was minted for.
    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    /// Host-defined capability string.
    pub fn capability(&self) -> &str {
        &self.capability
    }
}

/// Keepalive for a running capture stream.
///
/// Capture continues while this exists; [`stop`](Self::stop) (or drop)
/// ends it. Device-backed streams park their audio backend on a dedicated
/// thread so the keepalive itself stays `Send`.
pub struct CaptureStream {
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
    stopped: Arc<AtomicBool>,
}

impl CaptureStream {
    /// Keepalive for a stream owned by a background thread.
    ///
    /// The thread is expected to stop its stream and exit when it receives
    /// (or fails to receive) on the paired channel.
    pub fn from_thread(
        stop_tx: std::sync::mpsc::Sender<()>,
        thread: std::thread::JoinHandle<()>,
        stopped: Arc<AtomicBool>,
    ) -> Self {
        Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            stopped,
        }
    }

    /// Keepalive with no backing thread (mock streams).
    pub fn idle(stopped: Arc<AtomicBool>) -> Self {
        Self {
            stop_tx: None,
            thread: None,
            stopped,
        }
    }

    /// Stops the underlying stream. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("capture thread panicked during stop");
            }
        }
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once the stream has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStream")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// A live audio stream opened from a [`StreamToken`].
///
/// Samples arrive through a lock-free ring buffer filled by the host's
/// realtime capture thread; the keepalive keeps that thread running.
pub struct MediaStream {
    pub(crate) keepalive: CaptureStream,
    pub(crate) consumer: HeapCons<f32>,
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
}

impl MediaStream {
    /// Assembles a stream from its parts. Host implementations call this.
    pub fn new(
        keepalive: CaptureStream,
        consumer: HeapCons<f32>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        Self {
            keepalive,
            consumer,
            sample_rate,
            channels,
        }
    }

    /// Sample rate of the captured audio in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the captured audio.
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

/// The host environment's capture primitives.
///
/// Implementations map these onto whatever the platform provides — a tab
/// capture API, a loopback device, a test fixture. Any host-level denial
/// (source gone, permission revoked) surfaces as
/// [`TabEqError::CaptureUnavailable`].
#[async_trait]
pub trait CaptureHost: Send + Sync {
    /// Obtains a capture capability for the given source.
    async fn request_capture(&self, source_id: &SourceId) -> Result<StreamToken, TabEqError>;

    /// Turns a capability into a live audio stream.
    async fn open_stream(&self, token: StreamToken) -> Result<MediaStream, TabEqError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_accessors() {
        let token = StreamToken::new(SourceId::for_tab(5), "cap-abc");
        assert_eq!(token.source_id().as_str(), "tab:5");
        assert_eq!(token.capability(), "cap-abc");
    }

    #[test]
    fn test_idle_stream_stop_is_idempotent() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut stream = CaptureStream::idle(flag.clone());
        assert!(!stream.is_stopped());

        stream.stop();
        stream.stop();

        assert!(stream.is_stopped());
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_thread_stream_joins_on_stop() {
        let (tx, rx) = std::sync::mpsc::channel();
        let thread = std::thread::spawn(move || {
            let _ = rx.recv();
        });
        let mut stream = CaptureStream::from_thread(tx, thread, Arc::new(AtomicBool::new(false)));

        stream.stop();
        assert!(stream.is_stopped());
    }

    #[test]
    fn test_capture_host_is_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn CaptureHost>();
    }
}
