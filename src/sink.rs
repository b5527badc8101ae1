//! Output sinks for processed audio.
//!
//! The last stage of every pipeline is an [`OutputSink`]: whatever should
//! receive the equalized, limited audio. In deployments where the host
//! plays the stream itself the [`NullSink`] discards the blocks; a
//! [`ChannelSink`] hands them to an in-process consumer (playback engine,
//! recorder, test harness).

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::ProcessedChunk;

/// Errors from an [`OutputSink`] implementation.
///
/// Sink errors are recoverable: the pipeline logs them and keeps running,
/// since a stalled consumer must never stop the audio flow.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The receiving channel was closed.
    #[error("channel closed")]
    ChannelClosed,

    /// Custom error for user-implemented sinks.
    #[error("{0}")]
    Custom(String),
}

impl SinkError {
    /// Creates a custom sink error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// A destination for processed audio blocks.
///
/// # Implementation Notes
///
/// - Methods take `&self` - use interior mutability if needed
/// - `write` runs on the pipeline task; keep it fast or buffer internally
/// - Errors are logged and the pipeline continues
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Receives one processed block.
    async fn write(&self, chunk: &ProcessedChunk) -> Result<(), SinkError>;
}

/// Discards all blocks.
///
/// The default sink when the engine is only used for its side effects
/// (the host plays the processed stream itself).
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl OutputSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    async fn write(&self, _chunk: &ProcessedChunk) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Forwards blocks to a tokio mpsc channel.
///
/// If the channel is full the block is dropped rather than blocking the
/// pipeline; a closed channel surfaces as [`SinkError::ChannelClosed`].
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<ProcessedChunk>,
}

impl ChannelSink {
    /// Creates a sink writing to the given sender.
    pub fn new(tx: mpsc::Sender<ProcessedChunk>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl OutputSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    async fn write(&self, chunk: &ProcessedChunk) -> Result<(), SinkError> {
        match self.tx.try_send(chunk.clone()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::trace!(source = %chunk.source_id, "channel sink full, block dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SinkError::ChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceId;
    use std::time::Duration;

    fn chunk() -> ProcessedChunk {
        ProcessedChunk::new(
            vec![0.1, 0.2],
            Duration::ZERO,
            48000,
            1,
            SourceId::for_tab(1),
        )
    }

    #[tokio::test]
    async fn test_null_sink_accepts_everything() {
        let sink = NullSink;
        assert_eq!(sink.name(), "null");
        sink.write(&chunk()).await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = ChannelSink::new(tx);

        sink.write(&chunk()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.samples.len(), 2);
    }

    #[tokio::test]
    async fn test_channel_sink_drops_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let sink = ChannelSink::new(tx);

        sink.write(&chunk()).await.unwrap();
        // Second write finds the channel full; dropped, not an error.
        sink.write(&chunk()).await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_sink_closed_errors() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ChannelSink::new(tx);

        let result = sink.write(&chunk()).await;
        assert!(matches!(result, Err(SinkError::ChannelClosed)));
    }

    #[test]
    fn test_sink_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<std::sync::Arc<dyn OutputSink>>();
    }
}
