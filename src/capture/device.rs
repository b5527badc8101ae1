//! CPAL-backed capture host.
//!
//! Binds source ids to audio input devices. The CPAL stream itself is not
//! `Send`, so each opened stream lives on a dedicated thread that parks
//! until the keepalive asks it to stop; the audio callback pushes samples
//! into a lock-free ring buffer and never blocks.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig as CpalStreamConfig};
use parking_lot::Mutex;
use ringbuf::traits::{Producer, Split};
use ringbuf::{HeapCons, HeapRb};

use crate::capture::{CaptureHost, CaptureStream, MediaStream, StreamToken};
use crate::{SourceId, TabEqError};

/// Ring capacity in seconds of audio; absorbs scheduling hiccups in the
/// pipeline task without dropping capture.
const RING_CAPACITY_SECS: usize = 2;

/// How long to wait for the capture thread to report stream startup.
const STREAM_START_TIMEOUT: Duration = Duration::from_secs(5);

/// Scale for i16 capture formats.
const I16_TO_F32: f32 = 1.0 / 32768.0;

/// Capability string meaning "the system default input device".
const DEFAULT_DEVICE_CAPABILITY: &str = "";

/// A [`CaptureHost`] over CPAL input devices.
///
/// Every source id maps to the system default input device unless
/// [`map_source`](Self::map_source) binds it to a named device. One opened
/// stream per source; exclusivity is the caller's (broker's) contract.
#[derive(Debug, Default)]
pub struct DeviceCaptureHost {
    devices: Mutex<HashMap<SourceId, String>>,
}

impl DeviceCaptureHost {
    /// Creates a host where every source captures the default input device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a source id to a specific input device by name.
    pub fn map_source(&self, source_id: SourceId, device_name: impl Into<String>) {
        self.devices.lock().insert(source_id, device_name.into());
    }

    fn resolve_device(name: &str) -> Result<Device, String> {
        let host = cpal::default_host();
        if name == DEFAULT_DEVICE_CAPABILITY {
            return host
                .default_input_device()
                .ok_or_else(|| "no default input device configured".to_string());
        }

        let devices = host.input_devices().map_err(|e| e.to_string())?;
        for device in devices {
            if device.name().map(|n| n == name).unwrap_or(false) {
                return Ok(device);
            }
        }
        Err(format!("device not found: {name}"))
    }

    fn build_stream(
        device: &Device,
        config: &CpalStreamConfig,
        sample_format: SampleFormat,
        mut producer: ringbuf::HeapProd<f32>,
    ) -> Result<Stream, String> {
        let err_fn = |err| {
            tracing::error!("audio stream error: {err}");
        };

        let stream = match sample_format {
            SampleFormat::F32 => device.build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // Non-blocking push; drops samples if the ring is full
                    let _ = producer.push_slice(data);
                },
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        let _ = producer.try_push(f32::from(sample) * I16_TO_F32);
                    }
                },
                err_fn,
                None,
            ),
            format => return Err(format!("unsupported sample format: {format:?}")),
        };

        stream.map_err(|e| e.to_string())
    }

    /// Runs on the dedicated capture thread: opens the device, starts the
    /// stream, reports the consumer back, then parks until stopped.
    fn capture_thread(
        device_name: String,
        ready_tx: std::sync::mpsc::Sender<Result<(HeapCons<f32>, u32, u16), String>>,
        stop_rx: std::sync::mpsc::Receiver<()>,
    ) {
        let result = (|| {
            let device = Self::resolve_device(&device_name)?;
            let supported = device.default_input_config().map_err(|e| e.to_string())?;
            let sample_format = supported.sample_format();
            let config: CpalStreamConfig = supported.into();

            let sample_rate = config.sample_rate.0;
            let channels = config.channels;
            let capacity = sample_rate as usize * channels as usize * RING_CAPACITY_SECS;
            let (producer, consumer) = HeapRb::<f32>::new(capacity).split();

            let stream = Self::build_stream(&device, &config, sample_format, producer)?;
            stream.play().map_err(|e| e.to_string())?;

            Ok((stream, consumer, sample_rate, channels))
        })();

        match result {
            Ok((stream, consumer, sample_rate, channels)) => {
                if ready_tx.send(Ok((consumer, sample_rate, channels))).is_ok() {
                    // Hold the stream until the keepalive signals (or drops).
                    let _ = stop_rx.recv();
                }
                drop(stream);
            }
            Err(reason) => {
                let _ = ready_tx.send(Err(reason));
            }
        }
    }
}

#[async_trait]
impl CaptureHost for DeviceCaptureHost {
    async fn request_capture(&self, source_id: &SourceId) -> Result<StreamToken, TabEqError> {
        let device_name = self
            .devices
            .lock()
            .get(source_id)
            .cloned()
            .unwrap_or_else(|| DEFAULT_DEVICE_CAPABILITY.to_string());

        // Verify capturability up front so denial surfaces here, matching
        // the token-then-stream contract hosts expose.
        Self::resolve_device(&device_name)
            .map_err(|reason| TabEqError::capture_unavailable(source_id.clone(), reason))?;

        Ok(StreamToken::new(source_id.clone(), device_name))
    }

    async fn open_stream(&self, token: StreamToken) -> Result<MediaStream, TabEqError> {
        let source_id = token.source_id().clone();
        let device_name = token.capability().to_string();

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();
        let stopped = Arc::new(AtomicBool::new(false));

        let thread = std::thread::Builder::new()
            .name(format!("tab-eq-capture-{source_id}"))
            .spawn(move || Self::capture_thread(device_name, ready_tx, stop_rx))
            .map_err(|e| TabEqError::Backend(e.to_string()))?;

        let ready = tokio::task::spawn_blocking(move || {
            ready_rx
                .recv_timeout(STREAM_START_TIMEOUT)
                .map_err(|_| "capture thread did not start in time".to_string())
        })
        .await
        .map_err(|e| TabEqError::Backend(e.to_string()))?;

        match ready {
            Ok(Ok((consumer, sample_rate, channels))) => Ok(MediaStream::new(
                CaptureStream::from_thread(stop_tx, thread, stopped),
                consumer,
                sample_rate,
                channels,
            )),
            Ok(Err(reason)) | Err(reason) => {
                // Unblock and reap the thread before surfacing the failure.
                let _ = stop_tx.send(());
                let _ = thread.join();
                Err(TabEqError::capture_unavailable(source_id, reason))
            }
        }
    }
}
