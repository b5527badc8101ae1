//! # tab-eq
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Per-source parametric EQ pipelines with tiered capacity.
//!
//! `tab-eq` manages the full lifecycle of audio processing pipelines for
//! capturable sources (browser tabs, loopback devices): capture
//! acquisition, a cascaded peaking-filter bank, a pollable spectrum tap,
//! master volume and an anti-clipping limiter — one independent chain per
//! source, with a capacity policy per service tier (one shared slot on the
//! free tier, unbounded on premium).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tab_eq::capture::DeviceCaptureHost;
//! use tab_eq::{SourceId, StaticLicense, TabEq};
//!
//! let surface = TabEq::builder()
//!     .capture_host(Arc::new(DeviceCaptureHost::new()))
//!     .license(Arc::new(StaticLicense::premium()))
//!     .on_event(|e| tracing::info!(?e, "pipeline event"))
//!     .build()?;
//!
//! let tab = SourceId::for_tab(42);
//! surface.activate_source(&tab).await?;     // capture starts flowing
//! surface.set_gain(&tab, 2, 4.0);           // +4 dB on the third band
//! surface.set_volume(&tab, 1.25);           // master gain
//! let bins = surface.get_spectrum(&tab);    // poll per animation frame
//! surface.deactivate_source(&tab).await;    // capture released
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Capture Thread**: realtime audio callback that never blocks
//! - **Ring Buffer**: lock-free SPSC queue between capture and processing
//! - **Tokio Runtime**: one task per pipeline drives the stage chain
//!
//! Control calls are fire-and-forget parameter writes that take effect at
//! the next processed block; the registry serializes all lifecycle
//! mutations so no source can ever own two pipelines.

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![allow(clippy::unwrap_used)]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

mod builder;
pub mod capture;
mod chunk;
mod config;
pub mod dsp;
mod error;
mod event;
mod layout;
mod pipeline;
mod registry;
mod settings;
mod sink;
mod source_id;
mod surface;

pub use builder::{TabEq, TabEqBuilder};
pub use chunk::ProcessedChunk;
pub use config::{EngineConfig, LimiterParams, SpectrumConfig};
pub use error::TabEqError;
pub use event::{event_callback, DeactivationReason, EventCallback, PipelineEvent};
pub use layout::{BandLayout, Tier, FREE_BAND_FREQUENCIES, PREMIUM_BAND_FREQUENCIES};
pub use pipeline::SignalPipeline;
pub use registry::PipelineRegistry;
pub use settings::{Preset, SourceSettings};
pub use sink::{ChannelSink, NullSink, OutputSink, SinkError};
pub use source_id::SourceId;
pub use surface::{ControlSurface, LicenseProvider, StaticLicense};
