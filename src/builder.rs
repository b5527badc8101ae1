//! Builder pattern for assembling the engine.

use std::sync::Arc;

use crate::capture::{CaptureBroker, CaptureHost};
use crate::event::{event_callback, EventCallback, PipelineEvent};
use crate::registry::PipelineRegistry;
use crate::sink::{NullSink, OutputSink};
use crate::surface::{ControlSurface, LicenseProvider, StaticLicense};
use crate::{EngineConfig, TabEqError};

/// Main entry point for tab-eq.
///
/// Use [`TabEq::builder()`] to wire a capture host, license provider and
/// output sink into a [`ControlSurface`].
pub struct TabEq;

impl TabEq {
    /// Creates a new builder.
    pub fn builder() -> TabEqBuilder {
        TabEqBuilder::new()
    }
}

/// Builder for configuring the engine.
///
/// The capture host is the only mandatory collaborator; the license
/// defaults to free tier and the output sink to [`NullSink`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tab_eq::capture::MockCaptureHost;
/// use tab_eq::{StaticLicense, TabEq};
///
/// let surface = TabEq::builder()
///     .capture_host(Arc::new(MockCaptureHost::default()))
///     .license(Arc::new(StaticLicense::premium()))
///     .on_event(|event| tracing::info!(?event, "pipeline event"))
///     .build()
///     .expect("engine builds");
/// # drop(surface);
/// ```
#[must_use]
pub struct TabEqBuilder {
    host: Option<Arc<dyn CaptureHost>>,
    license: Option<Arc<dyn LicenseProvider>>,
    sink: Option<Arc<dyn OutputSink>>,
    config: EngineConfig,
    event_callback: Option<EventCallback>,
}

impl Default for TabEqBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TabEqBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            host: None,
            license: None,
            sink: None,
            config: EngineConfig::default(),
            event_callback: None,
        }
    }

    /// Sets the capture host (mandatory).
    pub fn capture_host(mut self, host: Arc<dyn CaptureHost>) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the license provider. Default: free tier for every source.
    pub fn license(mut self, license: Arc<dyn LicenseProvider>) -> Self {
        self.license = Some(license);
        self
    }

    /// Sets the output sink every pipeline writes to. Default: [`NullSink`].
    pub fn output_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Sets custom engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a callback receiving lifecycle events.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(PipelineEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Assembles the control surface.
    ///
    /// # Errors
    ///
    /// Returns [`TabEqError::NoCaptureHost`] if no host was configured.
    pub fn build(self) -> Result<ControlSurface, TabEqError> {
        let host = self.host.ok_or(TabEqError::NoCaptureHost)?;
        let license = self
            .license
            .unwrap_or_else(|| Arc::new(StaticLicense::free()) as Arc<dyn LicenseProvider>);
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(NullSink) as Arc<dyn OutputSink>);

        let broker = CaptureBroker::new(host, self.config.acquire_timeout);
        let registry = Arc::new(PipelineRegistry::new(
            broker,
            self.config,
            sink,
            self.event_callback,
        ));

        Ok(ControlSurface::new(registry, license))
    }
}
