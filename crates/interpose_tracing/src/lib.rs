//! Tracing subscriber setup for Interpose.
//!
//! The engine reports registrations, intercept installs, and contained
//! callback failures as `tracing` events under the `interpose` target (and
//! the reference runtime under `interpose::runtime`). Nothing is printed
//! until a subscriber is installed; [`TracingConfig::init`] installs one.
//!
//! # Example
//!
//! ```
//! use interpose_tracing::{TracingConfig, TracingFormat};
//! use tracing::Level;
//!
//! TracingConfig::default()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Compact)
//!     .init();
//!
//! tracing::debug!(target: "interpose", "subscriber ready");
//! ```

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry};
use tracing_subscriber::util::SubscriberInitExt;

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable colored output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output for log aggregation.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Subscriber configuration.
///
/// # Configuration Options
///
/// ```
/// use interpose_tracing::{TracingConfig, TracingFormat};
/// use tracing::Level;
///
/// // Development: pretty output, span events, engine at debug
/// let dev = TracingConfig::new()
///     .with_level(Level::DEBUG)
///     .with_format(TracingFormat::Pretty)
///     .with_span_events(true);
///
/// // Production: JSON output, only contained callback failures
/// let prod = TracingConfig::new()
///     .with_format(TracingFormat::Json)
///     .with_env_filter("interpose=warn,interpose::runtime=off");
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Maximum log level, used when no environment filter is set.
    pub level: Level,
    /// Output format.
    pub format: TracingFormat,
    /// Environment filter (e.g., "interpose=debug").
    pub env_filter: Option<String>,
    /// Whether to include span events (enter/exit).
    pub span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a custom environment filter string.
    ///
    /// Format: `target=level,target=level,...`. An invalid filter falls back
    /// to the configured level.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Builds the filter this configuration describes.
    #[must_use]
    pub fn build_filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        }
    }

    /// Installs a global subscriber.
    ///
    /// Does nothing if a global subscriber is already installed, so calling
    /// this more than once (for example from several tests) is harmless.
    pub fn init(&self) {
        let env_filter = self.build_filter();
        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        let fmt_layer = tracing_subscriber::fmt::layer().with_span_events(span_events);
        let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match self.format {
            TracingFormat::Pretty => fmt_layer.pretty().boxed(),
            TracingFormat::Compact => fmt_layer.compact().boxed(),
            TracingFormat::Json => fmt_layer.json().boxed(),
        };

        // try_init().ok(): a subscriber may already be installed
        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(env_filter)
            .try_init()
            .ok();

        tracing::debug!(
            target: "interpose",
            level = %self.level,
            format = ?self.format,
            "tracing initialized"
        );
    }
}
