//! Engine configuration.

use crate::fields::DEFAULT_PURGE_INTERVAL;

/// Tunables for a [`HookRegistry`](crate::registry::HookRegistry).
///
/// # Example
///
/// ```
/// use interpose_engine::config::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_catch_panics(true)
///     .with_field_purge_interval(1024);
/// assert_eq!(config.field_purge_interval, 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Contain panics raised by callbacks instead of unwinding into the
    /// intercepted caller.
    pub catch_panics: bool,
    /// Writes between automatic purges of the field store (`0` disables).
    pub field_purge_interval: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catch_panics: true,
            field_purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }
}

impl EngineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether callback panics are contained.
    #[must_use]
    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// Sets the field store purge interval.
    #[must_use]
    pub fn with_field_purge_interval(mut self, interval: usize) -> Self {
        self.field_purge_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert!(config.catch_panics);
        assert_eq!(config.field_purge_interval, DEFAULT_PURGE_INTERVAL);
    }

    #[test]
    fn builder_overrides() {
        let config = EngineConfig::new()
            .with_catch_panics(false)
            .with_field_purge_interval(0);
        assert!(!config.catch_panics);
        assert_eq!(config.field_purge_interval, 0);
    }
}
