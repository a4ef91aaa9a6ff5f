use std::time::Duration;

/// How an [`InstrumentedConnection`](super::InstrumentedConnection) reports
/// statements.
///
/// Everything starts switched off; hooks run regardless.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Statements slower than this are reported through `on_slow_query`.
    pub slow_query_threshold: Option<Duration>,
    pub monitoring_enabled: bool,
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slow_query_threshold(self, threshold: Duration) -> Self {
        Self {
            slow_query_threshold: Some(threshold),
            ..self
        }
    }

    pub fn enable_monitoring(self) -> Self {
        Self {
            monitoring_enabled: true,
            ..self
        }
    }

    pub fn disable_monitoring(self) -> Self {
        Self {
            monitoring_enabled: false,
            ..self
        }
    }

    /// Whether a statement that took `elapsed` counts as slow.
    pub fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_query_threshold.is_some_and(|limit| elapsed > limit)
    }
}
