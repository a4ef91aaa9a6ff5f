//! Query interceptors for SQL execution.
//!
//! Wrap any [`Connection`](crate::Connection) in an
//! [`InstrumentedConnection`] to:
//! - inspect, rewrite or abort statements before they run ([`QueryHook`])
//! - time statements and collect results ([`QueryMonitor`])
//! - flag slow queries
//!
//! # Example
//!
//! ```rust,ignore
//! use tabula::monitor::{InstrumentedConnection, MonitorConfig, StatsMonitor, TracingSqlHook};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let stats = Arc::new(StatsMonitor::new());
//! let conn = InstrumentedConnection::new(conn)
//!     .with_config(
//!         MonitorConfig::new()
//!             .with_slow_query_threshold(Duration::from_millis(200))
//!             .enable_monitoring(),
//!     )
//!     .with_monitor_arc(stats.clone())
//!     .with_hook(TracingSqlHook::new());
//!
//! tabula::query::select("*", "users").fetch_all(&conn).await?;
//! println!("{:?}", stats.stats());
//! ```

mod config;
mod instrumented;
mod monitors;
mod tracing_hook;
mod types;

#[cfg(test)]
mod tests;

pub use crate::query::QueryType;
pub use config::MonitorConfig;
pub use instrumented::{InstrumentedConnection, InstrumentedStatement};
pub use monitors::{
    CompositeHook, CompositeMonitor, LoggingMonitor, NoopMonitor, QueryStats, StatsMonitor,
};
pub use tracing_hook::TracingSqlHook;
pub use types::{HookAction, QueryContext, QueryHook, QueryMonitor, QueryResult};

/// Longest prefix of `text` within `max_bytes` that ends on a char boundary.
fn char_prefix(text: &str, max_bytes: usize) -> &str {
    let end = (0..=max_bytes.min(text.len()))
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or(0);
    &text[..end]
}

/// `text` cut to `max` bytes with a trailing `...`; `None` keeps it whole.
pub(crate) fn shorten_sql(text: &str, max: Option<usize>) -> String {
    match max {
        Some(max) if text.len() > max => format!("{}...", char_prefix(text, max)),
        _ => text.to_string(),
    }
}
