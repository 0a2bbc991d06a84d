//! Prometheus metrics for the chat endpoint

mod collector;
mod types;

pub use collector::MetricsCollector;
pub use types::MetricsSnapshot;

pub(crate) const REQUESTS_METRIC: &str = "vera_chat_requests_total";
pub(crate) const DURATION_METRIC: &str = "vera_chat_duration_seconds";
pub(crate) const ERRORS_METRIC: &str = "vera_chat_errors_total";
