use std::time::Duration;
use serde::{Serialize, Deserialize};

/// Point-in-time view of the chat metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Chat requests dispatched to the model
    pub total_requests: u64,

    /// Chat requests that failed
    pub total_errors: u64,

    /// Successful requests whose duration was observed
    pub observed_durations: u64,

    /// Sum of observed durations
    pub total_duration: Duration,
}

impl MetricsSnapshot {
    pub fn error_rate(&self) -> f32 {
        if self.total_requests > 0 {
            self.total_errors as f32 / self.total_requests as f32
        } else {
            0.0
        }
    }

    pub fn average_latency(&self) -> Duration {
        if self.observed_durations > 0 {
            self.total_duration / self.observed_durations as u32
        } else {
            Duration::default()
        }
    }
}
