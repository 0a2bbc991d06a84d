use std::time::Duration;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

use crate::error::{Result, ServiceError};

use super::{MetricsSnapshot, DURATION_METRIC, ERRORS_METRIC, REQUESTS_METRIC};

/// Owns the chat counters and the registry they are exposed through
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Registry,
    requests: IntCounter,
    duration: Histogram,
    errors: IntCounter,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests = IntCounter::new(REQUESTS_METRIC, "Total chat requests")
            .map_err(registration_error)?;
        let duration = Histogram::with_opts(HistogramOpts::new(
            DURATION_METRIC,
            "Chat request duration",
        ))
        .map_err(registration_error)?;
        let errors =
            IntCounter::new(ERRORS_METRIC, "Total chat errors").map_err(registration_error)?;

        registry.register(Box::new(requests.clone())).map_err(registration_error)?;
        registry.register(Box::new(duration.clone())).map_err(registration_error)?;
        registry.register(Box::new(errors.clone())).map_err(registration_error)?;

        Ok(Self {
            registry,
            requests,
            duration,
            errors,
        })
    }

    pub fn record_request(&self) {
        self.requests.inc();
    }

    pub fn record_duration(&self, elapsed: Duration) {
        self.duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_error(&self) {
        self.errors.inc();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.requests.get(),
            total_errors: self.errors.get(),
            observed_durations: self.duration.get_sample_count(),
            total_duration: Duration::from_secs_f64(self.duration.get_sample_sum()),
        }
    }

    /// Render every metric in the Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| ServiceError::ProcessingError {
                message: "Failed to encode metrics".to_string(),
                source: Some(Box::new(e)),
            })?;

        String::from_utf8(buffer).map_err(|e| ServiceError::ProcessingError {
            message: "Metrics output is not UTF-8".to_string(),
            source: Some(Box::new(e)),
        })
    }
}

fn registration_error(err: prometheus::Error) -> ServiceError {
    ServiceError::InitializationError {
        message: "Failed to register metric".to_string(),
        source: Some(Box::new(err)),
    }
}
