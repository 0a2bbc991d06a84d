//! VERA model service - chat facade over a fine-tuned language model
//!
//! This crate renders conversations into the model's instruction template,
//! runs generation on a single worker, cuts the reply out of the decoded
//! output, and exposes the whole thing over HTTP with health and Prometheus
//! metrics. A separate responder serves the prebuilt web bundle.

use std::fmt;

// Public modules
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod model;
pub mod processing;
pub mod prompt;
pub mod static_files;
pub mod types;
pub mod utils;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SERVICE_NAME: &str = "VERA AI Model Service";

// Re-exports for public API
pub use config::{ServiceConfig, StaticConfig};
pub use engine::{ChatEngine, EngineBuilder, LifecycleState};
pub use error::{Result, ServiceError};
pub use metrics::MetricsCollector;
pub use types::{ChatRequest, ChatResponse, Message, Role};

/// Feature detection for supported backends
#[derive(Debug, Clone, Copy)]
pub struct Features {
    /// Whether CUDA support is enabled
    pub cuda: bool,
    /// Number of detected CUDA devices
    pub cuda_devices: usize,
}

impl Features {
    /// Detect available features at runtime
    pub fn detect() -> Self {
        #[cfg(feature = "cuda")]
        let (cuda, cuda_devices) = {
            let count = (0..8)
                .take_while(|&i| candle_core::Device::new_cuda(i).is_ok())
                .count();
            (count > 0, count)
        };

        #[cfg(not(feature = "cuda"))]
        let (cuda, cuda_devices) = (false, 0);

        Self {
            cuda,
            cuda_devices,
        }
    }

    /// Features of a machine with no accelerator
    pub fn cpu_only() -> Self {
        Self {
            cuda: false,
            cuda_devices: 0,
        }
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CUDA support: {}", if self.cuda { "yes" } else { "no" })?;
        if self.cuda {
            write!(f, " ({} devices)", self.cuda_devices)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_detection() {
        let features = Features::detect();
        assert_eq!(features.cuda, features.cuda_devices > 0);
    }

    #[test]
    fn test_features_display() {
        assert_eq!(Features::cpu_only().to_string(), "CUDA support: no");
        let gpu = Features {
            cuda: true,
            cuda_devices: 2,
        };
        assert_eq!(gpu.to_string(), "CUDA support: yes (2 devices)");
    }

    #[test]
    fn test_version_numbers() {
        assert_eq!(VERSION, "1.0.0");
    }
}
