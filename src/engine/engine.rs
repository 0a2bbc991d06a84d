use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::{
    config::ServiceConfig,
    error::{Result, ServiceError},
    metrics::MetricsCollector,
    model::TextGenerator,
    processing::GenerationQueue,
    prompt,
    types::{ChatRequest, ChatResponse, GenerationParams, HealthResponse, ServiceInfo},
    Features, SERVICE_NAME, VERSION,
};

use super::{EngineBuilder, LifecycleState};

enum Lifecycle {
    NoModel,
    Ready(Arc<GenerationQueue>),
    Stopped,
}

/// Process-wide chat service state: the loaded model, its lifecycle and metrics
pub struct ChatEngine {
    config: Arc<ServiceConfig>,
    state: RwLock<Lifecycle>,
    metrics: MetricsCollector,
    features: Features,
}

impl ChatEngine {
    /// Create a new engine builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// An engine with no model behind it. Every chat request is refused until
    /// a generator is installed.
    pub(crate) fn unloaded(config: Arc<ServiceConfig>, features: Features) -> Result<Self> {
        Ok(Self {
            config,
            state: RwLock::new(Lifecycle::NoModel),
            metrics: MetricsCollector::new()?,
            features,
        })
    }

    /// Move from `NoModel` to `Ready`. Only valid once.
    pub(crate) fn install(&self, generator: Box<dyn TextGenerator>) -> Result<()> {
        let mut state = self.state.write();
        if !matches!(*state, Lifecycle::NoModel) {
            return Err(ServiceError::InitializationError {
                message: "A model can only be installed once, before shutdown".to_string(),
                source: None,
            });
        }

        let queue = GenerationQueue::start(generator, self.config.processing.queue_size)?;
        debug!(capacity = queue.capacity(), "Generation queue started");
        *state = Lifecycle::Ready(Arc::new(queue));
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        match *self.state.read() {
            Lifecycle::NoModel => LifecycleState::NoModel,
            Lifecycle::Ready(_) => LifecycleState::Ready,
            Lifecycle::Stopped => LifecycleState::Stopped,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "healthy".to_string(),
            model_loaded: self.is_ready(),
            gpu_available: self.features.cuda,
        }
    }

    pub fn info(&self) -> ServiceInfo {
        ServiceInfo {
            service: SERVICE_NAME.to_string(),
            status: "running".to_string(),
            version: VERSION.to_string(),
        }
    }

    /// Caller-chosen parameters, with configured defaults for the missing ones
    pub fn generation_params(&self, request: &ChatRequest) -> GenerationParams {
        GenerationParams {
            max_new_tokens: request
                .max_tokens
                .unwrap_or(self.config.generation.default_max_tokens),
            temperature: request
                .temperature
                .unwrap_or(self.config.generation.default_temperature),
        }
    }

    /// Run one chat turn: render, generate, extract.
    ///
    /// Refused with `NotReady` before anything is counted when no model is
    /// loaded. Otherwise the request counter moves exactly once, and the error
    /// counter moves on failure.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let started = Instant::now();
        let params = self.generation_params(&request);

        // Count and submit under one read guard: shutdown cannot land in between
        let submitted = {
            let state = self.state.read();
            let Lifecycle::Ready(queue) = &*state else {
                return Err(ServiceError::NotReady);
            };
            self.metrics.record_request();

            let prompt = prompt::render_prompt(&request.messages);
            let submitted = queue.submit(prompt, params);
            if let Ok(handle) = &submitted {
                debug!(job_id = handle.job_id(), pending = queue.pending(), "Queued chat turn");
            }
            submitted
        };

        let outcome = match submitted {
            Ok(handle) => handle.wait().await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(output) => {
                self.metrics.record_duration(started.elapsed());
                let response = ChatResponse {
                    message: prompt::extract_response(&output.text),
                    tokens_used: output.tokens_used,
                };
                info!(
                    wait_ms = output.wait_time.as_millis() as u64,
                    generation_ms = output.processing_time.as_millis() as u64,
                    tokens_used = output.tokens_used,
                    "Generated response ({} chars)",
                    response.message.chars().count()
                );
                Ok(response)
            }
            Err(err) => {
                self.metrics.record_error();
                let err = err.into_generation_failure();
                error!("Error generating response: {}", err);
                Err(err)
            }
        }
    }

    /// Release the model. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *self.state.write(), Lifecycle::Stopped);

        match previous {
            Lifecycle::Ready(queue) => {
                info!("Shutting down VERA service...");
                let snapshot = self.metrics.snapshot();
                info!(
                    requests = snapshot.total_requests,
                    error_rate = snapshot.error_rate(),
                    avg_latency_ms = snapshot.average_latency().as_millis() as u64,
                    "Final chat metrics"
                );

                let used_gpu = queue.shutdown().await?;
                if used_gpu {
                    info!("Model and tokenizer released, CUDA memory returned");
                } else {
                    info!("Model and tokenizer released");
                }
            }
            Lifecycle::NoModel => debug!("Shutdown requested with no model loaded"),
            Lifecycle::Stopped => debug!("Engine already stopped"),
        }

        Ok(())
    }
}
