use std::sync::Arc;
use tracing::{error, info};

use crate::{
    config::ServiceConfig,
    error::{Result, ServiceError},
    model::{ModelLoader, TextGenerator},
    Features,
};

use super::engine::ChatEngine;

/// Builder for constructing a ready [`ChatEngine`]
pub struct EngineBuilder {
    config: Option<ServiceConfig>,
    generator: Option<Box<dyn TextGenerator>>,
    features: Option<Features>,
}

impl EngineBuilder {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            config: None,
            generator: None,
            features: None,
        }
    }

    /// Set the service configuration
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an already constructed generator instead of loading one from disk
    pub fn with_generator(mut self, generator: Box<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Override runtime feature detection
    pub fn with_features(mut self, features: Features) -> Self {
        self.features = Some(features);
        self
    }

    /// Load the model and return a ready engine.
    ///
    /// Any failure here is fatal: the caller must not start serving.
    pub async fn build(self) -> Result<ChatEngine> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let config = Arc::new(config);

        let features = self.features.unwrap_or_else(Features::detect);
        let engine = ChatEngine::unloaded(config.clone(), features)?;

        let generator = match self.generator {
            Some(generator) => generator,
            None => {
                info!("Loading VERA model...");
                let loader = ModelLoader::new(config.clone());
                let loaded = tokio::task::spawn_blocking(move || loader.load())
                    .await
                    .map_err(|e| ServiceError::InitializationError {
                        message: "Model loading task failed".to_string(),
                        source: Some(Box::new(e)),
                    })?;

                match loaded {
                    Ok(runtime) => Box::new(runtime) as Box<dyn TextGenerator>,
                    Err(e) => {
                        error!("Failed to load model: {}", e);
                        return Err(e);
                    }
                }
            }
        };

        engine.install(generator)?;
        info!(%features, "VERA model loaded successfully");
        Ok(engine)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
