use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use vera_model_service::{
    api,
    utils::{setup_logging, LogConfig},
    ChatEngine, Features, ServiceConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = ServiceConfig::from_env()?;
    setup_logging(LogConfig::for_service(&config))?;

    if config.server.development {
        warn!("Development mode: debug logging enabled, restart the process to pick up changes");
    }

    let features = Features::detect();
    info!("{}", features);

    let addr = config.bind_addr()?;
    let engine = match ChatEngine::builder()
        .with_config(config)
        .with_features(features)
        .build()
        .await
    {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            error!("Startup aborted: {}", e);
            return Err(e.into());
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            engine.shutdown().await?;
            return Err(e).with_context(|| format!("Failed to bind {}", addr));
        }
    };
    info!("VERA model service listening on {}", addr);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    api::serve(engine, listener, shutdown).await?;
    Ok(())
}
