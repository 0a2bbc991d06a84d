use std::process::ExitCode;

use tracing::error;

use vera_model_service::{
    static_files::{self, BUILD_HINT},
    utils::{setup_logging, LogConfig},
    ServiceError, StaticConfig,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    if let Err(e) = setup_logging(LogConfig::default()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let config = StaticConfig::default();
    if let Err(e) = static_files::ensure_root(&config) {
        return report_missing_root(&e);
    }

    println!("✅ VERA Server Starting");
    println!("📍 Building from: {}", config.root.display());
    println!("🌐 Access at: http://localhost:{}", config.port);
    println!("Press Ctrl+C to stop\n");

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n📍 VERA Server stopped");
        }
    };

    match static_files::serve(&config, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ ServiceError::StaticRootMissing { .. }) => report_missing_root(&e),
        Err(e) => {
            error!("Static server failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn report_missing_root(e: &ServiceError) -> ExitCode {
    println!("❌ {}", e);
    println!("{}", BUILD_HINT);
    ExitCode::FAILURE
}
