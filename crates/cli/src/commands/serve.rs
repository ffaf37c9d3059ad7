//! `medbridge serve`: start the HTTP API server.

use medbridge_config::AppConfig;
use tracing::{error, info};

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.server.port = port;
    }

    println!("🩺 MedBridge");
    println!("   Listening: {}:{}", config.server.host, config.server.port);
    println!("   Model: {}", config.llm.model);
    println!("   Default language: {}", config.default_language);

    info!(
        config = %AppConfig::resolved_path().display(),
        max_attempts = config.retry.max_attempts,
        timeout_ms = config.retry.timeout_ms,
        lock_after_finalize = config.sessions.lock_after_finalize,
        "Starting server"
    );

    if let Err(e) = medbridge_server::start(config).await {
        error!(error = %e, "Server exited with an error");
        return Err(e);
    }

    Ok(())
}
