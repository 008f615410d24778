mod bootstrap;
mod health;

use anyhow::Result;
use mailseek_core::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use mailseek_core::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Config and logging come up before anything else touches the runtime.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.store.clone(),
    )
    .await?;

    tracing::info!(
        event_name = "server_started",
        correlation_id = "bootstrap",
        trusted_channel_id = app.config.channel.trusted_channel_id.as_str(),
        "mailseek-server started"
    );

    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "server_stopping",
        correlation_id = "shutdown",
        "mailseek-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
