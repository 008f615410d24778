use std::sync::Arc;

use mailseek_agent::KeywordClassifier;
use mailseek_bot::{
    DispatcherSettings, HttpMailProvider, NoopAuthProvider, NoopChannelTransport, TurnDispatcher,
};
use mailseek_core::{AppConfig, ConfigError, LoadOptions, StorageBackend};
use mailseek_store::{MemoryStateStore, SqliteStateStore, StateStore};
use thiserror::Error;
use tracing::info;

/// Fully wired runtime. The auth provider and channel transport default to
/// no-ops; a deployment plugs its channel adapter in before serving real
/// traffic.
pub struct Application {
    pub config: AppConfig,
    pub store: Arc<dyn StateStore>,
    pub dispatcher: Arc<TurnDispatcher>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("state store connection failed: {0}")]
    StoreConnect(#[source] sqlx::Error),
    #[error("mail client construction failed: {0}")]
    MailClient(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "bootstrap_start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let store: Arc<dyn StateStore> = match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryStateStore::new()),
        StorageBackend::Sqlite => {
            let store = SqliteStateStore::connect(
                &config.storage.database_url,
                config.storage.max_connections,
                config.storage.timeout_secs,
            )
            .await
            .map_err(BootstrapError::StoreConnect)?;
            info!(
                event_name = "store_connected",
                correlation_id = "bootstrap",
                "sqlite state store connected"
            );
            Arc::new(store)
        }
    };

    let mail = HttpMailProvider::new(
        config.mail.inbox_endpoint.clone(),
        config.mail.timeout_secs,
        config.mail.timezone.clone(),
    )
    .map_err(|error| BootstrapError::MailClient(error.to_string()))?;

    let dispatcher = Arc::new(TurnDispatcher::new(
        store.clone(),
        Arc::new(NoopAuthProvider),
        Arc::new(KeywordClassifier::new()),
        Arc::new(mail),
        Arc::new(NoopChannelTransport),
        DispatcherSettings::from_config(&config),
    ));

    info!(
        event_name = "bootstrap_complete",
        correlation_id = "bootstrap",
        "application bootstrap complete"
    );

    Ok(Application { config, store, dispatcher })
}
