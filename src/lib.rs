pub mod accounts;
pub mod api;
pub mod authorization;
pub mod config;
pub mod core_state;
pub mod crypto;
pub mod db;
pub mod models;
pub mod prescriptions;
pub mod storage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Startup failed: {0}")]
    Core(#[from] core_state::CoreError),
    #[error("Superuser bootstrap failed: {0}")]
    Bootstrap(#[from] accounts::AccountError),
    #[error("Server error: {0}")]
    Server(String),
    #[error("Signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Build the core, bootstrap the superuser and serve until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let bind = config.bind;
    let core = Arc::new(CoreState::new(config)?);

    if let (Some(email), Some(password)) = (&core.config.admin_email, &core.config.admin_password) {
        let conn = core.open_db()?;
        let admin = accounts::ensure_superuser(&conn, email, password)?;
        tracing::info!(user_id = %admin.id, "Superuser ready");
    }

    let server = api::start_server_on(core.clone(), bind)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received, shutting down");
    server.stop().await;

    match core.flush_audit() {
        Ok(flushed) => tracing::info!(flushed, "Audit log flushed"),
        Err(e) => tracing::warn!("Failed to flush audit log: {e}"),
    }
    Ok(())
}
