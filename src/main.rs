mod config;
mod db;
mod dispatch;
mod handlers;
mod napcat;
mod state;
mod types;

use anyhow::Result;
use config::Config;
use db::essence_store::EssenceStore;
use dispatch::CommandDispatcher;
use handlers::builtin_registry;
use napcat::{BotClient, NapcatClient};
use state::AppState;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("essencebot=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("essencebot v{}", env!("CARGO_PKG_VERSION"));
    debug!("Config loaded from environment");

    let essence_store = EssenceStore::open(&config.essence_db_path).await?;
    debug!(db_path = %config.essence_db_path.display(), "Essence store initialized");

    info!(ws_url = %config.ws_url, "Connecting to NapCat...");
    let (client, mut events) = NapcatClient::connect(
        &config.ws_url,
        config.access_token.as_deref(),
        config.request_timeout,
    )
    .await?;

    let identity = client.get_login_info().await?;
    info!(
        bot_id = identity.user_id,
        nickname = %identity.nickname,
        "Logged in"
    );

    let state = Arc::new(AppState::new(config, essence_store));
    state
        .context
        .initialize(identity, Arc::clone(&client) as Arc<dyn BotClient>)
        .await;

    let registry = Arc::new(builtin_registry());
    let dispatcher = CommandDispatcher::new(registry, Arc::clone(&state));

    info!("Bot connected. Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("Event stream closed by transport, shutting down");
                    break;
                };
                if let Err(e) = dispatcher.dispatch(&event).await {
                    if e.is_config_error() {
                        error!(error = %e, "Unrecoverable dispatch error");
                        state.context.cleanup().await;
                        return Err(e.into());
                    }
                    error!(error = %e, "Error handling event");
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down gracefully...");
                break;
            }
        }
    }

    state.context.cleanup().await;
    info!("Shutdown complete.");
    Ok(())
}
