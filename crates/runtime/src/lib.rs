use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use tracing::info;
use tuber_chats::{
    ChatRelay, InMemoryBroadcast, InMemoryRoomLog, RedisBroadcast, RedisRoomLog, RoomBroadcast,
    RoomLog,
};
use tuber_config::{AppConfig, ChatBackend};

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Shared chat backends, built once at startup and injected everywhere.
#[derive(Clone)]
pub struct BackendServices {
    pub log: Arc<dyn RoomLog>,
    pub broadcast: Arc<dyn RoomBroadcast>,
    pub relay: Arc<ChatRelay>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        config.chat.validate().context("invalid chat configuration")?;

        let (log, broadcast): (Arc<dyn RoomLog>, Arc<dyn RoomBroadcast>) = match config.chat.backend
        {
            ChatBackend::Redis => {
                let client = redis::Client::open(config.redis.url.as_str())
                    .with_context(|| format!("invalid redis url {}", config.redis.url))?;
                let conn = ConnectionManager::new(client.clone())
                    .await
                    .with_context(|| format!("failed to connect to redis at {}", config.redis.url))?;
                info!(url = %config.redis.url, "redis connection established");

                (
                    Arc::new(RedisRoomLog::new(conn.clone(), config.chat.history_max_len)),
                    Arc::new(RedisBroadcast::new(client, conn)),
                )
            }
            ChatBackend::Memory => {
                tracing::warn!("using in-memory chat backend, messages stay on this instance");
                (
                    Arc::new(InMemoryRoomLog::new(config.chat.history_max_len)),
                    Arc::new(InMemoryBroadcast::new(config.chat.subscription_capacity)),
                )
            }
        };

        let relay = ChatRelay::new(Arc::clone(&log), Arc::clone(&broadcast))
            .with_shutdown_grace(Duration::from_millis(config.chat.shutdown_grace_ms));

        info!(
            backend = ?config.chat.backend,
            history_max_len = ?config.chat.history_max_len,
            allow_anonymous = config.chat.allow_anonymous,
            "chat relay ready"
        );

        Ok(Self {
            log,
            broadcast,
            relay: Arc::new(relay),
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
