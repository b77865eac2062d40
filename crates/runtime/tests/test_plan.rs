use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use tokio::time::{sleep, timeout};
use tuber_chats::ChatEvent;
use tuber_chats::ParticipantId;
use tuber_config::{AppConfig, ChatBackend};
use tuber_runtime::{self, BackendServices};

fn memory_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.chat.backend = ChatBackend::Memory;
    config.chat.history_max_len = Some(2);
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_wires_memory_backends_into_the_relay() -> Result<()> {
    let services = BackendServices::initialise(&memory_config()).await?;

    for payload in ["a", "b", "c"] {
        services
            .log
            .append("chatstream:r1", &ChatEvent::new(ParticipantId::ANONYMOUS, "r1", payload))
            .await?;
    }

    let retained = services.relay.log().read_all("chatstream:r1").await?;
    let payloads: Vec<Bytes> = retained.into_iter().map(|event| event.payload).collect();
    assert_eq!(payloads, vec!["b", "c"], "retention cap should come from configuration");

    let mut subscription = services.broadcast.subscribe("chatroom:r1").await?;
    services
        .relay
        .broadcast()
        .publish("chatroom:r1", Bytes::from_static(b"shared"))
        .await?;
    assert_eq!(subscription.next().await?.unwrap(), "shared");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_fails_when_redis_is_unreachable() -> Result<()> {
    let mut config = AppConfig::default();
    config.chat.backend = ChatBackend::Redis;
    config.redis.url = "redis://127.0.0.1:1".to_string();

    let error = match timeout(Duration::from_secs(60), BackendServices::initialise(&config)).await? {
        Ok(_) => panic!("expected redis connection to fail"),
        Err(error) => error,
    };
    let message = format!("{error:#}");
    assert!(
        message.contains("failed to connect to redis"),
        "expected redis connection context, got {message}"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_rejects_invalid_chat_configuration() -> Result<()> {
    let mut config = memory_config();
    config.chat.subscription_capacity = 0;

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("expected validation failure"),
        Err(error) => error,
    };
    assert!(format!("{error:#}").contains("invalid chat configuration"));
    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    tuber_runtime::telemetry::init_tracing().expect("first initialisation should succeed");

    let second = tuber_runtime::telemetry::init_tracing();
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}

#[tokio::test(flavor = "multi_thread")]
#[cfg_attr(not(unix), ignore = "requires Unix signal handling")]
async fn shutdown_signal_completes_on_ctrl_c_notification() -> Result<()> {
    let shutdown_task = tokio::spawn(async { tuber_runtime::shutdown_signal().await });

    sleep(Duration::from_millis(50)).await;
    #[cfg(unix)]
    unsafe {
        libc::raise(libc::SIGINT);
    }

    timeout(Duration::from_secs(2), shutdown_task).await??;
    Ok(())
}
