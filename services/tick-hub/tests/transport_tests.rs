//! Live connection against the in-process STOMP broker

use anyhow::Result;
use pretty_assertions::assert_eq;
use services_common::{
    ConnectionState, ServiceError, StaticToken, TokenProvider, ORDERS_QUEUE, TICKS_QUEUE,
};
use std::sync::Arc;
use tempfile::TempDir;
use test_utils::{
    MockStompBroker, TEST_TOKEN, WAIT, init_test_logging, order_update, test_config, tick,
    wait_until, with_timeout,
};
use tick_hub::TickHub;
use tokio::sync::watch;

async fn connected(state: &mut watch::Receiver<ConnectionState>) -> Result<()> {
    with_timeout(WAIT, state.wait_for(|s| s.is_connected())).await??;
    Ok(())
}

fn hub_for(broker: &MockStompBroker, dir: &TempDir) -> Result<TickHub> {
    let config = test_config("http://127.0.0.1:9/rest", &broker.ws_url(), dir.path());
    let tokens: Arc<dyn TokenProvider> = Arc::new(StaticToken::new(TEST_TOKEN));
    Ok(TickHub::connect(config, tokens)?)
}

#[tokio::test]
async fn test_missing_token_is_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = test_config("http://127.0.0.1:9/rest", "ws://127.0.0.1:9/ws", dir.path());

    let result = TickHub::connect(config, Arc::new(StaticToken::empty()));

    assert!(matches!(result, Err(ServiceError::MissingToken)));
    Ok(())
}

#[tokio::test]
async fn test_session_handshake() -> Result<()> {
    init_test_logging();
    let broker = MockStompBroker::spawn().await?;
    let dir = tempfile::tempdir()?;
    let hub = hub_for(&broker, &dir)?;

    connected(&mut hub.connection_state()).await?;

    assert_eq!(broker.tokens_seen(), vec![TEST_TOKEN.to_string()]);
    assert_eq!(
        broker.queue_subscriptions(),
        vec![TICKS_QUEUE.to_string(), ORDERS_QUEUE.to_string()]
    );
    hub.close().await;
    Ok(())
}

#[tokio::test]
async fn test_ticks_and_orders_fan_out() -> Result<()> {
    let broker = MockStompBroker::spawn().await?;
    let dir = tempfile::tempdir()?;
    let hub = hub_for(&broker, &dir)?;
    connected(&mut hub.connection_state()).await?;

    let mut all = hub.ticks();
    let mut nifty_only = hub.ticks_for(&[256_265]);
    let mut orders = hub.order_updates();

    broker.push_ticks(&[tick(256_265, 21_500.0, 2.38, 21_000.0), tick(408_065, 1_450.0, -0.5, 1_457.3)])?;
    broker.push_order(&order_update("240101000000001", "COMPLETE"))?;

    let batch = with_timeout(WAIT, all.recv()).await?.expect("tick bus open");
    assert_eq!(batch.len(), 2);

    let narrowed = with_timeout(WAIT, nifty_only.recv()).await?.expect("tick bus open");
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].instrument_token, 256_265);

    let event = with_timeout(WAIT, orders.recv()).await?.expect("order bus open");
    assert_eq!(event.status, "COMPLETE");
    assert_eq!(event.order_id, "240101000000001");

    hub.close().await;
    Ok(())
}

#[tokio::test]
async fn test_reconnect_replays_tracked_tokens_in_one_batch() -> Result<()> {
    init_test_logging();
    let broker = MockStompBroker::spawn().await?;
    let dir = tempfile::tempdir()?;
    let hub = hub_for(&broker, &dir)?;

    hub.subscribe(&[30, 10]);
    hub.subscribe(&[20]);
    connected(&mut hub.connection_state()).await?;
    wait_until(|| broker.subscribes().len() == 1).await?;

    broker.drop_connections();
    wait_until(|| broker.connection_count() == 2).await?;
    wait_until(|| broker.subscribes().len() == 2).await?;

    assert_eq!(broker.subscribes(), vec![vec![10, 20, 30], vec![10, 20, 30]]);
    assert_eq!(broker.tokens_seen().len(), 2);
    assert_eq!(hub.registry().count(10), 1);

    hub.close().await;
    Ok(())
}

#[tokio::test]
async fn test_view_release_reaches_broker() -> Result<()> {
    let broker = MockStompBroker::spawn().await?;
    let dir = tempfile::tempdir()?;
    let hub = hub_for(&broker, &dir)?;

    let mut view = hub.view("positions", vec![1, 2]);
    view.activate().await?;
    wait_until(|| broker.subscribes().contains(&vec![1, 2])).await?;

    view.close().await;
    wait_until(|| broker.unsubscribes() == vec![vec![1, 2]]).await?;
    assert!(hub.registry().is_empty());

    hub.close().await;
    Ok(())
}
