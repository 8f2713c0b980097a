//! Fan-out behaviour of the tick and order buses

use pretty_assertions::assert_eq;
use rstest::*;
use services_common::{FanOutBus, Tick, TickBatch};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn batch(tokens: &[u32]) -> TickBatch {
    Arc::new(
        tokens
            .iter()
            .map(|&instrument_token| Tick {
                instrument_token,
                last_traded_price: 100.0,
                ..Tick::default()
            })
            .collect(),
    )
}

#[fixture]
fn bus() -> FanOutBus<TickBatch> {
    FanOutBus::new("ticks", 16)
}

#[rstest]
#[tokio::test]
async fn test_one_publish_reaches_every_view(bus: FanOutBus<TickBatch>) {
    let mut listeners: Vec<_> = (0..4).map(|_| bus.subscribe()).collect();

    assert_eq!(bus.publish(batch(&[1, 2])), 4);

    for listener in &mut listeners {
        let received = timeout(Duration::from_secs(1), listener.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.len(), 2);
    }
}

#[rstest]
#[tokio::test]
async fn test_order_is_preserved_per_listener(bus: FanOutBus<TickBatch>) {
    let mut listener = bus.subscribe();
    for token in 1..=5 {
        bus.publish(batch(&[token]));
    }

    let mut seen = Vec::new();
    for _ in 0..5 {
        let received = listener.recv().await.unwrap();
        seen.push(received[0].instrument_token);
    }
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

#[rstest]
#[tokio::test]
async fn test_filtered_listener_can_be_retargeted(bus: FanOutBus<TickBatch>) {
    let mut filtered = bus.subscribe_filtered([1]);

    bus.publish(batch(&[2, 3]));
    bus.publish(batch(&[1, 3]));
    let first = filtered.recv().await.unwrap();
    assert_eq!(first.iter().map(|t| t.instrument_token).collect::<Vec<_>>(), vec![1]);

    filtered.set_keys([3]);
    bus.publish(batch(&[1, 3]));
    let second = filtered.recv().await.unwrap();
    assert_eq!(second.iter().map(|t| t.instrument_token).collect::<Vec<_>>(), vec![3]);
}

#[rstest]
#[tokio::test]
async fn test_publish_without_listeners_is_counted(bus: FanOutBus<TickBatch>) {
    assert_eq!(bus.publish(batch(&[1])), 0);

    let snapshot = bus.metrics().snapshot();
    assert_eq!(snapshot.no_listeners, 1);
    assert_eq!(snapshot.total_publishes(), 1);
}
