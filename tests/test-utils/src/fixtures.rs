//! rstest fixtures shared by the integration suites

use crate::factories::{HoldingFactory, order, position};
use crate::recorders::{RecordingNotifier, RecordingWire};
use rstest::fixture;
use services_common::{ClientConfig, Holding, OrderDetails, PositionDetails, StaticToken};
use std::path::Path;
use std::sync::Arc;

/// Bearer token the fixtures log in with
pub const TEST_TOKEN: &str = "test-bearer-token";

/// Wire that starts connected
#[fixture]
pub fn connected_wire() -> Arc<RecordingWire> {
    Arc::new(RecordingWire::new(true))
}

/// Wire that starts disconnected
#[fixture]
pub fn disconnected_wire() -> Arc<RecordingWire> {
    Arc::new(RecordingWire::new(false))
}

#[fixture]
pub fn notifier() -> Arc<RecordingNotifier> {
    Arc::new(RecordingNotifier::default())
}

/// Logged-in token holder
#[fixture]
pub fn token() -> Arc<StaticToken> {
    Arc::new(StaticToken::new(TEST_TOKEN))
}

/// Two holdings whose totals are 215000 invested and 195000 current
#[fixture]
pub fn holdings() -> Vec<Holding> {
    let factory = HoldingFactory::new();
    vec![
        factory.priced(408_065, "INFY", 100, 1_500.0, 1_400.0),
        factory.priced(2_953_217, "TCS", 20, 3_250.0, 2_750.0),
    ]
}

/// One long and one short NRML position plus an MIS row
#[fixture]
pub fn positions() -> Vec<PositionDetails> {
    let mut intraday = position(3, "RELIANCE", 10, 2_900.0, 0, 0.0);
    intraday.position.product = "MIS".to_string();
    vec![
        position(1, "NIFTY25JAN24000CE", 75, 120.0, 0, 0.0),
        position(2, "BANKNIFTY25JANFUT", 0, 0.0, 30, 51_000.0),
        intraday,
    ]
}

/// Mix of open and finished orders across two accounts
#[fixture]
pub fn orders() -> Vec<OrderDetails> {
    vec![
        order("AB1234", "240101000000001", "OPEN"),
        order("AB1234", "240101000000002", "COMPLETE"),
        order("CD5678", "240101000000003", "TRIGGER PENDING"),
        order("CD5678", "240101000000004", "REJECTED"),
    ]
}

/// Development config pointed at local test servers
#[must_use]
pub fn test_config(base_url: &str, ws_url: &str, storage_dir: &Path) -> ClientConfig {
    let mut config = ClientConfig::development();
    config.base_url = base_url.to_string();
    config.ws_url = ws_url.to_string();
    config.storage_dir = storage_dir.to_path_buf();
    config.reconnect_delay_ms = 100;
    config.unsubscribe_settle_ms = 10;
    config.handshake_timeout_ms = 2_000;
    config.http_timeout_ms = Some(5_000);
    config
}
