//! Shared constants for the live feed, REST access and client-side storage

/// Delay between reconnect attempts of the live connection
pub const RECONNECT_DELAY_MS: u64 = 5000;

/// Deadline for the WebSocket upgrade plus the STOMP CONNECTED reply
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// Heart-beat interval offered in both directions; 0 disables heart-beating
pub const HEART_BEAT_MS: u64 = 10_000;

/// Time given to the server to apply an unsubscribe before callers proceed
pub const UNSUBSCRIBE_SETTLE_MS: u64 = 100;

/// Debounce window for search-as-you-type inputs
pub const SEARCH_DEBOUNCE_MS: u64 = 300;

/// Debounce window for margin recalculation and log search
pub const MARGIN_DEBOUNCE_MS: u64 = 500;

/// Maximum number of tokens a watchlist sends per subscribe call
pub const SUBSCRIPTION_BATCH_SIZE: usize = 50;

/// Broadcast capacity for tick batches
pub const TICK_CHANNEL_CAPACITY: usize = 1024;

/// Broadcast capacity for order updates
pub const ORDER_CHANNEL_CAPACITY: usize = 256;

/// Client-to-server destination for instrument subscriptions
pub const SUBSCRIBE_DESTINATION: &str = "/app/subscribe";

/// Client-to-server destination for instrument unsubscriptions
pub const UNSUBSCRIBE_DESTINATION: &str = "/app/unsubscribe";

/// Per-user queue carrying tick batches
pub const TICKS_QUEUE: &str = "/user/queue/ticks";

/// Per-user queue carrying order updates
pub const ORDERS_QUEUE: &str = "/user/queue/orders";

/// Subscription id used for the tick queue
pub const TICKS_SUBSCRIPTION_ID: &str = "sub-ticks";

/// Subscription id used for the order queue
pub const ORDERS_SUBSCRIPTION_ID: &str = "sub-orders";

/// Storage key of the bearer token
pub const AUTH_TOKEN_KEY: &str = "trade-manage-app-token";

/// Storage key of the per-screen UI state
pub const USER_VIEW_STATE_KEY: &str = "userViewState";

/// Storage key of the last-fetched data snapshot
pub const USER_DATA_STATE_KEY: &str = "userDataState";

/// Storage key of the basket order draft
pub const BASKET_CACHE_KEY: &str = "basket_order_items";

/// Where a forced logout sends the user
pub const SESSION_EXPIRED_REDIRECT: &str = "/login?reason=session-expired";

/// Development REST base URL
pub const DEV_BASE_URL: &str = "http://localhost:8090/rest";

/// Development broker endpoint
pub const DEV_WS_URL: &str = "ws://localhost:8090/ws/websocket";

/// Production REST path, relative to the serving origin
pub const PROD_REST_PATH: &str = "/rest";

/// Production broker path, relative to the serving origin
pub const PROD_WS_PATH: &str = "/ws/websocket";

/// Product type whose positions feed the positions summary
pub const PRODUCT_NRML: &str = "NRML";

/// Order statuses counted as still open
pub const PENDING_ORDER_STATUSES: [&str; 5] = [
    "TRIGGER PENDING",
    "AMO REQ RECEIVED",
    "MODIFY AMO REQ RECEIVED",
    "OPEN",
    "OPEN PENDING",
];

/// No value change for this long marks the index feed idle
pub const FEED_IDLE_THRESHOLD_MS: u64 = 5_000;

/// No tick at all for this long marks the index feed disconnected
pub const FEED_DISCONNECT_THRESHOLD_MS: u64 = 60_000;
