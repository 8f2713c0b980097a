//! Persisted client state
//!
//! A directory-backed string store with one file per key. Typed stores on top
//! of it hold the session token, the per-screen view state, free-form user
//! data and the basket draft.

use crate::derived::BasketDraft;
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use services_common::{
    AUTH_TOKEN_KEY, BASKET_CACHE_KEY, BasketItem, ServiceError, ServiceResult, TokenProvider,
    USER_DATA_STATE_KEY, USER_VIEW_STATE_KEY,
};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// String key/value store backed by a directory
#[derive(Debug)]
pub struct LocalStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Open (creating if needed) the store at `dir`
    pub fn open(dir: impl AsRef<Path>) -> ServiceResult<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            fs::create_dir_all(dir).map_err(|e| storage_error(dir, &e))?;
        }
        info!("Opened client storage at {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the values
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(file)
    }

    /// Raw value for `key`
    pub fn get_item(&self, key: &str) -> ServiceResult<Option<String>> {
        let path = self.path(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(&path, &e)),
        }
    }

    /// Replace the value for `key`
    pub fn set_item(&self, key: &str, value: &str) -> ServiceResult<()> {
        let path = self.path(key);
        let staging = path.with_extension("tmp");
        let _guard = self.write_lock.lock();
        fs::write(&staging, value).map_err(|e| storage_error(&staging, &e))?;
        fs::rename(&staging, &path).map_err(|e| storage_error(&path, &e))?;
        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    /// Delete `key`; deleting a missing key is not an error
    pub fn remove_item(&self, key: &str) -> ServiceResult<()> {
        let path = self.path(key);
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(&path, &e)),
        }
    }

    /// Value for `key` parsed as JSON
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> ServiceResult<Option<T>> {
        match self.get_item(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Store `value` as JSON
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> ServiceResult<()> {
        self.set_item(key, &serde_json::to_string(value)?)
    }

    /// Shallow-merge `partial` over the object stored at `key`
    ///
    /// Top-level fields of `partial` replace the stored ones wholesale.
    /// A missing or non-object value starts from `base`.
    pub fn merge_json(&self, key: &str, partial: Map<String, Value>, base: Value) -> ServiceResult<Value> {
        let current = self.get_json::<Value>(key)?.unwrap_or(base);
        let mut merged = match current {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        merged.extend(partial);
        let merged = Value::Object(merged);
        self.set_json(key, &merged)?;
        Ok(merged)
    }
}

fn storage_error(path: &Path, err: &std::io::Error) -> ServiceError {
    ServiceError::Storage(format!("{}: {err}", path.display()))
}

/// Session token persisted under `trade-manage-app-token`
#[derive(Debug, Clone)]
pub struct TokenStore {
    store: Arc<LocalStore>,
}

impl TokenStore {
    /// Token store over `store`
    pub const fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Persist `token`
    pub fn set(&self, token: &str) -> ServiceResult<()> {
        self.store.set_item(AUTH_TOKEN_KEY, token)
    }
}

impl TokenProvider for TokenStore {
    fn token(&self) -> Option<String> {
        match self.store.get_item(AUTH_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(err) => {
                warn!(error = %err, "Failed to read session token");
                None
            }
        }
    }

    fn clear(&self) {
        if let Err(err) = self.store.remove_item(AUTH_TOKEN_KEY) {
            warn!(error = %err, "Failed to clear session token");
        }
    }
}

/// Default per-screen view state
#[must_use]
pub fn default_view_state() -> Value {
    json!({
        "holdings": {
            "selectedUsersIds": [],
            "selectedHoldingType": "All",
            "searchQuery": "",
            "filterSelection": []
        },
        "positions": {
            "selectedUsersIds": [],
            "searchQuery": "",
            "filterSelection": []
        },
        "orders": {
            "selectedUsersIds": [],
            "selectedOrderType": "Open",
            "searchQuery": "",
            "filterSelection": []
        },
        "funds": { "selectedUsersIds": [] },
        "watchlist": { "activeWatchlist": 0, "isCollapsed": false },
        "mfSips": {
            "selectedSectionType": "SIPs",
            "selectedUsersIds": [],
            "searchQuery": "",
            "mfSearchQuery": "",
            "filterSelection": [],
            "mfOrderFilterSelection": []
        },
        "ordersHistory": {},
        "charges": { "selectedUsersIds": [] },
        "userManagementDashboard": {},
        "straddles": {
            "selectedSectionType": "Straddles",
            "selectedUsersIds": [],
            "searchQuery": ""
        },
        "historicalData": {},
        "ipos": {
            "selectedIpoType": "IPO",
            "searchQuery": "",
            "searchIpoApplicationsQuery": "",
            "selectedUsersIds": [],
            "filterSelection": [],
            "applicationsFilterSelection": []
        },
        "userPreferences": {},
        "home": { "selectedUsersIds": [] },
        "profile": { "selectedTab": "Profile" },
        "administration": { "selectedTab": "Scheduled Tasks" }
    })
}

/// JSON object state under one key with shallow-merge updates
#[derive(Debug)]
pub struct StateStore<'a> {
    store: &'a LocalStore,
    key: &'static str,
    defaults: fn() -> Value,
    persist_defaults: bool,
}

impl<'a> StateStore<'a> {
    /// Per-screen view state; defaults are written on first read
    pub fn user_view(store: &'a LocalStore) -> Self {
        Self {
            store,
            key: USER_VIEW_STATE_KEY,
            defaults: default_view_state,
            persist_defaults: true,
        }
    }

    /// Free-form user data; starts as `{}`
    pub fn user_data(store: &'a LocalStore) -> Self {
        Self {
            store,
            key: USER_DATA_STATE_KEY,
            defaults: || json!({}),
            persist_defaults: false,
        }
    }

    /// Current state
    pub fn get(&self) -> ServiceResult<Value> {
        if let Some(state) = self.store.get_json(self.key)? {
            return Ok(state);
        }
        let defaults = (self.defaults)();
        if self.persist_defaults {
            self.store.set_json(self.key, &defaults)?;
        }
        Ok(defaults)
    }

    /// Replace the top-level fields present in `partial`
    pub fn set(&self, partial: Map<String, Value>) -> ServiceResult<Value> {
        let current = self.get()?;
        self.store.merge_json(self.key, partial, current)
    }

    /// Section `name` of the state, if present
    pub fn section(&self, name: &str) -> ServiceResult<Option<Value>> {
        Ok(self.get()?.get(name).cloned())
    }

    /// Forget the state
    pub fn clear(&self) -> ServiceResult<()> {
        self.store.remove_item(self.key)
    }
}

/// Basket draft persistence and per-exchange quantity cache
#[derive(Debug)]
pub struct BasketStore<'a> {
    store: &'a LocalStore,
}

impl<'a> BasketStore<'a> {
    /// Basket store over `store`
    pub const fn new(store: &'a LocalStore) -> Self {
        Self { store }
    }

    /// Persist the draft's items
    pub fn save(&self, draft: &BasketDraft) -> ServiceResult<()> {
        self.store.set_json(BASKET_CACHE_KEY, draft.items())
    }

    /// Restore the draft for `account_id`
    ///
    /// An unreadable cache is removed and treated as empty.
    pub fn load(&self, account_id: &str) -> ServiceResult<Option<BasketDraft>> {
        match self.store.get_json::<Vec<BasketItem>>(BASKET_CACHE_KEY) {
            Ok(Some(items)) => Ok(Some(BasketDraft::from_items(account_id, items))),
            Ok(None) => Ok(None),
            Err(ServiceError::Serialization(err)) => {
                warn!(error = %err, "Discarding invalid basket cache");
                self.store.remove_item(BASKET_CACHE_KEY)?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Forget the draft
    pub fn clear(&self) -> ServiceResult<()> {
        self.store.remove_item(BASKET_CACHE_KEY)
    }

    /// Last quantity used for `exchange` by `account_id`, 1 if none
    pub fn cached_quantity(&self, account_id: &str, exchange: &str) -> i64 {
        self.store
            .get_item(&quantity_key(account_id, exchange))
            .ok()
            .flatten()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(1)
    }

    /// Remember `quantity` for `exchange` under `account_id`
    pub fn cache_quantity(&self, account_id: &str, exchange: &str, quantity: i64) -> ServiceResult<()> {
        self.store
            .set_item(&quantity_key(account_id, exchange), &quantity.to_string())
    }
}

fn quantity_key(account_id: &str, exchange: &str) -> String {
    format!("basket_qty_{account_id}_{exchange}")
}
