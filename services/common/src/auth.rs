//! Bearer token access

use parking_lot::RwLock;

/// Source of the bearer token used by REST calls and the live connection
pub trait TokenProvider: Send + Sync {
    /// Current token, if logged in
    fn token(&self) -> Option<String>;

    /// Forget the token (forced logout)
    fn clear(&self);
}

/// In-memory token holder
#[derive(Debug, Default)]
pub struct StaticToken {
    token: RwLock<Option<String>>,
}

impl StaticToken {
    /// Holder initialised with `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Holder with no token
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Replace the token
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .clone()
            .filter(|t| !t.trim().is_empty())
    }

    fn clear(&self) {
        *self.token.write() = None;
    }
}
