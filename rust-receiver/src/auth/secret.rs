//! Shared webhook secret and its process-wide store.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// The shared webhook token.
///
/// The value is never printed; `Debug` always renders `[REDACTED]`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// A secret that is unset or whitespace-only counts as empty.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Raw token. Only the authenticator should need this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// Process-wide holder for the current [`Secret`].
///
/// Requests take a cheap `Arc` snapshot, so a reload never changes the
/// secret underneath a request that is already being authorized.
#[derive(Debug, Clone)]
pub struct SecretStore {
    inner: Arc<RwLock<Arc<Secret>>>,
}

impl SecretStore {
    pub fn new(secret: Secret) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(secret))),
        }
    }

    /// Snapshot of the secret in effect right now.
    pub fn current(&self) -> Arc<Secret> {
        Arc::clone(&*self.inner.read())
    }

    /// Replace the secret for all subsequent requests.
    pub fn reload(&self, secret: Secret) {
        *self.inner.write() = Arc::new(secret);
    }
}
