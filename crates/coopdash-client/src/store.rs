//! Access level store.
//!
//! Single source of truth for the viewer's permission tier. The current
//! value lives in a watch channel so views can observe changes; every
//! update is also written through to durable client storage, where the
//! route guard reads it.

use std::sync::Arc;

use coopdash_core::config::ACCESS_LEVEL_KEY;
use coopdash_core::{AccessLevel, ClientStorage};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Reactive, persisted access level.
pub struct AccessLevelStore {
    storage: Arc<dyn ClientStorage>,
    tx: watch::Sender<AccessLevel>,
}

impl AccessLevelStore {
    /// Create the store, starting from the persisted level or guest.
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        let initial = read_persisted(storage.as_ref()).unwrap_or_default();
        let (tx, _rx) = watch::channel(initial);
        Self { storage, tx }
    }

    /// Current level.
    pub fn read(&self) -> AccessLevel {
        self.tx.borrow().clone()
    }

    /// Persist `level` and publish it to observers.
    ///
    /// Not validated and not deduplicated: every call writes storage and
    /// wakes observers. A storage failure is logged and the in-memory
    /// value is still updated.
    pub fn update(&self, level: impl Into<AccessLevel>) {
        let level = level.into();
        if let Err(e) = self.storage.set_item(ACCESS_LEVEL_KEY, level.as_str()) {
            warn!("Failed to persist access level: {}", e);
        }
        debug!("Access level set to {}", level);
        self.tx.send_replace(level);
    }

    /// Observe level changes.
    pub fn subscribe(&self) -> watch::Receiver<AccessLevel> {
        self.tx.subscribe()
    }

    /// The level as persisted in durable storage, if any.
    pub fn persisted(&self) -> Option<AccessLevel> {
        read_persisted(self.storage.as_ref())
    }

    pub fn storage(&self) -> &Arc<dyn ClientStorage> {
        &self.storage
    }
}

fn read_persisted(storage: &dyn ClientStorage) -> Option<AccessLevel> {
    match storage.get_item(ACCESS_LEVEL_KEY) {
        Ok(raw) => raw.map(AccessLevel::from),
        Err(e) => {
            warn!("Failed to read persisted access level: {}", e);
            None
        }
    }
}
