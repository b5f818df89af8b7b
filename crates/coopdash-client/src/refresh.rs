//! Access level refresh loop.
//!
//! Keeps the [`AccessLevelStore`] in step with the device. One blocking
//! refresh runs at startup, then a fixed-period timer fires for the rest of
//! the application's life. Ticks do not wait for each other: a slow device
//! can have several refreshes in flight at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coopdash_core::access::ACCESS_LEVEL_QUERY;
use coopdash_core::{AccessLevel, ResponseOrdering};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ParamsApi};
use crate::store::AccessLevelStore;

/// Default period between refreshes.
pub const ACCESS_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Fetches the device-reported access level into the store.
pub struct AccessLevelRefresher {
    api: Arc<dyn ParamsApi>,
    store: Arc<AccessLevelStore>,
    ordering: ResponseOrdering,
    issued: AtomicU64,
    applied: Mutex<u64>,
}

impl AccessLevelRefresher {
    pub fn new(
        api: Arc<dyn ParamsApi>,
        store: Arc<AccessLevelStore>,
        ordering: ResponseOrdering,
    ) -> Self {
        Self {
            api,
            store,
            ordering,
            issued: AtomicU64::new(0),
            applied: Mutex::new(0),
        }
    }

    pub fn store(&self) -> &Arc<AccessLevelStore> {
        &self.store
    }

    /// Fetch the level once and apply it.
    ///
    /// Never fails: any error, or a response without `AccessLvl`, stores
    /// the guest level. Returns the level the response carried.
    pub async fn refresh(&self) -> AccessLevel {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        let level = match self.fetch_level().await {
            Ok(level) => level,
            Err(e) => {
                warn!("Access level refresh #{} failed: {}", seq, e);
                AccessLevel::guest()
            }
        };

        self.apply(seq, level.clone());
        level
    }

    async fn fetch_level(&self) -> Result<AccessLevel, ApiError> {
        let response = self.api.get_params(ACCESS_LEVEL_QUERY).await?;
        AccessLevel::from_response(&response).ok_or(ApiError::MissingField("AccessLvl"))
    }

    fn apply(&self, seq: u64, level: AccessLevel) {
        let mut applied = self.applied.lock().unwrap_or_else(|e| e.into_inner());
        if self.ordering == ResponseOrdering::LatestRequestWins && seq < *applied {
            debug!("Dropping stale access level response #{} (have #{})", seq, *applied);
            return;
        }
        *applied = (*applied).max(seq);
        self.store.update(level);
    }

    /// Start the periodic refresh.
    ///
    /// The first tick fires one `period` from now; the startup refresh is
    /// the caller's job. Each tick spawns its own request, raced against
    /// `cancel`. A zero `period` falls back to [`ACCESS_REFRESH_INTERVAL`].
    pub fn spawn(
        self: Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let period = if period.is_zero() {
            warn!("Zero access level refresh period, using {:?}", ACCESS_REFRESH_INTERVAL);
            ACCESS_REFRESH_INTERVAL
        } else {
            period
        };
        tokio::spawn(async move {
            info!("Access level refresh every {:?}", period);
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let this = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = this.refresh() => {}
                    }
                });
            }
            debug!("Access level refresh stopped");
        })
    }
}
