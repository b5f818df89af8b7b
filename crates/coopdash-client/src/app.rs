//! Application context.
//!
//! Built once at startup. Owns the access level store, the route table and
//! the access level refresh loop, and hands out views.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use coopdash_core::routes::{Navigation, ResolvedRoute, RouteError};
use coopdash_core::{AccessLevel, ClientStorage, DashboardSettings, RouteTable, ThemePreference};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::ParamsApi;
use crate::notify::Notifier;
use crate::param_client::{ParameterClient, ViewOptions};
use crate::refresh::AccessLevelRefresher;
use crate::store::AccessLevelStore;
use crate::view::SettingsView;

/// Process-wide dashboard state.
pub struct AppContext {
    api: Arc<dyn ParamsApi>,
    notifier: Arc<dyn Notifier>,
    store: Arc<AccessLevelStore>,
    routes: RouteTable,
    refresher: Arc<AccessLevelRefresher>,
    refresh_interval: Duration,
    idle_period: Duration,
    shutdown: CancellationToken,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppContext {
    pub fn new(
        api: Arc<dyn ParamsApi>,
        notifier: Arc<dyn Notifier>,
        storage: Arc<dyn ClientStorage>,
        settings: &DashboardSettings,
    ) -> Self {
        let store = Arc::new(AccessLevelStore::new(storage));
        let refresher = Arc::new(AccessLevelRefresher::new(
            api.clone(),
            store.clone(),
            settings.response_ordering(),
        ));

        Self {
            api,
            notifier,
            store,
            routes: RouteTable::coop_controller(),
            refresher,
            refresh_interval: settings.access_refresh_interval(),
            idle_period: settings.default_fetch_period(),
            shutdown: CancellationToken::new(),
            refresh_task: Mutex::new(None),
        }
    }

    /// Fetch the access level once, then keep refreshing it.
    ///
    /// Returns after the first refresh completes, successful or not.
    pub async fn start(&self) -> AccessLevel {
        let level = self.refresher.refresh().await;
        info!("Access level at startup: {}", level);

        let task = self
            .refresher
            .clone()
            .spawn(self.refresh_interval, self.shutdown.child_token());
        let previous = self
            .refresh_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(task);
        if let Some(previous) = previous {
            warn!("Access level refresh was already running; replacing it");
            previous.abort();
        }
        level
    }

    /// Resolve `path` and run the access guard against the persisted level.
    pub fn navigate(&self, path: &str) -> Result<Navigation, RouteError> {
        let stored = self.store.persisted();
        let navigation = self.routes.navigate(path, stored.as_ref())?;
        if let Navigation::Redirected { requested, to } = &navigation {
            info!("Access to {} denied, redirected to {}", requested, to.path);
        }
        Ok(navigation)
    }

    /// Build a parameter client for `options` and mount it on `route`.
    pub async fn mount_view(&self, route: ResolvedRoute, options: ViewOptions) -> SettingsView {
        let client = Arc::new(self.parameter_client(options));
        SettingsView::mount(route, client).await
    }

    /// A parameter client wired to this context's API and notifier.
    ///
    /// Torn down together with the context.
    pub fn parameter_client(&self, options: ViewOptions) -> ParameterClient {
        ParameterClient::new(self.api.clone(), self.notifier.clone(), options)
            .with_idle_period(self.idle_period)
            .with_parent(&self.shutdown)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn store(&self) -> &Arc<AccessLevelStore> {
        &self.store
    }

    pub fn access_level(&self) -> AccessLevel {
        self.store.read()
    }

    pub fn subscribe_access_level(&self) -> watch::Receiver<AccessLevel> {
        self.store.subscribe()
    }

    /// Refresh the access level now, outside the periodic loop.
    pub async fn refresh_access_level(&self) -> AccessLevel {
        self.refresher.refresh().await
    }

    pub fn theme(&self) -> ThemePreference {
        ThemePreference::load(self.store.storage().as_ref())
    }

    pub fn set_theme(&self, theme: ThemePreference) {
        if let Err(e) = theme.store(self.store.storage().as_ref()) {
            warn!("Failed to persist theme preference: {}", e);
        }
    }

    /// Stop the refresh loop and every client created by this context.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self
            .refresh_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("Dashboard context shut down");
    }
}
