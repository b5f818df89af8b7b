//! Headless settings view.
//!
//! A mounted view owns one [`ParameterClient`] and its poll loop. Any UI
//! (the CLI, a TUI, tests) drives it through mount, route change and
//! unmount.

use std::sync::Arc;

use coopdash_core::routes::ResolvedRoute;
use tracing::debug;

use crate::param_client::{FetchStatus, ParameterClient};
use crate::poll::PollHandle;

pub struct SettingsView {
    route: ResolvedRoute,
    client: Arc<ParameterClient>,
    poll: Option<PollHandle>,
}

impl SettingsView {
    /// Load the view's parameters, then start polling.
    pub async fn mount(route: ResolvedRoute, client: Arc<ParameterClient>) -> Self {
        debug!("Mounting view {}", route.path);
        client.route_changed().await;
        let poll = PollHandle::start(client.clone());
        Self {
            route,
            client,
            poll: Some(poll),
        }
    }

    /// Switch to another route served by the same view and reload.
    pub async fn change_route(&mut self, route: ResolvedRoute) -> FetchStatus {
        debug!("View route {} -> {}", self.route.path, route.path);
        self.route = route;
        self.client.route_changed().await
    }

    pub fn route(&self) -> &ResolvedRoute {
        &self.route
    }

    pub fn title(&self) -> Option<&str> {
        self.route.title()
    }

    pub fn client(&self) -> &Arc<ParameterClient> {
        &self.client
    }

    pub fn is_polling(&self) -> bool {
        self.poll.as_ref().map_or(false, PollHandle::is_running)
    }

    /// Stop polling and discard anything still in flight.
    pub async fn unmount(mut self) {
        debug!("Unmounting view {}", self.route.path);
        if let Some(poll) = self.poll.take() {
            poll.stop().await;
        }
        self.client.teardown();
    }
}

impl Drop for SettingsView {
    fn drop(&mut self) {
        self.client.teardown();
    }
}
