//! Parameter client.
//!
//! Every settings view is built on a [`ParameterClient`]: it holds the
//! view's slice of device parameters, remembers the last synced snapshot,
//! and talks to the device through a [`ParamsApi`].
//!
//! The keys of the working copy double as the read selector, so a view
//! declares what it shows simply by naming the parameters up front.
//!
//! Nothing here is fatal. Failures are logged and, for user-triggered
//! actions, reported once through the [`Notifier`]; the next poll tick or
//! user action is the only retry.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use coopdash_core::params::ParamState;
use coopdash_core::validation::{FormReport, FormRules};
use coopdash_core::ParameterSet;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ApiError, ParamsApi};
use crate::notify::{Notifier, MSG_LOAD_FAILED, MSG_SAVED, MSG_SAVE_FAILED};

/// Poll tick used when a view declares no period of its own.
pub const DEFAULT_FETCH_PERIOD: Duration = Duration::from_millis(1000);

/// What a view shows and how often it refreshes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewOptions {
    /// Parameter names the view reads and edits.
    pub keys: Vec<String>,
    /// Live poll period. Zero means the view is not live-polled.
    pub fetch_period: Duration,
}

impl ViewOptions {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            fetch_period: Duration::ZERO,
        }
    }

    /// Poll the view every `period`.
    pub fn live(mut self, period: Duration) -> Self {
        self.fetch_period = period;
        self
    }
}

/// Outcome of [`ParameterClient::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Response applied to the working copy and snapshot.
    Synced,
    /// No keys to select on; no request was made.
    Skipped,
    Failed,
    /// The client was torn down while the request was in flight.
    Cancelled,
}

/// Outcome of a submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Saved,
    /// The form is not valid; no request was made.
    Invalid,
    Failed,
    Cancelled,
}

#[derive(Debug)]
struct ClientState {
    params: ParamState,
    loading: bool,
    form_valid: bool,
    fetch_period: Duration,
    idle_period: Duration,
}

/// Fetch/submit/poll logic shared by every view.
pub struct ParameterClient {
    api: Arc<dyn ParamsApi>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<ClientState>,
    cancel: CancellationToken,
}

impl ParameterClient {
    pub fn new(api: Arc<dyn ParamsApi>, notifier: Arc<dyn Notifier>, options: ViewOptions) -> Self {
        Self {
            api,
            notifier,
            state: Mutex::new(ClientState {
                params: ParamState::from_keys(options.keys),
                loading: true,
                form_valid: false,
                fetch_period: options.fetch_period,
                idle_period: DEFAULT_FETCH_PERIOD,
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Override the tick used while the view is not live-polled.
    pub fn with_idle_period(self, period: Duration) -> Self {
        if !period.is_zero() {
            self.lock().idle_period = period;
        }
        self
    }

    /// Tear this client down whenever `parent` is cancelled.
    pub fn with_parent(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------
    // State access
    // ------------------------------------------------------------------

    /// Snapshot of the working copy.
    pub fn params(&self) -> ParameterSet {
        self.lock().params.params().clone()
    }

    /// Snapshot of the last synced values.
    pub fn original(&self) -> ParameterSet {
        self.lock().params.original().clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().params.get(key).cloned()
    }

    /// Edit a working value.
    pub fn set_param(&self, key: &str, value: impl Into<Value>) {
        self.lock().params.set(key, value.into());
    }

    pub fn has_changes(&self) -> bool {
        self.lock().params.has_changes()
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn is_form_valid(&self) -> bool {
        self.lock().form_valid
    }

    pub fn set_form_valid(&self, valid: bool) {
        self.lock().form_valid = valid;
    }

    /// Run `rules` over the working copy and record the verdict.
    pub fn validate(&self, rules: &FormRules) -> FormReport {
        let mut state = self.lock();
        let report = rules.validate(state.params.params());
        state.form_valid = report.is_valid();
        report
    }

    pub fn fetch_period(&self) -> Duration {
        self.lock().fetch_period
    }

    pub fn set_fetch_period(&self, period: Duration) {
        self.lock().fetch_period = period;
    }

    /// Whether the poll loop should fetch on each tick.
    pub fn is_live(&self) -> bool {
        !self.lock().fetch_period.is_zero()
    }

    /// Delay until the next poll tick.
    pub fn poll_interval(&self) -> Duration {
        let state = self.lock();
        if state.fetch_period.is_zero() {
            state.idle_period
        } else {
            state.fetch_period
        }
    }

    /// Discard edits made since the last sync.
    pub fn reset(&self) {
        self.lock().params.reset();
    }

    // ------------------------------------------------------------------
    // Device I/O
    // ------------------------------------------------------------------

    /// Read the current keys from the device.
    ///
    /// On success both the working copy and the snapshot are replaced by
    /// the response, so edits made while the request was in flight are
    /// lost. With `notify_on_error` a failure is also shown to the user.
    pub async fn fetch(&self, notify_on_error: bool) -> FetchStatus {
        let query = {
            let state = self.lock();
            if state.params.is_empty() {
                return FetchStatus::Skipped;
            }
            state.params.query()
        };
        let query = match query {
            Ok(query) => query,
            Err(e) => {
                self.fetch_failed(&ApiError::Encode(e.to_string()), notify_on_error);
                return FetchStatus::Failed;
            }
        };

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return FetchStatus::Cancelled,
            result = self.api.get_params(&query) => result,
        };

        match result {
            Ok(response) => {
                if self.cancel.is_cancelled() {
                    return FetchStatus::Cancelled;
                }
                let mut state = self.lock();
                state.params.sync(response);
                state.loading = false;
                FetchStatus::Synced
            }
            Err(e) => {
                self.fetch_failed(&e, notify_on_error);
                FetchStatus::Failed
            }
        }
    }

    fn fetch_failed(&self, error: &ApiError, notify: bool) {
        warn!("Failed to fetch parameters: {}", error);
        if notify {
            self.notifier.error(MSG_LOAD_FAILED);
        }
    }

    /// Write the whole working copy.
    ///
    /// Does nothing while the form is invalid. On success the user is
    /// notified and the view re-reads its keys; on failure the edits stay
    /// in place.
    pub async fn submit(&self) -> SubmitStatus {
        let body = {
            let state = self.lock();
            if !state.form_valid {
                debug!("Submit skipped: form is invalid");
                return SubmitStatus::Invalid;
            }
            state.params.params().clone()
        };
        self.send(body, true).await
    }

    /// Write only `keys` from the working copy.
    ///
    /// Names missing from the working copy are left out. The success
    /// notification is shown only when `announce` is set.
    pub async fn submit_subset<S: AsRef<str>>(&self, keys: &[S], announce: bool) -> SubmitStatus {
        let body = self.lock().params.subset(keys);
        self.send(body, announce).await
    }

    async fn send(&self, body: ParameterSet, announce: bool) -> SubmitStatus {
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SubmitStatus::Cancelled,
            result = self.api.set_params(&body) => result,
        };

        match result {
            Ok(()) => {
                if announce {
                    self.notifier.success(MSG_SAVED);
                }
                self.fetch(true).await;
                SubmitStatus::Saved
            }
            Err(e) => {
                warn!("Failed to submit parameters: {}", e);
                self.notifier.error(MSG_SAVE_FAILED);
                SubmitStatus::Failed
            }
        }
    }

    /// The view's route parameters changed: reload with a loading state.
    pub async fn route_changed(&self) -> FetchStatus {
        self.lock().loading = true;
        self.fetch(true).await
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Cancel in-flight requests; their responses are discarded.
    pub fn teardown(&self) {
        self.cancel.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
