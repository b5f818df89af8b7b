//! # coopdash-client
//!
//! Parameter sync client for the coop door controller.
//!
//! The client reads and writes named slices of the device configuration
//! through `/api/get_params` and `/api/set_params`, keeps each slice's
//! dirty state, polls for live values, and gates views by the access level
//! the device reports.
//!
//! ## Architecture
//!
//! - [`AppContext`] is built once at startup. It owns the access level
//!   store, the route table and the access level refresh loop.
//! - Each open view is a [`SettingsView`] wrapping a [`ParameterClient`]
//!   and its poll loop.
//! - Transport sits behind the [`ParamsApi`] trait; [`HttpParamsApi`] is
//!   the reqwest implementation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coopdash_client::{AppContext, HttpParamsApi, LogNotifier, ViewOptions};
//!
//! let api = Arc::new(HttpParamsApi::new("http://192.168.1.1")?);
//! let app = AppContext::new(api, Arc::new(LogNotifier), storage, &settings);
//! app.start().await;
//!
//! let nav = app.navigate("/mqtt/settings")?;
//! let view = app.mount_view(nav.route().clone(), ViewOptions::new(["MqttHost", "MqttPort"])).await;
//! ```

pub mod api;
pub mod app;
#[cfg(feature = "http")]
pub mod http;
pub mod notify;
pub mod param_client;
pub mod poll;
pub mod refresh;
pub mod store;
#[cfg(test)]
mod testing;
pub mod view;

pub use api::{ApiError, ParamsApi};
pub use app::AppContext;
#[cfg(feature = "http")]
pub use http::HttpParamsApi;
pub use notify::{LogNotifier, Notifier};
pub use param_client::{FetchStatus, ParameterClient, SubmitStatus, ViewOptions};
pub use poll::PollHandle;
pub use refresh::AccessLevelRefresher;
pub use store::AccessLevelStore;
pub use view::SettingsView;

pub use coopdash_core::{AccessLevel, ParameterSet};
