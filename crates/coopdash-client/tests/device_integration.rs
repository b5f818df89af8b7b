//! Integration tests against the device emulator.
//!
//! These tests start an actual emulator on an ephemeral port and drive it
//! with the reqwest-backed client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use coopdash_client::notify::{CollectingNotifier, Notification, MSG_LOAD_FAILED, MSG_SAVED};
use coopdash_client::{
    AccessLevel, ApiError, AppContext, FetchStatus, HttpParamsApi, ParameterSet, ParamsApi,
    SubmitStatus, ViewOptions,
};
use coopdash_core::config::MemoryStorage;
use coopdash_core::DashboardSettings;
use coopdash_device::{create_router, simulation, AppState, DeviceState};
use serde_json::json;

/// Find an available port for testing.
async fn find_available_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Start an emulator and return its base URL.
async fn start_device() -> (String, tokio::task::JoinHandle<()>) {
    let addr = find_available_port().await;
    let app = create_router(Arc::new(DeviceState::default()));

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{}", addr), handle)
}

/// Talks to a device state directly, so device and client share the
/// test clock.
struct InProcessDevice(AppState);

#[async_trait]
impl ParamsApi for InProcessDevice {
    async fn get_params(&self, query: &str) -> Result<ParameterSet, ApiError> {
        let names = query
            .split('&')
            .filter_map(|pair| pair.split_once('=').map(|(name, _)| name));
        Ok(self.0.registry.read().await.read_many(names))
    }

    async fn set_params(&self, params: &ParameterSet) -> Result<(), ApiError> {
        let errors = self.0.registry.write().await.write_many(params);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Status(400))
        }
    }
}

/// Serve `router` on an ephemeral port and return its base URL.
async fn start_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

fn app(api: Arc<dyn ParamsApi>) -> (AppContext, Arc<CollectingNotifier>) {
    let notifier = Arc::new(CollectingNotifier::new());
    let app = AppContext::new(
        api,
        notifier.clone(),
        Arc::new(MemoryStorage::new()),
        &DashboardSettings::default(),
    );
    (app, notifier)
}

#[tokio::test]
async fn test_read_selected_params() {
    let (url, _device) = start_device().await;
    let api = HttpParamsApi::new(url).unwrap();

    let params = api.get_params("MqttPort=&Bogus=").await.unwrap();
    assert_eq!(params.get("MqttPort"), Some(&json!(1883)));
    assert!(!params.contains_key("Bogus"));
}

#[tokio::test]
async fn test_pin_unlocks_privileged_routes() {
    let (url, _device) = start_device().await;
    let api = Arc::new(HttpParamsApi::new(url).unwrap());
    let (app, _) = app(api.clone());

    assert_eq!(app.start().await, AccessLevel::guest());
    assert!(app.navigate("/settings/motor").unwrap().is_redirect());

    let mut pin = ParameterSet::new();
    pin.insert("Pin".into(), json!(1234));
    api.set_params(&pin).await.unwrap();

    assert_eq!(app.refresh_access_level().await, AccessLevel::privileged());
    let nav = app.navigate("/settings/motor").unwrap();
    assert!(!nav.is_redirect());
    assert_eq!(nav.route().title(), Some("Settings / Drive"));

    app.shutdown().await;
}

#[tokio::test]
async fn test_view_edit_and_submit() {
    let (url, _device) = start_device().await;
    let api = Arc::new(HttpParamsApi::new(url).unwrap());
    let (app, notifier) = app(api.clone());
    app.start().await;

    let route = app.navigate("/mqtt/settings").unwrap().route().clone();
    let view = app
        .mount_view(route, ViewOptions::new(["MqttHost", "MqttPort", "MqttUser"]))
        .await;
    let client = view.client().clone();
    assert!(!client.is_loading());
    assert_eq!(client.get("MqttPort"), Some(json!(1883)));

    client.set_param("MqttHost", "broker.local");
    client.set_param("MqttPort", 8883);
    assert!(client.has_changes());

    assert_eq!(client.submit().await, SubmitStatus::Invalid);
    client.set_form_valid(true);
    assert_eq!(client.submit().await, SubmitStatus::Saved);
    assert!(!client.has_changes());
    assert_eq!(client.get("MqttPort"), Some(json!(8883)));
    assert_eq!(notifier.notifications(), vec![Notification::Success(MSG_SAVED.to_string())]);

    view.unmount().await;
    app.shutdown().await;
}

#[tokio::test]
async fn test_rejected_write_keeps_edits() {
    let (url, _device) = start_device().await;
    let api = Arc::new(HttpParamsApi::new(url).unwrap());
    let (app, notifier) = app(api);

    let route = app.routes().resolve("/mqtt/settings").unwrap();
    let view = app.mount_view(route, ViewOptions::new(["MqttPort"])).await;
    let client = view.client().clone();

    client.set_param("MqttPort", 70000);
    assert_eq!(client.submit_subset(&["MqttPort"], true).await, SubmitStatus::Failed);
    assert!(client.has_changes());
    assert!(matches!(notifier.notifications().last(), Some(Notification::Error(_))));

    client.reset();
    assert_eq!(client.get("MqttPort"), Some(json!(1883)));
    view.unmount().await;
}

#[tokio::test]
async fn test_unreachable_device() {
    let addr = find_available_port().await;
    let api = Arc::new(
        HttpParamsApi::with_timeout(format!("http://{}", addr), Some(Duration::from_secs(2)))
            .unwrap(),
    );
    let (app, notifier) = app(api);

    assert_eq!(app.start().await, AccessLevel::guest());

    let client = app.parameter_client(ViewOptions::new(["DoorState"]));
    assert_eq!(client.fetch(false).await, FetchStatus::Failed);
    assert!(notifier.notifications().is_empty());
    assert_eq!(client.fetch(true).await, FetchStatus::Failed);
    assert_eq!(notifier.notifications().len(), 1);

    app.shutdown().await;
}

#[tokio::test]
async fn test_device_log() {
    let (url, _device) = start_device().await;
    let api = HttpParamsApi::new(url).unwrap();

    let page = api.get_log(0, 10).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.logs[0].message, "Device started");
}

#[tokio::test]
async fn test_plain_text_response_is_rejected() {
    let router = axum::Router::new().route(
        "/api/get_params",
        axum::routing::get(|| async { "DoorState=1" }),
    );
    let url = start_stub(router).await;
    let api = Arc::new(HttpParamsApi::new(url).unwrap());

    let err = api.get_params("DoorState=").await.unwrap_err();
    assert!(matches!(err, ApiError::UnexpectedContentType(ref ct) if ct.starts_with("text/plain")));

    let (app, notifier) = app(api);
    let client = app.parameter_client(ViewOptions::new(["DoorState"]));
    let before = client.original();

    assert_eq!(client.fetch(true).await, FetchStatus::Failed);
    assert_eq!(
        notifier.notifications(),
        vec![Notification::Error(MSG_LOAD_FAILED.to_string())]
    );
    assert_eq!(client.original(), before);
    assert!(client.is_loading());

    app.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_refresh_picks_up_expired_installer_access() {
    let state = Arc::new(DeviceState::default().with_access_timeout(Duration::from_secs(60)));
    state.registry.write().await.write("Pin", &json!(1234)).unwrap();
    let _simulation = simulation::spawn(state.clone(), Duration::from_secs(1));

    let (app, _) = app(Arc::new(InProcessDevice(state)));
    assert_eq!(app.start().await.as_str(), "1");

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(app.access_level().as_str(), "1");
    assert!(!app.navigate("/settings/motor").unwrap().is_redirect());

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert_eq!(app.access_level().as_str(), "0");
    assert_eq!(app.store().persisted(), Some(AccessLevel::guest()));
    assert!(app.navigate("/settings/motor").unwrap().is_redirect());

    app.shutdown().await;
}
