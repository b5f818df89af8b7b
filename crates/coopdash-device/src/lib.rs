//! # coopdash-device
//!
//! Device-side emulator for the coop door controller web API.
//!
//! This crate provides:
//! - `/api/get_params`, `/api/set_params` and `/api/get_log` with the
//!   firmware's semantics (silent omission of unknown names, `400` on any
//!   rejected write, PIN based privilege elevation)
//! - Static file serving for the dashboard build
//! - A background simulation that keeps the read-only status values moving
//!   and revokes installer access once it lapses
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coopdash_device::{create_router, DeviceState};
//!
//! let state = DeviceState::shared(ParameterRegistry::coop_controller());
//! let app = create_router(state.clone());
//!
//! let listener = TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod routes;
pub mod simulation;

pub use routes::create_router;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use coopdash_core::log::{DeviceLog, LogLevel, DEFAULT_LOG_CAPACITY};
use coopdash_core::registry::INSTALLER_ACCESS_TIMEOUT;
use coopdash_core::ParameterRegistry;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Shared device state for all route handlers.
pub struct DeviceState {
    pub registry: RwLock<ParameterRegistry>,
    pub log: RwLock<DeviceLog>,
    /// Dashboard build served for non-API paths.
    pub static_dir: Option<PathBuf>,
    /// How long installer access lasts before the simulation revokes it.
    pub access_timeout: Duration,
    pub started: Instant,
}

impl DeviceState {
    pub fn new(registry: ParameterRegistry) -> Self {
        let mut log = DeviceLog::new(DEFAULT_LOG_CAPACITY);
        log.push(LogLevel::Info, "Device started");
        Self {
            registry: RwLock::new(registry),
            log: RwLock::new(log),
            static_dir: None,
            access_timeout: INSTALLER_ACCESS_TIMEOUT,
            started: Instant::now(),
        }
    }

    /// Serve the dashboard from `dir`.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn with_access_timeout(mut self, timeout: Duration) -> Self {
        self.access_timeout = timeout;
        self
    }

    pub fn shared(registry: ParameterRegistry) -> AppState {
        Arc::new(Self::new(registry))
    }

    /// Append to the device log.
    pub async fn record(&self, level: LogLevel, message: impl Into<String>) {
        self.log.write().await.push(level, message);
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(ParameterRegistry::coop_controller())
    }
}

/// Type alias for shared state in Axum handlers.
pub type AppState = Arc<DeviceState>;
