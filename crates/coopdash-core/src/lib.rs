//! # coopdash-core
//!
//! Core model of the coop door controller dashboard.
//!
//! This crate provides:
//! - Parameter sets and their dirty tracking (working copy vs. synced snapshot)
//! - Access levels and the route table with its access guard
//! - Client-side form validation rules
//! - Durable client storage and dashboard settings
//! - The device-side parameter registry and system log
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! so both the client and the device emulator build on it.

pub mod access;
pub mod config;
pub mod log;
pub mod params;
pub mod registry;
pub mod routes;
pub mod validation;

pub use access::AccessLevel;
pub use config::{ClientStorage, ConfigError, DashboardSettings, ResponseOrdering, ThemePreference};
pub use params::{ParamState, ParameterSet};
pub use registry::ParameterRegistry;
pub use routes::{Navigation, RouteTable};
