//! Simulated device activity.
//!
//! Keeps the read-only status parameters moving so live views have
//! something to poll: uptime, clock, ambient light and the door drive
//! reacting to `DoorCommand`.

use std::time::Duration;

use coopdash_core::log::LogLevel;
use coopdash_core::ParameterRegistry;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::AppState;

/// `DoorState` values.
pub const DOOR_CLOSED: i64 = 0;
pub const DOOR_OPEN: i64 = 1;
pub const DOOR_OPENING: i64 = 2;
pub const DOOR_CLOSING: i64 = 3;

/// `DoorCommand` values.
pub const CMD_NONE: i64 = 0;
pub const CMD_OPEN: i64 = 1;
pub const CMD_CLOSE: i64 = 2;

/// Door travel per tick, in percent.
const DOOR_STEP_PCT: i64 = 25;

fn int(registry: &ParameterRegistry, name: &str) -> i64 {
    registry.read(name).and_then(|v| v.as_i64()).unwrap_or_default()
}

fn set(registry: &mut ParameterRegistry, name: &str, value: Value) {
    if let Err(e) = registry.set_value(name, value) {
        debug!("Simulation skipped {}: {}", name, e);
    }
}

/// Advance the simulation by one tick.
///
/// `uptime` is time since the device started. Returns the messages to
/// record in the device log.
pub fn step(
    registry: &mut ParameterRegistry,
    uptime: Duration,
    access_timeout: Duration,
) -> Vec<String> {
    let mut events = Vec::new();
    if registry.expire_privilege(uptime, access_timeout) {
        events.push("Installer access expired".to_string());
    }

    let secs = uptime.as_secs();
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let light = (50.0 + 50.0 * (secs as f64 / 60.0).sin()).round() as i64;
    set(registry, "Uptime_s", Value::from(secs));
    set(registry, "DateTime", Value::from(now));
    set(registry, "Light_pct", Value::from(light));

    let command = int(registry, "DoorCommand");
    let position = int(registry, "DoorPosition_pct");
    let (target, moving) = match command {
        CMD_OPEN => (100, DOOR_OPENING),
        CMD_CLOSE => (0, DOOR_CLOSING),
        _ => return events,
    };

    let next = if target > position {
        (position + DOOR_STEP_PCT).min(target)
    } else {
        (position - DOOR_STEP_PCT).max(target)
    };
    set(registry, "DoorPosition_pct", Value::from(next));

    if next == target {
        let done = if target == 100 { DOOR_OPEN } else { DOOR_CLOSED };
        set(registry, "DoorState", Value::from(done));
        set(registry, "DoorCommand", Value::from(CMD_NONE));
        events.push(if done == DOOR_OPEN { "Door opened" } else { "Door closed" }.to_string());
    } else {
        set(registry, "DoorState", Value::from(moving));
    }
    events
}

/// Run the simulation once per `period` for the life of the process.
pub fn spawn(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let uptime = state.started.elapsed();
            let events = step(&mut *state.registry.write().await, uptime, state.access_timeout);
            for message in events {
                debug!("{}", message);
                state.record(LogLevel::Info, message).await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use coopdash_core::registry::{DEFAULT_SERVICE_PIN, INSTALLER_ACCESS_TIMEOUT, PIN_PARAM};
    use serde_json::json;

    fn tick(registry: &mut ParameterRegistry, secs: u64) -> Vec<String> {
        step(registry, Duration::from_secs(secs), INSTALLER_ACCESS_TIMEOUT)
    }

    #[test]
    fn test_status_values_advance() {
        let mut registry = ParameterRegistry::coop_controller();
        assert!(tick(&mut registry, 42).is_empty());
        assert_eq!(registry.read("Uptime_s"), Some(json!(42)));
        assert!(registry.read("DateTime").unwrap().as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_door_opens_over_several_ticks() {
        let mut registry = ParameterRegistry::coop_controller();
        registry.write("DoorCommand", &json!(CMD_OPEN)).unwrap();

        for secs in 1..4 {
            assert!(tick(&mut registry, secs).is_empty());
            assert_eq!(registry.read("DoorState"), Some(json!(DOOR_OPENING)));
        }
        assert_eq!(tick(&mut registry, 4), vec!["Door opened".to_string()]);
        assert_eq!(registry.read("DoorPosition_pct"), Some(json!(100)));
        assert_eq!(registry.read("DoorState"), Some(json!(DOOR_OPEN)));
        assert_eq!(registry.read("DoorCommand"), Some(json!(CMD_NONE)));
    }

    #[test]
    fn test_installer_access_lapses() {
        let mut registry = ParameterRegistry::coop_controller();
        registry.write(PIN_PARAM, &json!(DEFAULT_SERVICE_PIN)).unwrap();

        assert!(tick(&mut registry, 10).is_empty());
        assert!(tick(&mut registry, 609).is_empty());
        assert_eq!(registry.read("AccessLvl"), Some(json!(1)));

        assert_eq!(tick(&mut registry, 610), vec!["Installer access expired".to_string()]);
        assert_eq!(registry.read("AccessLvl"), Some(json!(0)));
        assert!(registry.write("MotorSpeed_pct", &json!(50)).is_err());
    }
}
