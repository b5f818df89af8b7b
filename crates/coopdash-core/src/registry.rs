//! Device parameter registry.
//!
//! The device side of `/api/get_params` and `/api/set_params`. Every
//! parameter has a definition (kind, limits, direction, privilege) and a
//! current value. Reads silently skip unknown or write-only names; writes
//! are checked against the definition and the active privilege.
//!
//! Writing the PIN parameter switches privilege: the service PIN elevates
//! the session to installer level and sets `AccessLvl` to 1, anything else
//! drops it back to public and 0. Installer access lapses once it has been
//! held for [`INSTALLER_ACCESS_TIMEOUT`], see
//! [`ParameterRegistry::expire_privilege`].

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::access::{ACCESS_LEVEL_PARAM, GUEST, PRIVILEGED};
use crate::params::ParameterSet;

/// Parameter that receives PIN entry.
pub const PIN_PARAM: &str = "Pin";

/// Parameter holding the service PIN itself.
pub const SERVICE_PIN_PARAM: &str = "ServicePin";

/// Service PIN used when none is configured.
pub const DEFAULT_SERVICE_PIN: i64 = 1234;

/// How long installer access lasts after PIN entry.
pub const INSTALLER_ACCESS_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Value type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Integer within `[min, max]`.
    Int,
    /// String whose length is within `[min, max]`.
    Str,
}

/// Which way a parameter may be accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    ReadWrite,
    Write,
}

impl Direction {
    fn readable(&self) -> bool {
        matches!(self, Direction::Read | Direction::ReadWrite)
    }

    fn writable(&self) -> bool {
        matches!(self, Direction::Write | Direction::ReadWrite)
    }
}

/// Privilege needed to modify a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Privilege {
    Public,
    Installer,
}

/// Definition of one device parameter.
#[derive(Debug, Clone)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParamKind,
    pub default: Value,
    pub min: i64,
    pub max: i64,
    pub direction: Direction,
    pub privilege: Privilege,
}

impl ParameterDef {
    /// Read-write public integer.
    pub fn int(name: &str, default: i64, min: i64, max: i64) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Int,
            default: Value::from(default),
            min,
            max,
            direction: Direction::ReadWrite,
            privilege: Privilege::Public,
        }
    }

    /// Read-write public string of at most `max_len` characters.
    pub fn string(name: &str, default: &str, max_len: i64) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Str,
            default: Value::from(default),
            min: 0,
            max: max_len,
            direction: Direction::ReadWrite,
            privilege: Privilege::Public,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.direction = Direction::Read;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.direction = Direction::Write;
        self
    }

    pub fn installer(mut self) -> Self {
        self.privilege = Privilege::Installer;
        self
    }

    /// Check and normalize a value against kind and limits.
    fn coerce(&self, value: &Value) -> Result<Value, RegistryError> {
        match self.kind {
            ParamKind::Int => {
                let n = match value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    Value::Bool(b) => Some(i64::from(*b)),
                    _ => None,
                }
                .ok_or_else(|| RegistryError::TypeMismatch(self.name.clone()))?;
                if n < self.min || n > self.max {
                    return Err(RegistryError::OutOfRange {
                        name: self.name.clone(),
                        min: self.min,
                        max: self.max,
                    });
                }
                Ok(Value::from(n))
            }
            ParamKind::Str => {
                let s = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err(RegistryError::TypeMismatch(self.name.clone())),
                };
                let len = s.chars().count() as i64;
                if len < self.min || len > self.max {
                    return Err(RegistryError::OutOfRange {
                        name: self.name.clone(),
                        min: self.min,
                        max: self.max,
                    });
                }
                Ok(Value::String(s))
            }
        }
    }
}

/// Errors that can occur when writing a parameter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown parameter {0}")]
    Unknown(String),
    #[error("Parameter {0} is read-only")]
    NotWritable(String),
    #[error("Parameter {0} requires installer privilege")]
    Privilege(String),
    #[error("Parameter {0} has the wrong type")]
    TypeMismatch(String),
    #[error("Parameter {name} out of range [{min}, {max}]")]
    OutOfRange { name: String, min: i64, max: i64 },
    #[error("Wrong PIN")]
    WrongPin,
}

/// Parameter definitions and current values of one device.
#[derive(Debug, Clone)]
pub struct ParameterRegistry {
    defs: Vec<ParameterDef>,
    index: HashMap<String, usize>,
    values: HashMap<String, Value>,
    active: Privilege,
    /// Device time at which installer access was first seen.
    elevated_at: Option<Duration>,
}

impl ParameterRegistry {
    /// Build a registry with every parameter at its default.
    pub fn new(defs: Vec<ParameterDef>) -> Self {
        let index = defs
            .iter()
            .enumerate()
            .map(|(i, def)| (def.name.clone(), i))
            .collect();
        let values = defs
            .iter()
            .map(|def| (def.name.clone(), def.default.clone()))
            .collect();
        Self {
            defs,
            index,
            values,
            active: Privilege::Public,
            elevated_at: None,
        }
    }

    /// Parameter table of the coop door controller.
    pub fn coop_controller() -> Self {
        Self::new(vec![
            // Access
            ParameterDef::int(ACCESS_LEVEL_PARAM, i64::from(GUEST), 0, 1).read_only(),
            ParameterDef::int(PIN_PARAM, 0, 0, 9999).write_only(),
            ParameterDef::int(SERVICE_PIN_PARAM, DEFAULT_SERVICE_PIN, 0, 9999)
                .write_only()
                .installer(),
            // Door status
            ParameterDef::int("DoorState", 0, 0, 11).read_only(),
            ParameterDef::int("DoorPosition_pct", 0, 0, 100).read_only(),
            ParameterDef::int("MotorCurrent_mA", 0, 0, 2000).read_only(),
            ParameterDef::int("Temperature_C", 20, -100, 100).read_only(),
            ParameterDef::int("Light_pct", 0, 0, 100).read_only(),
            ParameterDef::int("ErrorCode", 0, 0, 32).read_only(),
            ParameterDef::int("DoorCommand", 0, 0, 2),
            // Automation
            ParameterDef::int("OpenMode", 0, 0, 2),
            ParameterDef::int("CloseMode", 0, 0, 2),
            ParameterDef::string("OpenTime", "06:30", 5),
            ParameterDef::string("CloseTime", "20:30", 5),
            ParameterDef::int("OpenLight_pct", 30, 0, 100),
            ParameterDef::int("CloseLight_pct", 10, 0, 100),
            // Drive
            ParameterDef::int("MotorMaxCurrent_mA", 800, 0, 2000).installer(),
            ParameterDef::int("MotorSpeed_pct", 80, 0, 100).installer(),
            ParameterDef::int("OpenPosition_puls", 150, 0, 300).installer(),
            // WiFi
            ParameterDef::string("WiFiHostname", "coop", 32),
            ParameterDef::string("WiFiSsid", "", 32),
            ParameterDef::string("WiFiPassword", "", 64).write_only(),
            ParameterDef::string("WiFiIp", "0.0.0.0", 45).read_only(),
            ParameterDef::int("WiFiRssi", 0, -127, 0).read_only(),
            // MQTT
            ParameterDef::string("MqttHost", "", 64),
            ParameterDef::int("MqttPort", 1883, 1, 65535),
            ParameterDef::string("MqttUser", "", 32),
            ParameterDef::string("MqttPassword", "", 64).write_only(),
            ParameterDef::int("MqttConnected", 0, 0, 1).read_only(),
            // Date and time
            ParameterDef::string("DateTime", "", 32).read_only(),
            ParameterDef::string("TimeZone", "CET-1CEST,M3.5.0,M10.5.0/3", 64).installer(),
            ParameterDef::string("NtpServer", "pool.ntp.org", 64).installer(),
            // System
            ParameterDef::string("FwVersion", env!("CARGO_PKG_VERSION"), 16).read_only(),
            ParameterDef::int("Uptime_s", 0, 0, i64::MAX).read_only(),
        ])
    }

    /// Look up a definition.
    pub fn def(&self, name: &str) -> Option<&ParameterDef> {
        self.index.get(name).map(|&i| &self.defs[i])
    }

    /// All definitions in table order.
    pub fn defs(&self) -> &[ParameterDef] {
        &self.defs
    }

    /// Currently active privilege.
    pub fn privilege(&self) -> Privilege {
        self.active
    }

    /// Read one parameter, if it exists and is readable.
    pub fn read(&self, name: &str) -> Option<Value> {
        let def = self.def(name)?;
        if !def.direction.readable() {
            return None;
        }
        self.values.get(name).cloned()
    }

    /// Read every known, readable name; others are omitted.
    pub fn read_many<'a, I>(&self, names: I) -> ParameterSet
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter_map(|name| self.read(name).map(|v| (name.to_string(), v)))
            .collect()
    }

    /// Write one parameter through the access checks.
    pub fn write(&mut self, name: &str, value: &Value) -> Result<(), RegistryError> {
        let def = self
            .def(name)
            .ok_or_else(|| RegistryError::Unknown(name.to_string()))?;
        if !def.direction.writable() {
            return Err(RegistryError::NotWritable(name.to_string()));
        }
        if def.privilege > self.active {
            return Err(RegistryError::Privilege(name.to_string()));
        }
        let value = def.coerce(value)?;

        if name == PIN_PARAM {
            return self.enter_pin(value);
        }

        debug!("Parameter {} = {}", name, value);
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Write every pair, returning the failures.
    ///
    /// A failing pair does not stop the remaining ones.
    pub fn write_many(&mut self, params: &ParameterSet) -> Vec<RegistryError> {
        params
            .iter()
            .filter_map(|(name, value)| self.write(name, value).err())
            .collect()
    }

    /// Set a value directly, bypassing direction and privilege checks.
    ///
    /// Used for values the device itself produces (status, sensors).
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<(), RegistryError> {
        if self.def(name).is_none() {
            return Err(RegistryError::Unknown(name.to_string()));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Drop installer access once it has been held for `timeout`.
    ///
    /// `now` is device time (uptime). Called periodically; the hold time
    /// starts at the first call that sees installer access. Returns true
    /// when access was dropped by this call.
    pub fn expire_privilege(&mut self, now: Duration, timeout: Duration) -> bool {
        if self.active != Privilege::Installer {
            self.elevated_at = None;
            return false;
        }
        let since = *self.elevated_at.get_or_insert(now);
        if now.saturating_sub(since) < timeout {
            return false;
        }
        info!("Installer access expired after {:?}", timeout);
        self.drop_privilege();
        true
    }

    fn drop_privilege(&mut self) {
        self.active = Privilege::Public;
        self.elevated_at = None;
        self.values
            .insert(ACCESS_LEVEL_PARAM.to_string(), Value::from(GUEST));
    }

    fn enter_pin(&mut self, pin: Value) -> Result<(), RegistryError> {
        let service_pin = self
            .values
            .get(SERVICE_PIN_PARAM)
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_SERVICE_PIN);
        let granted = pin.as_i64() == Some(service_pin);
        self.values.insert(PIN_PARAM.to_string(), pin);

        if granted {
            info!("Service PIN accepted, installer access granted");
            self.active = Privilege::Installer;
            self.values
                .insert(ACCESS_LEVEL_PARAM.to_string(), Value::from(PRIVILEGED));
            return Ok(());
        }

        // An installer session may enter any PIN to log out.
        let was_installer = self.active == Privilege::Installer;
        info!("PIN rejected, access dropped to public");
        self.drop_privilege();
        if was_installer {
            Ok(())
        } else {
            Err(RegistryError::WrongPin)
        }
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::coop_controller()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> ParameterSet {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_read_many_skips_unknown_and_write_only() {
        let registry = ParameterRegistry::coop_controller();
        let out = registry.read_many(["MqttPort", "Nope", "WiFiPassword", "AccessLvl"]);
        assert_eq!(Value::Object(out), json!({"MqttPort": 1883, "AccessLvl": 0}));
    }

    #[test]
    fn test_write_checks_range_and_type() {
        let mut registry = ParameterRegistry::coop_controller();
        assert!(registry.write("MqttPort", &json!(8883)).is_ok());
        assert_eq!(registry.read("MqttPort"), Some(json!(8883)));

        assert!(matches!(
            registry.write("MqttPort", &json!(0)),
            Err(RegistryError::OutOfRange { .. })
        ));
        assert_eq!(
            registry.write("MqttPort", &json!({"x": 1})),
            Err(RegistryError::TypeMismatch("MqttPort".to_string()))
        );
        assert_eq!(registry.read("MqttPort"), Some(json!(8883)));
    }

    #[test]
    fn test_write_accepts_numeric_strings() {
        let mut registry = ParameterRegistry::coop_controller();
        registry.write("OpenMode", &json!("2")).unwrap();
        assert_eq!(registry.read("OpenMode"), Some(json!(2)));
    }

    #[test]
    fn test_string_length_limit() {
        let mut registry = ParameterRegistry::coop_controller();
        assert!(registry.write("OpenTime", &json!("07:15")).is_ok());
        assert!(registry.write("OpenTime", &json!("07:15:00")).is_err());
    }

    #[test]
    fn test_read_only_rejected() {
        let mut registry = ParameterRegistry::coop_controller();
        assert_eq!(
            registry.write("AccessLvl", &json!(1)),
            Err(RegistryError::NotWritable("AccessLvl".to_string()))
        );
    }

    #[test]
    fn test_installer_parameters_need_pin() {
        let mut registry = ParameterRegistry::coop_controller();
        assert_eq!(
            registry.write("MotorSpeed_pct", &json!(50)),
            Err(RegistryError::Privilege("MotorSpeed_pct".to_string()))
        );

        registry.write(PIN_PARAM, &json!(DEFAULT_SERVICE_PIN)).unwrap();
        assert_eq!(registry.privilege(), Privilege::Installer);
        assert_eq!(registry.read("AccessLvl"), Some(json!(1)));
        assert!(registry.write("MotorSpeed_pct", &json!(50)).is_ok());
    }

    #[test]
    fn test_wrong_pin_rejected_for_public_session() {
        let mut registry = ParameterRegistry::coop_controller();
        assert_eq!(registry.write(PIN_PARAM, &json!(1)), Err(RegistryError::WrongPin));
        assert_eq!(registry.privilege(), Privilege::Public);
        assert_eq!(registry.read("AccessLvl"), Some(json!(0)));
    }

    #[test]
    fn test_any_pin_logs_out_installer() {
        let mut registry = ParameterRegistry::coop_controller();
        registry.write(PIN_PARAM, &json!(DEFAULT_SERVICE_PIN)).unwrap();

        assert_eq!(registry.write(PIN_PARAM, &json!(1)), Ok(()));
        assert_eq!(registry.privilege(), Privilege::Public);
        assert_eq!(registry.read("AccessLvl"), Some(json!(0)));
    }

    #[test]
    fn test_installer_access_expires() {
        let mut registry = ParameterRegistry::coop_controller();
        let timeout = INSTALLER_ACCESS_TIMEOUT;
        assert!(!registry.expire_privilege(Duration::from_secs(5), timeout));

        registry.write(PIN_PARAM, &json!(DEFAULT_SERVICE_PIN)).unwrap();
        assert!(!registry.expire_privilege(Duration::from_secs(100), timeout));
        assert!(!registry.expire_privilege(Duration::from_secs(699), timeout));
        assert_eq!(registry.privilege(), Privilege::Installer);

        assert!(registry.expire_privilege(Duration::from_secs(700), timeout));
        assert_eq!(registry.privilege(), Privilege::Public);
        assert_eq!(registry.read("AccessLvl"), Some(json!(0)));
        assert!(!registry.expire_privilege(Duration::from_secs(701), timeout));

        // A fresh PIN entry starts a new hold period.
        registry.write(PIN_PARAM, &json!(DEFAULT_SERVICE_PIN)).unwrap();
        assert!(!registry.expire_privilege(Duration::from_secs(800), timeout));
        assert_eq!(registry.privilege(), Privilege::Installer);
    }

    #[test]
    fn test_changed_service_pin() {
        let mut registry = ParameterRegistry::coop_controller();
        registry.write(PIN_PARAM, &json!(DEFAULT_SERVICE_PIN)).unwrap();
        registry.write(SERVICE_PIN_PARAM, &json!(4321)).unwrap();

        assert!(registry.write(PIN_PARAM, &json!(DEFAULT_SERVICE_PIN)).is_err());
        assert!(registry.write(PIN_PARAM, &json!(4321)).is_ok());
    }

    #[test]
    fn test_write_many_continues_after_failure() {
        let mut registry = ParameterRegistry::coop_controller();
        let errors = registry.write_many(&object(json!({
            "MqttHost": "broker.local",
            "Nope": 1,
            "MqttPort": 1884
        })));
        assert_eq!(errors, vec![RegistryError::Unknown("Nope".to_string())]);
        assert_eq!(registry.read("MqttHost"), Some(json!("broker.local")));
        assert_eq!(registry.read("MqttPort"), Some(json!(1884)));
    }

    #[test]
    fn test_set_value_bypasses_direction() {
        let mut registry = ParameterRegistry::coop_controller();
        registry.set_value("Temperature_C", json!(-3)).unwrap();
        assert_eq!(registry.read("Temperature_C"), Some(json!(-3)));
        assert!(registry.set_value("Nope", json!(1)).is_err());
    }
}
