//! Access level model.
//!
//! The device reports the viewer's permission tier in the `AccessLvl`
//! parameter. The client caches it as text, exactly as received, and only
//! uses it to decide which views to show. The device stays the authority
//! for what may actually be written.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Device parameter carrying the current access level.
pub const ACCESS_LEVEL_PARAM: &str = "AccessLvl";

/// Query selecting only the access level parameter.
pub const ACCESS_LEVEL_QUERY: &str = "AccessLvl=";

/// Guest tier.
pub const GUEST: u16 = 0;

/// Privileged (service) tier.
pub const PRIVILEGED: u16 = 1;

/// A cached access level.
///
/// Stored unvalidated; comparisons interpret the text numerically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessLevel(String);

impl AccessLevel {
    /// Wrap a raw stored value.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The guest level, `"0"`.
    pub fn guest() -> Self {
        Self::from(GUEST)
    }

    /// The privileged level, `"1"`.
    pub fn privileged() -> Self {
        Self::from(PRIVILEGED)
    }

    /// Convert a JSON field from a device response.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Self(s.clone()),
            other => Self(other.to_string()),
        }
    }

    /// Extract the level from a `get_params` response, if the field exists.
    pub fn from_response(response: &serde_json::Map<String, Value>) -> Option<Self> {
        response.get(ACCESS_LEVEL_PARAM).map(Self::from_json)
    }

    /// The raw stored text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric interpretation of the stored text.
    ///
    /// Surrounding whitespace is ignored and blank text counts as zero.
    /// Returns `None` when the text is not a number.
    pub fn numeric(&self) -> Option<f64> {
        let trimmed = self.0.trim();
        if trimmed.is_empty() {
            return Some(0.0);
        }
        trimmed.parse::<f64>().ok()
    }

    /// Exact-match comparison against a route requirement.
    ///
    /// A level 2 viewer does not satisfy a level 1 requirement.
    pub fn satisfies(&self, required: u16) -> bool {
        self.numeric() == Some(f64::from(required))
    }

    /// True for the privileged tier.
    pub fn is_privileged(&self) -> bool {
        self.satisfies(PRIVILEGED)
    }
}

impl Default for AccessLevel {
    fn default() -> Self {
        Self::guest()
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for AccessLevel {
    fn from(level: u16) -> Self {
        Self(level.to_string())
    }
}

impl From<&str> for AccessLevel {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for AccessLevel {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_is_guest() {
        assert_eq!(AccessLevel::default().as_str(), "0");
    }

    #[test]
    fn test_from_json_number_and_string() {
        assert_eq!(AccessLevel::from_json(&json!(1)).as_str(), "1");
        assert_eq!(AccessLevel::from_json(&json!("1")).as_str(), "1");
    }

    #[test]
    fn test_from_response_missing_field() {
        let response = serde_json::Map::new();
        assert!(AccessLevel::from_response(&response).is_none());
    }

    #[test]
    fn test_loose_comparison() {
        assert!(AccessLevel::new("1").satisfies(1));
        assert!(AccessLevel::new(" 1 ").satisfies(1));
        assert!(AccessLevel::new("1.0").satisfies(1));
        assert!(!AccessLevel::new("0").satisfies(1));
        assert!(!AccessLevel::new("abc").satisfies(1));
        assert!(AccessLevel::new("").satisfies(0));
    }

    #[test]
    fn test_exact_match_not_threshold() {
        assert!(!AccessLevel::from(2).satisfies(1));
    }

    #[test]
    fn test_serde_transparent() {
        let level: AccessLevel = serde_json::from_str("\"1\"").unwrap();
        assert!(level.is_privileged());
        assert_eq!(serde_json::to_string(&level).unwrap(), "\"1\"");
    }
}
