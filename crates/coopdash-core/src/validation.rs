//! Client-side form validation.
//!
//! Rules run against the working parameter set before a submit. A failing
//! form blocks the submit entirely; nothing is sent to the device.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::params::ParameterSet;

/// Dotted IPv4 or full eight-group IPv6.
const IP_ADDRESS_PATTERN: &str = r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$|^([0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}$";

fn ip_address_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IP_ADDRESS_PATTERN).expect("Invalid IP address pattern"))
}

/// A single field rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Field must be present and not empty, zero or false.
    Required,
    /// Field must be an IPv4 or IPv6 address.
    IpAddress,
}

impl Rule {
    /// Check a value, returning the message to show when it fails.
    pub fn check(&self, value: Option<&Value>) -> Result<(), &'static str> {
        match self {
            Rule::Required => {
                if is_filled(value) {
                    Ok(())
                } else {
                    Err("This field is required.")
                }
            }
            Rule::IpAddress => {
                let text = match value {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                if ip_address_regex().is_match(&text) {
                    Ok(())
                } else {
                    Err("Invalid IP address.")
                }
            }
        }
    }
}

fn is_filled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Rules attached to the fields of one form.
#[derive(Debug, Clone, Default)]
pub struct FormRules {
    fields: BTreeMap<String, Vec<Rule>>,
}

impl FormRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach rules to a field.
    pub fn field(mut self, name: &str, rules: &[Rule]) -> Self {
        self.fields
            .entry(name.to_string())
            .or_default()
            .extend_from_slice(rules);
        self
    }

    /// Run every rule against `params`.
    pub fn validate(&self, params: &ParameterSet) -> FormReport {
        let mut errors = BTreeMap::new();
        for (name, rules) in &self.fields {
            let value = params.get(name);
            let messages: Vec<&'static str> = rules
                .iter()
                .filter_map(|rule| rule.check(value).err())
                .collect();
            if !messages.is_empty() {
                errors.insert(name.clone(), messages);
            }
        }
        FormReport { errors }
    }
}

/// Validation result for a form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormReport {
    errors: BTreeMap<String, Vec<&'static str>>,
}

impl FormReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages for one field, empty when it passed.
    pub fn errors_for(&self, field: &str) -> &[&'static str] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<&'static str>> {
        &self.errors
    }
}
