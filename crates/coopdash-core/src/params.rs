//! Parameter sets and their sync state.
//!
//! A parameter set is an untyped JSON object mapping parameter names to
//! scalar values. Its shape is whatever the device answers with. Every view
//! keeps two copies: the working `params` the user edits and the `original`
//! snapshot taken at the last successful sync with the device.

use serde_json::{Map, Value};

/// Untyped parameter object, as read from and written to the device.
pub type ParameterSet = Map<String, Value>;

/// Build the query string sent to `/api/get_params`.
///
/// Each key of `params` becomes one query field. The device only looks at
/// the field names; values are carried along stringified.
pub fn query_string(params: &ParameterSet) -> Result<String, serde_urlencoded::ser::Error> {
    let pairs: Vec<(&str, String)> = params
        .iter()
        .map(|(key, value)| (key.as_str(), query_value(value)))
        .collect();
    serde_urlencoded::to_string(pairs)
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Copy the listed keys out of `params`.
///
/// Keys missing from `params` are skipped, so the result never invents
/// fields the view does not own.
pub fn pick<S: AsRef<str>>(params: &ParameterSet, keys: &[S]) -> ParameterSet {
    let mut subset = ParameterSet::new();
    for key in keys {
        let key = key.as_ref();
        if let Some(value) = params.get(key) {
            subset.insert(key.to_string(), value.clone());
        }
    }
    subset
}

/// Working copy plus last-synced snapshot of one parameter slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamState {
    /// Live, editable values.
    params: ParameterSet,
    /// Snapshot from the last successful fetch or submit.
    original: ParameterSet,
}

impl ParamState {
    /// Start from an initial parameter object; the snapshot equals it.
    pub fn new(initial: ParameterSet) -> Self {
        Self {
            original: initial.clone(),
            params: initial,
        }
    }

    /// Start from a list of parameter names with empty values.
    ///
    /// The names act as the selector for the first fetch.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let initial = keys
            .into_iter()
            .map(|k| (k.into(), Value::String(String::new())))
            .collect();
        Self::new(initial)
    }

    /// The working copy.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    /// The last synced snapshot.
    pub fn original(&self) -> &ParameterSet {
        &self.original
    }

    /// Get a working value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Edit a working value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.params.insert(key.into(), value)
    }

    /// Whether the working copy has no keys (nothing to select on).
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// True when the working copy differs structurally from the snapshot.
    pub fn has_changes(&self) -> bool {
        self.params != self.original
    }

    /// Accept a device response as the new working copy and snapshot.
    pub fn sync(&mut self, response: ParameterSet) {
        self.original = response.clone();
        self.params = response;
    }

    /// Discard working edits.
    pub fn reset(&mut self) {
        self.params = self.original.clone();
    }

    /// Query string selecting the current keys.
    pub fn query(&self) -> Result<String, serde_urlencoded::ser::Error> {
        query_string(&self.params)
    }

    /// Working values restricted to `keys`.
    pub fn subset<S: AsRef<str>>(&self, keys: &[S]) -> ParameterSet {
        pick(&self.params, keys)
    }
}
