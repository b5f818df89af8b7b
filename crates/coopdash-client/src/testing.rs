//! In-memory device APIs for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use coopdash_core::ParameterSet;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::api::{ApiError, ParamsApi};

/// Device state in a map, with request counters and failure switches.
#[derive(Default)]
pub struct MockApi {
    device: Mutex<ParameterSet>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    failing: AtomicBool,
    hanging: AtomicBool,
    last_query: Mutex<Option<String>>,
    submitted: Mutex<Vec<ParameterSet>>,
}

impl MockApi {
    pub fn with_params(params: Value) -> Self {
        let device = match params {
            Value::Object(map) => map,
            _ => ParameterSet::new(),
        };
        Self {
            device: Mutex::new(device),
            ..Default::default()
        }
    }

    /// Every request fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Reads never complete.
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    /// Change a value on the "device" side.
    pub fn put(&self, key: &str, value: Value) {
        self.device.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<String> {
        self.last_query.lock().unwrap().clone()
    }

    /// Bodies of every `set_params` call, oldest first.
    pub fn submitted(&self) -> Vec<ParameterSet> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ParamsApi for MockApi {
    async fn get_params(&self, query: &str) -> Result<ParameterSet, ApiError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.to_string());

        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::Transport("connection refused".into()));
        }

        let device = self.device.lock().unwrap();
        let mut response = ParameterSet::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let key = pair.split('=').next().unwrap_or_default();
            if let Some(value) = device.get(key) {
                response.insert(key.to_string(), value.clone());
            }
        }
        Ok(response)
    }

    async fn set_params(&self, params: &ParameterSet) -> Result<(), ApiError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(params.clone());

        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::Status(500));
        }

        let mut device = self.device.lock().unwrap();
        for (key, value) in params {
            device.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

pub type Reply = oneshot::Sender<Result<Value, ApiError>>;

/// Reads wait until the test answers them, in whatever order it likes.
pub struct GatedApi {
    pending: mpsc::UnboundedSender<Reply>,
}

impl GatedApi {
    /// The receiver yields one reply handle per issued read.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Reply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { pending: tx }, rx)
    }
}

#[async_trait]
impl ParamsApi for GatedApi {
    async fn get_params(&self, _query: &str) -> Result<ParameterSet, ApiError> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .send(tx)
            .map_err(|_| ApiError::Transport("test harness gone".into()))?;
        match rx.await {
            Ok(Ok(Value::Object(map))) => Ok(map),
            Ok(Ok(other)) => Err(ApiError::Decode(other.to_string())),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ApiError::Transport("reply dropped".into())),
        }
    }

    async fn set_params(&self, _params: &ParameterSet) -> Result<(), ApiError> {
        Ok(())
    }
}
