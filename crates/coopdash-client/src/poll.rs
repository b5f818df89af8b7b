//! Per-view poll loop.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::param_client::ParameterClient;

/// A running poll loop. Dropping the handle stops it.
pub struct PollHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Start polling `client`.
    ///
    /// Each tick sleeps for the client's current poll interval, then does a
    /// silent fetch when the view is live. The period is re-read every tick,
    /// so changing it takes effect from the next reschedule. The loop stops
    /// when the handle is stopped or the client is torn down.
    pub fn start(client: Arc<ParameterClient>) -> Self {
        let cancel = client.cancel_token().child_token();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                let delay = client.poll_interval();
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                if !client.is_live() {
                    continue;
                }
                trace!("Poll tick");
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = client.fetch(false) => {}
                }
            }
            debug!("Poll loop stopped");
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stop the loop and wait for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self.task.as_ref().map_or(false, |task| !task.is_finished())
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
