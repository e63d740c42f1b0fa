// Start/stop lifecycle for background periodic tasks.

use std::future::Future;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A spawned task that runs until `stop` is called (or it returns on its own).
pub struct TaskHandle {
    name: &'static str,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawns `task` with the receiving half of its shutdown channel.
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(task(shutdown_rx));
        tracing::debug!(task = name, "task started");
        Self {
            name,
            shutdown_tx: Some(shutdown_tx),
            join,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signals shutdown and waits for the task to finish its current iteration.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        match self.join.await {
            Ok(()) => tracing::debug!(task = self.name, "task stopped"),
            Err(e) => tracing::warn!(task = self.name, error = %e, "task ended abnormally"),
        }
    }
}
