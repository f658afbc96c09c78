use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle over the background loops (reminder ticker, dispatcher listener).
/// - 各ループは `watch::Receiver<bool>` を受け取り、true か sender の drop で止まる
/// - `shutdown_and_join()` で全ループの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl Default for WorkerGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerGroup {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            joins: Vec::new(),
        }
    }

    /// Spawn one loop. It gets its own receiver of the shutdown signal.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, f: F)
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let rx = self.shutdown_tx.subscribe();
        let fut = f(rx);
        self.joins.push(tokio::spawn(async move {
            fut.await;
            tracing::debug!(worker = name, "worker stopped");
        }));
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Request shutdown for all loops.
    /// Work already in progress (a scan, a batch being mailed) runs to
    /// completion; no new work is picked up.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all loops.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            if let Err(e) = j.await {
                tracing::error!(error = %e, "worker panicked");
            }
        }
    }
}

/// Resolves once shutdown is requested or the group is gone.
pub async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
