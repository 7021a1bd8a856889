//! Running stage workers side by side.

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::stages::{StageHandler, StageWorker};

/// A group of spawned stage workers sharing one shutdown signal.
pub struct WorkerSet {
    shutdown: CancellationToken,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl Default for WorkerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerSet {
    pub fn new() -> Self {
        Self::with_shutdown(CancellationToken::new())
    }

    /// Workers stop when `shutdown` (or [`WorkerSet::shutdown`]) fires.
    pub fn with_shutdown(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    pub fn spawn<H: StageHandler>(&mut self, worker: StageWorker<H>) {
        let label = format!("{}:{}", worker.stage(), worker.worker_id());
        let token = self.shutdown.child_token();
        self.handles.push((label, tokio::spawn(worker.run(token))));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait for every worker to exit without signalling them.
    pub async fn join(self) {
        let (labels, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();
        for (label, result) in labels.into_iter().zip(join_all(handles).await) {
            if let Err(e) = result {
                error!(worker = %label, error = %e, "worker task panicked");
            }
        }
    }

    /// Signal every worker and wait for them to finish their current job.
    pub async fn shutdown(self) {
        info!(workers = self.handles.len(), "stopping stage workers");
        self.shutdown.cancel();
        self.join().await;
    }
}
