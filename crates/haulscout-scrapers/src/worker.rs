//! Background scan queue.
//!
//! Jobs are sent to a single worker task over a bounded channel. The worker
//! runs up to `concurrency` jobs at a time and answers each submitter on a
//! oneshot channel, which the submitter may await or drop.

use crate::backhaul::suggest_backhaul;
use crate::scan::{run_criteria_scan, ScanPipeline, ScanReport};
use futures::FutureExt;
use haulscout_core::{Cipher, Database, HaulError, Result, SuggestedBackhaul, WorkerConfig};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanJob {
    /// Scan a stored criteria.
    Criteria(i64),
    /// Suggest return loads for a saved load.
    Backhaul(i64),
}

#[derive(Debug, Clone)]
pub enum JobOutcome {
    Scan(ScanReport),
    Backhaul(SuggestedBackhaul),
}

/// Everything a job needs.
pub struct ScanContext {
    pub db: Database,
    pub pipeline: Arc<ScanPipeline>,
    pub cipher: Cipher,
    pub backhaul_top_n: usize,
}

impl ScanContext {
    async fn execute(&self, job: ScanJob) -> Result<JobOutcome> {
        match job {
            ScanJob::Criteria(id) => run_criteria_scan(&self.db, &self.pipeline, &self.cipher, id)
                .await
                .map(JobOutcome::Scan),
            ScanJob::Backhaul(id) => {
                suggest_backhaul(&self.db, &self.pipeline, &self.cipher, id, self.backhaul_top_n)
                    .await
                    .map(JobOutcome::Backhaul)
            }
        }
    }
}

type Reply = oneshot::Sender<Result<JobOutcome>>;

pub struct ScanWorker;

impl ScanWorker {
    pub fn spawn(context: ScanContext, config: &WorkerConfig) -> ScanWorkerHandle {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let concurrency = config.concurrency.max(1);
        let task = tokio::spawn(run(Arc::new(context), receiver, concurrency));
        info!("Scan worker started (concurrency {})", concurrency);
        ScanWorkerHandle { sender, task }
    }
}

async fn run(context: Arc<ScanContext>, mut receiver: mpsc::Receiver<(ScanJob, Reply)>, concurrency: usize) {
    let permits = Arc::new(Semaphore::new(concurrency));
    let mut running = JoinSet::new();

    while let Some((job, reply)) = receiver.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let context = context.clone();
        running.spawn(async move {
            debug!("Starting {:?}", job);
            let outcome = context.execute(job).await;
            if let Err(e) = &outcome {
                warn!("{:?} failed: {}", job, e);
            }
            if reply.send(outcome).is_err() {
                debug!("Submitter of {:?} is no longer waiting", job);
            }
            drop(permit);
        });

        while let Some(Some(finished)) = running.join_next().now_or_never() {
            if let Err(e) = finished {
                warn!("Scan job aborted: {}", e);
            }
        }
    }

    while let Some(finished) = running.join_next().await {
        if let Err(e) = finished {
            warn!("Scan job aborted: {}", e);
        }
    }
    info!("Scan worker stopped");
}

pub struct ScanWorkerHandle {
    sender: mpsc::Sender<(ScanJob, Reply)>,
    task: JoinHandle<()>,
}

impl ScanWorkerHandle {
    /// Queues a job. Waits while the queue is full.
    pub async fn submit(&self, job: ScanJob) -> Result<oneshot::Receiver<Result<JobOutcome>>> {
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send((job, reply))
            .await
            .map_err(|_| HaulError::WorkerStopped)?;
        Ok(receiver)
    }

    /// Stops accepting jobs and waits for queued and running jobs to finish.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.task.await {
            warn!("Scan worker task failed: {}", e);
        }
    }
}

/// Waits for a submitted job's result.
pub async fn wait_for(receiver: oneshot::Receiver<Result<JobOutcome>>) -> Result<JobOutcome> {
    receiver.await.map_err(|_| HaulError::WorkerStopped)?
}
