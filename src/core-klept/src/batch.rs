//! Bounded-concurrency batch runner.
//!
//! A fixed pool of workers pulls URLs from one shared queue and runs one job at a
//! time each. Failures are recorded, never propagated, so every URL ends up with
//! an outcome. A panicking job is reported as a failure of its own URL and the
//! worker moves on to the next one.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::job::JobOutcome;

/// Outcomes of every URL in a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn outcomes(&self) -> &[JobOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<JobOutcome> {
        self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Tokens consumed by all successful jobs.
    pub fn total_tokens(&self) -> u64 {
        self.outcomes.iter().map(|o| u64::from(o.tokens_consumed())).sum()
    }
}

/// Runs `job` for every URL with at most `max(concurrency, 1)` jobs in flight.
///
/// Returns once every URL has an outcome. After `cancel` fires, workers stop starting
/// jobs and each remaining URL is reported as cancelled.
pub async fn run<J, Fut>(urls: Vec<Url>, concurrency: usize, cancel: CancellationToken, job: J) -> BatchReport
where
    J: Fn(Url) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = JobOutcome> + Send + 'static,
{
    let workers = concurrency.max(1);
    tracing::info!("Running {} jobs on {} workers", urls.len(), workers);

    let (sender, receiver) = mpsc::unbounded_channel::<(usize, Url)>();
    for queued in urls.iter().cloned().enumerate() {
        // the receiver is still alive, so sending cannot fail
        let _ = sender.send(queued);
    }
    drop(sender);

    let queue = Arc::new(Mutex::new(receiver));
    let job = Arc::new(job);
    let (done, mut finished) = mpsc::unbounded_channel::<(usize, JobOutcome)>();

    let mut pool = JoinSet::new();
    for worker in 0..workers {
        let queue = queue.clone();
        let job = job.clone();
        let cancel = cancel.clone();
        let done = done.clone();
        pool.spawn(async move {
            loop {
                // The lock is released before the job runs so other workers can dequeue.
                let next = queue.lock().await.recv().await;
                let Some((index, url)) = next else {
                    break;
                };
                let outcome = if cancel.is_cancelled() {
                    tracing::warn!("[SKIP] [url: {}] Not started: run was cancelled", url);
                    JobOutcome::cancelled(url)
                } else {
                    tracing::debug!("Worker {} picked up '{}'", worker, url);
                    match AssertUnwindSafe((*job)(url.clone())).catch_unwind().await {
                        Ok(outcome) => outcome,
                        Err(panic) => {
                            let message = panic_message(panic.as_ref());
                            tracing::error!("[SKIP] [url: {}] Job panicked: {}", url, message);
                            JobOutcome::panicked(url, message)
                        }
                    }
                };
                // the collector holds the receiver until every worker has exited
                let _ = done.send((index, outcome));
            }
        });
    }
    drop(done);

    while let Some(joined) = pool.join_next().await {
        if let Err(error) = joined {
            tracing::error!("[SKIP] Batch worker terminated abnormally: {}", error);
        }
    }

    let mut outcomes: Vec<Option<JobOutcome>> = urls.iter().map(|_| None).collect();
    while let Some((index, outcome)) = finished.recv().await {
        outcomes[index] = Some(outcome);
    }

    BatchReport {
        outcomes: outcomes
            .into_iter()
            .zip(urls)
            .map(|(outcome, url)| {
                outcome.unwrap_or_else(|| {
                    tracing::error!("[SKIP] [url: {}] No outcome reported by its worker", url);
                    JobOutcome::panicked(url, "worker stopped before reporting")
                })
            })
            .collect(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
