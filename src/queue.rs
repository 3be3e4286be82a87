//! Per-category FIFO admission queue for browser operations.
//!
//! One [`SerialQueue`] exists per operation category (search, suggest,
//! content, graphic). All callers funnel through `enqueue`; a single worker
//! task drains jobs one at a time, so at most one browser operation of a
//! given category is ever in flight, regardless of how many callers submit
//! concurrently. Admission order is strict FIFO and there is no cancellation:
//! once submitted, a job runs to completion or failure.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::core::types::QueueStats;
use crate::error::ScrapeError;

type Job<T> = (
    oneshot::Sender<Result<T, ScrapeError>>,
    BoxFuture<'static, Result<T, ScrapeError>>,
);

pub struct SerialQueue<T> {
    label: &'static str,
    tx: mpsc::UnboundedSender<Job<T>>,
    pending: Arc<AtomicUsize>,
    processing: Arc<AtomicBool>,
}

impl<T: Send + 'static> SerialQueue<T> {
    /// Create the queue and spawn its worker. The worker lives for the life
    /// of the process; dropping the queue closes the channel and lets it
    /// drain out.
    pub fn new(label: &'static str) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<T>>();
        let pending = Arc::new(AtomicUsize::new(0));
        let processing = Arc::new(AtomicBool::new(false));

        let worker_pending = pending.clone();
        let worker_processing = processing.clone();
        tokio::spawn(async move {
            while let Some((reply, job)) = rx.recv().await {
                // Flip to processing before the pending count drops so an
                // observer never sees the queue momentarily empty and idle
                // while a job is about to run.
                worker_processing.store(true, Ordering::SeqCst);
                worker_pending.fetch_sub(1, Ordering::SeqCst);
                let out = job.await;
                worker_processing.store(false, Ordering::SeqCst);
                // Receiver may have been dropped; losing the result is fine.
                let _ = reply.send(out);
            }
            debug!("serial queue '{}' worker exited", label);
        });

        Self {
            label,
            tx,
            pending,
            processing,
        }
    }

    /// Submit a job without awaiting its result. Returns the receiver that
    /// resolves exactly once with the job's outcome.
    pub fn submit(
        &self,
        job: BoxFuture<'static, Result<T, ScrapeError>>,
    ) -> oneshot::Receiver<Result<T, ScrapeError>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send((reply_tx, job)).is_err() {
            // Worker gone; the dropped reply_tx makes reply_rx resolve with
            // RecvError, which enqueue maps below.
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        reply_rx
    }

    /// Submit a job and wait for its outcome in FIFO order.
    pub async fn enqueue(
        &self,
        job: BoxFuture<'static, Result<T, ScrapeError>>,
    ) -> Result<T, ScrapeError> {
        self.submit(job).await.map_err(|_| {
            ScrapeError::Browser(format!("task queue '{}' dropped the job", self.label))
        })?
    }

    /// Number of jobs admitted but not yet started.
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a job of this category is executing right now.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            size: self.len(),
            processing: self.is_processing(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn jobs_complete_in_submission_order() {
        let q = SerialQueue::<u32>::new("test-order");
        let log: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        let mut receivers = Vec::new();
        for i in 0..4u32 {
            let log = log.clone();
            receivers.push(q.submit(Box::pin(async move {
                // Later jobs sleep less; FIFO must still hold.
                tokio::time::sleep(Duration::from_millis(20 - 4 * i as u64)).await;
                log.lock().unwrap().push(i);
                Ok(i)
            })));
        }

        for (i, rx) in receivers.into_iter().enumerate() {
            assert_eq!(rx.await.unwrap().unwrap(), i as u32);
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn never_two_jobs_in_flight() {
        let q = SerialQueue::<()>::new("test-single-flight");
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut receivers = Vec::new();
        for _ in 0..6 {
            let active = active.clone();
            let max_seen = max_seen.clone();
            receivers.push(q.submit(Box::pin(async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })));
        }
        for rx in receivers {
            rx.await.unwrap().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stats_settle_to_idle() {
        let q = SerialQueue::<u8>::new("test-stats");
        let rx1 = q.submit(Box::pin(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(1)
        }));
        let rx2 = q.submit(Box::pin(async { Ok(2) }));
        // Second job is admitted but not started while the first runs.
        assert!(q.len() >= 1);

        rx1.await.unwrap().unwrap();
        rx2.await.unwrap().unwrap();
        assert_eq!(q.len(), 0);
        assert!(!q.is_processing());
        let stats = q.stats();
        assert_eq!(stats.size, 0);
        assert!(!stats.processing);
    }

    #[tokio::test]
    async fn errors_reach_the_submitter() {
        let q = SerialQueue::<u8>::new("test-errors");
        let out = q
            .enqueue(Box::pin(async {
                Err(ScrapeError::ElementNotFound("nothing".into()))
            }))
            .await;
        assert!(matches!(out, Err(ScrapeError::ElementNotFound(_))));
        // The queue keeps serving after a failed job.
        assert_eq!(q.enqueue(Box::pin(async { Ok(7) })).await.unwrap(), 7);
    }
}
