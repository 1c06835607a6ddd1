//! Bounded worker pool for transcode jobs.
//!
//! Each job runs one blocking transcode on a pool worker with its own
//! demuxer, muxer and codec set; nothing is shared between concurrent
//! transcodes. The pool is an explicit object owned by the caller.

use crate::listener::TranscodeListener;
use crate::options::TranscodeOptions;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use squeeze_core::{CancelToken, Error};
use squeeze_engine::TranscoderEngine;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Maximum queued-but-not-started jobs.
const JOB_QUEUE_CAPACITY: usize = 64;

/// Terminal state of one job.
#[derive(Debug)]
pub enum JobOutcome {
    /// The transcode completed and the output container is valid.
    Completed,
    /// The job was canceled through its [`JobHandle`].
    Canceled,
    /// The transcode failed.
    Failed(Error),
}

/// Handle to one submitted job.
pub struct JobHandle {
    cancel: CancelToken,
    progress: Arc<Mutex<f64>>,
    outcome: Receiver<JobOutcome>,
}

impl JobHandle {
    /// Request cancellation. The job observes the request at its next
    /// suspension point and finishes as [`JobOutcome::Canceled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Latest progress reported by the job, negative when indeterminate.
    pub fn progress(&self) -> f64 {
        *self.progress.lock()
    }

    /// Block until the job reaches a terminal state.
    pub fn join(self) -> JobOutcome {
        self.outcome.recv().unwrap_or_else(|_| {
            JobOutcome::Failed(Error::Shutdown(
                "worker thread terminated before completing the job".into(),
            ))
        })
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A bounded pool of transcode workers.
pub struct TranscodePool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl TranscodePool {
    /// Create a pool with the given number of workers.
    pub fn new(workers: usize) -> Self {
        let worker_count = workers.max(1);
        let (sender, receiver) = bounded::<Job>(JOB_QUEUE_CAPACITY);
        let workers = (0..worker_count)
            .map(|index| {
                let receiver: Receiver<Job> = receiver.clone();
                thread::Builder::new()
                    .name(format!("squeeze-worker-{index}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
                    .expect("failed to spawn transcode worker")
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Create a pool sized to the machine's available parallelism.
    pub fn with_default_workers() -> Self {
        let workers = thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::new(workers)
    }

    /// Submit one transcode job. The listener's callbacks run on the worker
    /// thread executing the job.
    pub fn submit(
        &self,
        options: TranscodeOptions,
        listener: Arc<dyn TranscodeListener>,
    ) -> JobHandle {
        let cancel = CancelToken::new();
        let progress = Arc::new(Mutex::new(0.0));
        let (outcome_tx, outcome_rx) = bounded(1);

        let handle = JobHandle {
            cancel: cancel.clone(),
            progress: progress.clone(),
            outcome: outcome_rx,
        };

        let job = Box::new(move || {
            let outcome = run_job(options, listener, cancel, progress);
            let _ = outcome_tx.send(outcome);
        });
        match self.sender.as_ref() {
            Some(sender) => {
                let _ = sender.send(job);
            }
            None => debug!("job submitted to a closed pool"),
        }
        handle
    }
}

impl Drop for TranscodePool {
    fn drop(&mut self) {
        // Closing the channel lets the workers drain and exit.
        self.sender = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn run_job(
    options: TranscodeOptions,
    listener: Arc<dyn TranscodeListener>,
    cancel: CancelToken,
    progress: Arc<Mutex<f64>>,
) -> JobOutcome {
    let config = options.engine_config();
    let TranscodeOptions {
        mut source,
        mut sink,
        ..
    } = options;

    let mut engine = TranscoderEngine::new();
    engine.set_cancel_token(cancel);
    let progress_listener = listener.clone();
    engine.set_progress_callback(Box::new(move |value| {
        *progress.lock() = value;
        progress_listener.on_progress(value);
    }));

    let result = engine.transcode(source.as_mut(), sink.as_mut(), &config);
    source.release();

    match result {
        Ok(()) => {
            listener.on_completed();
            JobOutcome::Completed
        }
        Err(error) if error.is_cancellation() => {
            listener.on_canceled();
            JobOutcome::Canceled
        }
        Err(error) => {
            listener.on_failed(&error);
            JobOutcome::Failed(error)
        }
    }
}
