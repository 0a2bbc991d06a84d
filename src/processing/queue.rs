// Location: src/processing/queue.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::{
    error::{Result, ServiceError},
    model::TextGenerator,
    types::{GenerationHandle, GenerationOutput, GenerationParams},
};

/// A job waiting for the generation worker
struct GenerationJob {
    id: usize,
    prompt: String,
    params: GenerationParams,
    enqueued_at: Instant,
    response_sender: oneshot::Sender<Result<GenerationOutput>>,
}

/// Single-worker queue in front of the generator.
///
/// One OS thread owns the generator and runs jobs strictly one after another,
/// however many requests the HTTP layer accepts concurrently.
pub struct GenerationQueue {
    sender: Mutex<Option<Sender<GenerationJob>>>,
    worker: Mutex<Option<JoinHandle<bool>>>,
    capacity: usize,
    next_job_id: AtomicUsize,
}

impl GenerationQueue {
    /// Start the worker thread, moving the generator into it
    pub fn start(generator: Box<dyn TextGenerator>, capacity: usize) -> Result<Self> {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);

        let worker = std::thread::Builder::new()
            .name("vera-generation".to_string())
            .spawn(move || Self::run_worker(generator, receiver))
            .map_err(|e| ServiceError::InitializationError {
                message: "Failed to spawn generation worker".to_string(),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            capacity,
            next_job_id: AtomicUsize::new(0),
        })
    }

    /// Queue a prompt for generation
    pub fn submit(&self, prompt: String, params: GenerationParams) -> Result<GenerationHandle> {
        let (tx, rx) = oneshot::channel();
        let job_id = self.next_job_id.fetch_add(1, Ordering::Relaxed) + 1;

        let job = GenerationJob {
            id: job_id,
            prompt,
            params,
            enqueued_at: Instant::now(),
            response_sender: tx,
        };

        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(ServiceError::NotReady)?;
        match sender.try_send(job) {
            Ok(()) => Ok(GenerationHandle::new(job_id, rx)),
            Err(TrySendError::Full(_)) => Err(ServiceError::QueueError {
                message: "Generation queue is full".to_string(),
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(ServiceError::NotReady),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs waiting for the worker, not counting the one in progress
    pub fn pending(&self) -> usize {
        self.sender.lock().as_ref().map(|s| s.len()).unwrap_or(0)
    }

    /// Close the queue and wait for the worker to drop the generator.
    ///
    /// Jobs already queued still run. Returns whether the generator was on a GPU.
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<bool> {
        self.sender.lock().take();
        let worker = self.worker.lock().take();

        let Some(worker) = worker else {
            return Ok(false);
        };

        let joined = tokio::task::spawn_blocking(move || worker.join())
            .await
            .map_err(|e| {
                ServiceError::processing(format!("Failed to join generation worker: {}", e))
            })?;

        joined.map_err(|_| ServiceError::processing("Generation worker panicked"))
    }

    fn run_worker(
        mut generator: Box<dyn TextGenerator>,
        receiver: Receiver<GenerationJob>,
    ) -> bool {
        debug!("Generation worker started");

        while let Ok(job) = receiver.recv() {
            let wait_time = job.enqueued_at.elapsed();
            let started = Instant::now();

            let result = generator
                .generate(&job.prompt, &job.params)
                .and_then(|tokens| {
                    let text = generator.decode(&tokens)?;
                    Ok(GenerationOutput {
                        text,
                        tokens_used: tokens.len(),
                        processing_time: started.elapsed(),
                        wait_time,
                    })
                });

            debug!(
                job_id = job.id,
                wait_ms = wait_time.as_millis() as u64,
                ok = result.is_ok(),
                "Generation job finished"
            );

            if job.response_sender.send(result).is_err() {
                warn!(job_id = job.id, "Caller went away before generation finished");
            }
        }

        let uses_gpu = generator.uses_gpu();
        drop(generator);
        debug!("Generation worker stopped, model released");
        uses_gpu
    }
}
