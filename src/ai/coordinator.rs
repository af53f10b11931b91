//! Streaming generation coordinator.
//!
//! Completion calls run on a small fixed-size worker pool, decoupled from
//! the interactive surface by a per-task channel. The worker accumulates the
//! full response text, so every chunk it relays is a prefix-superset of the
//! previous one; ordering is FIFO, and `done` flips to true exactly once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

use crate::constants::{GENERATION_WORKERS, JOB_QUEUE_CAPACITY, UPDATE_CHANNEL_CAPACITY};
use crate::error::DraftError;

use super::backend::CompletionBackend;
use super::conversation::{Conversation, Turn};

/// One incremental unit of generation output.
///
/// `text` carries the full accumulated response so far, never a bare delta.
#[derive(Debug, Clone)]
pub enum StreamUpdate {
    Chunk { text: String, done: bool },
    Error { message: String },
}

struct Job {
    turns: Vec<Turn>,
    model: String,
    updates: mpsc::Sender<StreamUpdate>,
}

/// Consumer side of one generation task.
pub struct GenerationHandle {
    rx: mpsc::Receiver<StreamUpdate>,
}

impl GenerationHandle {
    /// Wait up to `wait` for the next update. `None` means nothing arrived
    /// in time; callers treat that as a transient "processing" state.
    pub async fn poll(&mut self, wait: Duration) -> Option<StreamUpdate> {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(update)) => Some(update),
            // Channel closed without a terminal update: surface it as one.
            Ok(None) => Some(StreamUpdate::Error {
                message: "generation task ended unexpectedly".to_string(),
            }),
            Err(_) => None,
        }
    }
}

/// Fixed-size pool of background generation workers.
///
/// Capacity bounds concurrent completions across all sessions; submissions
/// beyond the queue capacity wait for a slot.
pub struct GenerationPool<B: CompletionBackend> {
    backend: Arc<B>,
    jobs: mpsc::Sender<Job>,
}

impl<B: CompletionBackend> GenerationPool<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_workers(backend, GENERATION_WORKERS)
    }

    pub fn with_workers(backend: Arc<B>, workers: usize) -> Self {
        let (jobs, rx) = mpsc::channel(JOB_QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            tokio::spawn(worker_loop(worker, Arc::clone(&backend), Arc::clone(&rx)));
        }

        Self { backend, jobs }
    }

    /// Dispatch one generation task and return its consumer handle.
    ///
    /// An unhealthy backend is detected here, before dispatch, and fails
    /// immediately instead of wasting a worker slot.
    pub async fn submit(
        &self,
        conversation: &Conversation,
        model: &str,
    ) -> Result<GenerationHandle, DraftError> {
        if !self.backend.is_healthy() {
            return Err(DraftError::BackendUnavailable(format!(
                "{} backend is not configured or failed its health check",
                self.backend.name()
            )));
        }

        let (updates, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let job = Job {
            turns: conversation.turns().to_vec(),
            model: model.to_string(),
            updates,
        };

        self.jobs
            .send(job)
            .await
            .map_err(|_| DraftError::Backend("worker pool is shut down".to_string()))?;

        Ok(GenerationHandle { rx })
    }
}

async fn worker_loop<B: CompletionBackend>(
    worker: usize,
    backend: Arc<B>,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
) {
    loop {
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };
        tracing::debug!("generation worker {worker} picked up a task");
        run_task(&backend, job).await;
    }
    tracing::debug!("generation worker {worker} shutting down");
}

async fn run_task<B: CompletionBackend>(backend: &Arc<B>, job: Job) {
    let Job {
        turns,
        model,
        updates,
    } = job;

    let (delta_tx, mut delta_rx) = mpsc::channel::<String>(UPDATE_CHANNEL_CAPACITY);
    let streamer = {
        let backend = Arc::clone(backend);
        tokio::spawn(async move { backend.stream(&turns, &model, delta_tx).await })
    };

    let mut accumulated = String::new();
    let mut abandoned = false;

    while let Some(delta) = delta_rx.recv().await {
        accumulated.push_str(&delta);
        if abandoned {
            continue;
        }
        let chunk = StreamUpdate::Chunk {
            text: accumulated.clone(),
            done: false,
        };
        if updates.send(chunk).await.is_err() {
            // Consumer walked away. The task keeps running to completion;
            // its output is discarded.
            tracing::debug!("generation consumer gone, discarding output");
            abandoned = true;
        }
    }

    let terminal = match streamer.await {
        Ok(Ok(())) => StreamUpdate::Chunk {
            text: accumulated,
            done: true,
        },
        Ok(Err(e)) => StreamUpdate::Error {
            message: e.to_string(),
        },
        Err(e) => StreamUpdate::Error {
            message: format!("generation task failed: {e}"),
        },
    };

    if !abandoned {
        let _ = updates.send(terminal).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::backend::testing::ScriptedBackend;

    fn conversation() -> Conversation {
        Conversation::start("system".to_string(), "user".to_string())
    }

    async fn drain(handle: &mut GenerationHandle) -> Vec<StreamUpdate> {
        let mut updates = Vec::new();
        loop {
            match handle.poll(Duration::from_millis(200)).await {
                Some(update) => {
                    let terminal = matches!(
                        &update,
                        StreamUpdate::Chunk { done: true, .. } | StreamUpdate::Error { .. }
                    );
                    updates.push(update);
                    if terminal {
                        return updates;
                    }
                }
                None => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_chunks_grow_monotonically_and_done_once() {
        let backend = Arc::new(ScriptedBackend::completing(vec!["Hi", " the", "re"]));
        let pool = GenerationPool::with_workers(backend, 1);

        let mut handle = pool.submit(&conversation(), "test-model").await.unwrap();
        let updates = drain(&mut handle).await;

        let mut previous = String::new();
        let mut done_count = 0;
        for update in &updates {
            match update {
                StreamUpdate::Chunk { text, done } => {
                    assert!(text.starts_with(&previous), "chunk shrank: {previous:?} -> {text:?}");
                    previous = text.clone();
                    if *done {
                        done_count += 1;
                    }
                }
                StreamUpdate::Error { message } => panic!("unexpected error: {message}"),
            }
        }
        assert_eq!(done_count, 1);
        assert_eq!(previous, "Hi there");
        assert!(matches!(
            updates.last(),
            Some(StreamUpdate::Chunk { done: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_is_terminal_error() {
        let backend = Arc::new(ScriptedBackend::failing(vec!["partial"], "boom"));
        let pool = GenerationPool::with_workers(backend, 1);

        let mut handle = pool.submit(&conversation(), "test-model").await.unwrap();
        let updates = drain(&mut handle).await;

        assert!(matches!(
            updates.last(),
            Some(StreamUpdate::Error { message }) if message.contains("boom")
        ));
        // Partial output still arrived before the failure.
        assert!(updates
            .iter()
            .any(|u| matches!(u, StreamUpdate::Chunk { text, .. } if text == "partial")));
    }

    #[tokio::test]
    async fn test_unhealthy_backend_short_circuits() {
        let backend = Arc::new(ScriptedBackend::unhealthy());
        let pool = GenerationPool::with_workers(backend, 1);

        let result = pool.submit(&conversation(), "test-model").await;
        assert!(matches!(result, Err(DraftError::BackendUnavailable(_))));
    }

    #[tokio::test]
    async fn test_empty_poll_reports_processing() {
        let backend = Arc::new(ScriptedBackend::completing(vec!["x"]));
        let pool = GenerationPool::with_workers(backend, 1);

        let mut handle = pool.submit(&conversation(), "test-model").await.unwrap();
        // A zero-length wait on a fresh task usually yields nothing yet.
        let first = handle.poll(Duration::from_millis(0)).await;
        assert!(first.is_none() || matches!(first, Some(StreamUpdate::Chunk { .. })));

        let updates = drain(&mut handle).await;
        assert!(matches!(
            updates.last(),
            Some(StreamUpdate::Chunk { done: true, .. })
        ));
    }

    #[tokio::test]
    async fn test_tasks_queue_beyond_worker_capacity() {
        let backend = Arc::new(ScriptedBackend::completing(vec!["a", "b"]));
        let pool = GenerationPool::with_workers(backend, 1);

        let mut first = pool.submit(&conversation(), "m").await.unwrap();
        let mut second = pool.submit(&conversation(), "m").await.unwrap();

        let first_updates = drain(&mut first).await;
        let second_updates = drain(&mut second).await;
        assert!(matches!(
            first_updates.last(),
            Some(StreamUpdate::Chunk { done: true, .. })
        ));
        assert!(matches!(
            second_updates.last(),
            Some(StreamUpdate::Chunk { done: true, .. })
        ));
    }
}
