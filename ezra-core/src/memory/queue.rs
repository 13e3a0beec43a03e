//! Background queue for memory evaluation.
//!
//! Turns hand their user message to [`MemoryQueue::submit`] and return
//! immediately. A dispatcher task drains a bounded channel into at most
//! `workers` concurrent jobs; jobs for the same (agent, user) pair run one
//! at a time and each gets its own deadline, unrelated to the turn that
//! produced it.

use super::evaluator::{MemoryEvaluator, MemoryOutcome};
use crate::config::MemorySection;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryJob {
    pub agent_id: String,
    pub user_id: String,
    pub message: String,
}

impl MemoryJob {
    pub fn new(
        agent_id: impl Into<String>,
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            user_id: user_id.into(),
            message: message.into(),
        }
    }

    fn key(&self) -> (String, String) {
        (self.agent_id.clone(), self.user_id.clone())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    pub workers: usize,
    pub capacity: usize,
    pub deadline: Duration,
}

impl From<&MemorySection> for QueueOptions {
    fn from(config: &MemorySection) -> Self {
        Self {
            workers: config.workers,
            capacity: config.queue_capacity,
            deadline: config.evaluation_timeout(),
        }
    }
}

type PairLocks = DashMap<(String, String), Arc<Mutex<()>>>;

/// Jobs accepted but not yet finished, plus a wakeup for `wait_idle`
#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    fn finish(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

pub struct MemoryQueue {
    sender: mpsc::Sender<MemoryJob>,
    pending: Arc<Pending>,
    shutdown: CancellationToken,
}

impl MemoryQueue {
    /// Spawn the dispatcher on the current Tokio runtime.
    pub fn start(evaluator: MemoryEvaluator, config: &MemorySection) -> Self {
        Self::start_with(evaluator, QueueOptions::from(config))
    }

    pub fn start_with(evaluator: MemoryEvaluator, options: QueueOptions) -> Self {
        let (sender, receiver) = mpsc::channel(options.capacity.max(1));
        let pending = Arc::new(Pending::default());
        let shutdown = CancellationToken::new();

        tokio::spawn(dispatch(
            receiver,
            Arc::new(evaluator),
            options,
            pending.clone(),
            shutdown.clone(),
        ));

        Self {
            sender,
            pending,
            shutdown,
        }
    }

    /// Enqueue without waiting. A full or closed queue drops the job.
    pub fn submit(&self, job: MemoryJob) -> bool {
        self.pending.count.fetch_add(1, Ordering::AcqRel);
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(agent_id = %job.agent_id, user_id = %job.user_id, "memory queue full, dropping evaluation");
                self.pending.finish();
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!(agent_id = %job.agent_id, user_id = %job.user_id, "memory queue closed, dropping evaluation");
                self.pending.finish();
                false
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::Acquire)
    }

    /// Resolves once every accepted job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.pending.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop taking new work; jobs already running finish on their own.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for MemoryQueue {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<MemoryJob>,
    evaluator: Arc<MemoryEvaluator>,
    options: QueueOptions,
    pending: Arc<Pending>,
    shutdown: CancellationToken,
) {
    let workers = Arc::new(Semaphore::new(options.workers.max(1)));
    let locks: Arc<PairLocks> = Arc::new(DashMap::new());

    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => break,
            job = receiver.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = shutdown.cancelled() => {
                pending.finish();
                break;
            }
            permit = workers.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    pending.finish();
                    break;
                }
            },
        };

        let evaluator = evaluator.clone();
        let locks = locks.clone();
        let pending = pending.clone();
        tokio::spawn(async move {
            run_job(&evaluator, &locks, job, options.deadline).await;
            drop(permit);
            pending.finish();
        });
    }

    // Anything still buffered will never run
    receiver.close();
    while receiver.try_recv().is_ok() {
        pending.finish();
    }
    debug!("memory queue dispatcher stopped");
}

async fn run_job(evaluator: &MemoryEvaluator, locks: &PairLocks, job: MemoryJob, deadline: Duration) {
    let key = job.key();
    let lock = locks.entry(key.clone()).or_default().clone();
    let guard = lock.lock().await;

    match tokio::time::timeout(
        deadline,
        evaluator.process(&job.agent_id, &job.user_id, &job.message),
    )
    .await
    {
        Ok(Ok(MemoryOutcome::Skipped)) => {
            debug!(agent_id = %job.agent_id, user_id = %job.user_id, "nothing worth remembering");
        }
        Ok(Ok(outcome)) => {
            info!(agent_id = %job.agent_id, user_id = %job.user_id, ?outcome, "memory evaluation applied");
        }
        Ok(Err(err)) => {
            warn!(agent_id = %job.agent_id, user_id = %job.user_id, error = %err, "memory evaluation failed");
        }
        Err(_) => {
            warn!(agent_id = %job.agent_id, user_id = %job.user_id, ?deadline, "memory evaluation timed out");
        }
    }

    drop(guard);
    drop(lock);
    locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{KnowledgeStore, SqliteKnowledgeStore};
    use crate::llm::{LLMError, LLMProvider, LLMRequest, LLMResponse, ModelClient, RetryPolicy};
    use async_trait::async_trait;

    /// Saves every message verbatim, optionally after a delay
    struct EchoJudge {
        delay: Duration,
    }

    #[async_trait]
    impl LLMProvider for EchoJudge {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: LLMRequest) -> Result<LLMResponse, LLMError> {
            tokio::time::sleep(self.delay).await;
            let system = request.system_prompt.unwrap_or_default();
            if system.starts_with("Compare this new fact") {
                return Ok(LLMResponse::text("[]"));
            }
            let message = system
                .split("User message: \"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap_or_default();
            Ok(LLMResponse::text(
                serde_json::json!({
                    "should_save": true,
                    "memory_type": "fact",
                    "content": message,
                    "topics": ["General"],
                    "importance": 5,
                })
                .to_string(),
            ))
        }
    }

    async fn queue_with(delay: Duration, deadline: Duration) -> (MemoryQueue, Arc<dyn KnowledgeStore>) {
        let store: Arc<dyn KnowledgeStore> = match SqliteKnowledgeStore::open_in_memory() {
            Ok(store) => Arc::new(store),
            Err(err) => panic!("in-memory store: {err}"),
        };
        for user in ["alice", "bob"] {
            if let Err(err) = store.get_or_create_user(user, user, user, "web").await {
                panic!("user: {err}");
            }
        }
        let judge = ModelClient::new(Arc::new(EchoJudge { delay }), "judge")
            .with_retry_policy(RetryPolicy::none());
        let queue = MemoryQueue::start_with(
            MemoryEvaluator::new(judge, store.clone()),
            QueueOptions {
                workers: 2,
                capacity: 16,
                deadline,
            },
        );
        (queue, store)
    }

    #[tokio::test]
    async fn jobs_run_in_background_until_idle() {
        let (queue, store) = queue_with(Duration::ZERO, Duration::from_secs(5)).await;

        assert!(queue.submit(MemoryJob::new("Ezra", "alice", "I keep bees in my garden")));
        assert!(queue.submit(MemoryJob::new("Ezra", "alice", "I work as a carpenter")));
        assert!(queue.submit(MemoryJob::new("Ezra", "bob", "I grew up near the sea")));
        queue.wait_idle().await;

        assert_eq!(queue.pending(), 0);
        assert_eq!(store.get_user_facts("alice").await.unwrap_or_default().len(), 2);
        assert_eq!(store.get_user_facts("bob").await.unwrap_or_default().len(), 1);
    }

    #[tokio::test]
    async fn slow_judges_hit_the_deadline() {
        let (queue, store) = queue_with(Duration::from_secs(30), Duration::from_millis(50)).await;

        assert!(queue.submit(MemoryJob::new("Ezra", "alice", "I keep bees in my garden")));
        tokio::time::timeout(Duration::from_secs(5), queue.wait_idle())
            .await
            .unwrap_or_else(|_| panic!("queue never went idle"));

        assert!(store.get_user_facts("alice").await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn wait_idle_returns_immediately_when_empty() {
        let (queue, _store) = queue_with(Duration::ZERO, Duration::from_secs(1)).await;
        tokio::time::timeout(Duration::from_millis(200), queue.wait_idle())
            .await
            .unwrap_or_else(|_| panic!("idle queue blocked"));
    }
}
