//! The Agent Bus: one bounded FIFO queue per agent, drained by a
//! worker pool sized to that agent's (clamped) concurrency limit. Submission
//! rejects with `Backpressure` when the queue is full rather than blocking
//! the caller or silently dropping the task.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use atrium_core::{AgentId, CoreError};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::executor::{SubmittedTask, TaskExecutor};
use crate::retry::RetryPolicy;

struct QueuedTask {
    task: SubmittedTask,
    cancel: CancellationToken,
    result_tx: oneshot::Sender<Result<Value, CoreError>>,
}

struct AgentHandle {
    sender: mpsc::Sender<QueuedTask>,
    shutdown: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    capacity: usize,
    queue_capacity: usize,
    task_cancels: DashMap<Uuid, CancellationToken>,
    workers: Vec<JoinHandle<()>>,
}

#[derive(Clone, Copy, Debug)]
pub struct BusMetrics {
    pub queued: usize,
    pub in_flight: usize,
    pub capacity: usize,
}

pub struct AgentBus {
    agents: DashMap<AgentId, AgentHandle>,
    retry_policy: RetryPolicy,
    cancel_grace: Duration,
    queue_capacity: usize,
}

impl AgentBus {
    pub fn new(retry_policy: RetryPolicy, cancel_grace: Duration, queue_capacity: usize) -> Self {
        Self {
            agents: DashMap::new(),
            retry_policy,
            cancel_grace,
            queue_capacity,
        }
    }

    /// Spawns a worker pool of `concurrency_limit` workers (clamped 1-10)
    /// sharing one bounded receiver, so dequeue order stays FIFO even though
    /// several workers process concurrently. Re-registering an agent
    /// replaces its previous queue; in-flight tasks on the old queue keep
    /// running to completion.
    pub fn register(&self, agent_id: AgentId, concurrency_limit: u32, executor: Arc<dyn TaskExecutor>) {
        let limit = concurrency_limit.clamp(1, 10) as usize;
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let shutdown = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(limit);
        for _ in 0..limit {
            let rx = rx.clone();
            let executor = executor.clone();
            let shutdown = shutdown.clone();
            let in_flight = in_flight.clone();
            let policy = self.retry_policy;
            let cancel_grace = self.cancel_grace;
            workers.push(tokio::spawn(worker_loop(
                rx,
                executor,
                shutdown,
                in_flight,
                policy,
                cancel_grace,
            )));
        }

        self.agents.insert(
            agent_id,
            AgentHandle {
                sender: tx,
                shutdown,
                in_flight,
                capacity: limit,
                queue_capacity: self.queue_capacity,
                task_cancels: DashMap::new(),
                workers,
            },
        );
    }

    pub fn deregister(&self, agent_id: AgentId) {
        if let Some((_, handle)) = self.agents.remove(&agent_id) {
            handle.shutdown.cancel();
            for cancel in handle.task_cancels.iter() {
                cancel.cancel();
            }
            for worker in handle.workers {
                worker.abort();
            }
        }
    }

    /// Enqueues a task for `agent_id`. Rejects immediately with
    /// `CoreError::Backpressure` if the agent's queue is already full:
    /// backpressure is rejection, never an unbounded queue.
    pub async fn submit(
        &self,
        agent_id: AgentId,
        task: SubmittedTask,
    ) -> Result<oneshot::Receiver<Result<Value, CoreError>>, CoreError> {
        let handle = self
            .agents
            .get(&agent_id)
            .ok_or_else(|| CoreError::NotFound(format!("agent {agent_id} not registered on bus")))?;

        let (result_tx, result_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        handle.task_cancels.insert(task.task_id, cancel.clone());

        match handle.sender.try_send(QueuedTask {
            task,
            cancel,
            result_tx,
        }) {
            Ok(()) => Ok(result_rx),
            Err(mpsc::error::TrySendError::Full(_)) => Err(CoreError::Backpressure(format!(
                "agent {agent_id} queue is full"
            ))),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(CoreError::NotFound(format!(
                "agent {agent_id} queue is closed"
            ))),
        }
    }

    /// Signals cooperative cancellation for one in-flight or queued task.
    /// The worker allows `cancel_grace` for the executor to wind down before
    /// abandoning it.
    pub fn cancel_task(&self, agent_id: AgentId, task_id: Uuid) -> bool {
        self.agents
            .get(&agent_id)
            .and_then(|handle| handle.task_cancels.get(&task_id).map(|c| c.cancel()))
            .is_some()
    }

    pub fn status(&self, agent_id: AgentId) -> Option<BusMetrics> {
        self.agents.get(&agent_id).map(|handle| BusMetrics {
            queued: handle.queue_capacity - handle.sender.capacity(),
            in_flight: handle.in_flight.load(Ordering::SeqCst),
            capacity: handle.capacity,
        })
    }
}

async fn worker_loop(
    rx: Arc<Mutex<mpsc::Receiver<QueuedTask>>>,
    executor: Arc<dyn TaskExecutor>,
    shutdown: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    policy: RetryPolicy,
    cancel_grace: Duration,
) {
    loop {
        let queued = {
            let mut guard = rx.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => return,
                item = guard.recv() => item,
            }
        };
        let Some(queued) = queued else { return };

        in_flight.fetch_add(1, Ordering::SeqCst);
        let result = run_with_retry(executor.clone(), queued.task, queued.cancel, policy, cancel_grace).await;
        in_flight.fetch_sub(1, Ordering::SeqCst);
        let _ = queued.result_tx.send(result);
    }
}

async fn run_with_retry(
    executor: Arc<dyn TaskExecutor>,
    task: SubmittedTask,
    cancel: CancellationToken,
    policy: RetryPolicy,
    cancel_grace: Duration,
) -> Result<Value, CoreError> {
    let mut attempt = 1;
    loop {
        let mut handle = tokio::spawn({
            let executor = executor.clone();
            let task = task.clone();
            let cancel = cancel.clone();
            async move { executor.execute(task, cancel).await }
        });

        let outcome = tokio::select! {
            joined = &mut handle => joined.unwrap_or_else(|_| Err(CoreError::Cancelled("executor task panicked".into()))),
            _ = cancel.cancelled() => {
                match tokio::time::timeout(cancel_grace, &mut handle).await {
                    Ok(Ok(res)) => res,
                    Ok(Err(_)) => Err(CoreError::Cancelled("executor task panicked during cancellation".into())),
                    Err(_) => {
                        handle.abort();
                        Err(CoreError::Cancelled("task did not wind down within the cancellation grace period".into()))
                    }
                }
            }
        };

        match outcome {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                tokio::time::sleep(policy.delay_for_attempt(attempt)).await;
                attempt += 1;
            }
            Err(e) if e.is_retryable() => {
                return Err(CoreError::MaxRetriesExceeded(e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atrium_core::{ProjectId, SessionId, UserId};
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex as StdMutex;

    struct EchoExecutor {
        calls: Arc<AtomicU32>,
        fail_times: u32,
    }

    #[async_trait]
    impl TaskExecutor for EchoExecutor {
        async fn execute(&self, task: SubmittedTask, _cancel: CancellationToken) -> Result<Value, CoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                return Err(CoreError::Transient("simulated flake".into()));
            }
            Ok(task.payload)
        }
    }

    fn task(agent_id: AgentId) -> SubmittedTask {
        SubmittedTask {
            task_id: Uuid::new_v4(),
            agent_id,
            session_id: SessionId::new(),
            user_id: UserId::new(),
            project_id: ProjectId::new(),
            payload: serde_json::json!({"ok": true}),
        }
    }

    #[tokio::test]
    async fn submit_runs_task_and_returns_result() {
        let bus = AgentBus::new(RetryPolicy::default(), Duration::from_millis(50), 8);
        let agent_id = AgentId::new();
        let executor = Arc::new(EchoExecutor {
            calls: Arc::new(AtomicU32::new(0)),
            fail_times: 0,
        });
        bus.register(agent_id, 2, executor);
        let rx = bus.submit(agent_id, task(agent_id)).await.unwrap();
        let result = rx.await.unwrap();
        assert_eq!(result.unwrap(), serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let bus = AgentBus::new(RetryPolicy::default(), Duration::from_millis(50), 8);
        let agent_id = AgentId::new();
        let executor = Arc::new(EchoExecutor {
            calls: Arc::new(AtomicU32::new(0)),
            fail_times: 2,
        });
        bus.register(agent_id, 1, executor);
        let rx = bus.submit(agent_id, task(agent_id)).await.unwrap();
        let result = rx.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn full_queue_rejects_with_backpressure() {
        let bus = AgentBus::new(RetryPolicy::default(), Duration::from_millis(50), 1);
        let agent_id = AgentId::new();
        let gate = Arc::new(StdMutex::new(()));

        struct BlockingExecutor {
            gate: Arc<StdMutex<()>>,
        }
        #[async_trait]
        impl TaskExecutor for BlockingExecutor {
            async fn execute(&self, task: SubmittedTask, _cancel: CancellationToken) -> Result<Value, CoreError> {
                let _held = self.gate.lock().unwrap();
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(task.payload)
            }
        }

        bus.register(agent_id, 1, Arc::new(BlockingExecutor { gate: gate.clone() }));
        let _first = bus.submit(agent_id, task(agent_id)).await.unwrap();
        // Queue capacity 1: the first task is immediately taken by the lone
        // worker, so the queue itself has room for exactly one more.
        let _second = bus.submit(agent_id, task(agent_id)).await.unwrap();
        let third = bus.submit(agent_id, task(agent_id)).await;
        assert!(matches!(third, Err(CoreError::Backpressure(_))));
    }

    #[tokio::test]
    async fn status_reports_capacity_for_registered_agent() {
        let bus = AgentBus::new(RetryPolicy::default(), Duration::from_millis(50), 8);
        let agent_id = AgentId::new();
        bus.register(
            agent_id,
            20,
            Arc::new(EchoExecutor {
                calls: Arc::new(AtomicU32::new(0)),
                fail_times: 0,
            }),
        );
        let metrics = bus.status(agent_id).unwrap();
        assert_eq!(metrics.capacity, 10);
    }

    #[tokio::test]
    async fn unregistered_agent_rejects_submission() {
        let bus = AgentBus::new(RetryPolicy::default(), Duration::from_millis(50), 8);
        let result = bus.submit(AgentId::new(), task(AgentId::new())).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }
}
