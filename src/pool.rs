//! Fixed-size pool of decryption workers.
//!
//! Each worker is an OS thread driving its own current-thread runtime. Callers
//! talk to workers only through channels: a job goes in through the worker's
//! queue and the answer comes back on a one-shot channel owned by the
//! dispatching future.

use crate::config::PoolConfig;
use crate::errors::{DecryptionError, Result, TimeoutStage};
use crate::reconstruct::ChunkReconstructor;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, oneshot};
use zeroize::Zeroizing;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

struct WorkerJob {
    id: TaskId,
    ciphertext: Vec<u8>,
    key: Zeroizing<Vec<u8>>,
    reply: oneshot::Sender<Result<u128>>,
}

struct WorkerHandle {
    jobs: mpsc::UnboundedSender<WorkerJob>,
    alive: Arc<AtomicBool>,
}

impl WorkerHandle {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

struct PoolState {
    workers: Vec<Option<WorkerHandle>>,
    pending: HashMap<TaskId, usize>,
    next_worker: usize,
    shut_down: bool,
}

/// Distributes decryption requests round-robin over a fixed number of
/// workers.
///
/// Workers are spawned on first use. A worker that panics fails every request
/// it holds with [`DecryptionError::WorkerFault`] and is replaced by the next
/// dispatch routed to its slot; other workers keep running.
pub struct WorkerPool {
    reconstructor: Arc<ChunkReconstructor>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    dispatched: AtomicU64,
    restarts: AtomicU64,
}

impl WorkerPool {
    pub fn new(reconstructor: Arc<ChunkReconstructor>, config: PoolConfig) -> Self {
        let workers = config.workers.max(1);

        WorkerPool {
            reconstructor,
            config: PoolConfig { workers, ..config },
            state: Mutex::new(PoolState {
                workers: (0..workers).map(|_| None).collect(),
                pending: HashMap::new(),
                next_worker: 0,
                shut_down: false,
            }),
            dispatched: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
        }
    }

    /// Decrypts `ciphertext` with the serialized decryption `key` on the next
    /// worker in line.
    ///
    /// Gives up after the configured dispatch timeout. The worker is not
    /// interrupted and its late answer is discarded.
    pub async fn dispatch(&self, ciphertext: Vec<u8>, key: &[u8]) -> Result<u128> {
        let id = TaskId::next();
        let (reply, answer) = oneshot::channel();

        let worker = {
            let mut state = self.state.lock();
            if state.shut_down {
                return Err(DecryptionError::PoolShutDown);
            }

            let worker = state.next_worker % self.config.workers;
            state.next_worker = state.next_worker.wrapping_add(1);

            let handle = self.ensure_worker(&mut state, worker)?;
            let job = WorkerJob {
                id,
                ciphertext,
                key: Zeroizing::new(key.to_vec()),
                reply,
            };
            if handle.jobs.send(job).is_err() {
                tracing::warn!(task = %id, worker, "worker queue closed");
                return Err(DecryptionError::WorkerFault { worker });
            }

            state.pending.insert(id, worker);
            worker
        };
        let _settle = Settle { pool: self, id };

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(task = %id, worker, "dispatched decryption");

        let timeout = self.config.dispatch_timeout();
        match tokio::time::timeout(timeout, answer).await {
            Ok(Ok(result)) => result,
            // The worker went away without answering.
            Ok(Err(_)) => Err(DecryptionError::WorkerFault { worker }),
            Err(_) => {
                tracing::warn!(task = %id, worker, ?timeout, "dispatch timed out");
                Err(DecryptionError::Timeout {
                    stage: TimeoutStage::Dispatch,
                    after: timeout,
                })
            }
        }
    }

    /// Stops accepting requests and releases every worker. Queued jobs are
    /// still answered; later dispatches fail with
    /// [`DecryptionError::PoolShutDown`].
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.shut_down {
            return;
        }
        state.shut_down = true;

        let released = release_workers(&mut state);
        tracing::debug!(released, "worker pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    /// Number of requests handed to a worker so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Number of crashed workers that have been replaced.
    pub fn worker_restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    /// Requests currently waiting for an answer.
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Requests currently waiting for an answer from `worker`.
    pub fn pending_on(&self, worker: usize) -> usize {
        self.state
            .lock()
            .pending
            .values()
            .filter(|&&w| w == worker)
            .count()
    }

    /// Workers spawned and not crashed.
    pub fn live_workers(&self) -> usize {
        self.state
            .lock()
            .workers
            .iter()
            .flatten()
            .filter(|handle| handle.is_alive())
            .count()
    }

    pub fn size(&self) -> usize {
        self.config.workers
    }

    fn ensure_worker<'s>(&self, state: &'s mut PoolState, worker: usize) -> Result<&'s WorkerHandle> {
        let slot = &mut state.workers[worker];

        match slot.as_ref().map(WorkerHandle::is_alive) {
            Some(true) => {}
            Some(false) => {
                self.restarts.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(worker, "replacing crashed worker");
                *slot = Some(spawn_worker(worker, Arc::clone(&self.reconstructor))?);
            }
            None => {
                tracing::debug!(worker, "spawning worker");
                *slot = Some(spawn_worker(worker, Arc::clone(&self.reconstructor))?);
            }
        }

        slot.as_ref().ok_or(DecryptionError::WorkerFault { worker })
    }

    fn settle(&self, id: TaskId) {
        let mut state = self.state.lock();
        state.pending.remove(&id);

        if state.pending.is_empty() && self.config.teardown_when_idle && !state.shut_down {
            let released = release_workers(&mut state);
            if released > 0 {
                tracing::trace!(released, "pool idle, released workers");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Removes the pending entry however the dispatching future ends, including
/// when it is dropped mid-wait.
struct Settle<'a> {
    pool: &'a WorkerPool,
    id: TaskId,
}

impl Drop for Settle<'_> {
    fn drop(&mut self) {
        self.pool.settle(self.id);
    }
}

/// Drops every worker handle. Workers exit once their queue is drained.
fn release_workers(state: &mut PoolState) -> usize {
    state
        .workers
        .iter_mut()
        .filter_map(Option::take)
        .count()
}

fn spawn_worker(index: usize, reconstructor: Arc<ChunkReconstructor>) -> Result<WorkerHandle> {
    let (jobs, queue) = mpsc::unbounded_channel();
    let alive = Arc::new(AtomicBool::new(true));
    let worker_alive = Arc::clone(&alive);

    thread::Builder::new()
        .name(format!("dlog-worker-{}", index))
        .spawn(move || run_worker(index, reconstructor, queue, worker_alive))?;

    Ok(WorkerHandle { jobs, alive })
}

fn run_worker(
    index: usize,
    reconstructor: Arc<ChunkReconstructor>,
    mut queue: mpsc::UnboundedReceiver<WorkerJob>,
    alive: Arc<AtomicBool>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(worker = index, error = %err, "failed to start worker runtime");
            alive.store(false, Ordering::Release);
            fail_queued(index, &mut queue);
            return;
        }
    };

    while let Some(job) = queue.blocking_recv() {
        let WorkerJob {
            id,
            ciphertext,
            key,
            reply,
        } = job;
        tracing::trace!(task = %id, worker = index, "worker picked up job");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            runtime.block_on(reconstructor.reconstruct_bytes(&ciphertext, &key))
        }));

        match outcome {
            Ok(result) => {
                if reply.send(result).is_err() {
                    tracing::trace!(task = %id, worker = index, "caller stopped waiting, dropping reply");
                }
            }
            Err(_) => {
                tracing::warn!(task = %id, worker = index, "worker crashed");
                alive.store(false, Ordering::Release);
                let _ = reply.send(Err(DecryptionError::WorkerFault { worker: index }));
                fail_queued(index, &mut queue);
                break;
            }
        }
    }

    runtime.shutdown_background();
}

/// Closes the queue and fails every job still in it.
fn fail_queued(index: usize, queue: &mut mpsc::UnboundedReceiver<WorkerJob>) {
    queue.close();
    while let Ok(job) = queue.try_recv() {
        tracing::debug!(task = %job.id, worker = index, "failing queued job");
        let _ = job.reply.send(Err(DecryptionError::WorkerFault { worker: index }));
    }
}
