use {
    std::{collections::HashMap, sync::{Arc, atomic::{AtomicU64, Ordering}}},
    parking_lot::Mutex,
    tokio::sync::broadcast,
    serde::Deserialize,
    tracing::info,
    fx_core::TriggerDefinition,
    crate::{
        error::DispatchError,
        process::WorkerProcess,
        worker::{RuntimeWorker, WorkerId, WorkerState, WorkerStateEvent},
    },
};

const STATE_EVENTS_CAPACITY: usize = 1024;

/// How invocations may overlap across the whole emulator.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One invocation at a time across all functions. Used for debugging.
    Sequential,
    #[default]
    Concurrent,
}

/// Owns every worker, bucketed by the id of the trigger it serves.
pub struct RuntimeWorkerPool {
    mode: ExecutionMode,
    workers: Mutex<Buckets>,
    next_worker_id: AtomicU64,
    events: broadcast::Sender<WorkerStateEvent>,
}

impl RuntimeWorkerPool {
    pub fn new(mode: ExecutionMode) -> Self {
        let (events, _) = broadcast::channel(STATE_EVENTS_CAPACITY);
        Self {
            mode,
            workers: Mutex::new(Buckets::default()),
            next_worker_id: AtomicU64::new(1),
            events,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// State transitions of every worker in this pool, including ones added later.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerStateEvent> {
        self.events.subscribe()
    }

    /// Wraps `process` in a new worker serving `trigger`. The worker starts out `CREATED`;
    /// the caller marks it ready once the process can take work.
    ///
    /// After [`Self::exit`] the worker is finished right away and never joins the pool.
    pub fn add_worker(&self, trigger: &TriggerDefinition, process: Box<dyn WorkerProcess>) -> Arc<RuntimeWorker> {
        let worker = self.new_worker(trigger, process);
        if !self.insert(&worker) {
            worker.kill();
        }
        worker
    }

    /// Adds a cold-started worker that is already `BUSY`, so no other caller can pick it up
    /// before the invocation it was launched for.
    pub(crate) fn add_reserved_worker(&self, trigger: &TriggerDefinition, process: Box<dyn WorkerProcess>) -> Result<Arc<RuntimeWorker>, DispatchError> {
        let worker = self.new_worker(trigger, process);
        worker.ready_and_reserve()?;
        if !self.insert(&worker) {
            worker.kill();
            return Err(DispatchError::Shutdown);
        }
        Ok(worker)
    }

    /// First idle worker for the trigger. `None` means a cold start is needed.
    pub fn get_idle_worker(&self, trigger_id: &str) -> Option<Arc<RuntimeWorker>> {
        let mut workers = self.workers.lock();
        let bucket = workers.by_trigger.get_mut(trigger_id)?;
        bucket.retain(|v| !v.state().is_terminal());
        bucket.iter().find(|v| v.state() == WorkerState::Idle).cloned()
    }

    /// Like [`Self::get_idle_worker`], but also moves the worker to `BUSY` while the bucket
    /// is locked, so that concurrent callers never pick the same worker.
    pub(crate) fn reserve_idle_worker(&self, trigger_id: &str) -> Option<Arc<RuntimeWorker>> {
        let mut workers = self.workers.lock();
        let bucket = workers.by_trigger.get_mut(trigger_id)?;
        bucket.retain(|v| !v.state().is_terminal());
        bucket.iter().find(|v| v.reserve().is_ok()).cloned()
    }

    pub fn get_trigger_workers(&self, trigger_id: &str) -> Vec<Arc<RuntimeWorker>> {
        self.workers.lock()
            .by_trigger
            .get(trigger_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether an invocation for `trigger_id` may start now.
    ///
    /// Always true in concurrent mode (a worker is idle or can be cold-started). In sequential
    /// mode false for every trigger while any worker in the pool has an invocation in flight.
    pub fn ready_for_work(&self, _trigger_id: &str) -> bool {
        match self.mode {
            ExecutionMode::Concurrent => true,
            ExecutionMode::Sequential => !self.is_executing(),
        }
    }

    /// Kills every worker. In-flight invocations are abandoned and workers added later are
    /// finished immediately.
    pub fn exit(&self) {
        let workers = {
            let mut workers = self.workers.lock();
            workers.closed = true;
            workers.snapshot()
        };
        info!(workers = workers.len(), "stopping all workers");
        for worker in workers {
            worker.kill();
        }
    }

    /// Retires every worker so that subsequent invocations cold-start against fresh code.
    /// Busy workers finish their current invocation first.
    pub fn refresh(&self) {
        let workers = self.all_workers();
        info!(workers = workers.len(), "refreshing all workers");
        for worker in workers {
            worker.mark_finishing();
        }
    }

    fn is_executing(&self) -> bool {
        self.workers.lock()
            .by_trigger
            .values()
            .flatten()
            .any(|worker| matches!(worker.state(), WorkerState::Busy | WorkerState::Finishing))
    }

    fn new_worker(&self, trigger: &TriggerDefinition, process: Box<dyn WorkerProcess>) -> Arc<RuntimeWorker> {
        let worker_id = WorkerId::new(self.next_worker_id.fetch_add(1, Ordering::Relaxed));
        let worker = RuntimeWorker::new(worker_id, trigger.id.clone(), process, self.events.clone());
        worker.watch_process();
        worker
    }

    /// Publishes `worker` to its trigger's bucket. False once the pool has exited.
    fn insert(&self, worker: &Arc<RuntimeWorker>) -> bool {
        {
            let mut workers = self.workers.lock();
            if workers.closed {
                return false;
            }
            let bucket = workers.by_trigger.entry(worker.trigger_id().to_owned()).or_default();
            bucket.retain(|v| !v.state().is_terminal());
            bucket.push(worker.clone());
        }

        info!(trigger_id = worker.trigger_id(), worker_id = %worker.id(), "added worker");
        true
    }

    // snapshot, so that worker transitions never run under the pool lock
    fn all_workers(&self) -> Vec<Arc<RuntimeWorker>> {
        self.workers.lock().snapshot()
    }
}

#[derive(Default)]
struct Buckets {
    by_trigger: HashMap<String, Vec<Arc<RuntimeWorker>>>,
    closed: bool,
}

impl Buckets {
    fn snapshot(&self) -> Vec<Arc<RuntimeWorker>> {
        self.by_trigger.values().flatten().cloned().collect()
    }
}

impl Default for RuntimeWorkerPool {
    fn default() -> Self {
        Self::new(ExecutionMode::default())
    }
}
