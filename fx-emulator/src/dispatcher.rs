use {
    std::sync::{Arc, atomic::{AtomicBool, Ordering}},
    tokio::sync::{Semaphore, SemaphorePermit},
    tracing::{debug, info, error},
    fx_core::{InvocationRequest, TriggerDefinition},
    crate::{
        catalog::TriggerCatalog,
        error::DispatchError,
        invocation::Invocation,
        pool::{ExecutionMode, RuntimeWorkerPool},
        process::ProcessLauncher,
        router::Router,
        worker::RuntimeWorker,
    },
};

/// Entry point for invocations: resolves the function, picks or cold-starts a worker and proxies
/// the request into it.
pub struct Dispatcher {
    router: Router,
    pool: Arc<RuntimeWorkerPool>,
    launcher: Arc<dyn ProcessLauncher>,
    // one permit in sequential mode, held for the whole invocation
    sequential_gate: Option<Semaphore>,
    closed: AtomicBool,
}

impl Dispatcher {
    pub fn new(catalog: Arc<dyn TriggerCatalog>, pool: Arc<RuntimeWorkerPool>, launcher: Arc<dyn ProcessLauncher>) -> Self {
        let sequential_gate = match pool.mode() {
            ExecutionMode::Sequential => Some(Semaphore::new(1)),
            ExecutionMode::Concurrent => None,
        };

        Self {
            router: Router::new(catalog),
            pool,
            launcher,
            sequential_gate,
            closed: AtomicBool::new(false),
        }
    }

    pub fn pool(&self) -> &Arc<RuntimeWorkerPool> {
        &self.pool
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handles one invocation end to end. Every outcome, including errors, is also delivered
    /// to the invocation's response sink.
    pub async fn dispatch(&self, invocation: Invocation) -> Result<(), DispatchError> {
        let Invocation { mut request, mut sink } = invocation;

        if self.closed.load(Ordering::Acquire) {
            sink.fail(DispatchError::Shutdown);
            return Err(DispatchError::Shutdown);
        }

        let route = match self.router.resolve(&request) {
            Ok(v) => v,
            Err(err) => {
                debug!("{err}");
                sink.fail(err.clone());
                return Err(err);
            },
        };

        if let InvocationRequest::Event(event) = &mut request {
            event.params = route.params.clone();
        }

        let _permit = match self.acquire_gate().await {
            Ok(v) => v,
            Err(err) => {
                sink.fail(err.clone());
                return Err(err);
            },
        };

        let worker = match self.pool.reserve_idle_worker(&route.trigger.id) {
            Some(v) => v,
            None => match self.cold_start(&route.trigger).await {
                Ok(v) => v,
                Err(err) => {
                    sink.fail(err.clone());
                    return Err(err);
                },
            },
        };

        debug!(trigger_id = route.trigger.id.as_str(), worker_id = %worker.id(), "dispatching invocation");
        worker.forward(Invocation::new(request, sink)).await
    }

    /// Stops accepting invocations and kills every worker.
    pub fn shutdown(&self) {
        info!("shutting down dispatcher");
        self.closed.store(true, Ordering::Release);
        if let Some(gate) = &self.sequential_gate {
            gate.close();
        }
        self.pool.exit();
    }

    /// Retires all workers so the next invocations run on freshly launched processes.
    pub fn reload(&self) {
        info!("reloading functions");
        self.pool.refresh();
    }

    async fn acquire_gate(&self) -> Result<Option<SemaphorePermit<'_>>, DispatchError> {
        match &self.sequential_gate {
            Some(gate) => gate.acquire().await.map(Some).map_err(|_| DispatchError::Shutdown),
            None => Ok(None),
        }
    }

    async fn cold_start(&self, trigger: &TriggerDefinition) -> Result<Arc<RuntimeWorker>, DispatchError> {
        info!(trigger_id = trigger.id.as_str(), "starting new worker");

        let process = self.launcher.launch(trigger).await.map_err(|err| {
            error!(trigger_id = trigger.id.as_str(), "failed to launch worker: {err}");
            DispatchError::LaunchFailed {
                trigger_id: trigger.id.clone(),
                reason: err.to_string(),
            }
        })?;

        // reserved before it is published, and rejected by the pool if shutdown won the race
        self.pool.add_reserved_worker(trigger, process)
    }
}
