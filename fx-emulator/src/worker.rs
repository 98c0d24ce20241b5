use {
    std::{fmt, sync::{Arc, Weak}, time::Instant},
    parking_lot::Mutex,
    tokio::sync::{broadcast, watch},
    futures::{StreamExt, stream::{self, BoxStream}, future::BoxFuture},
    tracing::{debug, error, info, warn},
    fx_core::InvocationRequest,
    crate::{
        error::{DispatchError, TransportError},
        invocation::{Invocation, ResponseSink},
        process::{WorkerProcess, ProcessEvent, ProcessExit, ProcessInfo},
    },
};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct WorkerId {
    id: u64,
}

impl WorkerId {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn as_u64(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Lifecycle of a worker:
///
/// ```text
/// CREATED -> IDLE <-> BUSY -> FINISHING -> FINISHED
///    \________\________\______________________^
/// ```
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum WorkerState {
    /// Process launched, not yet declared ready.
    Created,
    Idle,
    /// Exactly one invocation in flight.
    Busy,
    /// Retiring once the in-flight invocation completes.
    Finishing,
    /// Terminal. Process has been or is being killed.
    Finished,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Finishing => "finishing",
            Self::Finished => "finished",
        }
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::Finished
    }

    fn can_transition_to(&self, next: WorkerState) -> bool {
        use WorkerState::*;

        matches!(
            (*self, next),
            (Created, Idle)
                | (Idle, Busy)
                | (Busy, Idle)
                | (Busy, Finishing)
                | (Created | Idle | Busy | Finishing, Finished)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct WorkerStateEvent {
    pub worker_id: WorkerId,
    pub trigger_id: String,
    pub state: WorkerState,
    pub at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Retired,
    Killed,
    Failed,
    Crashed(ProcessExit),
}

/// Wraps one worker process and proxies at most one invocation at a time into it.
pub struct RuntimeWorker {
    id: WorkerId,
    trigger_id: String,
    process: Box<dyn WorkerProcess>,
    state: Mutex<WorkerState>,
    termination: watch::Sender<Option<Termination>>,
    events: broadcast::Sender<WorkerStateEvent>,
}

impl RuntimeWorker {
    /// Creates a worker in `CREATED` state. The `CREATED` event is published to `events`
    /// right away, so subscribe before constructing to observe it.
    pub fn new(
        id: WorkerId,
        trigger_id: impl Into<String>,
        process: Box<dyn WorkerProcess>,
        events: broadcast::Sender<WorkerStateEvent>,
    ) -> Arc<Self> {
        let (termination, _) = watch::channel(None);
        let worker = Arc::new(Self {
            id,
            trigger_id: trigger_id.into(),
            process,
            state: Mutex::new(WorkerState::Created),
            termination,
            events,
        });
        worker.emit(WorkerState::Created);
        worker
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn trigger_id(&self) -> &str {
        &self.trigger_id
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn process_info(&self) -> &ProcessInfo {
        self.process.info()
    }

    /// Transitions of this worker, ending with `FINISHED`.
    ///
    /// A worker that is already finished, or finishes while the subscriber lags behind, yields a
    /// single `FINISHED` event instead of the ones that were missed.
    pub fn state_events(&self) -> BoxStream<'static, WorkerStateEvent> {
        let rx = self.events.subscribe();
        let termination = self.termination.subscribe();
        let worker_id = self.id;
        let trigger_id = self.trigger_id.clone();
        let finished = move || WorkerStateEvent {
            worker_id,
            trigger_id: trigger_id.clone(),
            state: WorkerState::Finished,
            at: Instant::now(),
        };

        if self.state().is_terminal() {
            return stream::once(async move { finished() }).boxed();
        }

        stream::unfold(Some(rx), move |rx| {
            let termination = termination.clone();
            let finished = finished.clone();
            async move {
                let mut rx = rx?;
                loop {
                    match rx.recv().await {
                        Ok(event) if event.worker_id == worker_id => {
                            let rx = if event.state.is_terminal() { None } else { Some(rx) };
                            return Some((event, rx));
                        },
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            let terminated = termination.borrow().is_some();
                            if terminated {
                                return Some((finished(), None));
                            }
                        },
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        }).boxed()
    }

    /// Resolves once the underlying OS process has terminated.
    pub fn exited(&self) -> BoxFuture<'static, ProcessExit> {
        self.process.exited()
    }

    /// `CREATED -> IDLE`, called once the process signals it can take work.
    pub fn ready_for_work(&self) -> Result<(), DispatchError> {
        let mut state = self.state.lock();
        if *state != WorkerState::Created {
            return Err(self.illegal_state(*state));
        }
        self.transition(&mut state, WorkerState::Idle)
    }

    /// Proxies `invocation` to the worker process. The worker must be `IDLE`.
    pub async fn dispatch(&self, invocation: Invocation) -> Result<(), DispatchError> {
        if let Err(err) = self.reserve() {
            let mut sink = invocation.sink;
            sink.fail(err.clone());
            return Err(err);
        }
        self.forward(invocation).await
    }

    /// Retires the worker. Idle workers finish right away, busy ones after their current invocation.
    pub fn mark_finishing(&self) {
        let mut state = self.state.lock();
        match *state {
            WorkerState::Created | WorkerState::Idle => self.finish(&mut state, Termination::Retired),
            WorkerState::Busy => self.settle(&mut state, WorkerState::Finishing),
            WorkerState::Finishing | WorkerState::Finished => {},
        }
    }

    /// Finishes the worker immediately, abandoning any in-flight invocation.
    pub fn kill(&self) {
        let mut state = self.state.lock();
        self.finish(&mut state, Termination::Killed);
    }

    /// `CREATED -> IDLE -> BUSY` in one step, for a worker cold-started to serve one invocation.
    pub(crate) fn ready_and_reserve(&self) -> Result<(), DispatchError> {
        let mut state = self.state.lock();
        if *state != WorkerState::Created {
            return Err(self.illegal_state(*state));
        }
        self.transition(&mut state, WorkerState::Idle)?;
        self.transition(&mut state, WorkerState::Busy)
    }

    pub(crate) fn reserve(&self) -> Result<(), DispatchError> {
        let mut state = self.state.lock();
        if *state != WorkerState::Idle {
            return Err(self.illegal_state(*state));
        }
        self.transition(&mut state, WorkerState::Busy)
    }

    /// Runs an invocation on a worker already reserved (`BUSY`).
    pub(crate) async fn forward(&self, invocation: Invocation) -> Result<(), DispatchError> {
        let Invocation { request, mut sink } = invocation;
        let mut termination_rx = self.termination.subscribe();

        let result = tokio::select! {
            result = proxy(self.process.as_ref(), request, &mut sink) => result.map_err(DispatchError::from),
            termination = async { termination_rx.wait_for(Option::is_some).await.ok().and_then(|v| *v) } => {
                Err(match termination {
                    Some(Termination::Crashed(exit)) => DispatchError::ProcessCrash { code: exit.code },
                    _ => DispatchError::WorkerKilled,
                })
            },
        };

        match &result {
            Ok(()) => self.complete(),
            Err(err) => {
                warn!(trigger_id = self.trigger_id.as_str(), worker_id = %self.id, "invocation failed: {err}");
                {
                    let mut state = self.state.lock();
                    self.finish(&mut state, Termination::Failed);
                }
                if !sink.has_responded() {
                    sink.fail(err.clone());
                }
            },
        }

        result
    }

    /// Forwards process logs to tracing and finishes the worker if the process exits on its own.
    pub(crate) fn watch_process(self: &Arc<Self>) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(v) => v,
            Err(_) => {
                warn!(worker_id = %self.id, "no async runtime, worker process events will not be observed");
                return;
            },
        };

        let worker = Arc::downgrade(self);
        let trigger_id = self.trigger_id.clone();
        let worker_id = self.id;
        let mut events = self.process.events();

        runtime.spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    ProcessEvent::Log { stream, line } => {
                        info!(target: "fx_emulator::function", trigger_id = trigger_id.as_str(), worker_id = %worker_id, ?stream, "{line}");
                    },
                    ProcessEvent::Exit(exit) => {
                        if let Some(worker) = Weak::upgrade(&worker) {
                            worker.on_process_exit(exit);
                        }
                        break;
                    },
                }
            }
        });
    }

    fn on_process_exit(&self, exit: ProcessExit) {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return;
        }
        warn!(trigger_id = self.trigger_id.as_str(), worker_id = %self.id, code = ?exit.code, state = %*state, "worker process exited unexpectedly");
        self.finish(&mut state, Termination::Crashed(exit));
    }

    fn complete(&self) {
        let mut state = self.state.lock();
        match *state {
            WorkerState::Busy => self.settle(&mut state, WorkerState::Idle),
            WorkerState::Finishing => self.finish(&mut state, Termination::Retired),
            // killed while the invocation was running
            _ => {},
        }
    }

    fn finish(&self, state: &mut WorkerState, termination: Termination) {
        if state.is_terminal() {
            return;
        }
        self.termination.send_replace(Some(termination));
        self.settle(state, WorkerState::Finished);
    }

    fn settle(&self, state: &mut WorkerState, next: WorkerState) {
        if let Err(err) = self.transition(state, next) {
            error!(trigger_id = self.trigger_id.as_str(), "unexpected worker transition: {err}");
        }
    }

    fn transition(&self, state: &mut WorkerState, next: WorkerState) -> Result<(), DispatchError> {
        if !state.can_transition_to(next) {
            return Err(self.illegal_state(*state));
        }

        debug!(trigger_id = self.trigger_id.as_str(), worker_id = %self.id, from = %*state, to = %next, "worker state changed");
        *state = next;
        self.emit(next);

        if next == WorkerState::Finished {
            self.process.kill();
        }

        Ok(())
    }

    fn emit(&self, state: WorkerState) {
        // nobody listening is fine
        let _ = self.events.send(WorkerStateEvent {
            worker_id: self.id,
            trigger_id: self.trigger_id.clone(),
            state,
            at: Instant::now(),
        });
    }

    fn illegal_state(&self, state: WorkerState) -> DispatchError {
        DispatchError::IllegalState {
            worker_id: self.id,
            state,
        }
    }
}

impl fmt::Debug for RuntimeWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeWorker")
            .field("id", &self.id)
            .field("trigger_id", &self.trigger_id)
            .field("state", &self.state())
            .finish()
    }
}

async fn proxy(process: &dyn WorkerProcess, request: InvocationRequest, sink: &mut ResponseSink) -> Result<(), TransportError> {
    let mut frames = process.request(request).await?;
    while let Some(frame) = frames.next().await {
        sink.send(frame?);
    }
    Ok(())
}
