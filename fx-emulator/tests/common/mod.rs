#![allow(dead_code)]

use {
    std::{sync::{Arc, atomic::{AtomicBool, AtomicUsize, Ordering}}, time::Duration},
    parking_lot::Mutex,
    tokio::{sync::{Notify, broadcast, watch}, time::{sleep, timeout}},
    futures::{FutureExt, StreamExt, future::BoxFuture, stream::{self, BoxStream}},
    http::{HeaderMap, StatusCode},
    fx_core::{InvocationRequest, ResponseFrame, TriggerDefinition},
    fx_emulator::{
        LaunchError,
        ProcessEvent,
        ProcessExit,
        ProcessInfo,
        ProcessLauncher,
        ResponseFrames,
        TransportError,
        WorkerProcess,
        WorkerStateEvent,
    },
};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Behavior {
    /// Echoes http bodies, answers events with their captured params as json.
    Respond,
    /// Like `Respond`, but waits for [`FakeHandle::release`] first.
    Gated,
    /// Connection drops before any frame is produced.
    FailTransport,
}

/// Test-side view of a fake process.
pub struct FakeHandle {
    behavior: Behavior,
    gate: Notify,
    killed: AtomicBool,
    requests: AtomicUsize,
    events: broadcast::Sender<ProcessEvent>,
    exit: watch::Sender<Option<ProcessExit>>,
}

impl FakeHandle {
    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn log(&self, line: &str) {
        let _ = self.events.send(ProcessEvent::Log {
            stream: fx_emulator::LogStream::Stdout,
            line: line.to_owned(),
        });
    }

    /// Simulates the process dying on its own.
    pub fn crash(&self, code: i32) {
        let exit = ProcessExit { code: Some(code) };
        self.exit.send_replace(Some(exit));
        let _ = self.events.send(ProcessEvent::Exit(exit));
    }
}

pub struct FakeProcess {
    info: ProcessInfo,
    handle: Arc<FakeHandle>,
}

impl FakeProcess {
    pub fn new(behavior: Behavior) -> (Box<dyn WorkerProcess>, Arc<FakeHandle>) {
        let (events, _) = broadcast::channel(64);
        let (exit, _) = watch::channel(None);
        let handle = Arc::new(FakeHandle {
            behavior,
            gate: Notify::new(),
            killed: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            events,
            exit,
        });

        let process = Self {
            info: ProcessInfo::default(),
            handle: handle.clone(),
        };
        (Box::new(process) as Box<dyn WorkerProcess>, handle)
    }
}

impl WorkerProcess for FakeProcess {
    fn info(&self) -> &ProcessInfo {
        &self.info
    }

    fn request(&self, request: InvocationRequest) -> BoxFuture<'static, Result<ResponseFrames, TransportError>> {
        let handle = self.handle.clone();
        async move {
            handle.requests.fetch_add(1, Ordering::SeqCst);
            match handle.behavior {
                Behavior::FailTransport => return Err(TransportError::ConnectionReset),
                Behavior::Gated => handle.gate.notified().await,
                Behavior::Respond => {},
            }

            let body = match request {
                InvocationRequest::Http(request) => request.body,
                InvocationRequest::Event(event) => serde_json::to_vec(&event.params)
                    .map_err(|err| TransportError::Io { reason: err.to_string() })?,
            };

            let frames: Vec<Result<ResponseFrame, TransportError>> = vec![
                Ok(ResponseFrame::Head { status: StatusCode::OK, headers: HeaderMap::new() }),
                Ok(ResponseFrame::Body(body)),
            ];
            Ok(stream::iter(frames).boxed())
        }.boxed()
    }

    fn kill(&self) {
        self.handle.killed.store(true, Ordering::SeqCst);
        self.handle.exit.send_if_modified(|exit| {
            if exit.is_some() {
                return false;
            }
            *exit = Some(ProcessExit { code: None });
            true
        });
    }

    fn events(&self) -> BoxStream<'static, ProcessEvent> {
        stream::unfold(self.handle.events.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }).boxed()
    }

    fn exited(&self) -> BoxFuture<'static, ProcessExit> {
        let mut exit = self.handle.exit.subscribe();
        async move {
            match exit.wait_for(Option::is_some).await {
                Ok(v) => (*v).unwrap_or(ProcessExit { code: None }),
                Err(_) => ProcessExit { code: None },
            }
        }.boxed()
    }
}

pub struct FakeLauncher {
    behavior: Mutex<Behavior>,
    fail: AtomicBool,
    hold: AtomicBool,
    launch_gate: Arc<Notify>,
    launched: Mutex<Vec<Arc<FakeHandle>>>,
}

impl FakeLauncher {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            fail: AtomicBool::new(false),
            hold: AtomicBool::new(false),
            launch_gate: Arc::new(Notify::new()),
            launched: Mutex::new(Vec::new()),
        })
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn fail_launches(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Makes launches wait for [`Self::release_launch`] before returning the process.
    pub fn hold_launches(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub fn release_launch(&self) {
        self.launch_gate.notify_one();
    }

    pub fn launches(&self) -> usize {
        self.launched.lock().len()
    }

    pub fn handle(&self, index: usize) -> Arc<FakeHandle> {
        self.launched.lock()[index].clone()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn launch(&self, _trigger: &TriggerDefinition) -> BoxFuture<'static, Result<Box<dyn WorkerProcess>, LaunchError>> {
        if self.fail.load(Ordering::SeqCst) {
            return async { Err(LaunchError::Spawn { reason: "no such runtime".to_owned() }) }.boxed();
        }

        let (process, handle) = FakeProcess::new(*self.behavior.lock());
        self.launched.lock().push(handle);

        let gate = self.hold.load(Ordering::SeqCst).then(|| self.launch_gate.clone());
        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            Ok(process)
        }.boxed()
    }
}

/// Polls `condition` until it holds, failing the test after a second.
pub async fn wait_until(condition: impl Fn() -> bool) {
    timeout(Duration::from_secs(1), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    }).await.expect("condition was not reached in time");
}

/// Drains events already published to `rx`, returning their states in order.
pub fn drain_states(rx: &mut broadcast::Receiver<WorkerStateEvent>) -> Vec<fx_emulator::WorkerState> {
    let mut states = Vec::new();
    while let Ok(event) = rx.try_recv() {
        states.push(event.state);
    }
    states
}
