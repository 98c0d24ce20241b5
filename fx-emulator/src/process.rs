use {
    std::{collections::HashMap, path::PathBuf},
    futures::{future::BoxFuture, stream::BoxStream},
    fx_core::{InvocationRequest, ResponseFrame, TriggerDefinition},
    crate::error::{LaunchError, TransportError},
};

pub type ResponseFrames = BoxStream<'static, Result<ResponseFrame, TransportError>>;

/// Handle to a launched worker process.
///
/// Implemented by whatever spawns and talks to the process. The dispatcher core never constructs
/// these, it only drives them.
pub trait WorkerProcess: Send + Sync + 'static {
    fn info(&self) -> &ProcessInfo;

    /// Sends one request over the process connection. The returned stream yields the response
    /// frames and ends when the response is complete.
    fn request(&self, request: InvocationRequest) -> BoxFuture<'static, Result<ResponseFrames, TransportError>>;

    fn kill(&self);

    /// Log lines followed by a single exit event.
    fn events(&self) -> BoxStream<'static, ProcessEvent>;

    /// Resolves once the OS process has terminated.
    fn exited(&self) -> BoxFuture<'static, ProcessExit>;
}

pub trait ProcessLauncher: Send + Sync + 'static {
    /// Starts a worker for `trigger`. The returned process is ready to receive work.
    fn launch(&self, trigger: &TriggerDefinition) -> BoxFuture<'static, Result<Box<dyn WorkerProcess>, LaunchError>>;
}

#[derive(Debug, Clone, Default)]
pub struct ProcessInfo {
    pub pid: Option<u32>,
    pub cwd: PathBuf,
    pub socket_path: Option<PathBuf>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Log { stream: LogStream, line: String },
    Exit(ProcessExit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}
