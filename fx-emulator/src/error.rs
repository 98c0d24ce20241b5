use {
    std::io,
    thiserror::Error,
    crate::worker::{WorkerId, WorkerState},
};

/// Error delivered to an invocation's response sink and returned to the caller of `dispatch`.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DispatchError {
    /// No deployed function matches the invocation. Not retried.
    #[error("no function found to handle {target}")]
    RoutingNotFound { target: String },

    /// Channel to the worker process failed mid-invocation. The worker is finished and killed.
    #[error("worker transport failed: {0}")]
    Transport(#[from] TransportError),

    /// Worker process exited on its own while it was serving this invocation.
    #[error("worker process exited unexpectedly (code: {code:?})")]
    ProcessCrash { code: Option<i32> },

    /// Worker was killed (shutdown or external timeout) while serving this invocation.
    #[error("worker was killed while handling invocation")]
    WorkerKilled,

    /// Invocation was handed to a worker that was not idle. This is a bug in the caller.
    #[error("worker {worker_id} is {state}, expected idle")]
    IllegalState { worker_id: WorkerId, state: WorkerState },

    #[error("failed to launch worker for function {trigger_id:?}: {reason}")]
    LaunchFailed { trigger_id: String, reason: String },

    #[error("emulator is shutting down")]
    Shutdown,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum TransportError {
    #[error("connection refused")]
    ConnectionRefused,

    #[error("connection reset")]
    ConnectionReset,

    #[error("broken pipe")]
    BrokenPipe,

    #[error("io error: {reason}")]
    Io { reason: String },
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => Self::ConnectionReset,
            io::ErrorKind::BrokenPipe => Self::BrokenPipe,
            _ => Self::Io { reason: err.to_string() },
        }
    }
}

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("failed to spawn worker process: {reason}")]
    Spawn { reason: String },

    #[error("worker process did not become ready: {reason}")]
    NotReady { reason: String },
}

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0:?}")]
    FailedToRead(io::Error),

    #[error("failed to parse config: {0}")]
    FailedToParse(serde_yml::Error),
}

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    Registration(prometheus::Error),

    #[error("failed to encode metrics: {0}")]
    Encoding(prometheus::Error),
}
