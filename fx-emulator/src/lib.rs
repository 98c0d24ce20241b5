pub use crate::{
    catalog::{TriggerCatalog, InMemoryCatalog},
    classifier::Service,
    config::{EmulatorConfig, LoggerConfig},
    dispatcher::Dispatcher,
    error::{DispatchError, TransportError, LaunchError, ConfigLoadError, MetricsError},
    invocation::{Invocation, ResponseSink, ResponseReceiver, InvocationResponse},
    metrics::WorkerMetrics,
    pool::{ExecutionMode, RuntimeWorkerPool},
    process::{WorkerProcess, ProcessLauncher, ProcessInfo, ProcessEvent, ProcessExit, LogStream, ResponseFrames},
    router::{Router, Route},
    worker::{RuntimeWorker, WorkerId, WorkerState, WorkerStateEvent},
};

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod invocation;
pub mod logs;
pub mod matcher;
pub mod metrics;
pub mod pool;
pub mod process;
pub mod router;
pub mod worker;
