use {
    std::{collections::HashMap, sync::Arc, time::Instant},
    parking_lot::Mutex,
    tokio::sync::broadcast::{self, error::RecvError},
    tracing::warn,
    prometheus::{
        TextEncoder,
        Registry,
        IntCounterVec,
        IntGaugeVec,
        CounterVec,
        register_int_counter_vec_with_registry,
        register_int_gauge_vec_with_registry,
        register_counter_vec_with_registry,
    },
    crate::{
        error::MetricsError,
        worker::{WorkerId, WorkerState, WorkerStateEvent},
    },
};

/// Worker lifecycle metrics, fed from the pool's state event stream.
#[derive(Clone)]
pub struct WorkerMetrics {
    registry: Registry,

    transitions_total: IntCounterVec,
    workers: IntGaugeVec,
    state_seconds_total: CounterVec,

    current: Arc<Mutex<HashMap<WorkerId, (WorkerState, Instant)>>>,
}

impl WorkerMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let transitions_total = register_int_counter_vec_with_registry!("fx_worker_transitions_total", "worker state transitions", &["state"], registry)
            .map_err(MetricsError::Registration)?;
        let workers = register_int_gauge_vec_with_registry!("fx_workers", "live workers by state", &["state"], registry)
            .map_err(MetricsError::Registration)?;
        let state_seconds_total = register_counter_vec_with_registry!("fx_worker_state_seconds_total", "time workers spent in each state", &["state"], registry)
            .map_err(MetricsError::Registration)?;

        Ok(Self {
            registry,
            transitions_total,
            workers,
            state_seconds_total,
            current: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn record(&self, event: &WorkerStateEvent) {
        self.transitions_total.with_label_values(&[event.state.as_str()]).inc();

        let mut current = self.current.lock();
        if let Some((previous, since)) = current.remove(&event.worker_id) {
            self.workers.with_label_values(&[previous.as_str()]).dec();
            let elapsed = event.at.saturating_duration_since(since).as_secs_f64();
            self.state_seconds_total.with_label_values(&[previous.as_str()]).inc_by(elapsed);
        }

        if !event.state.is_terminal() {
            self.workers.with_label_values(&[event.state.as_str()]).inc();
            current.insert(event.worker_id, (event.state, event.at));
        }
    }

    /// Records events until the pool is dropped.
    pub async fn run(self, mut events: broadcast::Receiver<WorkerStateEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.record(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "metrics fell behind worker state events"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    pub fn encode(&self) -> Result<String, MetricsError> {
        let metrics = self.registry.gather();
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&metrics).map_err(MetricsError::Encoding)
    }
}
