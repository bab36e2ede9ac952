// Shared test helpers: a scripted stats source and raw record builders

#![allow(dead_code)]

use bytes::Bytes;
use dockerstats::engine::{
    self, ClientRegistry, EngineConfig, EngineDeps, EngineError, EngineStats, StreamErrorPolicy,
};
use dockerstats::metrics::MetricContext;
use dockerstats::models::ContainerRef;
use dockerstats::source::{ByteStream, SourceError, StatsSource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;

pub type Feed = mpsc::UnboundedSender<Result<Bytes, std::io::Error>>;
type FeedRx = mpsc::UnboundedReceiver<Result<Bytes, std::io::Error>>;

/// In-memory source: tests choose the running containers and push raw bytes per container.
pub struct ScriptedSource {
    containers: Mutex<Result<Vec<ContainerRef>, String>>,
    pending: Mutex<HashMap<String, FeedRx>>,
    list_calls: AtomicUsize,
    opened: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            containers: Mutex::new(Ok(Vec::new())),
            pending: Mutex::new(HashMap::new()),
            list_calls: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
        })
    }

    pub fn set_running(&self, ids: &[&str]) {
        *self.containers.lock().unwrap() = Ok(ids
            .iter()
            .map(|id| ContainerRef::new(*id, format!("/{}", id)))
            .collect());
    }

    pub fn fail_listing(&self, message: &str) {
        *self.containers.lock().unwrap() = Err(message.to_string());
    }

    /// Prepare the next stream opened for `id`. Dropping the returned feed ends that stream.
    pub fn feed(&self, id: &str) -> Feed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.pending.lock().unwrap().insert(id.to_string(), rx);
        tx
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl StatsSource for ScriptedSource {
    async fn list_running(&self) -> Result<Vec<ContainerRef>, SourceError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.containers
            .lock()
            .unwrap()
            .clone()
            .map_err(SourceError::List)
    }

    async fn open_stats(&self, container: &ContainerRef) -> Result<ByteStream, SourceError> {
        let rx = self
            .pending
            .lock()
            .unwrap()
            .remove(&container.id)
            .ok_or_else(|| SourceError::Open {
                container: container.name.clone(),
                message: "no scripted stream".into(),
            })?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        let body = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(body))
    }
}

/// A Posix stats line: cpu = (total - pre_total) / (system - pre_system) * online * 100.
pub fn posix_record(id: &str, cpu_total: (u64, u64), system: (u64, u64), memory: u64) -> String {
    let line = serde_json::json!({
        "id": id,
        "name": format!("/{}", id),
        "os_type": "linux",
        "read": "2024-05-01T10:00:01Z",
        "preread": "2024-05-01T10:00:00Z",
        "cpu_stats": {
            "cpu_usage": { "total_usage": cpu_total.0 },
            "system_cpu_usage": system.0,
            "online_cpus": 1
        },
        "precpu_stats": {
            "cpu_usage": { "total_usage": cpu_total.1 },
            "system_cpu_usage": system.1,
            "online_cpus": 1
        },
        "memory_stats": { "usage": memory, "limit": memory * 4, "stats": {} },
        "networks": { "eth0": { "rx_bytes": 10, "tx_bytes": 20 } },
        "blkio_stats": { "io_service_bytes_recursive": [
            { "major": 8, "minor": 0, "op": "read", "value": 3 },
            { "major": 8, "minor": 0, "op": "write", "value": 4 }
        ] }
    });
    format!("{}\n", line)
}

pub fn simple_record(id: &str) -> String {
    posix_record(id, (200, 100), (2000, 1000), 1024)
}

pub fn send_line(feed: &Feed, line: &str) {
    feed.send(Ok(Bytes::from(line.to_string())))
        .expect("reader still attached");
}

pub struct RunningEngine {
    pub registry: Arc<ClientRegistry>,
    pub stats: Arc<EngineStats>,
    pub shutdown_tx: Option<oneshot::Sender<()>>,
    pub handle: tokio::task::JoinHandle<Result<(), EngineError>>,
}

impl RunningEngine {
    pub async fn shutdown(mut self) -> Result<(), EngineError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(2), self.handle)
            .await
            .expect("engine stops on shutdown")
            .expect("engine task did not panic")
    }
}

pub const HOST_MEMORY: u64 = 8 * 1024 * 1024 * 1024;

pub fn test_config(on_stream_error: StreamErrorPolicy, read_timeout: Option<Duration>) -> EngineConfig {
    EngineConfig {
        aggregator_buffer: 64,
        read_timeout,
        on_stream_error,
        list_retry: Duration::from_millis(10),
        stats_log_interval: Duration::from_secs(3600),
    }
}

pub fn start_engine(source: Arc<ScriptedSource>, config: EngineConfig) -> RunningEngine {
    let registry = Arc::new(ClientRegistry::new());
    let stats = Arc::new(EngineStats::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = engine::spawn(
        EngineDeps {
            source,
            registry: registry.clone(),
            metric_context: MetricContext::new(HOST_MEMORY),
            stats: stats.clone(),
            shutdown_rx,
        },
        config,
    );
    RunningEngine {
        registry,
        stats,
        shutdown_tx: Some(shutdown_tx),
        handle,
    }
}

/// Poll `cond` until it holds or a second passes.
pub async fn eventually(mut cond: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
