// Stats collection engine: demand-gated fetch cycles over all running containers.
// Collection runs in the orchestrator and its readers; batching and fan-out run in the aggregator task.

pub mod aggregator;
pub mod decoder;
pub mod gate;
mod orchestrator;
pub mod reader;
pub mod registry;

pub use aggregator::{AggregatorClosed, FetchCycle};
pub use gate::DemandGate;
pub use reader::ReaderExit;
pub use registry::{Batch, ClientId, ClientRegistry};

use crate::metrics::MetricContext;
use crate::source::StatsSource;
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use tokio::sync::oneshot;
use tokio::time::Duration;
use tracing::Instrument;

/// What a transport error on one stats stream does to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorPolicy {
    /// Stop the engine; the process exits.
    #[default]
    Exit,
    /// End only the affected reader.
    StopReader,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("stats stream for {container} failed: {source}")]
    Stream {
        container: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    AggregatorClosed(#[from] AggregatorClosed),
}

/// Counters reported in the periodic engine stats log.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub cycles_started: AtomicU64,
    pub batches_broadcast: AtomicU64,
    pub cycles_abandoned: AtomicU64,
}

/// Source, shared state and shutdown for the engine.
pub struct EngineDeps<S> {
    pub source: Arc<S>,
    pub registry: Arc<ClientRegistry>,
    pub metric_context: MetricContext,
    pub stats: Arc<EngineStats>,
    pub shutdown_rx: oneshot::Receiver<()>,
}

pub struct EngineConfig {
    pub aggregator_buffer: usize,
    pub read_timeout: Option<Duration>,
    pub on_stream_error: StreamErrorPolicy,
    pub list_retry: Duration,
    pub stats_log_interval: Duration,
}

/// Spawns the aggregator and the orchestrator. The returned handle resolves when the engine stops:
/// `Ok` after shutdown, `Err` when a reader failed under [`StreamErrorPolicy::Exit`].
pub fn spawn<S: StatsSource>(
    deps: EngineDeps<S>,
    config: EngineConfig,
) -> tokio::task::JoinHandle<Result<(), EngineError>> {
    let EngineDeps {
        source,
        registry,
        metric_context,
        stats,
        shutdown_rx,
    } = deps;
    let EngineConfig {
        aggregator_buffer,
        read_timeout,
        on_stream_error,
        list_retry,
        stats_log_interval,
    } = config;

    let (aggregator, events) = aggregator::channel(aggregator_buffer);
    let aggregator_handle = aggregator::spawn(events, registry.clone(), stats, stats_log_interval);

    let orchestrator = orchestrator::Orchestrator {
        source,
        registry,
        aggregator,
        metric_context,
        reader_settings: reader::ReaderSettings {
            read_timeout,
            on_stream_error,
        },
        list_retry,
    };

    tokio::spawn(
        async move {
            let result = orchestrator.run(shutdown_rx).await;
            // Orchestrator and readers held the last senders; the aggregator drains and exits.
            if let Err(e) = aggregator_handle.await {
                tracing::warn!(error = %e, "aggregator task failed");
            }
            result
        }
        .instrument(tracing::debug_span!("engine")),
    )
}
