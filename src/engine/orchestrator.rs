// Fetch orchestrator: one cycle per gate opening, one reader per running container

use super::EngineError;
use super::aggregator::AggregatorHandle;
use super::reader::{Reader, ReaderExit, ReaderSettings};
use super::registry::ClientRegistry;
use crate::metrics::MetricContext;
use crate::source::StatsSource;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio::time::{Duration, sleep};

pub(super) struct Orchestrator<S> {
    pub source: Arc<S>,
    pub registry: Arc<ClientRegistry>,
    pub aggregator: AggregatorHandle,
    pub metric_context: MetricContext,
    pub reader_settings: ReaderSettings,
    pub list_retry: Duration,
}

impl<S: StatsSource> Orchestrator<S> {
    /// Loops until shutdown. Returns an error only when a reader fails fatally.
    pub async fn run(self, mut shutdown_rx: oneshot::Receiver<()>) -> Result<(), EngineError> {
        loop {
            tokio::select! {
                _ = self.registry.gate().wait() => {}
                _ = &mut shutdown_rx => break,
            }

            let containers = match self.source.list_running().await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(error = %e, operation = "list_running", "container listing failed");
                    if self.pause(&mut shutdown_rx).await {
                        break;
                    }
                    continue;
                }
            };
            if containers.is_empty() {
                tracing::debug!("no running containers");
                if self.pause(&mut shutdown_rx).await {
                    break;
                }
                continue;
            }

            self.aggregator.start_cycle(containers.len()).await?;
            tracing::debug!(containers = containers.len(), "cycle started");

            let mut readers = JoinSet::new();
            for container in containers {
                let reader = Reader {
                    source: self.source.clone(),
                    registry: self.registry.clone(),
                    aggregator: self.aggregator.clone(),
                    metric_context: self.metric_context,
                    settings: self.reader_settings,
                };
                readers.spawn(reader.run(container));
            }

            loop {
                tokio::select! {
                    joined = readers.join_next() => match joined {
                        Some(Ok(Ok(exit))) => {
                            log_exit(exit);
                            // This cycle can no longer complete; end it so the next one relists.
                            if exit != ReaderExit::NoClients && self.registry.size() > 0 {
                                readers.abort_all();
                            }
                        }
                        Some(Ok(Err(e))) => {
                            readers.abort_all();
                            return Err(e);
                        }
                        Some(Err(e)) if e.is_cancelled() => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "reader task failed");
                            readers.abort_all();
                        }
                        None => break,
                    },
                    _ = &mut shutdown_rx => {
                        readers.abort_all();
                        tracing::debug!("Orchestrator shutting down");
                        return Ok(());
                    }
                }
            }
            tracing::debug!("cycle finished");
            // The cycle ended while clients remain; don't hammer the daemon.
            if self.registry.size() > 0 && self.pause(&mut shutdown_rx).await {
                break;
            }
        }
        tracing::debug!("Orchestrator shutting down");
        Ok(())
    }

    /// Back off before retrying; true when shutdown arrived meanwhile.
    async fn pause(&self, shutdown_rx: &mut oneshot::Receiver<()>) -> bool {
        tokio::select! {
            _ = sleep(self.list_retry) => false,
            _ = shutdown_rx => true,
        }
    }
}

fn log_exit(exit: ReaderExit) {
    match exit {
        ReaderExit::NoClients | ReaderExit::StreamEnded => {
            tracing::debug!(?exit, "reader finished");
        }
        ReaderExit::StreamFailed | ReaderExit::OpenFailed => {
            tracing::info!(?exit, "reader finished early");
        }
    }
}
