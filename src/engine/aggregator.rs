// Cycle aggregation: readers send stats over one channel, a single task batches and broadcasts.

use super::EngineStats;
use super::registry::{Batch, ClientRegistry};
use crate::models::NormalizedStat;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;
use tokio::time::{Duration, interval};
use tracing::Instrument;

pub enum CycleEvent {
    /// Sent by the orchestrator before any reader of the cycle is spawned.
    Start { expected: usize },
    Stat(NormalizedStat),
}

/// The stats collected so far for the running cycle.
#[derive(Debug, Default)]
pub struct FetchCycle {
    expected: usize,
    stats: Vec<NormalizedStat>,
}

impl FetchCycle {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            stats: Vec::with_capacity(expected),
        }
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Add one stat. A container already in the pending batch is overwritten in place, so a batch
    /// never holds two entries for one container. Returns the full batch, leaving the cycle empty,
    /// once every expected container has reported.
    pub fn collect(&mut self, stat: NormalizedStat) -> Option<Vec<NormalizedStat>> {
        if self.expected == 0 {
            return None;
        }
        match self.stats.iter_mut().find(|s| s.id == stat.id) {
            Some(existing) => *existing = stat,
            None => self.stats.push(stat),
        }
        if self.stats.len() == self.expected {
            Some(std::mem::replace(
                &mut self.stats,
                Vec::with_capacity(self.expected),
            ))
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("aggregator task stopped")]
pub struct AggregatorClosed;

/// Sending side used by the orchestrator and the readers.
#[derive(Clone)]
pub struct AggregatorHandle {
    tx: mpsc::Sender<CycleEvent>,
}

impl AggregatorHandle {
    pub async fn start_cycle(&self, expected: usize) -> Result<(), AggregatorClosed> {
        self.tx
            .send(CycleEvent::Start { expected })
            .await
            .map_err(|_| AggregatorClosed)
    }

    pub async fn collect(&self, stat: NormalizedStat) -> Result<(), AggregatorClosed> {
        self.tx
            .send(CycleEvent::Stat(stat))
            .await
            .map_err(|_| AggregatorClosed)
    }
}

pub fn channel(capacity: usize) -> (AggregatorHandle, mpsc::Receiver<CycleEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (AggregatorHandle { tx }, rx)
}

/// Spawns the task that owns the cycle buffer. Exits once every handle is dropped.
pub fn spawn(
    mut rx: mpsc::Receiver<CycleEvent>,
    registry: Arc<ClientRegistry>,
    stats: Arc<EngineStats>,
    stats_log_interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut cycle = FetchCycle::default();
        let mut stats_log_tick = interval(stats_log_interval);
        stats_log_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(CycleEvent::Start { expected }) => {
                            if !cycle.is_empty() {
                                stats.cycles_abandoned.fetch_add(1, Ordering::Relaxed);
                                tracing::debug!(
                                    collected = cycle.len(),
                                    expected = cycle.expected(),
                                    "previous cycle abandoned"
                                );
                            }
                            stats.cycles_started.fetch_add(1, Ordering::Relaxed);
                            cycle = FetchCycle::new(expected);
                        }
                        Some(CycleEvent::Stat(stat)) => {
                            if let Some(batch) = cycle.collect(stat) {
                                publish(&registry, &stats, &batch);
                            }
                        }
                        None => break,
                    }
                }
                _ = stats_log_tick.tick() => {
                    tracing::info!(
                        clients = registry.size(),
                        cycles_started = stats.cycles_started.load(Ordering::Relaxed),
                        batches_broadcast = stats.batches_broadcast.load(Ordering::Relaxed),
                        cycles_abandoned = stats.cycles_abandoned.load(Ordering::Relaxed),
                        "engine stats"
                    );
                }
            }
        }
        tracing::debug!("Aggregator shutting down");
    }
    .instrument(tracing::debug_span!("aggregator")))
}

fn publish(registry: &ClientRegistry, stats: &EngineStats, batch: &[NormalizedStat]) {
    let message: Batch = match serde_json::to_string(batch) {
        Ok(json) => Arc::from(json),
        Err(e) => {
            tracing::warn!(error = %e, operation = "serialize_batch", "batch serialization failed");
            return;
        }
    };
    let delivered = registry.broadcast(message);
    stats.batches_broadcast.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(
        operation = "broadcast",
        containers = batch.len(),
        delivered,
        "batch broadcast"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(id: &str, cpu: f64) -> NormalizedStat {
        NormalizedStat {
            id: id.to_string(),
            name: format!("/{}", id),
            memory: 0.0,
            memory_limit: 0.0,
            memory_percent: 0.0,
            cpu,
            net_in: 0.0,
            net_out: 0.0,
            block_in: 0,
            block_out: 0,
        }
    }

    #[test]
    fn batch_only_when_complete() {
        let mut cycle = FetchCycle::new(3);
        assert!(cycle.collect(stat("a", 1.0)).is_none());
        assert!(cycle.collect(stat("b", 2.0)).is_none());
        let batch = cycle.collect(stat("c", 3.0)).expect("complete");
        assert_eq!(batch.len(), 3);
        assert!(cycle.is_empty());
        assert_eq!(cycle.expected(), 3);
    }

    #[test]
    fn batch_preserves_collection_order() {
        let mut cycle = FetchCycle::new(2);
        cycle.collect(stat("b", 0.0));
        let batch = cycle.collect(stat("a", 0.0)).unwrap();
        let ids: Vec<_> = batch.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn repeat_report_replaces_pending_entry() {
        let mut cycle = FetchCycle::new(2);
        assert!(cycle.collect(stat("a", 1.0)).is_none());
        assert!(cycle.collect(stat("a", 5.0)).is_none());
        assert_eq!(cycle.len(), 1);
        let batch = cycle.collect(stat("b", 2.0)).unwrap();
        assert_eq!(batch[0].cpu, 5.0);
    }

    #[test]
    fn refills_after_each_batch() {
        let mut cycle = FetchCycle::new(1);
        assert!(cycle.collect(stat("a", 1.0)).is_some());
        assert!(cycle.collect(stat("a", 2.0)).is_some());
    }

    #[test]
    fn empty_cycle_never_emits() {
        let mut cycle = FetchCycle::default();
        assert!(cycle.collect(stat("a", 1.0)).is_none());
        assert!(cycle.is_empty());
    }
}
