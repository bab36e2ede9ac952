// Metric calculators: raw Docker stats record -> NormalizedStat.
// All functions are total: absent counters count as zero.

use crate::models::{
    BlkioStats, ContainerRef, ContainerSnapshot, CpuStats, HostFamily, MemoryStats,
    NetworkCounters, NormalizedStat, StorageCounters,
};
use chrono::DateTime;
use std::collections::HashMap;

/// Host-wide values the calculators need, sampled once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricContext {
    pub host_memory_bytes: u64,
}

impl MetricContext {
    pub fn new(host_memory_bytes: u64) -> Self {
        Self { host_memory_bytes }
    }
}

/// Build the dashboard record for one snapshot. Identity falls back to the listed container
/// when the record omits it.
pub fn normalize(
    snapshot: &ContainerSnapshot,
    family: HostFamily,
    ctx: &MetricContext,
    container: &ContainerRef,
) -> NormalizedStat {
    let (cpu, memory, (block_read, block_write)) = match family {
        HostFamily::Posix => (
            cpu_percent_posix(
                snapshot.cpu_stats.as_ref(),
                snapshot.precpu_stats.as_ref(),
            ),
            memory_usage_posix(snapshot.memory_stats.as_ref()),
            block_io_posix(snapshot.blkio_stats.as_ref()),
        ),
        HostFamily::Windows => (
            cpu_percent_windows(snapshot),
            memory_usage_windows(snapshot.memory_stats.as_ref()),
            block_io_windows(snapshot.storage_stats.as_ref()),
        ),
    };
    let (net_in, net_out) = network_io(snapshot.networks.as_ref());

    NormalizedStat {
        id: snapshot
            .id
            .clone()
            .unwrap_or_else(|| container.id.clone()),
        name: snapshot
            .name
            .clone()
            .unwrap_or_else(|| container.name.clone()),
        memory,
        memory_limit: ctx.host_memory_bytes as f64,
        memory_percent: memory_percent(memory, ctx.host_memory_bytes),
        cpu,
        net_in,
        net_out,
        block_in: block_write,
        block_out: block_read,
    }
}

fn total_usage(stats: Option<&CpuStats>) -> u64 {
    stats
        .and_then(|c| c.cpu_usage.as_ref())
        .and_then(|u| u.total_usage)
        .unwrap_or(0)
}

/// `(cpu delta / system delta) * online cpus * 100`; 0 unless both deltas are positive.
pub fn cpu_percent_posix(current: Option<&CpuStats>, previous: Option<&CpuStats>) -> f64 {
    let cpu_delta = total_usage(current).saturating_sub(total_usage(previous));
    let system_delta = current
        .and_then(|c| c.system_cpu_usage)
        .unwrap_or(0)
        .saturating_sub(previous.and_then(|p| p.system_cpu_usage).unwrap_or(0));
    if cpu_delta == 0 || system_delta == 0 {
        return 0.0;
    }

    let online = match current.and_then(|c| c.online_cpus).unwrap_or(0) {
        0 => current
            .and_then(|c| c.cpu_usage.as_ref())
            .and_then(|u| u.percpu_usage.as_ref())
            .map_or(0, |p| p.len() as u32),
        n => n,
    };
    (cpu_delta as f64 / system_delta as f64) * online as f64 * 100.0
}

/// CPU time used over the possible 100ns intervals between `preread` and `read`, across all
/// processors.
pub fn cpu_percent_windows(snapshot: &ContainerSnapshot) -> f64 {
    let parse = |ts: Option<&String>| ts.and_then(|t| DateTime::parse_from_rfc3339(t).ok());
    let elapsed_ns = match (
        parse(snapshot.read.as_ref()),
        parse(snapshot.preread.as_ref()),
    ) {
        (Some(read), Some(preread)) => (read - preread).num_nanoseconds().unwrap_or(0),
        _ => 0,
    };
    if elapsed_ns <= 0 {
        return 0.0;
    }

    let possible_intervals = (elapsed_ns as u64 / 100) * snapshot.num_procs.unwrap_or(0) as u64;
    if possible_intervals == 0 {
        return 0.0;
    }
    let used_intervals = total_usage(snapshot.cpu_stats.as_ref())
        .saturating_sub(total_usage(snapshot.precpu_stats.as_ref()));
    used_intervals as f64 / possible_intervals as f64 * 100.0
}

/// Usage minus the reclaimable page cache (cgroup v1 `total_inactive_file`, cgroup v2
/// `inactive_file`, older daemons `cache`).
pub fn memory_usage_posix(memory: Option<&MemoryStats>) -> f64 {
    let Some(memory) = memory else {
        return 0.0;
    };
    let usage = memory.usage.unwrap_or(0);
    let reclaimable = memory.stats.as_ref().and_then(reclaimable_cache);
    match reclaimable {
        Some(cache) if cache < usage => (usage - cache) as f64,
        _ => usage as f64,
    }
}

fn reclaimable_cache(stats: &HashMap<String, u64>) -> Option<u64> {
    ["total_inactive_file", "inactive_file", "cache"]
        .iter()
        .find_map(|key| stats.get(*key).copied())
}

pub fn memory_usage_windows(memory: Option<&MemoryStats>) -> f64 {
    memory
        .and_then(|m| m.private_working_set)
        .unwrap_or(0) as f64
}

pub fn memory_percent(usage: f64, host_memory_bytes: u64) -> f64 {
    if host_memory_bytes == 0 {
        return 0.0;
    }
    usage / host_memory_bytes as f64 * 100.0
}

/// Summed (rx, tx) bytes across all interfaces.
pub fn network_io(networks: Option<&HashMap<String, NetworkCounters>>) -> (f64, f64) {
    networks.map_or((0.0, 0.0), |n| {
        n.values().fold((0.0, 0.0), |(rx, tx), v| {
            (
                rx + v.rx_bytes.unwrap_or(0) as f64,
                tx + v.tx_bytes.unwrap_or(0) as f64,
            )
        })
    })
}

/// Summed (read, write) bytes across all block devices.
pub fn block_io_posix(blkio: Option<&BlkioStats>) -> (u64, u64) {
    blkio
        .and_then(|b| b.io_service_bytes_recursive.as_ref())
        .map_or((0, 0), |entries| {
            let mut read = 0u64;
            let mut write = 0u64;
            for e in entries {
                let value = e.value.unwrap_or(0);
                match e.op.as_deref() {
                    Some(op) if op.eq_ignore_ascii_case("read") => {
                        read = read.saturating_add(value)
                    }
                    Some(op) if op.eq_ignore_ascii_case("write") => {
                        write = write.saturating_add(value)
                    }
                    _ => {}
                }
            }
            (read, write)
        })
}

/// (read, write) bytes from Windows storage stats.
pub fn block_io_windows(storage: Option<&StorageCounters>) -> (u64, u64) {
    storage.map_or((0, 0), |s| {
        (
            s.read_size_bytes.unwrap_or(0),
            s.write_size_bytes.unwrap_or(0),
        )
    })
}
