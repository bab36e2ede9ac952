// Raw Docker stats record, one per line on the stats stream.
// Every field is optional: the daemon omits counters depending on host family and cgroup version.

use super::HostFamily;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContainerSnapshot {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Daemon host OS ("linux", "windows").
    pub os_type: Option<String>,
    /// RFC 3339 timestamp of this sample.
    pub read: Option<String>,
    /// RFC 3339 timestamp of the previous sample.
    pub preread: Option<String>,
    /// Processor count (Windows only).
    pub num_procs: Option<u32>,
    pub cpu_stats: Option<CpuStats>,
    pub precpu_stats: Option<CpuStats>,
    pub memory_stats: Option<MemoryStats>,
    pub networks: Option<HashMap<String, NetworkCounters>>,
    pub blkio_stats: Option<BlkioStats>,
    pub storage_stats: Option<StorageCounters>,
}

impl ContainerSnapshot {
    /// Counter layout of this record. Records without `os_type` are treated as Posix.
    pub fn host_family(&self) -> HostFamily {
        self.os_type
            .as_deref()
            .map(HostFamily::from_os_type)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuStats {
    pub cpu_usage: Option<CpuUsage>,
    pub system_cpu_usage: Option<u64>,
    pub online_cpus: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuUsage {
    pub total_usage: Option<u64>,
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryStats {
    pub usage: Option<u64>,
    /// cgroup memory.stat entries (cache, inactive_file, total_inactive_file, ...).
    pub stats: Option<HashMap<String, u64>>,
    #[serde(rename = "privateworkingset")]
    pub private_working_set: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkCounters {
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlkioStats {
    pub io_service_bytes_recursive: Option<Vec<BlkioEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlkioEntry {
    pub op: Option<String>,
    pub value: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageCounters {
    pub read_size_bytes: Option<u64>,
    pub write_size_bytes: Option<u64>,
}
