// Normalized per-container stat sent to dashboards

use serde::{Deserialize, Serialize};

/// One container's metrics for one cycle. Serializes with the dashboard's camelCase keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedStat {
    pub id: String,
    pub name: String,
    /// Used memory in bytes, reclaimable cache excluded.
    pub memory: f64,
    /// Host total memory in bytes.
    pub memory_limit: f64,
    pub memory_percent: f64,
    /// CPU usage percent (may exceed 100 on multi-core hosts).
    pub cpu: f64,
    pub net_in: f64,
    pub net_out: f64,
    /// Bytes written to block devices.
    pub block_in: u64,
    /// Bytes read from block devices.
    pub block_out: u64,
}
