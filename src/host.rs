// Host introspection via sysinfo

use crate::metrics::MetricContext;
use sysinfo::System;

/// Total physical memory in bytes. Refreshes memory only.
pub fn total_memory_bytes() -> u64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.total_memory()
}

/// Sample host memory once and build the calculators' context from it.
pub async fn metric_context() -> anyhow::Result<MetricContext> {
    let total = tokio::task::spawn_blocking(total_memory_bytes)
        .await
        .map_err(|e| anyhow::anyhow!("sysinfo task join: {}", e))?;
    anyhow::ensure!(total > 0, "host total memory reported as 0");
    tracing::info!(host_memory_bytes = total, "host memory sampled");
    Ok(MetricContext::new(total))
}
