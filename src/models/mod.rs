// Domain models: raw Docker stats records and the normalized dashboard payload

mod container;
mod snapshot;
mod stat;

pub use container::{ContainerRef, HostFamily};
pub use snapshot::{
    BlkioEntry, BlkioStats, ContainerSnapshot, CpuStats, CpuUsage, MemoryStats, NetworkCounters,
    StorageCounters,
};
pub use stat::NormalizedStat;
