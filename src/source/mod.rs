// Host metrics source: container listing and per-container raw stats streams

mod docker;

pub use docker::DockerSource;

use crate::models::ContainerRef;
use bytes::Bytes;
use futures_util::Stream;
use std::future::Future;
use std::pin::Pin;

/// Raw stats bytes, one JSON object per update. Chunking is arbitrary.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("docker connect failed: {0}")]
    Connect(#[source] bollard::errors::Error),

    #[error("listing containers failed: {0}")]
    List(String),

    #[error("opening stats stream for {container} failed: {message}")]
    Open { container: String, message: String },
}

/// Where the engine gets containers and their stats from. Docker in production, scripted in tests.
pub trait StatsSource: Send + Sync + 'static {
    fn list_running(&self) -> impl Future<Output = Result<Vec<ContainerRef>, SourceError>> + Send;

    /// Live stats for one container. Each record carries its own `os_type`.
    fn open_stats(
        &self,
        container: &ContainerRef,
    ) -> impl Future<Output = Result<ByteStream, SourceError>> + Send;
}
