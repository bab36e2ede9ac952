// Docker stats source via bollard

use super::{ByteStream, SourceError, StatsSource};
use crate::models::ContainerRef;
use bollard::Docker;
use bollard::query_parameters::{ListContainersOptions, StatsOptions};
use bytes::Bytes;
use futures_util::StreamExt;
use std::collections::HashMap;
use tracing::instrument;

pub struct DockerSource {
    docker: Docker,
}

impl DockerSource {
    /// Connect over the local socket (unix socket or named pipe). Does not contact the daemon yet.
    pub fn connect() -> Result<Self, SourceError> {
        let docker = Docker::connect_with_local_defaults().map_err(SourceError::Connect)?;
        Ok(Self { docker })
    }
}

impl StatsSource for DockerSource {
    #[instrument(skip(self), fields(source = "docker", operation = "list_running"))]
    async fn list_running(&self) -> Result<Vec<ContainerRef>, SourceError> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let filter = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(filter))
            .await
            .map_err(|e| SourceError::List(e.to_string()))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                // Docker reports names with a leading '/', which the dashboard expects.
                let name = c
                    .names
                    .and_then(|n| n.into_iter().next())
                    .unwrap_or_else(|| format!("/{}", id));
                Some(ContainerRef { id, name })
            })
            .collect())
    }

    async fn open_stats(&self, container: &ContainerRef) -> Result<ByteStream, SourceError> {
        let options = StatsOptions {
            stream: true,
            ..Default::default()
        };
        // Re-encode each record as one JSON line so the engine sees the daemon's wire shape.
        let body = self
            .docker
            .stats(&container.id, Some(options))
            .map(|result| match result {
                Ok(stats) => serde_json::to_vec(&stats)
                    .map(|mut line| {
                        line.push(b'\n');
                        Bytes::from(line)
                    })
                    .map_err(std::io::Error::other),
                Err(e) => Err(std::io::Error::other(e)),
            });
        Ok(Box::pin(body))
    }
}
