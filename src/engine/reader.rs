// Per-container stream reader

use super::aggregator::AggregatorHandle;
use super::decoder::{Frame, RecordDecoder};
use super::registry::ClientRegistry;
use super::{EngineError, StreamErrorPolicy};
use crate::metrics::{self, MetricContext};
use crate::models::{ContainerRef, ContainerSnapshot};
use crate::source::{ByteStream, StatsSource};
use bytes::Bytes;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::time::{Duration, timeout};
use tracing::{debug, info, instrument, warn};

/// How a reader finished when it did not fail fatally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// Registry was empty at a record boundary.
    NoClients,
    /// The daemon closed the stream.
    StreamEnded,
    /// Transport error under [`StreamErrorPolicy::StopReader`].
    StreamFailed,
    /// The stream could not be opened.
    OpenFailed,
}

#[derive(Debug, Clone, Copy)]
pub struct ReaderSettings {
    pub read_timeout: Option<Duration>,
    pub on_stream_error: StreamErrorPolicy,
}

pub struct Reader<S> {
    pub source: Arc<S>,
    pub registry: Arc<ClientRegistry>,
    pub aggregator: AggregatorHandle,
    pub metric_context: MetricContext,
    pub settings: ReaderSettings,
}

impl<S: StatsSource> Reader<S> {
    /// Read `container`'s stats stream until clients are gone or the stream ends.
    #[instrument(skip_all, fields(container = %container.name, id = %container.id))]
    pub async fn run(self, container: ContainerRef) -> Result<ReaderExit, EngineError> {
        let mut body = match self.source.open_stats(&container).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, operation = "open_stats", "stats stream unavailable");
                return Ok(ReaderExit::OpenFailed);
            }
        };
        let mut decoder = RecordDecoder::new();

        loop {
            let chunk = match next_chunk(&mut body, self.settings.read_timeout).await {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return self.stream_failed(&container, e),
                None => {
                    if !decoder.is_empty() {
                        info!(
                            trailing = %String::from_utf8_lossy(decoder.remaining()),
                            "stats stream ended with trailing bytes"
                        );
                    }
                    debug!("stats stream ended");
                    return Ok(ReaderExit::StreamEnded);
                }
            };

            decoder.push(&chunk);
            while let Some(frame) = decoder.next_frame() {
                if self.registry.size() == 0 {
                    debug!("no clients left, closing stats stream");
                    return Ok(ReaderExit::NoClients);
                }
                match frame {
                    Frame::Record(bytes) => {
                        match serde_json::from_slice::<ContainerSnapshot>(&bytes) {
                            Ok(snapshot) => {
                                let stat = metrics::normalize(
                                    &snapshot,
                                    snapshot.host_family(),
                                    &self.metric_context,
                                    &container,
                                );
                                self.aggregator.collect(stat).await?;
                            }
                            Err(e) => {
                                warn!(error = %e, operation = "decode", "stats record skipped");
                            }
                        }
                    }
                    Frame::Malformed { skipped, error } => {
                        warn!(
                            error = %error,
                            bytes = skipped.len(),
                            operation = "decode",
                            "malformed stats line skipped"
                        );
                    }
                }
            }
        }
    }

    fn stream_failed(
        &self,
        container: &ContainerRef,
        error: std::io::Error,
    ) -> Result<ReaderExit, EngineError> {
        match self.settings.on_stream_error {
            StreamErrorPolicy::Exit => Err(EngineError::Stream {
                container: container.name.clone(),
                source: error,
            }),
            StreamErrorPolicy::StopReader => {
                warn!(error = %error, "stats stream failed, reader stopped");
                Ok(ReaderExit::StreamFailed)
            }
        }
    }
}

async fn next_chunk(
    body: &mut ByteStream,
    read_timeout: Option<Duration>,
) -> Option<Result<Bytes, std::io::Error>> {
    match read_timeout {
        Some(limit) => match timeout(limit, body.next()).await {
            Ok(item) => item,
            Err(_) => Some(Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no stats received for {:?}", limit),
            ))),
        },
        None => body.next().await,
    }
}
