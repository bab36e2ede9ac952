use anyhow::Result;
use dockerstats::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let metric_context = host::metric_context().await?;
    let source = Arc::new(source::DockerSource::connect()?);
    let registry = Arc::new(engine::ClientRegistry::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let mut engine_handle = engine::spawn(
        engine::EngineDeps {
            source,
            registry: registry.clone(),
            metric_context,
            stats: Arc::new(engine::EngineStats::default()),
            shutdown_rx,
        },
        app_config.engine_config(),
    );

    let app = routes::app(registry, app_config.clone());
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        joined = &mut engine_handle => {
            // Fail fast: a fatal stream error takes the whole process down.
            joined??;
            anyhow::bail!("stats engine stopped unexpectedly");
        }
        _ = shutdown_signal() => {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
            if let Err(e) = engine_handle.await? {
                tracing::warn!(error = %e, "engine stopped with error during shutdown");
            }
        }
    }

    Ok(())
}
