use crate::di::Services;
use std::sync::Arc;
use tlspol_application::ports::{PolicyRefresh, PolicyStore};
use tlspol_domain::Config;
use tlspol_infrastructure::socketmap::SocketmapServer;
use tlspol_jobs::PrefetchJob;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Run the daemon until a shutdown signal arrives, then flush the cache and
/// drain in-flight connections.
pub async fn run(config: &Config, services: Services) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone())?;

    let prefetch_handle = if config.server.prefetch {
        info!("Prefetching enabled");
        let refresh: Arc<dyn PolicyRefresh> = services.refresh.clone();
        let job = Arc::new(PrefetchJob::new(refresh).with_cancellation(shutdown.clone()));
        Some(job.start())
    } else {
        None
    };

    let server = SocketmapServer::new(services.handler.clone(), shutdown.clone());
    server
        .run(
            &config.server.address,
            config.server.socket_permissions.as_deref(),
        )
        .await?;

    // The accept loop only returns once the token fired.
    info!("Shutting down");
    if let Some(handle) = prefetch_handle {
        let _ = handle.await;
    }
    services.store.tidy().await;
    services.store.close().await;
    info!("Cache flushed, bye");
    Ok(())
}

fn spawn_signal_listener(shutdown: CancellationToken) -> anyhow::Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sighup = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
            _ = sigquit.recv() => {}
            _ = sighup.recv() => {}
        }
        info!("Received shutdown signal");
        shutdown.cancel();
    });
    Ok(())
}
