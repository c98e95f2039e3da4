//! Server lifecycle: bind, serve the intake router, stop on Ctrl-C.
//!
//! `start_on` spawns the server in a background task and hands back a handle
//! with a shutdown channel; `serve` is the foreground variant the binary uses.
//! [`IntakeServer::stop`] returns only once in-flight requests have drained.

use std::net::SocketAddr;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::intake_router;
use crate::api::types::AppContext;

/// Handle to a server running in a background task.
pub struct IntakeServer {
    pub addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl IntakeServer {
    /// Signal graceful shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        if self.shutdown_tx.send(()).is_ok() {
            tracing::info!("Intake server shutdown signal sent");
        }
        if let Err(e) = self.task.await {
            tracing::error!("Intake server task failed: {e}");
        }
    }
}

/// Bind `addr` and serve in a background task.
pub async fn start_on(ctx: AppContext, addr: SocketAddr) -> std::io::Result<IntakeServer> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    let app = intake_router(ctx);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
            tracing::info!("Intake server received shutdown signal");
        };

        tracing::info!(%addr, "Intake server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Intake server error: {e}");
        }

        tracing::info!("Intake server stopped");
    });

    Ok(IntakeServer {
        addr,
        shutdown_tx,
        task,
    })
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(ctx: AppContext, addr: SocketAddr) -> std::io::Result<()> {
    let server = start_on(ctx, addr).await?;
    tracing::info!(addr = %server.addr, "Listening for receipts");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
    server.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::extraction::pdfium::MockPdfPageRenderer;
    use crate::pipeline::extraction::{ExtractionAdapter, MockVisionClient};
    use crate::pipeline::sinks::{MockArchiveSink, MockNotificationSink};
    use crate::pipeline::IntakePipeline;
    use crate::settings::InMemorySettings;

    fn test_ctx(root: &std::path::Path) -> AppContext {
        let pipeline = IntakePipeline::new(
            ExtractionAdapter::new(
                Arc::new(MockVisionClient::new("{}")),
                Arc::new(MockPdfPageRenderer::new(1)),
            ),
            Arc::new(MockArchiveSink::new()),
            Arc::new(MockNotificationSink::new()),
            None,
            root.to_path_buf(),
        );
        AppContext::new(Arc::new(pipeline), Arc::new(InMemorySettings::default()))
    }

    #[tokio::test]
    async fn start_and_stop_server() {
        let dir = tempfile::tempdir().unwrap();
        let server = start_on(test_ctx(dir.path()), "127.0.0.1:0".parse().unwrap())
            .await
            .expect("server should start");
        assert!(server.addr.port() > 0);

        let url = format!("http://{}/health", server.addr);
        let resp = reqwest::get(&url).await.unwrap();
        assert!(resp.status().is_success());
        drop(resp);

        let addr = server.addr;
        tokio::time::timeout(std::time::Duration::from_secs(5), server.stop())
            .await
            .expect("server should stop");
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
