//! Test server harness.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use ragvision::gateway::{HandlerState, create_router_with_state};
use ragvision::pipeline::VisionRagService;
use ragvision::reasoning::{MockInvoker, ReasoningInvoker};

use super::fixtures::build_service;

const STARTUP_WAIT_TIMEOUT_SECS: u64 = 5;
const STARTUP_POLL_INTERVAL_MS: u64 = 50;

pub struct TestServerConfig {
    pub invoker: Arc<dyn ReasoningInvoker>,
    /// Persist uploads under a temporary support root.
    pub persist_uploads: bool,
}

impl Default for TestServerConfig {
    fn default() -> Self {
        Self {
            invoker: Arc::new(MockInvoker::top_evidence()),
            persist_uploads: false,
        }
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub service: Arc<VisionRagService>,
    pub support_root: Option<PathBuf>,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _temp_dir: Option<TempDir>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServerStartupError {
    #[error("Server failed to start within timeout")]
    Timeout,
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
}

pub async fn wait_for_server_ready(
    addr: SocketAddr,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServerStartupError> {
    let start = std::time::Instant::now();

    loop {
        if start.elapsed() > timeout {
            return Err(ServerStartupError::Timeout);
        }

        match tokio::net::TcpStream::connect(addr).await {
            Ok(_) => return Ok(()),
            Err(_) => tokio::time::sleep(interval).await,
        }
    }
}

/// Spawns a server on an ephemeral port with a stub embedder and the given invoker.
pub async fn spawn_test_server(config: TestServerConfig) -> Result<TestServer, ServerStartupError> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let local_addr = listener.local_addr()?;

    let service = build_service(config.invoker);
    let mut state = HandlerState::new(Arc::clone(&service));

    let (support_root, _temp_dir) = if config.persist_uploads {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();
        state = state.with_support_root(root.clone());
        (Some(root), Some(temp_dir))
    } else {
        (None, None)
    };

    let app = create_router_with_state(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    wait_for_server_ready(
        local_addr,
        Duration::from_secs(STARTUP_WAIT_TIMEOUT_SECS),
        Duration::from_millis(STARTUP_POLL_INTERVAL_MS),
    )
    .await?;

    Ok(TestServer {
        addr: local_addr,
        service,
        support_root,
        _server_handle: server_handle,
        shutdown_tx: Some(shutdown_tx),
        _temp_dir,
    })
}
