//! RagVision HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use ragvision::DimConfig;
use ragvision::config::Config;
use ragvision::embedding::{ClipEmbedder, EmbeddingProvider};
use ragvision::gateway::{HandlerState, check_health, create_router_with_state};
use ragvision::index::SupportIndex;
use ragvision::pipeline::VisionRagService;
use ragvision::postprocess::ResponsePostprocessor;
use ragvision::reasoning::{MockInvoker, OpenAiInvoker, ReasoningInvoker};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const DEFAULT_HEALTH_CHECK_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check().await);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        classes = ?config.classes,
        "RagVision starting"
    );

    let labels = config.label_set()?;
    let positive = config.positive_label(&labels)?;

    if config.clip_model_path.is_none() {
        tracing::warn!("No RAGVISION_CLIP_MODEL_PATH configured, running embedder in stub mode");
    }
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(ClipEmbedder::load(config.clip_config())?);

    let invoker: Arc<dyn ReasoningInvoker> = if config.mock_provider {
        tracing::warn!("RAGVISION_MOCK_PROVIDER set, reasoning answers come from the mock invoker");
        Arc::new(MockInvoker::top_evidence())
    } else {
        let openai = config.openai_config();
        tracing::info!(
            endpoint = %openai.endpoint(),
            model = %openai.model,
            "Reasoning backend configured"
        );
        Arc::new(OpenAiInvoker::new(openai))
    };

    let index = Arc::new(SupportIndex::new(
        labels.clone(),
        DimConfig::new(embedder.dimension()),
    ));
    let service = Arc::new(VisionRagService::new(
        index,
        embedder,
        invoker,
        ResponsePostprocessor::new(labels, &positive),
        config.service_settings(),
    )?);

    if config.support_root.is_dir() {
        tracing::info!(root = %config.support_root.display(), "Loading support set...");
        let report = service.load_support_dir(&config.support_root).await?;
        tracing::info!(
            images = report.total_images(),
            patches = report.patches,
            skipped = report.skipped,
            "Support set ready"
        );
    } else {
        tracing::warn!(
            root = %config.support_root.display(),
            "Support root not found. Starting empty; upload images to populate."
        );
    }

    let state = HandlerState::new(service).with_support_root(config.support_root.clone());
    let app = create_router_with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("RagVision shutdown complete");
    Ok(())
}

async fn run_health_check() -> i32 {
    let port = std::env::var("RAGVISION_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_HEALTH_CHECK_PORT);

    if check_health(port, Duration::from_secs(1)).await {
        0
    } else {
        1
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
