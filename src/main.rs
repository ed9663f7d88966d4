use anyhow::Context;
use filemill::engines::{PdfEngine, ToolContext};
use filemill::handlers::AppState;
use filemill::router::SmartRouter;
use filemill::{app, Config, Platform, SystemRunner};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filemill=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();
    let platform = Platform::current();
    if let Platform::Unsupported(name) = &platform {
        warn!("Platform {} is not supported; every conversion will fail", name);
    }

    let ctx = ToolContext::new(platform, config.tools.clone(), Arc::new(SystemRunner));

    // Runs every engine's version check once
    let smart_router = SmartRouter::new(ctx.clone()).await;

    let state = Arc::new(AppState {
        router: smart_router,
        inspector: Arc::new(PdfEngine::new(ctx)),
    });

    let listener = tokio::net::TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!("🚀 filemill server running on http://{}", config.addr);
    info!("📖 API documentation: http://{}/info", config.addr);
    info!("🔄 Convert files: POST http://{}/convert", config.addr);

    axum::serve(listener, app(state))
        .await
        .context("server error")?;

    Ok(())
}
