use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use trafficlens_server::state::AppState;

/// `trafficlens health`: liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$TRAFFICLENS_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("TRAFFICLENS_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }
    // Structured JSON logging. Level controlled via RUST_LOG env var.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("trafficlens=info".parse()?),
        )
        .json()
        .init();

    let cfg = trafficlens_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/trafficlens.db", cfg.data_dir);
    let db = trafficlens_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    let addr = format!("0.0.0.0:{}", cfg.port);
    info!(
        port = cfg.port,
        row_limit = cfg.row_limit,
        max_group_by = cfg.max_group_by,
        identity_header = %cfg.identity_header,
        "TrafficLens listening on {}",
        addr
    );

    let state = Arc::new(AppState::new(db, cfg));
    let app = trafficlens_server::app::build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    info!("TrafficLens shut down");
    Ok(())
}
