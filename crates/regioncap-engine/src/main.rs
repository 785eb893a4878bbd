//! regioncap admin server.
//!
//! - Config: `$REGIONCAP_CONFIG` (default `regioncap.yaml`), strict parsing
//! - Store: SQLite at `storage.path`
//! - HTTP: limits, statistics, reload/reset, `/metrics`

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use regioncap_engine::{app_state::AppState, config::FileSource, router};

const CONFIG_ENV: &str = "REGIONCAP_CONFIG";
const DEFAULT_CONFIG: &str = "regioncap.yaml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let state = AppState::open(Arc::new(FileSource::new(&path)), None)?;
    let listen: SocketAddr = state
        .admin()
        .listen
        .parse()
        .map_err(|e| format!("admin.listen must be a valid SocketAddr: {e}"))?;

    let _maintenance = state.spawn_maintenance();
    let app = router::build_router(state);

    tracing::info!(%listen, config = %path, "regioncap starting");
    let listener = tokio::net::TcpListener::bind(listen).await?;

    axum::serve(listener, app).await?;
    Ok(())
}
