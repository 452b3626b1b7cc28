use anyhow::Result;
use solar_pv_emulator::config::Config;
use solar_pv_emulator::controller::AppState;
use solar_pv_emulator::{api, telemetry};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;
    let addr = cfg.server.socket_addr()?;
    if cfg.server.host == "0.0.0.0" {
        warn!("binding to 0.0.0.0 exposes the service to the network; prefer 127.0.0.1 behind a reverse proxy");
    }

    let state = AppState::new(cfg.clone()).await?;
    let app = api::router(state, &cfg);

    info!(%addr, "starting solar PV emulator");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}
