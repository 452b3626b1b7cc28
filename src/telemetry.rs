//! Tracing setup and process shutdown wiring.

use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Applied when `RUST_LOG` is unset. The simulation pipeline logs its
/// fitted and scaled parameters at debug; opt in with
/// `RUST_LOG=solar_pv_emulator=debug`.
const DEFAULT_FILTER: &str = "info,hyper=warn,tower_http=info,sqlx=warn";

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Resolves once the process is asked to stop, on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let interrupt = async {
        signal::ctrl_c().await.expect("SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
    info!("shutdown signal received, draining in-flight requests");
}
