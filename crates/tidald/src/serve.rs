//! Prediction API role.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tidal_core::{ServerConfig, TidalConfig};
use tidal_log::ObservationStore;
use tidal_predict::{PredictionService, load_predictor};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// Open the observation log and model and assemble the prediction service.
pub fn open_service(server: &ServerConfig) -> anyhow::Result<Arc<PredictionService>> {
    std::fs::create_dir_all(&server.data_dir)
        .with_context(|| format!("creating data dir {}", server.data_dir.display()))?;
    let db_path = server.data_dir.join("observations.redb");

    let store = ObservationStore::open(&db_path)?;
    info!(path = ?db_path, records = store.len()?, "observation log opened");

    let predictor = load_predictor(server.model_path.as_deref())?;
    if predictor.is_none() {
        warn!("no model loaded; /predict will answer 503 until one is provided");
    }

    Ok(Arc::new(PredictionService::new(Arc::new(store), predictor)))
}

/// Bind a listener up front so an unusable address fails startup.
pub async fn bind(name: &'static str, addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {name} listener on {addr}"))?;
    info!(addr = %listener.local_addr()?, "{name} listening");
    Ok(listener)
}

/// Serve `router` on a bound listener until the shutdown channel flips.
pub async fn serve_router(
    name: &'static str,
    listener: TcpListener,
    router: Router,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(crate::wait_for_shutdown(shutdown))
        .await
        .with_context(|| format!("{name} server failed"))?;

    info!("{name} stopped");
    Ok(())
}

pub async fn run_serve(config: TidalConfig) -> anyhow::Result<()> {
    info!("tidal daemon starting in serve mode");

    let service = open_service(&config.server)?;
    let listener = bind("prediction API", config.server.listen).await?;
    let router = tidal_api::build_router(service);
    let (_shutdown_tx, shutdown) = crate::shutdown_channel();

    serve_router("prediction API", listener, router, shutdown).await
}
