//! Control loop roles: remote (`autoscale`) and in-process (`standalone`).

use std::future::Future;
use std::sync::Arc;

use tidal_autoscale::{
    Controller, HttpSource, KubeOrchestrator, LocalSource, Orchestrator, TrafficSource,
};
use tidal_core::TidalConfig;
use tidal_metrics::TrafficMetrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::serve::{bind, open_service, serve_router};

async fn connect_orchestrator(config: &TidalConfig) -> anyhow::Result<Arc<dyn Orchestrator>> {
    let orchestrator =
        KubeOrchestrator::connect(&config.autoscale.workload, &config.autoscale.namespace)
            .await?
            .with_min_replicas(config.autoscale.min_replicas);
    Ok(Arc::new(orchestrator))
}

fn spawn_loop(
    mut controller: Controller,
    config: &TidalConfig,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let interval = config.autoscale.poll_interval();
    tokio::spawn(async move {
        controller.run(interval, shutdown).await;
    })
}

/// Drive the HTTP server next to a running loop task.
///
/// If the server fails the loop is told to stop, so the daemon never keeps
/// scaling without its HTTP surface. The loop is always joined before
/// returning the server's result.
async fn serve_alongside<F>(
    loop_handle: JoinHandle<()>,
    serving: F,
    shutdown: &watch::Sender<bool>,
) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let served = serving.await;
    if let Err(e) = &served {
        error!(error = %e, "server failed, stopping control loop");
        let _ = shutdown.send(true);
    }

    if let Err(e) = loop_handle.await {
        error!(error = %e, "control loop task failed");
    }
    served
}

pub async fn run_autoscale(config: TidalConfig) -> anyhow::Result<()> {
    info!(
        workload = %config.autoscale.workload,
        namespace = %config.autoscale.namespace,
        predictor = %config.autoscale.predictor_url,
        "tidal daemon starting in autoscale mode"
    );

    let source: Arc<dyn TrafficSource> = Arc::new(HttpSource::new(&config.autoscale.predictor_url)?);
    let orchestrator = connect_orchestrator(&config).await?;
    let metrics = Arc::new(TrafficMetrics::new());
    let listener = bind("metrics", config.autoscale.metrics_listen).await?;

    let controller = Controller::new(source, orchestrator, &config.autoscale)
        .with_metrics(Arc::clone(&metrics));

    let (shutdown_tx, shutdown) = crate::shutdown_channel();
    let loop_handle = spawn_loop(controller, &config, shutdown.clone());

    let router = tidal_api::metrics_router(metrics);
    let served = serve_alongside(
        loop_handle,
        serve_router("metrics", listener, router, shutdown),
        &shutdown_tx,
    )
    .await;

    info!("tidal daemon stopped");
    served
}

pub async fn run_standalone(config: TidalConfig) -> anyhow::Result<()> {
    info!(
        workload = %config.autoscale.workload,
        namespace = %config.autoscale.namespace,
        "tidal daemon starting in standalone mode"
    );

    let service = open_service(&config.server)?;
    let orchestrator = connect_orchestrator(&config).await?;
    let listener = bind("prediction API", config.server.listen).await?;

    // The loop's gauges land in the same registry the API exposes.
    let source: Arc<dyn TrafficSource> = Arc::new(LocalSource::new(Arc::clone(&service)));
    let controller = Controller::new(source, orchestrator, &config.autoscale)
        .with_metrics(Arc::clone(service.metrics()));

    let (shutdown_tx, shutdown) = crate::shutdown_channel();
    let loop_handle = spawn_loop(controller, &config, shutdown.clone());

    let router = tidal_api::build_router(service);
    let served = serve_alongside(
        loop_handle,
        serve_router("prediction API", listener, router, shutdown),
        &shutdown_tx,
    )
    .await;

    info!("tidal daemon stopped");
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn server_failure_stops_the_loop() {
        let (tx, rx) = watch::channel(false);
        let loop_handle = tokio::spawn(crate::wait_for_shutdown(rx));

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            serve_alongside(loop_handle, async { Err(anyhow::anyhow!("listener gone")) }, &tx),
        )
        .await
        .expect("loop kept running after the server failed");

        assert!(result.is_err());
        assert!(*tx.borrow());
    }

    #[tokio::test]
    async fn clean_shutdown_joins_the_loop() {
        let (tx, rx) = watch::channel(false);
        let loop_handle = tokio::spawn(crate::wait_for_shutdown(rx.clone()));
        tx.send(true).unwrap();

        let serving = async move {
            crate::wait_for_shutdown(rx).await;
            Ok(())
        };
        let result = serve_alongside(loop_handle, serving, &tx).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn panicked_loop_does_not_mask_server_result() {
        let (tx, _rx) = watch::channel(false);
        fn tick_blew_up() {
            panic!("tick blew up");
        }
        let loop_handle = tokio::spawn(async { tick_blew_up() });

        let result = serve_alongside(loop_handle, async { Ok(()) }, &tx).await;
        assert!(result.is_ok());
    }
}
