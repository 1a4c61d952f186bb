//! tidald: the Tidal daemon.
//!
//! One binary, three roles:
//! - `serve`: the prediction API (observation log + model + HTTP)
//! - `autoscale`: the control loop, talking to a remote prediction API
//! - `standalone`: both in one process, sharing the prediction service
//!
//! # Usage
//!
//! ```text
//! tidald --config tidal.toml serve --listen 0.0.0.0:5000 --model model.json
//! tidald autoscale --predictor-url http://traffic-server:5000
//! ```

mod control;
mod serve;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tidal_core::TidalConfig;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,tidald=debug,tidal=debug";

#[derive(Parser)]
#[command(name = "tidald", about = "Tidal predictive autoscaler daemon")]
struct Cli {
    /// Configuration file; built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the prediction API.
    Serve(ServerArgs),

    /// Run the control loop against a remote prediction API.
    Autoscale {
        #[command(flatten)]
        target: TargetArgs,

        /// Base URL of the prediction API.
        #[arg(long)]
        predictor_url: Option<String>,

        /// Address for the loop's own `/metrics` listener.
        #[arg(long)]
        metrics_listen: Option<SocketAddr>,
    },

    /// Run the prediction API and the control loop in one process.
    Standalone {
        #[command(flatten)]
        server: ServerArgs,

        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct ServerArgs {
    /// Address to listen on.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Directory for the observation log.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Model artifact (JSON weights).
    #[arg(long)]
    model: Option<PathBuf>,
}

#[derive(Args)]
struct TargetArgs {
    /// Deployment to scale.
    #[arg(long)]
    workload: Option<String>,

    #[arg(long)]
    namespace: Option<String>,
}

impl ServerArgs {
    fn apply(self, config: &mut TidalConfig) {
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(dir) = self.data_dir {
            config.server.data_dir = dir;
        }
        if let Some(model) = self.model {
            config.server.model_path = Some(model);
        }
    }
}

impl TargetArgs {
    fn apply(self, config: &mut TidalConfig) {
        if let Some(workload) = self.workload {
            config.autoscale.workload = workload;
        }
        if let Some(namespace) = self.namespace {
            config.autoscale.namespace = namespace;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = match &cli.config {
        Some(path) => TidalConfig::from_file(path)?,
        None => TidalConfig::default(),
    };

    match cli.command {
        Command::Serve(server) => {
            server.apply(&mut config);
            config.validate()?;
            serve::run_serve(config).await
        }
        Command::Autoscale {
            target,
            predictor_url,
            metrics_listen,
        } => {
            target.apply(&mut config);
            if let Some(url) = predictor_url {
                config.autoscale.predictor_url = url;
            }
            if let Some(addr) = metrics_listen {
                config.autoscale.metrics_listen = addr;
            }
            config.validate()?;
            control::run_autoscale(config).await
        }
        Command::Standalone { server, target } => {
            server.apply(&mut config);
            target.apply(&mut config);
            config.validate()?;
            control::run_standalone(config).await
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Shutdown channel flipped on Ctrl-C. The returned sender lets a role
/// stop its other tasks when one of them fails.
fn shutdown_channel() -> (Arc<watch::Sender<bool>>, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    let tx = Arc::new(tx);
    let signal_tx = Arc::clone(&tx);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            // Keep the sender alive so the daemon does not stop on its own.
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = signal_tx.send(true);
    });
    (tx, rx)
}

/// Resolves once the shutdown channel flips (or its sender goes away).
async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}
