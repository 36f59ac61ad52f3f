// DANS : src/bin/token_tracker.rs

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use pump_vault_tracker::{
    config::{Config, TrackerConfig},
    delivery::{
        ConsoleReport, CsvSink, SnapshotSink,
        http::{self, HttpState},
    },
    monitoring::logging,
    rpc::ResilientRpcClient,
    state::{LatestSnapshot, PollLoop, poll_loop::compute_once},
};
use std::collections::HashMap;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Suivi des vaults et du prix d'un token pump.fun AMM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Un seul cycle (résolution + lecture), rapport sur la console.
    Once {
        /// Mint à interroger. Par défaut le premier de TOKEN_MINTS.
        #[arg(long)]
        mint: Option<String>,
    },
    /// Boucle de polling avec rapport console (et CSV si CSV_PATH est défini).
    Watch,
    /// Boucles de polling + serveur HTTP (/vault, /snapshot, /metrics).
    Serve {
        /// Remplace HTTP_PORT.
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    logging::setup_logging(config.log_json);

    let rpc_client = ResilientRpcClient::new(config.solana_rpc_url.clone(), config.retry_policy());
    info!("[Tracker] RPC : {}", config.solana_rpc_url);

    let result = match cli.command {
        Commands::Once { mint } => run_once(&config, &rpc_client, mint).await,
        Commands::Watch => run_watch(&config, &rpc_client).await,
        Commands::Serve { port } => run_serve(&config, &rpc_client, port.unwrap_or(config.http_port)).await,
    };

    if let Err(e) = result {
        error!("[Tracker] Arrêt sur erreur : {:?}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run_once(config: &Config, rpc_client: &ResilientRpcClient, mint: Option<String>) -> Result<()> {
    let mint = match mint {
        Some(mint) => mint,
        None => match config.mints().next() {
            Some(mint) => mint.to_string(),
            None => bail!("Aucun mint : passer --mint ou renseigner TOKEN_MINTS"),
        },
    };
    let tracker = config.tracker_config(&mint)?;

    let outcome = compute_once(rpc_client, &tracker).await;
    ConsoleReport::stdout().emit(&outcome);
    outcome.map(|_| ()).context("Le cycle n'a pas produit de snapshot")
}

/// Une boucle par mint, chacune avec ses propres sorties.
fn spawn_loops(
    config: &Config,
    rpc_client: &ResilientRpcClient,
    trackers: Vec<TrackerConfig>,
    shutdown: &watch::Receiver<bool>,
    mut add_sinks: impl FnMut(&TrackerConfig, PollLoop) -> PollLoop,
) -> Result<Vec<JoinHandle<()>>> {
    let tracked = trackers.len();
    let mut handles = Vec::with_capacity(tracked);
    for tracker in trackers {
        let mut poll_loop = add_sinks(&tracker, PollLoop::new(rpc_client.clone(), tracker.clone()));
        if let Some(path) = config.csv_path_for(&tracker.token_mint, tracked) {
            let sink = CsvSink::open(&path)?;
            info!(mint = %tracker.token_mint, "[Tracker] Historique CSV : {}", path.display());
            poll_loop = poll_loop.with_sink(sink);
        }
        handles.push(tokio::spawn(poll_loop.run(shutdown.clone())));
    }
    Ok(handles)
}

async fn wait_for_ctrl_c(shutdown: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[Tracker] Écoute de Ctrl-C impossible : {}", e);
    }
    info!("[Tracker] Arrêt demandé, fin des cycles en cours...");
    let _ = shutdown.send(true);
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            error!("[Tracker] Une boucle de polling a paniqué : {}", e);
        }
    }
}

async fn run_watch(config: &Config, rpc_client: &ResilientRpcClient) -> Result<()> {
    let trackers = config.tracker_configs()?;
    info!("[Tracker] Suivi de {} mint(s) en mode console", trackers.len());

    let (tx, rx) = watch::channel(false);
    let handles = spawn_loops(config, rpc_client, trackers, &rx, |_, poll_loop| {
        poll_loop.with_sink(ConsoleReport::stdout())
    })?;

    wait_for_ctrl_c(tx).await;
    join_all(handles).await;
    Ok(())
}

async fn run_serve(config: &Config, rpc_client: &ResilientRpcClient, port: u16) -> Result<()> {
    let trackers = config.tracker_configs()?;
    let template = trackers[0].clone();
    info!("[Tracker] Suivi de {} mint(s), serveur HTTP sur le port {}", trackers.len(), port);

    let mut latest = HashMap::new();
    let (tx, rx) = watch::channel(false);
    let mut handles = spawn_loops(config, rpc_client, trackers, &rx, |tracker, poll_loop| {
        let store = LatestSnapshot::new();
        latest.insert(tracker.token_mint, store.clone());
        poll_loop.with_sink(store)
    })?;

    let state = HttpState::new(rpc_client.clone(), template, latest);
    let server_shutdown = rx.clone();
    handles.push(tokio::spawn(async move {
        if let Err(e) = http::serve(state, port, server_shutdown).await {
            error!("[HTTP] Serveur arrêté sur erreur : {:?}", e);
        }
    }));

    wait_for_ctrl_c(tx).await;
    join_all(handles).await;
    Ok(())
}
