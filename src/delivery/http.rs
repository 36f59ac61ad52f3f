// DANS : src/delivery/http.rs

use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::{collections::HashMap, convert::Infallible, net::SocketAddr, str::FromStr, sync::Arc};
use tokio::sync::watch;
use tracing::{debug, info};
use warp::{Filter, Rejection, Reply};

use crate::config::TrackerConfig;
use crate::monitoring::metrics::gather_text;
use crate::rpc::{ChainReader, ResilientRpcClient, SolanaChainReader};
use crate::state::poll_loop::compute_once;
use crate::state::snapshot::{LatestSnapshot, SnapshotResponse};

/// Ce dont les routes HTTP ont besoin : un client pour les calculs ponctuels,
/// un modèle de configuration, et les derniers snapshots des boucles actives.
pub struct HttpState<R: ChainReader = SolanaChainReader> {
    client: ResilientRpcClient<R>,
    template: TrackerConfig,
    latest: Arc<HashMap<Pubkey, LatestSnapshot>>,
}

impl<R: ChainReader> Clone for HttpState<R> {
    fn clone(&self) -> Self {
        Self { client: self.client.clone(), template: self.template.clone(), latest: self.latest.clone() }
    }
}

impl<R: ChainReader> HttpState<R> {
    pub fn new(
        client: ResilientRpcClient<R>,
        template: TrackerConfig,
        latest: HashMap<Pubkey, LatestSnapshot>,
    ) -> Self {
        Self { client, template, latest: Arc::new(latest) }
    }

    /// Configuration pour un mint quelconque. L'adresse de pool configurée
    /// ne vaut que pour le mint qui l'accompagne.
    fn config_for(&self, mint: Pubkey) -> TrackerConfig {
        let pool_address = if mint == self.template.token_mint { self.template.pool_address } else { None };
        TrackerConfig { token_mint: mint, pool_address, ..self.template.clone() }
    }
}

fn parse_mint(raw: &str) -> Result<Pubkey, SnapshotResponse> {
    Pubkey::from_str(raw).map_err(|e| SnapshotResponse::error(format!("Invalid mint {}: {}", raw, e)))
}

async fn vault_handler<R: ChainReader>(raw_mint: String, state: HttpState<R>) -> Result<impl Reply, Infallible> {
    let response = match parse_mint(&raw_mint) {
        Ok(mint) => {
            debug!(mint = %mint, "[HTTP] Calcul ponctuel demandé");
            SnapshotResponse::from(&compute_once(&state.client, &state.config_for(mint)).await)
        }
        Err(response) => response,
    };
    Ok(warp::reply::json(&response))
}

async fn snapshot_handler<R: ChainReader>(raw_mint: String, state: HttpState<R>) -> Result<impl Reply, Infallible> {
    let reply = match parse_mint(&raw_mint) {
        Ok(mint) => match state.latest.get(&mint) {
            Some(latest) => warp::reply::json(&*latest.current()),
            None => warp::reply::json(&SnapshotResponse::error(format!("Mint {} is not tracked", mint))),
        },
        Err(response) => warp::reply::json(&response),
    };
    Ok(reply)
}

/// Toujours HTTP 200 : les échecs sont dans le corps `{"error": ...}`.
pub fn routes<R: ChainReader + 'static>(
    state: HttpState<R>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let with_state = warp::any().map(move || state.clone());

    let vault = warp::get()
        .and(warp::path!("vault" / String))
        .and(with_state.clone())
        .and_then(vault_handler::<R>);

    let snapshot = warp::get()
        .and(warp::path!("snapshot" / String))
        .and(with_state)
        .and_then(snapshot_handler::<R>);

    let metrics = warp::get().and(warp::path!("metrics")).map(|| {
        warp::reply::with_header(gather_text(), "content-type", "text/plain; version=0.0.4")
    });

    vault.or(snapshot).or(metrics)
}

/// Sert les routes jusqu'à ce que `shutdown` passe à `true`.
pub async fn serve<R: ChainReader + 'static>(
    state: HttpState<R>,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let signal = async move {
        loop {
            let requested = *shutdown.borrow_and_update();
            if requested || shutdown.changed().await.is_err() {
                break;
            }
        }
    };
    let (addr, server): (SocketAddr, _) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), signal)
        .with_context(|| format!("Impossible d'écouter sur le port {}", port))?;

    info!("[HTTP] Serveur exposé sur http://{}", addr);
    server.await;
    info!("[HTTP] Serveur arrêté");
    Ok(())
}
