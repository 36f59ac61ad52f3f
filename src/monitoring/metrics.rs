// DANS : src/monitoring/metrics.rs

use lazy_static::lazy_static;
use prometheus::{
    Encoder, GaugeVec, HistogramVec, IntCounterVec, TextEncoder, register_gauge_vec,
    register_histogram_vec, register_int_counter_vec,
};

lazy_static! {
    // --- RPC ---
    pub static ref RPC_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tracker_rpc_requests_total",
        "Compteur total des requêtes RPC, segmenté par méthode et statut",
        &["method", "status"] // Labels: "getTokenSupply", "success" / "failure"
    ).unwrap();
    pub static ref RPC_REQUEST_LATENCY: HistogramVec = register_histogram_vec!(
        "tracker_rpc_request_latency_seconds",
        "Latence des appels RPC vers le nœud Solana",
        &["method"]
    ).unwrap();
    pub static ref RPC_RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tracker_rpc_retries_total",
        "Nombre de nouvelles tentatives après une erreur de transport",
        &["method"]
    ).unwrap();

    // --- Boucle de polling ---
    pub static ref POLL_CYCLES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tracker_poll_cycles_total",
        "Cycles de polling terminés, par mint et par résultat",
        &["mint", "outcome"] // Labels: "snapshot" / "error"
    ).unwrap();
    pub static ref LAST_PRICE_WSOL: GaugeVec = register_gauge_vec!(
        "tracker_last_price_wsol",
        "Dernier prix publié (en WSOL) pour chaque mint suivi",
        &["mint"]
    ).unwrap();
}

/// Exposition texte Prometheus de tous les compteurs enregistrés.
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!("[Monitoring] Encodage des métriques impossible : {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
