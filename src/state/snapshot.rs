// DANS : src/state/snapshot.rs

use arc_swap::ArcSwap;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::DecimalOverrides;
use crate::decoders::VaultPair;
use crate::error::TrackerResult;
use crate::math::decimals::RawAmount;
use crate::math::pool_metrics::{compute, volume_delta};

/// Résultat d'un cycle : un snapshot, ou l'erreur qui l'a empêché.
pub type CycleOutcome = TrackerResult<Snapshot>;

fn as_base58<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(key)
}

/// Un résultat de polling, immuable. Un nouveau cycle produit un nouveau snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    #[serde(serialize_with = "as_base58")]
    pub token_mint: Pubkey,
    #[serde(serialize_with = "as_base58")]
    pub pool: Pubkey,
    #[serde(serialize_with = "as_base58")]
    pub base_vault: Pubkey,
    #[serde(serialize_with = "as_base58")]
    pub quote_vault: Pubkey,
    #[serde(with = "rust_decimal::serde::float")]
    pub base: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub quote: Decimal,
    #[serde(rename = "price_in_wsol", with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub liquidity: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub supply: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub market_cap: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub volume: Option<Decimal>,
    /// Secondes Unix.
    pub timestamp: u64,
    /// Au moins une lecture du cycle est retombée sur zéro.
    pub degraded: bool,
}

impl Snapshot {
    /// Étape "Computing" : normalise chaque montant avec SES décimales, puis
    /// dérive les métriques. Le volume n'existe qu'avec un snapshot précédent.
    pub fn build(
        token_mint: Pubkey,
        vaults: VaultPair,
        base: RawAmount,
        quote: RawAmount,
        supply: RawAmount,
        overrides: DecimalOverrides,
        previous: Option<&Snapshot>,
        timestamp: u64,
    ) -> Self {
        let base_qty = base.with_decimals_override(overrides.base).normalized();
        let quote_qty = quote.with_decimals_override(overrides.quote).normalized();
        let supply_qty = supply.with_decimals_override(overrides.supply).normalized();

        let metrics = compute(base_qty, quote_qty, supply_qty);
        let volume = previous.map(|prev| volume_delta(prev.base, prev.quote, prev.price, base_qty, quote_qty));

        Self {
            token_mint,
            pool: vaults.pool,
            base_vault: vaults.base_vault,
            quote_vault: vaults.quote_vault,
            base: base_qty,
            quote: quote_qty,
            price: metrics.price,
            liquidity: metrics.liquidity,
            supply: supply_qty,
            market_cap: metrics.market_cap,
            volume,
            timestamp,
            degraded: false,
        }
    }

    /// Marque un snapshot construit avec au moins une lecture repliée sur zéro.
    /// Ses réserves ne reflètent pas la chaîne : pas de volume calculé contre elles.
    pub fn into_degraded(self) -> Self {
        Self { volume: None, degraded: true, ..self }
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

/// Corps JSON servi en HTTP : le snapshot, ou `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SnapshotResponse {
    Snapshot(Snapshot),
    Error { error: String },
}

impl SnapshotResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { error: message.into() }
    }
}

impl From<&CycleOutcome> for SnapshotResponse {
    fn from(outcome: &CycleOutcome) -> Self {
        match outcome {
            Ok(snapshot) => Self::Snapshot(snapshot.clone()),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Dernier résultat publié par une boucle de polling.
/// Les lecteurs obtiennent un `Arc` complet : jamais un snapshot à moitié écrit.
#[derive(Clone)]
pub struct LatestSnapshot {
    latest: Arc<ArcSwap<SnapshotResponse>>,
}

impl Default for LatestSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestSnapshot {
    pub fn new() -> Self {
        Self {
            latest: Arc::new(ArcSwap::from_pointee(SnapshotResponse::error("No snapshot available yet"))),
        }
    }

    pub fn current(&self) -> Arc<SnapshotResponse> {
        self.latest.load_full()
    }

    pub fn publish(&self, outcome: &CycleOutcome) {
        self.latest.store(Arc::new(SnapshotResponse::from(outcome)));
    }
}
