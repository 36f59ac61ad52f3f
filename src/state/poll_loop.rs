// DANS : src/state/poll_loop.rs

use rust_decimal::prelude::ToPrimitive;
use std::time::Duration;
use tokio::{sync::watch, time::sleep};
use tracing::{debug, error, info};

use crate::config::TrackerConfig;
use crate::data_pipeline::vault_resolver;
use crate::decoders::VaultPair;
use crate::delivery::SnapshotSink;
use crate::error::{TrackerError, TrackerResult};
use crate::monitoring::metrics::{LAST_PRICE_WSOL, POLL_CYCLES_TOTAL};
use crate::rpc::{ChainReader, OnFailure, ResilientRpcClient, SolanaChainReader};
use super::snapshot::{CycleOutcome, Snapshot, unix_now};

/// Granularité de l'attente entre deux cycles : un arrêt est vu en au plus une tranche.
const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// Lit les trois montants d'un cycle en parallèle (repli sur zéro pour chacun)
/// et construit le snapshot. Échoue seulement si les trois lectures sont dégradées.
pub async fn build_snapshot<R: ChainReader>(
    client: &ResilientRpcClient<R>,
    config: &TrackerConfig,
    vaults: VaultPair,
    previous: Option<&Snapshot>,
) -> CycleOutcome {
    let (base, quote, supply) = tokio::join!(
        client.read_balance(&vaults.base_vault, OnFailure::ZeroFallback),
        client.read_balance(&vaults.quote_vault, OnFailure::ZeroFallback),
        client.read_supply(&config.token_mint, OnFailure::ZeroFallback),
    );
    let (base, quote, supply) = (base?, quote?, supply?);

    if base.degraded && quote.degraded && supply.degraded {
        return Err(TrackerError::AllReadsFailed(config.token_mint));
    }

    let degraded = base.degraded || quote.degraded || supply.degraded;
    let snapshot = Snapshot::build(
        config.token_mint,
        vaults,
        base.amount,
        quote.amount,
        supply.amount,
        config.decimals,
        if degraded { None } else { previous },
        unix_now(),
    );
    Ok(if degraded { snapshot.into_degraded() } else { snapshot })
}

/// Un cycle complet sans état : résolution puis lecture. Utilisé par les
/// requêtes HTTP ponctuelles et la sous-commande `once`.
pub async fn compute_once<R: ChainReader>(client: &ResilientRpcClient<R>, config: &TrackerConfig) -> CycleOutcome {
    let vaults = vault_resolver::resolve(client, config).await?;
    build_snapshot(client, config, vaults, None).await
}

/// Attend `total` par tranches d'une seconde. Renvoie `true` si un arrêt a été demandé.
pub async fn sleep_or_shutdown(total: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let mut remaining = total;
    while !remaining.is_zero() {
        let requested = *shutdown.borrow();
        if requested {
            return true;
        }
        let slice = remaining.min(SLEEP_SLICE);
        tokio::select! {
            _ = sleep(slice) => {}
            changed = shutdown.changed() => {
                // Émetteur disparu : personne ne pourra plus relancer la boucle proprement.
                if changed.is_err() || *shutdown.borrow() {
                    return true;
                }
            }
        }
        remaining = remaining.saturating_sub(slice);
    }
    let requested = *shutdown.borrow();
    requested
}

/// La boucle de suivi d'un mint : Resolving -> Reading -> Computing -> Publishing -> Sleeping.
pub struct PollLoop<R: ChainReader = SolanaChainReader> {
    client: ResilientRpcClient<R>,
    config: TrackerConfig,
    vaults: Option<VaultPair>,
    previous: Option<Snapshot>,
    sinks: Vec<Box<dyn SnapshotSink>>,
}

impl<R: ChainReader> PollLoop<R> {
    pub fn new(client: ResilientRpcClient<R>, config: TrackerConfig) -> Self {
        Self { client, config, vaults: None, previous: None, sinks: Vec::new() }
    }

    pub fn with_sink(mut self, sink: impl SnapshotSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Dernier snapshot complet (non dégradé), base du calcul de volume.
    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    /// Vaults en cache, ou nouvelle résolution si le cache est vide ou désactivé.
    async fn vaults(&mut self) -> TrackerResult<VaultPair> {
        if !self.config.refresh_vaults_every_cycle {
            if let Some(vaults) = self.vaults {
                return Ok(vaults);
            }
        }
        let vaults = vault_resolver::resolve(&self.client, &self.config).await?;
        self.vaults = Some(vaults);
        Ok(vaults)
    }

    /// Un cycle complet. Le résultat est transmis à toutes les sorties avant d'être rendu.
    pub async fn run_once(&mut self) -> CycleOutcome {
        let outcome = match self.vaults().await {
            Ok(vaults) => build_snapshot(&self.client, &self.config, vaults, self.previous.as_ref()).await,
            Err(e) => Err(e),
        };

        let mint = self.config.token_mint.to_string();
        match &outcome {
            Ok(snapshot) => {
                POLL_CYCLES_TOTAL.with_label_values(&[mint.as_str(), "snapshot"]).inc();
                LAST_PRICE_WSOL
                    .with_label_values(&[mint.as_str()])
                    .set(snapshot.price.to_f64().unwrap_or_default());
                debug!(mint = %mint, price = %snapshot.price, degraded = snapshot.degraded, "[PollLoop] Snapshot publié");
                // Un snapshot dégradé ne sert jamais de référence au volume suivant.
                if !snapshot.degraded {
                    self.previous = Some(snapshot.clone());
                }
            }
            Err(e) => {
                POLL_CYCLES_TOTAL.with_label_values(&[mint.as_str(), "error"]).inc();
                error!(mint = %mint, error = %e, "[PollLoop] Cycle en échec");
                // Des vaults qui ne répondent plus du tout sont peut-être obsolètes.
                if matches!(e, TrackerError::AllReadsFailed(_)) {
                    self.vaults = None;
                }
            }
        }

        for sink in &mut self.sinks {
            sink.emit(&outcome);
        }
        outcome
    }

    /// Boucle jusqu'à ce que `shutdown` passe à `true`.
    /// Un cycle en cours se termine toujours avant l'arrêt.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            mint = %self.config.token_mint,
            interval_secs = self.config.poll_interval.as_secs(),
            "[PollLoop] Démarrage de la boucle de polling"
        );
        loop {
            let requested = *shutdown.borrow();
            if requested {
                break;
            }
            let _ = self.run_once().await;
            if sleep_or_shutdown(self.config.poll_interval, &mut shutdown).await {
                break;
            }
        }
        info!(mint = %self.config.token_mint, "[PollLoop] Arrêt demandé, boucle terminée");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecimalOverrides;
    use crate::decoders::PoolAccountData;
    use crate::decoders::pump::amm::{PUMP_AMM_LAYOUT, PUMP_AMM_PROGRAM_ID};
    use crate::math::decimals::RawAmount;
    use crate::rpc::RetryPolicy;
    use crate::rpc::testing::ScriptedChain;
    use crate::state::snapshot::{LatestSnapshot, SnapshotResponse};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use solana_sdk::pubkey::Pubkey;
    use std::sync::{Arc, Mutex, atomic::Ordering};

    const FAST: RetryPolicy = RetryPolicy { max_attempts: 2, base_delay: Duration::ZERO };

    struct Fixture {
        chain: Arc<ScriptedChain>,
        mint: Pubkey,
        vaults: VaultPair,
    }

    impl Fixture {
        fn new() -> Self {
            let fixture = Self {
                chain: Arc::new(ScriptedChain::new()),
                mint: Pubkey::new_unique(),
                vaults: VaultPair {
                    pool: Pubkey::new_unique(),
                    base_vault: Pubkey::new_unique(),
                    quote_vault: Pubkey::new_unique(),
                },
            };
            fixture.chain.push_program_accounts(Ok(vec![fixture.parsed_pool()]));
            fixture
        }

        fn parsed_pool(&self) -> (Pubkey, PoolAccountData) {
            let data = json!({
                "info": {
                    "baseVault": self.vaults.base_vault.to_string(),
                    "quoteVault": self.vaults.quote_vault.to_string(),
                }
            });
            (self.vaults.pool, PoolAccountData::Parsed(data))
        }

        fn amounts(&self, base: u64, quote: u64, supply: u64) {
            self.chain.push_balance(self.vaults.base_vault, Ok(Some(RawAmount::new(base, 6))));
            self.chain.push_balance(self.vaults.quote_vault, Ok(Some(RawAmount::new(quote, 9))));
            self.chain.push_supply(self.mint, Ok(Some(RawAmount::new(supply, 6))));
        }

        fn config(&self) -> TrackerConfig {
            TrackerConfig {
                token_mint: self.mint,
                program_id: PUMP_AMM_PROGRAM_ID,
                pool_address: None,
                layout: PUMP_AMM_LAYOUT,
                poll_interval: Duration::from_secs(3600),
                decimals: DecimalOverrides::default(),
                refresh_vaults_every_cycle: false,
            }
        }

        fn poll_loop(&self, config: TrackerConfig) -> PollLoop<ScriptedChain> {
            PollLoop::new(ResilientRpcClient::from_shared(self.chain.clone(), FAST), config)
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<CycleOutcome>>>);

    impl SnapshotSink for Recorder {
        fn emit(&mut self, outcome: &CycleOutcome) {
            self.0.lock().unwrap().push(outcome.clone());
        }
    }

    #[tokio::test]
    async fn test_cycle_with_reference_amounts() {
        let fx = Fixture::new();
        fx.amounts(1_000_000, 2_000_000_000, 1_000_000_000_000);
        let mut poll_loop = fx.poll_loop(fx.config());

        let snapshot = poll_loop.run_once().await.unwrap();
        assert_eq!(snapshot.base_vault, fx.vaults.base_vault);
        assert_eq!(snapshot.quote_vault, fx.vaults.quote_vault);
        assert_eq!(snapshot.base, dec!(1));
        assert_eq!(snapshot.quote, dec!(2));
        assert_eq!(snapshot.supply, dec!(1000000));
        assert_eq!(snapshot.price, dec!(2));
        assert_eq!(snapshot.liquidity, dec!(4));
        assert_eq!(snapshot.market_cap, dec!(2000000));
        assert_eq!(snapshot.volume, None);
    }

    #[tokio::test]
    async fn test_empty_base_reserve_gives_zero_price() {
        let fx = Fixture::new();
        fx.amounts(0, 5_000_000_000, 1_000_000_000_000);
        let mut poll_loop = fx.poll_loop(fx.config());

        let snapshot = poll_loop.run_once().await.unwrap();
        assert_eq!(snapshot.price, Decimal::ZERO);
        assert_eq!(snapshot.liquidity, dec!(5));
        assert_eq!(snapshot.market_cap, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_unknown_mint_publishes_error_and_keeps_going() {
        let fx = Fixture::new();
        let chain = Arc::new(ScriptedChain::new());
        chain.push_program_accounts(Ok(Vec::new()));
        chain.push_program_accounts(Ok(vec![fx.parsed_pool()]));
        let fx = Fixture { chain, ..fx };
        fx.amounts(1_000_000, 2_000_000_000, 1_000_000_000_000);

        let latest = LatestSnapshot::new();
        let mut poll_loop = fx.poll_loop(fx.config()).with_sink(latest.clone());

        assert_eq!(poll_loop.run_once().await, Err(TrackerError::NotFound(fx.mint)));
        let body = serde_json::to_value(&*latest.current()).unwrap();
        assert_eq!(body, json!({ "error": format!("No vaults found for mint {}", fx.mint) }));

        // Le cycle suivant repart de la résolution.
        assert!(poll_loop.run_once().await.is_ok());
        assert!(matches!(*latest.current(), SnapshotResponse::Snapshot(_)));
        assert_eq!(fx.chain.program_account_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_volume_between_two_cycles() {
        let fx = Fixture::new();
        fx.amounts(1_000_000, 2_000_000_000, 1_000_000_000_000);
        fx.amounts(1_200_000, 2_100_000_000, 1_000_000_000_000);
        let mut poll_loop = fx.poll_loop(fx.config());

        let first = poll_loop.run_once().await.unwrap();
        assert_eq!(first.volume, None);
        let second = poll_loop.run_once().await.unwrap();
        assert_eq!(second.volume, Some(dec!(0.5)));
        assert_eq!(poll_loop.previous(), Some(&second));
    }

    #[tokio::test]
    async fn test_vaults_are_cached_between_cycles() {
        let fx = Fixture::new();
        fx.amounts(1_000_000, 2_000_000_000, 1_000_000_000_000);
        let mut poll_loop = fx.poll_loop(fx.config());

        poll_loop.run_once().await.unwrap();
        poll_loop.run_once().await.unwrap();
        assert_eq!(fx.chain.program_account_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refresh_every_cycle_resolves_each_time() {
        let fx = Fixture::new();
        fx.amounts(1_000_000, 2_000_000_000, 1_000_000_000_000);
        let config = TrackerConfig { refresh_vaults_every_cycle: true, ..fx.config() };
        let mut poll_loop = fx.poll_loop(config);

        poll_loop.run_once().await.unwrap();
        poll_loop.run_once().await.unwrap();
        assert_eq!(fx.chain.program_account_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_failed_read_degrades_to_zero() {
        let fx = Fixture::new();
        fx.chain.push_balance(fx.vaults.base_vault, Ok(Some(RawAmount::new(1_000_000, 6))));
        fx.chain.push_balance(fx.vaults.quote_vault, Err(TrackerError::transport("getTokenAccountBalance", "reset")));
        fx.chain.push_supply(fx.mint, Ok(Some(RawAmount::new(1_000_000_000_000, 6))));
        let mut poll_loop = fx.poll_loop(fx.config());

        let snapshot = poll_loop.run_once().await.unwrap();
        assert_eq!(snapshot.quote, Decimal::ZERO);
        assert_eq!(snapshot.price, Decimal::ZERO);
        assert_eq!(snapshot.base, dec!(1));
        assert!(snapshot.degraded);
        assert!(poll_loop.previous().is_none());
        // Budget de deux tentatives pour la lecture en échec.
        assert_eq!(fx.chain.balance_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_degraded_cycle_is_skipped_for_volume() {
        let fx = Fixture::new();
        fx.chain.push_balance(fx.vaults.base_vault, Ok(Some(RawAmount::new(1_000_000, 6))));
        fx.chain.push_supply(fx.mint, Ok(Some(RawAmount::new(1_000_000_000_000, 6))));
        let reset = || Err(TrackerError::transport("getTokenAccountBalance", "reset"));
        fx.chain.push_balance(fx.vaults.quote_vault, Ok(Some(RawAmount::new(2_000_000_000, 9))));
        fx.chain.push_balance(fx.vaults.quote_vault, reset());
        fx.chain.push_balance(fx.vaults.quote_vault, reset());
        fx.chain.push_balance(fx.vaults.quote_vault, Ok(Some(RawAmount::new(2_100_000_000, 9))));
        let mut poll_loop = fx.poll_loop(fx.config());

        let first = poll_loop.run_once().await.unwrap();
        assert!(!first.degraded);
        assert_eq!(first.volume, None);

        let second = poll_loop.run_once().await.unwrap();
        assert!(second.degraded);
        assert_eq!(second.quote, Decimal::ZERO);
        assert_eq!(second.volume, None);
        assert_eq!(poll_loop.previous(), Some(&first));

        // Le volume se mesure contre le dernier cycle complet, pas contre les zéros.
        let third = poll_loop.run_once().await.unwrap();
        assert!(!third.degraded);
        assert_eq!(third.volume, Some(dec!(0.1)));
        assert_eq!(poll_loop.previous(), Some(&third));
    }

    #[tokio::test]
    async fn test_all_reads_failed_is_an_error_and_drops_cached_vaults() {
        let fx = Fixture::new();
        let mut poll_loop = fx.poll_loop(fx.config());

        assert_eq!(poll_loop.run_once().await, Err(TrackerError::AllReadsFailed(fx.mint)));
        assert!(poll_loop.previous().is_none());

        poll_loop.run_once().await.unwrap_err();
        assert_eq!(fx.chain.program_account_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_decimal_override_replaces_reported_decimals() {
        let fx = Fixture::new();
        fx.amounts(1_000_000, 2_000_000_000, 1_000_000_000_000);
        let config = TrackerConfig {
            decimals: DecimalOverrides { base: Some(3), quote: None, supply: None },
            ..fx.config()
        };
        let mut poll_loop = fx.poll_loop(config);

        let snapshot = poll_loop.run_once().await.unwrap();
        assert_eq!(snapshot.base, dec!(1000));
        assert_eq!(snapshot.price, dec!(0.002));
    }

    #[tokio::test]
    async fn test_every_sink_sees_every_cycle() {
        let fx = Fixture::new();
        fx.amounts(1_000_000, 2_000_000_000, 1_000_000_000_000);
        let (first, second) = (Recorder::default(), Recorder::default());
        let mut poll_loop = fx.poll_loop(fx.config()).with_sink(first.clone()).with_sink(second.clone());

        poll_loop.run_once().await.unwrap();
        poll_loop.run_once().await.unwrap();
        assert_eq!(first.0.lock().unwrap().len(), 2);
        assert_eq!(second.0.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_compute_once_has_no_volume() {
        let fx = Fixture::new();
        fx.amounts(1_000_000, 2_000_000_000, 1_000_000_000_000);
        let client = ResilientRpcClient::from_shared(fx.chain.clone(), FAST);

        let snapshot = compute_once(&client, &fx.config()).await.unwrap();
        assert_eq!(snapshot.price, dec!(2));
        assert_eq!(snapshot.volume, None);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_long_sleep() {
        let fx = Fixture::new();
        fx.amounts(1_000_000, 2_000_000_000, 1_000_000_000_000);
        let recorder = Recorder::default();
        let poll_loop = fx.poll_loop(fx.config()).with_sink(recorder.clone());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(poll_loop.run(rx));
        while recorder.0.lock().unwrap().is_empty() {
            tokio::task::yield_now().await;
        }
        tx.send(true).unwrap();

        // Intervalle d'une heure, mais l'arrêt doit être vu dans la tranche courante.
        tokio::time::timeout(Duration::from_secs(3), handle).await.unwrap().unwrap();
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sleep_runs_to_completion_without_shutdown() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(!sleep_or_shutdown(Duration::from_millis(20), &mut rx).await);

        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        assert!(sleep_or_shutdown(Duration::from_secs(3600), &mut rx).await);
    }
}
