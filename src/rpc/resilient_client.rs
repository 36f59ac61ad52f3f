// DANS : src/rpc/resilient_client.rs

use solana_sdk::pubkey::Pubkey;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::warn;

use crate::decoders::PoolAccountData;
use crate::error::{TrackerError, TrackerResult};
use crate::math::decimals::RawAmount;
use crate::monitoring::metrics::RPC_RETRIES_TOTAL;
use super::{ChainReader, SolanaChainReader};

/// Budget de ré-essai : `max_attempts` tentatives au total, attente linéaire
/// `base_delay * n` après l'échec de la tentative `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Exécute `call` jusqu'au succès ou à épuisement du budget.
    /// Seules les erreurs de transport sont ré-essayées.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> TrackerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = TrackerResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "[RPC] Échec temporaire, nouvelle tentative"
                    );
                    RPC_RETRIES_TOTAL.with_label_values(&[operation]).inc();
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Politique d'échec décidée par chaque site d'appel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// L'échec remonte à l'appelant (résolution des vaults).
    Propagate,
    /// L'échec devient une lecture (0, 0) : la boucle de polling reste en vie.
    ZeroFallback,
}

/// Résultat d'une lecture de montant. `degraded` indique un repli sur (0, 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub amount: RawAmount,
    pub degraded: bool,
}

impl Reading {
    fn fresh(amount: RawAmount) -> Self {
        Self { amount, degraded: false }
    }

    fn degraded() -> Self {
        Self { amount: RawAmount::ZERO, degraded: true }
    }
}

/// Un "wrapper" autour d'un `ChainReader` qui ajoute la logique de ré-essai
/// et la politique d'échec par site d'appel.
pub struct ResilientRpcClient<R: ChainReader = SolanaChainReader> {
    reader: Arc<R>,
    policy: RetryPolicy,
}

impl<R: ChainReader> Clone for ResilientRpcClient<R> {
    fn clone(&self) -> Self {
        Self { reader: self.reader.clone(), policy: self.policy }
    }
}

impl ResilientRpcClient<SolanaChainReader> {
    /// Construit un client résilient sur le RPC Solana.
    pub fn new(rpc_url: String, policy: RetryPolicy) -> Self {
        Self::from_reader(SolanaChainReader::new(rpc_url), policy)
    }
}

impl<R: ChainReader> ResilientRpcClient<R> {
    pub fn from_reader(reader: R, policy: RetryPolicy) -> Self {
        Self::from_shared(Arc::new(reader), policy)
    }

    pub fn from_shared(reader: Arc<R>, policy: RetryPolicy) -> Self {
        Self { reader, policy }
    }

    /// Toujours en mode "propagate" : la résolution doit échouer bruyamment.
    pub async fn find_program_accounts(
        &self,
        program_id: &Pubkey,
        offset: usize,
        prefix: &[u8],
    ) -> TrackerResult<Vec<(Pubkey, PoolAccountData)>> {
        self.policy
            .run("getProgramAccounts", || self.reader.program_accounts_by_prefix(program_id, offset, prefix))
            .await
    }

    /// Bytes bruts d'un compte. `Ok(None)` si le compte n'existe pas.
    pub async fn get_account_data(&self, account: &Pubkey) -> TrackerResult<Option<Vec<u8>>> {
        self.policy.run("getAccountInfo", || self.reader.account_data(account)).await
    }

    pub async fn read_balance(&self, account: &Pubkey, on_failure: OnFailure) -> TrackerResult<Reading> {
        let result = self
            .policy
            .run("getTokenAccountBalance", || self.reader.token_account_balance(account))
            .await;
        Self::settle("getTokenAccountBalance", account, result, on_failure)
    }

    pub async fn read_supply(&self, mint: &Pubkey, on_failure: OnFailure) -> TrackerResult<Reading> {
        let result = self.policy.run("getTokenSupply", || self.reader.token_supply(mint)).await;
        Self::settle("getTokenSupply", mint, result, on_failure)
    }

    fn settle(
        operation: &'static str,
        subject: &Pubkey,
        result: TrackerResult<Option<RawAmount>>,
        on_failure: OnFailure,
    ) -> TrackerResult<Reading> {
        let error = match result {
            Ok(Some(amount)) => return Ok(Reading::fresh(amount)),
            Ok(None) => TrackerError::AccountNotFound(*subject),
            Err(e) => e,
        };
        match on_failure {
            OnFailure::Propagate => Err(error),
            OnFailure::ZeroFallback => {
                warn!(operation, account = %subject, error = %error, "[RPC] Lecture dégradée à zéro");
                Ok(Reading::degraded())
            }
        }
    }
}
