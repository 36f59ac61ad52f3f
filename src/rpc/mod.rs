// src/rpc/mod.rs

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use crate::decoders::PoolAccountData;
use crate::error::TrackerResult;
use crate::math::decimals::RawAmount;

pub mod resilient_client;
pub mod solana_reader;
#[cfg(test)]
pub mod testing;

pub use resilient_client::{OnFailure, Reading, ResilientRpcClient, RetryPolicy};
pub use solana_reader::SolanaChainReader;

/// Les lectures de chaîne dont le cœur a besoin. Une implémentation fait UN
/// appel réseau par méthode : le ré-essai est l'affaire de `ResilientRpcClient`.
///
/// `Ok(None)` signifie "absent" (compte inexistant), à distinguer d'une erreur
/// de transport.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Comptes du programme dont les bytes à `offset` commencent par `prefix`.
    async fn program_accounts_by_prefix(
        &self,
        program_id: &Pubkey,
        offset: usize,
        prefix: &[u8],
    ) -> TrackerResult<Vec<(Pubkey, PoolAccountData)>>;

    async fn token_account_balance(&self, account: &Pubkey) -> TrackerResult<Option<RawAmount>>;

    async fn token_supply(&self, mint: &Pubkey) -> TrackerResult<Option<RawAmount>>;

    async fn account_data(&self, account: &Pubkey) -> TrackerResult<Option<Vec<u8>>>;
}
