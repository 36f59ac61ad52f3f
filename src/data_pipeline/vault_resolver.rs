// src/data_pipeline/vault_resolver.rs

use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::decoders::{PoolAccountData, PoolLayout, VaultPair, decode_vaults};
use crate::error::{TrackerError, TrackerResult};
use crate::rpc::{ChainReader, ResilientRpcClient};

/// Trouve les vaults du pool d'un mint.
///
/// Avec une adresse de pool configurée on lit directement ce compte, sinon on
/// scanne les comptes du programme AMM filtrés sur le mint. Les erreurs de
/// transport remontent telles quelles ; toute donnée inexploitable donne `NotFound`.
pub async fn resolve<R: ChainReader>(
    client: &ResilientRpcClient<R>,
    config: &TrackerConfig,
) -> TrackerResult<VaultPair> {
    let pair = match config.pool_address {
        Some(pool) => resolve_from_pool_account(client, &config.token_mint, &pool, &config.layout).await?,
        None => resolve_by_program_scan(client, &config.token_mint, &config.program_id, &config.layout).await?,
    };
    info!(
        mint = %config.token_mint,
        pool = %pair.pool,
        base_vault = %pair.base_vault,
        quote_vault = %pair.quote_vault,
        "[Resolver] Vaults résolus"
    );
    Ok(pair)
}

/// Scan `getProgramAccounts` avec filtre memcmp sur le mint.
/// Le premier compte renvoyé gagne : l'ordre est celui du nœud RPC.
pub async fn resolve_by_program_scan<R: ChainReader>(
    client: &ResilientRpcClient<R>,
    mint: &Pubkey,
    program_id: &Pubkey,
    layout: &PoolLayout,
) -> TrackerResult<VaultPair> {
    let accounts = client.find_program_accounts(program_id, layout.mint_offset, mint.as_ref()).await?;
    let returned = accounts.len();

    // Le filtre est appliqué côté serveur ; on le revérifie quand on a les bytes.
    let first_match = accounts.into_iter().find(|(_, data)| match data {
        PoolAccountData::Raw(bytes) => layout.mint_matches(bytes, mint),
        PoolAccountData::Parsed(_) | PoolAccountData::Absent => true,
    });

    let Some((pool, data)) = first_match else {
        debug!(mint = %mint, program = %program_id, returned, "[Resolver] Aucun compte de pool pour ce mint");
        return Err(TrackerError::NotFound(*mint));
    };
    if returned > 1 {
        debug!(mint = %mint, pool = %pool, returned, "[Resolver] Plusieurs pools trouvés, on garde le premier");
    }

    decode_vaults(pool, &data, layout).map_err(|e| {
        warn!(mint = %mint, pool = %pool, error = %e, "[Resolver] Données de pool inexploitables");
        TrackerError::NotFound(*mint)
    })
}

/// Lecture directe d'un compte de pool connu, décodé à offsets fixes.
pub async fn resolve_from_pool_account<R: ChainReader>(
    client: &ResilientRpcClient<R>,
    mint: &Pubkey,
    pool: &Pubkey,
    layout: &PoolLayout,
) -> TrackerResult<VaultPair> {
    let Some(bytes) = client.get_account_data(pool).await? else {
        warn!(mint = %mint, pool = %pool, "[Resolver] Le compte de pool n'existe pas");
        return Err(TrackerError::NotFound(*mint));
    };
    if !layout.mint_matches(&bytes, mint) {
        warn!(mint = %mint, pool = %pool, "[Resolver] Le pool configuré ne référence pas ce mint");
        return Err(TrackerError::NotFound(*mint));
    }
    decode_vaults(*pool, &PoolAccountData::Raw(bytes), layout).map_err(|e| {
        warn!(mint = %mint, pool = %pool, error = %e, "[Resolver] Données de pool inexploitables");
        TrackerError::NotFound(*mint)
    })
}
