// DANS: src/decoders/pump/amm/pool.rs

use bytemuck::{Pod, Zeroable};
use solana_sdk::pubkey::Pubkey;
use std::mem::offset_of;
use crate::decoders::PoolLayout;

// --- CONSTANTES DU PROTOCOLE ---
// Trouvées dans l'IDL
pub const PUMP_AMM_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("pAMMBay6oceH9fJKBRHGP5D4bD4sWpmSwMn52FMfXEA");
pub const POOL_ACCOUNT_DISCRIMINATOR: [u8; 8] = [241, 154, 109, 4, 17, 177, 109, 188];
const DISCRIMINATOR_LEN: usize = 8;


// --- MODULE POUR LES STRUCTURES ON-CHAIN ---
// Miroir exact du compte Pool (après le discriminateur Anchor).
pub mod onchain_layouts {
    use super::*;

    #[repr(C, packed)]
    #[derive(Clone, Copy, Pod, Zeroable, Debug)]
    pub struct Pool {
        pub pool_bump: u8,
        pub index: u16,
        pub creator: Pubkey,
        pub base_mint: Pubkey,
        pub quote_mint: Pubkey,
        pub lp_mint: Pubkey,
        pub pool_base_token_account: Pubkey,
        pub pool_quote_token_account: Pubkey,
        pub lp_supply: u64,
        pub coin_creator: Pubkey,
    }
}

use onchain_layouts::Pool;

// Le vault quote suit immédiatement le vault base : le décodage générique lit 64 bytes d'un coup.
const _: () = assert!(
    offset_of!(Pool, pool_quote_token_account) == offset_of!(Pool, pool_base_token_account) + 32
);

/// Layout du compte Pool pump.fun AMM : mint base à l'octet 43, vaults à 139 et 171.
pub const PUMP_AMM_LAYOUT: PoolLayout = PoolLayout {
    discriminator: Some(POOL_ACCOUNT_DISCRIMINATOR),
    mint_offset: DISCRIMINATOR_LEN + offset_of!(Pool, base_mint),
    vault_offset: DISCRIMINATOR_LEN + offset_of!(Pool, pool_base_token_account),
};

/// Sérialise un Pool tel qu'il apparaît on-chain (discriminateur inclus).
/// Sert à construire des comptes de test et à vérifier le layout.
pub fn encode_pool_account(pool: &Pool) -> Vec<u8> {
    let mut data = Vec::with_capacity(DISCRIMINATOR_LEN + std::mem::size_of::<Pool>());
    data.extend_from_slice(&POOL_ACCOUNT_DISCRIMINATOR);
    data.extend_from_slice(bytemuck::bytes_of(pool));
    data
}
