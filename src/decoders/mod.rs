// src/decoders/mod.rs

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_account_decoder::{UiAccountData, UiAccountEncoding};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::error::{TrackerError, TrackerResult};

pub mod pump;

/// Clés acceptées pour les vaults dans une réponse `jsonParsed`.
const BASE_VAULT_KEYS: [&str; 2] = ["baseVault", "poolBaseTokenAccount"];
const QUOTE_VAULT_KEYS: [&str; 2] = ["quoteVault", "poolQuoteTokenAccount"];

/// Les deux comptes de réserve d'un pool, résolus pour un mint.
/// Jamais construit avec un seul des deux vaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPair {
    pub pool: Pubkey,
    pub base_vault: Pubkey,
    pub quote_vault: Pubkey,
}

/// Les formes de données qu'un compte de pool peut avoir dans une réponse RPC.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolAccountData {
    /// Déjà décodé par le nœud (`jsonParsed`) : on lit des champs nommés.
    Parsed(Value),
    /// Bytes bruts (base64 / base58) : extraction à offsets fixes.
    Raw(Vec<u8>),
    /// Rien d'exploitable.
    Absent,
}

impl PoolAccountData {
    /// Convertit la représentation "UI" du RPC. Un payload non décodable devient `Absent`.
    pub fn from_ui(data: UiAccountData) -> Self {
        match data {
            UiAccountData::Json(parsed) => Self::Parsed(parsed.parsed),
            UiAccountData::LegacyBinary(encoded) => decode_base58(&encoded),
            UiAccountData::Binary(encoded, UiAccountEncoding::Base58 | UiAccountEncoding::Binary) => {
                decode_base58(&encoded)
            }
            UiAccountData::Binary(encoded, UiAccountEncoding::Base64) => {
                match base64::engine::general_purpose::STANDARD.decode(encoded) {
                    Ok(bytes) => Self::Raw(bytes),
                    Err(_) => Self::Absent,
                }
            }
            UiAccountData::Binary(_, _) => Self::Absent,
        }
    }
}

fn decode_base58(encoded: &str) -> PoolAccountData {
    match bs58::decode(encoded).into_vec() {
        Ok(bytes) => PoolAccountData::Raw(bytes),
        Err(_) => PoolAccountData::Absent,
    }
}

/// Où trouver le mint et les vaults dans les bytes bruts d'un compte de pool.
/// Les vaults sont contigus : base à `[vault_offset, +32)`, quote à `[+32, +64)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLayout {
    pub discriminator: Option<[u8; 8]>,
    pub mint_offset: usize,
    pub vault_offset: usize,
}

impl PoolLayout {
    pub fn with_offsets(self, mint_offset: Option<usize>, vault_offset: Option<usize>) -> Self {
        Self {
            mint_offset: mint_offset.unwrap_or(self.mint_offset),
            vault_offset: vault_offset.unwrap_or(self.vault_offset),
            ..self
        }
    }

    /// Vérification côté client du filtre memcmp.
    pub fn mint_matches(&self, data: &[u8], mint: &Pubkey) -> bool {
        data.get(self.mint_offset..self.mint_offset + 32) == Some(mint.as_ref())
    }

    fn decode_raw(&self, data: &[u8]) -> TrackerResult<(Pubkey, Pubkey)> {
        if let Some(discriminator) = self.discriminator {
            if data.get(..8) != Some(&discriminator[..]) {
                return Err(TrackerError::MalformedData("invalid pool account discriminator".into()));
            }
        }
        let vaults = data.get(self.vault_offset..self.vault_offset + 64).ok_or_else(|| {
            TrackerError::MalformedData(format!(
                "pool account too short: {} bytes, vaults expected at {}..{}",
                data.len(),
                self.vault_offset,
                self.vault_offset + 64
            ))
        })?;
        let (base, quote) = vaults.split_at(32);
        Ok((pubkey_from_slice(base)?, pubkey_from_slice(quote)?))
    }
}

fn pubkey_from_slice(bytes: &[u8]) -> TrackerResult<Pubkey> {
    Pubkey::try_from(bytes).map_err(|_| TrackerError::MalformedData("vault address is not 32 bytes".into()))
}

fn parsed_vault(parsed: &Value, keys: &[&str]) -> Option<Pubkey> {
    [parsed.get("info"), Some(parsed)]
        .into_iter()
        .flatten()
        .flat_map(move |object| keys.iter().filter_map(move |key| object.get(*key)))
        .find_map(|value| value.as_str().and_then(|s| Pubkey::from_str(s).ok()))
}

/// Extrait les deux vaults d'un compte de pool, quelle que soit sa forme.
/// Toute forme non reconnue donne `MalformedData`, jamais une paire partielle.
pub fn decode_vaults(pool: Pubkey, data: &PoolAccountData, layout: &PoolLayout) -> TrackerResult<VaultPair> {
    let (base_vault, quote_vault) = match data {
        PoolAccountData::Parsed(parsed) => {
            let base = parsed_vault(parsed, &BASE_VAULT_KEYS);
            let quote = parsed_vault(parsed, &QUOTE_VAULT_KEYS);
            match (base, quote) {
                (Some(base), Some(quote)) => (base, quote),
                _ => return Err(TrackerError::MalformedData("parsed pool data has no baseVault/quoteVault".into())),
            }
        }
        PoolAccountData::Raw(bytes) => layout.decode_raw(bytes)?,
        PoolAccountData::Absent => {
            return Err(TrackerError::MalformedData("pool account has no usable data".into()));
        }
    };

    if base_vault == Pubkey::default() || quote_vault == Pubkey::default() {
        return Err(TrackerError::MalformedData("pool account references an empty vault".into()));
    }

    Ok(VaultPair { pool, base_vault, quote_vault })
}
