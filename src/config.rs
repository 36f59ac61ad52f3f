// DANS : src/config.rs

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::{path::PathBuf, str::FromStr, time::Duration};

use crate::decoders::PoolLayout;
use crate::decoders::pump::amm::{PUMP_AMM_LAYOUT, PUMP_AMM_PROGRAM_ID};
use crate::rpc::RetryPolicy;

fn default_program_id() -> String {
    PUMP_AMM_PROGRAM_ID.to_string()
}
fn default_poll_interval_secs() -> u64 {
    10
}
fn default_rpc_max_attempts() -> u32 {
    3
}
fn default_rpc_retry_base_delay_ms() -> u64 {
    500
}
fn default_http_port() -> u16 {
    10000
}
fn default_log_json() -> bool {
    true
}

/// Configuration brute, lue depuis l'environnement (et un éventuel `.env`).
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub solana_rpc_url: String,
    #[serde(default = "default_program_id")]
    pub amm_program_id: String,
    /// Liste séparée par des virgules.
    #[serde(default)]
    pub token_mints: Vec<String>,
    pub pool_address: Option<String>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_rpc_max_attempts")]
    pub rpc_max_attempts: u32,
    #[serde(default = "default_rpc_retry_base_delay_ms")]
    pub rpc_retry_base_delay_ms: u64,
    pub mint_filter_offset: Option<usize>,
    pub vault_offset: Option<usize>,
    pub base_decimals: Option<u8>,
    pub quote_decimals: Option<u8>,
    pub supply_decimals: Option<u8>,
    #[serde(default)]
    pub refresh_vaults_every_cycle: bool,
    pub csv_path: Option<PathBuf>,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_log_json")]
    pub log_json: bool,
}

/// Décimales imposées par la configuration, une par quantité logique.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecimalOverrides {
    pub base: Option<u8>,
    pub quote: Option<u8>,
    pub supply: Option<u8>,
}

/// Configuration typée d'une boucle de polling (un mint). Jamais modifiée par le cœur.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub token_mint: Pubkey,
    pub program_id: Pubkey,
    pub pool_address: Option<Pubkey>,
    pub layout: PoolLayout,
    pub poll_interval: Duration,
    pub decimals: DecimalOverrides,
    pub refresh_vaults_every_cycle: bool,
}

fn parse_pubkey(label: &str, value: &str) -> Result<Pubkey> {
    Pubkey::from_str(value.trim()).with_context(|| format!("{} invalide : '{}'", label, value))
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>().context("Lecture de la configuration depuis l'environnement")?;
        Ok(config)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.rpc_max_attempts, Duration::from_millis(self.rpc_retry_base_delay_ms))
    }

    /// Les mints configurés, sans les entrées vides.
    pub fn mints(&self) -> impl Iterator<Item = &str> {
        self.token_mints.iter().map(|m| m.trim()).filter(|m| !m.is_empty())
    }

    pub fn tracker_config(&self, token_mint: &str) -> Result<TrackerConfig> {
        let program_id = parse_pubkey("AMM_PROGRAM_ID", &self.amm_program_id)?;
        let pool_address = match self.pool_address.as_deref().map(str::trim) {
            Some(address) if !address.is_empty() => Some(parse_pubkey("POOL_ADDRESS", address)?),
            _ => None,
        };

        // Le discriminateur n'a de sens que pour le programme pump.fun AMM.
        let base_layout = if program_id == PUMP_AMM_PROGRAM_ID {
            PUMP_AMM_LAYOUT
        } else {
            PoolLayout { discriminator: None, ..PUMP_AMM_LAYOUT }
        };

        if self.poll_interval_secs == 0 {
            bail!("POLL_INTERVAL_SECS doit être strictement positif");
        }

        Ok(TrackerConfig {
            token_mint: parse_pubkey("TOKEN_MINT", token_mint)?,
            program_id,
            pool_address,
            layout: base_layout.with_offsets(self.mint_filter_offset, self.vault_offset),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            decimals: DecimalOverrides {
                base: self.base_decimals,
                quote: self.quote_decimals,
                supply: self.supply_decimals,
            },
            refresh_vaults_every_cycle: self.refresh_vaults_every_cycle,
        })
    }

    /// Fichier CSV d'un mint. Avec plusieurs mints suivis, chacun a son fichier
    /// (`history.csv` devient `history_<mint>.csv`) : une ligne ne porte pas son mint.
    pub fn csv_path_for(&self, mint: &Pubkey, tracked_mints: usize) -> Option<PathBuf> {
        let path = self.csv_path.as_ref()?;
        if tracked_mints <= 1 {
            return Some(path.clone());
        }
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let file_name = match path.extension() {
            Some(ext) => format!("{}_{}.{}", stem, mint, ext.to_string_lossy()),
            None => format!("{}_{}", stem, mint),
        };
        Some(path.with_file_name(file_name))
    }

    pub fn tracker_configs(&self) -> Result<Vec<TrackerConfig>> {
        let configs = self.mints().map(|mint| self.tracker_config(mint)).collect::<Result<Vec<_>>>()?;
        if configs.is_empty() {
            bail!("Aucun mint configuré : renseigner TOKEN_MINTS");
        }
        if configs.len() > 1 && configs.iter().any(|c| c.pool_address.is_some()) {
            bail!("POOL_ADDRESS ne peut servir qu'à un seul mint");
        }
        Ok(configs)
    }
}
