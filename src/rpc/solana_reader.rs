// DANS : src/rpc/solana_reader.rs

use async_trait::async_trait;
use serde_json::json;
use solana_account_decoder::UiAccountEncoding;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcAccountInfoConfig, RpcProgramAccountsConfig},
    rpc_filter::{Memcmp, RpcFilterType},
    rpc_request::{RpcError, RpcRequest},
    rpc_response::RpcKeyedAccount,
};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::{str::FromStr, time::Instant};
use tracing::debug;

use crate::decoders::PoolAccountData;
use crate::error::{TrackerError, TrackerResult};
use crate::math::decimals::RawAmount;
use crate::monitoring::metrics::{RPC_REQUEST_LATENCY, RPC_REQUESTS_TOTAL};
use super::ChainReader;

/// Code JSON-RPC "Invalid params" : c'est ce que renvoie le nœud pour un compte introuvable.
const INVALID_PARAMS_CODE: i64 = -32602;

/// Implémentation de `ChainReader` sur le `RpcClient` non bloquant de Solana.
/// Un appel = un aller-retour réseau, sans ré-essai.
pub struct SolanaChainReader {
    client: RpcClient,
}

impl SolanaChainReader {
    pub fn new(rpc_url: String) -> Self {
        Self { client: RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed()) }
    }

    fn program_accounts_config(&self, offset: usize, prefix: &[u8]) -> RpcProgramAccountsConfig {
        RpcProgramAccountsConfig {
            filters: Some(vec![RpcFilterType::Memcmp(Memcmp::new_base58_encoded(offset, prefix))]),
            account_config: RpcAccountInfoConfig {
                // Le nœud renvoie du JSON quand il sait parser le programme, du base64 sinon.
                encoding: Some(UiAccountEncoding::JsonParsed),
                data_slice: None,
                commitment: Some(self.client.commitment()),
                min_context_slot: None,
            },
            with_context: Some(false),
            sort_results: None,
        }
    }
}

/// Sépare "absent" (Ok(None)), "transport" (ré-essayable) et "malformé".
fn classify<T>(operation: &'static str, error: ClientError) -> TrackerResult<Option<T>> {
    match error.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code: INVALID_PARAMS_CODE, .. }) => Ok(None),
        ClientErrorKind::RpcError(RpcError::ForUser(message)) if message.contains("AccountNotFound") => Ok(None),
        ClientErrorKind::SerdeJson(e) => Err(TrackerError::MalformedData(format!("{operation}: {e}"))),
        // Réponse reçue mais inexploitable : la rejouer donnerait la même chose.
        ClientErrorKind::RpcError(RpcError::ParseError(_)) => {
            Err(TrackerError::MalformedData(format!("{operation}: {error}")))
        }
        ClientErrorKind::Reqwest(_) | ClientErrorKind::RpcError(_) | ClientErrorKind::Io(_) => {
            Err(TrackerError::transport(operation, error.to_string()))
        }
        _ => Err(TrackerError::MalformedData(format!("{operation}: {error}"))),
    }
}

fn record(operation: &'static str, started: Instant, ok: bool) {
    RPC_REQUEST_LATENCY
        .with_label_values(&[operation])
        .observe(started.elapsed().as_secs_f64());
    RPC_REQUESTS_TOTAL
        .with_label_values(&[operation, if ok { "success" } else { "failure" }])
        .inc();
}

fn parse_raw_amount(operation: &'static str, amount: &str, decimals: u8) -> TrackerResult<RawAmount> {
    let amount = amount
        .parse::<u64>()
        .map_err(|e| TrackerError::MalformedData(format!("{operation}: amount '{amount}' is not a u64 ({e})")))?;
    Ok(RawAmount::new(amount, decimals))
}

#[async_trait]
impl ChainReader for SolanaChainReader {
    async fn program_accounts_by_prefix(
        &self,
        program_id: &Pubkey,
        offset: usize,
        prefix: &[u8],
    ) -> TrackerResult<Vec<(Pubkey, PoolAccountData)>> {
        const OP: &str = "getProgramAccounts";
        let started = Instant::now();
        // `get_program_accounts_with_config` force des bytes : on passe par `send`
        // pour garder la forme jsonParsed quand le nœud la fournit.
        let params = json!([program_id.to_string(), self.program_accounts_config(offset, prefix)]);
        let result = self.client.send::<Vec<RpcKeyedAccount>>(RpcRequest::GetProgramAccounts, params).await;
        record(OP, started, result.is_ok());

        let keyed_accounts = match result {
            Ok(accounts) => accounts,
            Err(e) => return classify::<()>(OP, e).map(|_| Vec::new()),
        };
        debug!(program = %program_id, count = keyed_accounts.len(), "[RPC] Comptes de programme reçus");

        keyed_accounts
            .into_iter()
            .map(|keyed| {
                let address = Pubkey::from_str(&keyed.pubkey)
                    .map_err(|e| TrackerError::MalformedData(format!("{OP}: invalid pubkey {}: {e}", keyed.pubkey)))?;
                Ok((address, PoolAccountData::from_ui(keyed.account.data)))
            })
            .collect()
    }

    async fn token_account_balance(&self, account: &Pubkey) -> TrackerResult<Option<RawAmount>> {
        const OP: &str = "getTokenAccountBalance";
        let started = Instant::now();
        let result = self.client.get_token_account_balance(account).await;
        record(OP, started, result.is_ok());
        match result {
            Ok(ui_amount) => parse_raw_amount(OP, &ui_amount.amount, ui_amount.decimals).map(Some),
            Err(e) => classify(OP, e),
        }
    }

    async fn token_supply(&self, mint: &Pubkey) -> TrackerResult<Option<RawAmount>> {
        const OP: &str = "getTokenSupply";
        let started = Instant::now();
        let result = self.client.get_token_supply(mint).await;
        record(OP, started, result.is_ok());
        match result {
            Ok(ui_amount) => parse_raw_amount(OP, &ui_amount.amount, ui_amount.decimals).map(Some),
            Err(e) => classify(OP, e),
        }
    }

    async fn account_data(&self, account: &Pubkey) -> TrackerResult<Option<Vec<u8>>> {
        const OP: &str = "getAccountInfo";
        let started = Instant::now();
        let result = self.client.get_account_with_commitment(account, self.client.commitment()).await;
        record(OP, started, result.is_ok());
        match result {
            Ok(response) => Ok(response.value.map(|account| account.data)),
            Err(e) => classify(OP, e),
        }
    }
}
