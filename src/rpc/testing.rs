// DANS : src/rpc/testing.rs
//
// Nœud RPC en mémoire pour les tests : chaque lecture dépile une réponse
// scriptée. La dernière réponse d'une file est rejouée indéfiniment.

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    },
};

use crate::decoders::PoolAccountData;
use crate::error::TrackerResult;
use crate::math::decimals::RawAmount;
use super::ChainReader;

type Script<T> = VecDeque<TrackerResult<T>>;

#[derive(Default)]
pub struct ScriptedChain {
    program_accounts: Mutex<Script<Vec<(Pubkey, PoolAccountData)>>>,
    balances: Mutex<HashMap<Pubkey, Script<Option<RawAmount>>>>,
    supplies: Mutex<HashMap<Pubkey, Script<Option<RawAmount>>>>,
    accounts: Mutex<HashMap<Pubkey, Script<Option<Vec<u8>>>>>,
    pub program_account_calls: AtomicU32,
    pub balance_calls: AtomicU32,
    pub supply_calls: AtomicU32,
    pub account_calls: AtomicU32,
}

fn next<T: Clone>(script: Option<&mut Script<T>>, default: T) -> TrackerResult<T> {
    match script {
        Some(script) if script.len() > 1 => script.pop_front().unwrap_or(Ok(default)),
        Some(script) => script.front().cloned().unwrap_or(Ok(default)),
        None => Ok(default),
    }
}

impl ScriptedChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_program_accounts(&self, response: TrackerResult<Vec<(Pubkey, PoolAccountData)>>) {
        self.program_accounts.lock().unwrap().push_back(response);
    }

    pub fn push_balance(&self, account: Pubkey, response: TrackerResult<Option<RawAmount>>) {
        self.balances.lock().unwrap().entry(account).or_default().push_back(response);
    }

    pub fn push_supply(&self, mint: Pubkey, response: TrackerResult<Option<RawAmount>>) {
        self.supplies.lock().unwrap().entry(mint).or_default().push_back(response);
    }

    pub fn push_account(&self, account: Pubkey, response: TrackerResult<Option<Vec<u8>>>) {
        self.accounts.lock().unwrap().entry(account).or_default().push_back(response);
    }
}

#[async_trait]
impl ChainReader for ScriptedChain {
    async fn program_accounts_by_prefix(
        &self,
        _program_id: &Pubkey,
        _offset: usize,
        _prefix: &[u8],
    ) -> TrackerResult<Vec<(Pubkey, PoolAccountData)>> {
        self.program_account_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.program_accounts.lock().unwrap();
        next(Some(&mut *script), Vec::new())
    }

    async fn token_account_balance(&self, account: &Pubkey) -> TrackerResult<Option<RawAmount>> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        next(self.balances.lock().unwrap().get_mut(account), None)
    }

    async fn token_supply(&self, mint: &Pubkey) -> TrackerResult<Option<RawAmount>> {
        self.supply_calls.fetch_add(1, Ordering::SeqCst);
        next(self.supplies.lock().unwrap().get_mut(mint), None)
    }

    async fn account_data(&self, account: &Pubkey) -> TrackerResult<Option<Vec<u8>>> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        next(self.accounts.lock().unwrap().get_mut(account), None)
    }
}
