//! In-memory doubles of the ledger and the exchange client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::plan::TransactionPlan;
use crate::ports::{ExchangeClient, Ledger, SwapAggregator, SwapQuote, TokenHolding};

/// Token account the mock exchange hands out for `mint`.
pub fn token_account_for(mint: &Pubkey) -> Pubkey {
    let mut bytes = mint.to_bytes();
    bytes[31] ^= 0xff;
    Pubkey::new_from_array(bytes)
}

#[derive(Default)]
pub struct MockLedger {
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    slot: Mutex<u64>,
    balances: Mutex<HashMap<Pubkey, u64>>,
    /// token account -> successful balance reads left before reads fail
    balance_reads_left: Mutex<HashMap<Pubkey, usize>>,
    failing_subscriptions: Mutex<Vec<Pubkey>>,
    holdings: Mutex<Vec<TokenHolding>>,
    subscribers: Mutex<HashMap<Pubkey, Vec<UnboundedSender<Vec<u8>>>>>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.lock().insert(address, data);
    }

    /// Store `data` and notify subscribers of `address`.
    pub fn push_update(&self, address: Pubkey, data: Vec<u8>) {
        self.set_account(address, data.clone());
        if let Some(senders) = self.subscribers.lock().get_mut(&address) {
            senders.retain(|tx| tx.unbounded_send(data.clone()).is_ok());
        }
    }

    pub fn remove_account(&self, address: &Pubkey) {
        self.accounts.lock().remove(address);
    }

        pub fn account(&self, address: &Pubkey) -> Option<Vec<u8>> {
        self.accounts.lock().get(address).cloned()
    }

    pub fn set_slot(&self, slot: u64) {
        *self.slot.lock() = slot;
    }

    pub fn set_balance(&self, token_account: Pubkey, amount: u64) {
        self.balances.lock().insert(token_account, amount);
    }

    pub fn balance(&self, token_account: &Pubkey) -> u64 {
        self.balances.lock().get(token_account).copied().unwrap_or(0)
    }

    /// Let `reads` balance reads of `token_account` succeed, then fail.
    pub fn fail_balance_after(&self, token_account: Pubkey, reads: usize) {
        self.balance_reads_left.lock().insert(token_account, reads);
    }

    pub fn fail_subscriptions(&self, address: Pubkey) {
        self.failing_subscriptions.lock().push(address);
    }

        pub fn add_holding(&self, holding: TokenHolding) {
        self.holdings.lock().push(holding);
    }

    pub fn subscriber_count(&self, address: &Pubkey) -> usize {
        self.subscribers
            .lock()
            .get(address)
            .map(|s| s.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn program_accounts(
        &self,
        _program: &Pubkey,
        data_size: u64,
    ) -> anyhow::Result<Vec<(Pubkey, Vec<u8>)>> {
        let mut found: Vec<_> = self
            .accounts
            .lock()
            .iter()
            .filter(|(_, data)| data.len() as u64 == data_size)
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        found.sort_by_key(|(k, _)| *k);
        Ok(found)
    }

    async fn account_data(&self, address: &Pubkey) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.accounts.lock().get(address).cloned())
    }

    async fn slot(&self) -> anyhow::Result<u64> {
        Ok(*self.slot.lock())
    }

    async fn token_balance(&self, token_account: &Pubkey) -> anyhow::Result<u64> {
        if let Some(left) = self.balance_reads_left.lock().get_mut(token_account) {
            if *left == 0 {
                anyhow::bail!("getTokenAccountBalance: connection reset");
            }
            *left -= 1;
        }
        Ok(self.balance(token_account))
    }

    async fn token_holdings(&self, _owner: &Pubkey) -> anyhow::Result<Vec<TokenHolding>> {
        Ok(self.holdings.lock().clone())
    }

    async fn subscribe(&self, address: &Pubkey) -> anyhow::Result<BoxStream<'static, Vec<u8>>> {
        if self.failing_subscriptions.lock().contains(address) {
            anyhow::bail!("accountSubscribe: websocket closed");
        }
                let (tx, rx) = unbounded();
        self.subscribers.lock().entry(*address).or_default().push(tx);
        Ok(rx.boxed())
    }
}

type ExecuteHook = Box<dyn Fn(&TransactionPlan) -> anyhow::Result<()> + Send + Sync>;
type CheckHook = Box<dyn Fn(&Pubkey) -> anyhow::Result<()> + Send + Sync>;

/// Records every call; hooks simulate the program's effect on the ledger.
pub struct MockExchange {
    wallet: Pubkey,
    pub executed: Mutex<Vec<TransactionPlan>>,
    pub checked: Mutex<Vec<Pubkey>>,
    pub submitted: Mutex<Vec<String>>,
    on_execute: Mutex<Option<ExecuteHook>>,
    on_check: Mutex<Option<CheckHook>>,
}

impl MockExchange {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            wallet: Pubkey::new_from_array([99; 32]),
            executed: Mutex::new(Vec::new()),
            checked: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            on_execute: Mutex::new(None),
            on_check: Mutex::new(None),
        })
    }

    pub fn on_execute(
        &self,
        hook: impl Fn(&TransactionPlan) -> anyhow::Result<()> + Send + Sync + 'static,
    ) {
        *self.on_execute.lock() = Some(Box::new(hook));
    }

    pub fn on_check(&self, hook: impl Fn(&Pubkey) -> anyhow::Result<()> + Send + Sync + 'static) {
        *self.on_check.lock() = Some(Box::new(hook));
    }

    pub fn executed_count(&self) -> usize {
        self.executed.lock().len()
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    fn wallet(&self) -> Pubkey {
        self.wallet
    }

    async fn token_account(&self, mint: &Pubkey) -> anyhow::Result<Pubkey> {
        Ok(token_account_for(mint))
    }

    async fn check_account(&self, exchange_account: &Pubkey) -> anyhow::Result<Signature> {
        self.checked.lock().push(*exchange_account);
        if let Some(hook) = self.on_check.lock().as_ref() {
            hook(exchange_account)?;
        }
        Ok(Signature::default())
    }

    async fn execute(&self, plan: &TransactionPlan) -> anyhow::Result<Signature> {
        self.executed.lock().push(plan.clone());
        if let Some(hook) = self.on_execute.lock().as_ref() {
            hook(plan)?;
        }
        Ok(Signature::default())
    }

    async fn submit_serialized(&self, transaction: &str) -> anyhow::Result<Signature> {
        self.submitted.lock().push(transaction.to_string());
        Ok(Signature::default())
    }
}

/// Aggregator returning canned quotes per input mint.
#[derive(Default)]
pub struct MockAggregator {
    pub quotes: Mutex<HashMap<Pubkey, SwapQuote>>,
    pub failing: Mutex<Vec<Pubkey>>,
    pub requested: Mutex<Vec<(Pubkey, u64, u16)>>,
}

#[async_trait]
impl SwapAggregator for MockAggregator {
    async fn quote(
        &self,
        input_mint: &Pubkey,
        _output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> anyhow::Result<Option<SwapQuote>> {
        self.requested.lock().push((*input_mint, amount, slippage_bps));
        if self.failing.lock().contains(input_mint) {
            anyhow::bail!("quote service unavailable");
        }
        Ok(self.quotes.lock().get(input_mint).cloned())
    }

    async fn swap_transactions(&self, quote: &SwapQuote, _user: &Pubkey) -> anyhow::Result<Vec<String>> {
        Ok(vec![format!("swap-{}", quote.input_mint)])
    }
}
