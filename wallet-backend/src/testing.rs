//! In-memory wallet for exercising the façade without the real library.
#![cfg(any(test, feature = "testing"))]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::broadcast;

use crate::daemon::{Daemon, DaemonConnectionInfo};
use crate::errors::{WalletError, WalletResult};
use crate::wallet::{
    Balance, LogLevel, NodeFee, OpenWalletParams, PrivateKeys, SendFailure, SendRequest,
    SentTransaction, SyncStatus, WalletBackend, WalletEvent, WalletLibraryError, WalletOpener,
    WalletTransaction, NO_MNEMONIC_SEED_ERROR_CODE,
};

pub const MOCK_PRIMARY_ADDRESS: &str = "VRMmockprimaryaddress";
pub const MOCK_SPEND_KEY: &str = "spend-key";
pub const MOCK_VIEW_KEY: &str = "view-key";
pub const MOCK_PREPARED_HASH: &str = "prepared-hash";

/// Everything the mock reports and everything it was asked to do.
#[derive(Debug, Clone)]
pub struct MockState {
    pub balance: Balance,
    /// Newest first.
    pub transactions: Vec<WalletTransaction>,
    pub sync_status: SyncStatus,
    pub network_block_count: u64,
    pub primary_address: String,
    pub mnemonic_seed: Option<String>,
    pub node_fee: NodeFee,
    pub connection_info: DaemonConnectionInfo,
    pub save_succeeds: bool,
    pub send_failure: Option<SendFailure>,
    pub transaction_fee: u64,

    pub saves: Vec<(PathBuf, String)>,
    pub log_level: Option<LogLevel>,
    pub scan_coinbase: Option<bool>,
    pub started: bool,
    pub stopped: bool,
    pub reset_heights: Vec<u64>,
    pub swapped_to: Vec<Daemon>,
    pub built: Vec<SendRequest>,
    pub relayed: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            balance: Balance::default(),
            transactions: Vec::new(),
            sync_status: SyncStatus::default(),
            network_block_count: 0,
            primary_address: MOCK_PRIMARY_ADDRESS.to_string(),
            mnemonic_seed: None,
            node_fee: NodeFee::default(),
            connection_info: DaemonConnectionInfo::default(),
            save_succeeds: true,
            send_failure: None,
            transaction_fee: 10,
            saves: Vec::new(),
            log_level: None,
            scan_coinbase: None,
            started: false,
            stopped: false,
            reset_heights: Vec::new(),
            swapped_to: Vec::new(),
            built: Vec::new(),
            relayed: Vec::new(),
        }
    }
}

pub struct MockWallet {
    state: Mutex<MockState>,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    pub fn new(state: MockState) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            state: Mutex::new(state),
            events,
        })
    }

    pub fn inspect<R>(&self, f: impl FnOnce(&MockState) -> R) -> R {
        f(&self.state.lock())
    }

    pub fn update(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock())
    }

    /// Fires a library event at whoever subscribed.
    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }

    pub fn event_subscribers(&self) -> usize {
        self.events.receiver_count()
    }
}

pub fn transaction(hash: &str, total_amount: i64, block_height: u64) -> WalletTransaction {
    WalletTransaction {
        timestamp: 1_600_000_000 + block_height as i64,
        hash: hash.to_string(),
        total_amount,
        block_height,
        payment_id: String::new(),
        fee: 10,
        unlock_time: 0,
        is_fusion: false,
    }
}

#[async_trait]
impl WalletBackend for MockWallet {
    fn balance(&self) -> Balance {
        self.state.lock().balance
    }

    fn transactions(
        &self,
        start_index: Option<usize>,
        count: Option<usize>,
        include_fusions: bool,
    ) -> Vec<WalletTransaction> {
        self.state
            .lock()
            .transactions
            .iter()
            .filter(|tx| include_fusions || !tx.is_fusion)
            .skip(start_index.unwrap_or(0))
            .take(count.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    fn transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    fn sync_status(&self) -> SyncStatus {
        self.state.lock().sync_status
    }

    fn network_block_count(&self) -> u64 {
        self.state.lock().network_block_count
    }

    fn primary_address(&self) -> String {
        self.state.lock().primary_address.clone()
    }

    fn primary_address_private_keys(&self) -> Result<PrivateKeys, WalletLibraryError> {
        Ok(PrivateKeys {
            spend_key: SecretString::from(MOCK_SPEND_KEY.to_string()),
            view_key: SecretString::from(MOCK_VIEW_KEY.to_string()),
        })
    }

    fn mnemonic_seed(&self) -> Result<SecretString, WalletLibraryError> {
        match &self.state.lock().mnemonic_seed {
            Some(seed) => Ok(SecretString::from(seed.clone())),
            None => Err(WalletLibraryError::new(
                NO_MNEMONIC_SEED_ERROR_CODE,
                "Wallet was created from keys and has no mnemonic seed",
            )),
        }
    }

    fn node_fee(&self) -> NodeFee {
        self.state.lock().node_fee.clone()
    }

    fn daemon_connection_info(&self) -> DaemonConnectionInfo {
        self.state.lock().connection_info.clone()
    }

    fn save_to_file(&self, path: &Path, password: &SecretString) -> bool {
        let mut state = self.state.lock();
        state
            .saves
            .push((path.to_path_buf(), password.expose_secret().to_string()));
        state.save_succeeds
    }

    fn set_log_level(&self, level: LogLevel) {
        self.state.lock().log_level = Some(level);
    }

    fn scan_coinbase_transactions(&self, enabled: bool) {
        self.state.lock().scan_coinbase = Some(enabled);
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    async fn start(&self) -> Result<(), WalletLibraryError> {
        self.state.lock().started = true;
        Ok(())
    }

    async fn stop(&self) {
        self.state.lock().stopped = true;
    }

    async fn reset(&self, height: u64) -> Result<(), WalletLibraryError> {
        self.state.lock().reset_heights.push(height);
        Ok(())
    }

    async fn swap_node(&self, daemon: Daemon) -> Result<(), WalletLibraryError> {
        let mut state = self.state.lock();
        state.connection_info.host = daemon.host.clone();
        state.connection_info.port = daemon.port;
        state.swapped_to.push(daemon);
        Ok(())
    }

    async fn send_transaction_advanced(
        &self,
        request: SendRequest,
    ) -> Result<SentTransaction, SendFailure> {
        let mut state = self.state.lock();
        state.built.push(request);
        if let Some(failure) = state.send_failure.clone() {
            return Err(failure);
        }
        Ok(SentTransaction {
            transaction_hash: MOCK_PREPARED_HASH.to_string(),
            fee: state.transaction_fee,
        })
    }

    async fn send_prepared_transaction(&self, hash: &str) -> Result<SentTransaction, SendFailure> {
        let mut state = self.state.lock();
        if let Some(failure) = state.send_failure.clone() {
            return Err(failure);
        }
        state.relayed.push(hash.to_string());
        Ok(SentTransaction {
            transaction_hash: hash.to_string(),
            fee: state.transaction_fee,
        })
    }
}

/// Hands out one [`MockWallet`] to whoever knows the password.
pub struct MockOpener {
    wallet: Arc<MockWallet>,
    password: String,
    opened: Mutex<Vec<PathBuf>>,
}

impl MockOpener {
    pub fn new(wallet: Arc<MockWallet>, password: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            wallet,
            password: password.into(),
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().clone()
    }
}

impl WalletOpener for MockOpener {
    fn open_wallet_from_file(
        &self,
        params: OpenWalletParams<'_>,
    ) -> WalletResult<Arc<dyn WalletBackend>> {
        if params.password.expose_secret() != self.password {
            return Err(WalletError::AuthenticationFailed);
        }
        self.opened.lock().push(params.path.to_path_buf());
        let wallet: Arc<dyn WalletBackend> = self.wallet.clone();
        Ok(wallet)
    }
}
