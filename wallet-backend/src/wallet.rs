//! Seam to the external wallet library.
//!
//! Key management, block scanning, transaction construction and daemon
//! networking all live behind [`WalletBackend`]. The façade in
//! [`crate::backend`] only ever talks to these traits.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::coin::CoinParams;
use crate::daemon::{Daemon, DaemonConnectionInfo};
use crate::errors::WalletResult;

/// Error code the library uses when a wallet was imported from keys and has no seed.
pub const NO_MNEMONIC_SEED_ERROR_CODE: i64 = 41;

/// Verbosity of the wallet library's own logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    Disabled,
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Maps the config file's `logLevel` string. Anything unknown disables logging.
    pub fn from_config(value: &str) -> Self {
        match value {
            "DEBUG" => LogLevel::Debug,
            "ERROR" => LogLevel::Error,
            "INFO" => LogLevel::Info,
            "WARNING" => LogLevel::Warning,
            "TRACE" => LogLevel::Trace,
            _ => LogLevel::Disabled,
        }
    }

    pub fn as_config_str(&self) -> &'static str {
        match self {
            LogLevel::Disabled => "DISABLED",
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Disabled => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warning => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Unlocked and locked totals, sent over the wire as a `[unlocked, locked]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[u64; 2]", into = "[u64; 2]")]
pub struct Balance {
    pub unlocked: u64,
    pub locked: u64,
}

impl Balance {
    pub fn new(unlocked: u64, locked: u64) -> Self {
        Self { unlocked, locked }
    }

    pub fn total(&self) -> u64 {
        self.unlocked.saturating_add(self.locked)
    }
}

impl From<[u64; 2]> for Balance {
    fn from([unlocked, locked]: [u64; 2]) -> Self {
        Self { unlocked, locked }
    }
}

impl From<Balance> for [u64; 2] {
    fn from(balance: Balance) -> Self {
        [balance.unlocked, balance.locked]
    }
}

/// Wallet, local daemon and network block counts, sent as a triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[u64; 3]", into = "[u64; 3]")]
pub struct SyncStatus {
    pub wallet_block_count: u64,
    pub local_daemon_block_count: u64,
    pub network_block_count: u64,
}

impl SyncStatus {
    pub fn new(wallet: u64, local: u64, network: u64) -> Self {
        Self {
            wallet_block_count: wallet,
            local_daemon_block_count: local,
            network_block_count: network,
        }
    }
}

impl From<[u64; 3]> for SyncStatus {
    fn from([wallet, local, network]: [u64; 3]) -> Self {
        Self::new(wallet, local, network)
    }
}

impl From<SyncStatus> for [u64; 3] {
    fn from(status: SyncStatus) -> Self {
        [
            status.wallet_block_count,
            status.local_daemon_block_count,
            status.network_block_count,
        ]
    }
}

/// A transaction as the library reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    /// Unix seconds; zero while unconfirmed.
    pub timestamp: i64,
    pub hash: String,
    /// Net change to the wallet in atomic units (negative when sending).
    #[serde(rename = "totalTxAmount")]
    pub total_amount: i64,
    pub block_height: u64,
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    pub fee: u64,
    pub unlock_time: u64,
    #[serde(default)]
    pub is_fusion: bool,
}

/// Spend and view keys of the primary address.
#[derive(Debug)]
pub struct PrivateKeys {
    pub spend_key: SecretString,
    pub view_key: SecretString,
}

/// Error reported by the wallet library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletLibraryError {
    pub error_code: i64,
    pub error_string: String,
}

impl WalletLibraryError {
    pub fn new(error_code: i64, error_string: impl Into<String>) -> Self {
        Self {
            error_code,
            error_string: error_string.into(),
        }
    }
}

impl fmt::Display for WalletLibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.error_string)
    }
}

impl std::error::Error for WalletLibraryError {}

/// Parameters for building a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub destinations: Vec<(String, u64)>,
    pub mixin: Option<u64>,
    pub fee: Option<u64>,
    pub payment_id: Option<String>,
    pub relay_to_network: bool,
    pub send_all: bool,
}

/// Result of a successful build or relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub transaction_hash: String,
    pub fee: u64,
}

/// Failed build or relay. The fee is known for some failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub error: WalletLibraryError,
    pub fee: Option<u64>,
}

impl From<WalletLibraryError> for SendFailure {
    fn from(error: WalletLibraryError) -> Self {
        Self { error, fee: None }
    }
}

/// Fee the connected node charges per transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeFee {
    pub address: String,
    pub amount: u64,
}

/// Events emitted by an open wallet.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    HeightChange(SyncStatus),
    Transaction(WalletTransaction),
    IncomingTransaction(WalletTransaction),
    Log(String),
}

/// An open wallet owned by the external library.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    fn balance(&self) -> Balance;

    /// Newest first. `None` bounds mean "from the start" and "all of them".
    fn transactions(
        &self,
        start_index: Option<usize>,
        count: Option<usize>,
        include_fusions: bool,
    ) -> Vec<WalletTransaction>;

    fn transaction_count(&self) -> usize;

    fn sync_status(&self) -> SyncStatus;

    fn network_block_count(&self) -> u64;

    fn primary_address(&self) -> String;

    fn primary_address_private_keys(&self) -> Result<PrivateKeys, WalletLibraryError>;

    fn mnemonic_seed(&self) -> Result<SecretString, WalletLibraryError>;

    fn node_fee(&self) -> NodeFee;

    fn daemon_connection_info(&self) -> DaemonConnectionInfo;

    /// Returns false when the file could not be written.
    fn save_to_file(&self, path: &Path, password: &SecretString) -> bool;

    fn set_log_level(&self, level: LogLevel);

    fn scan_coinbase_transactions(&self, enabled: bool);

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;

    async fn start(&self) -> Result<(), WalletLibraryError>;

    async fn stop(&self);

    /// Rewind the scan cursor to `height`.
    async fn reset(&self, height: u64) -> Result<(), WalletLibraryError>;

    async fn swap_node(&self, daemon: Daemon) -> Result<(), WalletLibraryError>;

    async fn send_transaction_advanced(
        &self,
        request: SendRequest,
    ) -> Result<SentTransaction, SendFailure>;

    async fn send_prepared_transaction(&self, hash: &str) -> Result<SentTransaction, SendFailure>;
}

/// Arguments for opening a wallet file.
pub struct OpenWalletParams<'a> {
    pub daemon: &'a Daemon,
    pub path: &'a Path,
    pub password: &'a SecretString,
    pub coin: &'a CoinParams,
    pub scan_coinbase_transactions: bool,
}

/// Factory for wallet handles. Wrong passwords and unreadable files both surface as errors here.
pub trait WalletOpener: Send + Sync {
    fn open_wallet_from_file(
        &self,
        params: OpenWalletParams<'_>,
    ) -> WalletResult<Arc<dyn WalletBackend>>;
}
