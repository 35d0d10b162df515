//! The wallet façade.
//!
//! [`Backend`] owns at most one open wallet and turns requests from the UI into
//! library calls, publishing every outcome as a [`BackendMessage`] on its
//! outbound bus. Library events (new blocks, transactions, log lines) are
//! relayed onto the same bus by a background task.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use zeroize::Zeroizing;

use crate::amount::atomic_to_human;
use crate::bus::{EventBus, Subscription};
use crate::coin::CoinParams;
use crate::config_store::WalletConfig;
use crate::daemon::Daemon;
use crate::errors::{WalletError, WalletResult};
use crate::ipc::{
    BackendMessage, ChangeNodeRequest, ChangePasswordRequest, Envelope, FrontendMessage,
    IncomingTransactionNotice, PasswordChangeError, PasswordChangeResponse,
    PrepareTransactionRequest, PrepareTransactionResponse, RequestId, ResponseStatus,
    SendTransactionResponse,
};
use crate::transactions::{export_csv, format_transactions, transaction_search};
use crate::wallet::{
    LogLevel, OpenWalletParams, SendRequest, WalletBackend, WalletEvent, WalletOpener,
    NO_MNEMONIC_SEED_ERROR_CODE,
};

/// Rows sent right after a wallet opens, and the default page size.
pub const DEFAULT_TRANSACTION_DISPLAY_COUNT: usize = 50;

pub const INCOMING_TRANSACTION_TITLE: &str = "Transaction Received!";

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}

struct BackendState {
    notifications: bool,
    daemon: Daemon,
    wallet_file: PathBuf,
    log_level: LogLevel,
    scan_coinbase_transactions: bool,
    password: SecretString,
    wallet: Option<Arc<dyn WalletBackend>>,
    wallet_active: bool,
    last_tx_amount_requested: usize,
    transaction_count: usize,
}

impl BackendState {
    fn from_config(config: &WalletConfig) -> Self {
        Self {
            notifications: config.notifications,
            daemon: config.daemon(),
            wallet_file: PathBuf::from(&config.wallet_file),
            log_level: config.log_level(),
            scan_coinbase_transactions: config.scan_coinbase_transactions,
            password: SecretString::from(String::new()),
            wallet: None,
            wallet_active: false,
            last_tx_amount_requested: DEFAULT_TRANSACTION_DISPLAY_COUNT,
            transaction_count: 0,
        }
    }
}

/// Façade between the UI and the wallet library.
pub struct Backend {
    coin: CoinParams,
    opener: Arc<dyn WalletOpener>,
    state: RwLock<BackendState>,
    outbound: EventBus<Envelope<BackendMessage>>,
    save_lock: tokio::sync::Mutex<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    autosave_interval: Duration,
}

impl Backend {
    pub fn new(config: &WalletConfig, coin: CoinParams, opener: Arc<dyn WalletOpener>) -> Self {
        Self {
            coin,
            opener,
            state: RwLock::new(BackendState::from_config(config)),
            outbound: EventBus::default(),
            save_lock: tokio::sync::Mutex::new(()),
            tasks: Mutex::new(Vec::new()),
            autosave_interval: CoinParams::AUTOSAVE_INTERVAL,
        }
    }

    pub fn with_autosave_interval(mut self, interval: Duration) -> Self {
        self.autosave_interval = interval;
        self
    }

    pub fn subscribe(&self) -> Subscription<Envelope<BackendMessage>> {
        self.outbound.subscribe()
    }

    pub fn outbound(&self) -> EventBus<Envelope<BackendMessage>> {
        self.outbound.clone()
    }

    pub fn is_wallet_active(&self) -> bool {
        self.state.read().wallet_active
    }

    pub fn daemon(&self) -> Daemon {
        self.state.read().daemon.clone()
    }

    pub fn notifications_enabled(&self) -> bool {
        self.state.read().notifications
    }

    pub fn last_tx_amount_requested(&self) -> usize {
        self.state.read().last_tx_amount_requested
    }

    fn emit(&self, reply_to: Option<RequestId>, message: BackendMessage) {
        log::trace!("-> {}", message.message_type());
        self.outbound.publish(Envelope::reply(reply_to, message));
    }

    fn wallet(&self) -> WalletResult<Arc<dyn WalletBackend>> {
        self.state
            .read()
            .wallet
            .clone()
            .ok_or(WalletError::NotInitialized)
    }

    fn formatted_transactions(
        wallet: &dyn WalletBackend,
        start_index: Option<usize>,
        count: Option<usize>,
    ) -> Vec<crate::transactions::TransactionRow> {
        let transactions = wallet.transactions(start_index, count, false);
        let balance = wallet.balance().total();
        format_transactions(&transactions, i64::try_from(balance).unwrap_or(i64::MAX))
    }

    /// Opens the configured wallet file with `password`.
    ///
    /// A wrong password and an unreadable file both answer `authenticationStatus(false)`.
    pub async fn start_wallet(
        self: &Arc<Self>,
        password: SecretString,
        reply_to: Option<RequestId>,
    ) -> WalletResult<()> {
        let (daemon, wallet_file, scan_coinbase) = {
            let mut state = self.state.write();
            state.password = copy_secret(&password);
            (
                state.daemon.clone(),
                state.wallet_file.clone(),
                state.scan_coinbase_transactions,
            )
        };

        let opened = self.opener.open_wallet_from_file(OpenWalletParams {
            daemon: &daemon,
            path: &wallet_file,
            password: &password,
            coin: &self.coin,
            scan_coinbase_transactions: scan_coinbase,
        });

        match opened {
            Ok(wallet) => self.wallet_init(wallet, reply_to).await,
            Err(err) => {
                log::warn!("Failed to open {}: {}", wallet_file.display(), err);
                self.emit(reply_to, BackendMessage::AuthenticationStatus(false));
                Ok(())
            }
        }
    }

    async fn wallet_init(
        self: &Arc<Self>,
        wallet: Arc<dyn WalletBackend>,
        reply_to: Option<RequestId>,
    ) -> WalletResult<()> {
        log::info!("Wallet opened, initialising");
        let (log_level, scan_coinbase) = {
            let mut state = self.state.write();
            state.wallet = Some(wallet.clone());
            state.wallet_active = true;
            state.transaction_count = wallet.transaction_count();
            (state.log_level, state.scan_coinbase_transactions)
        };
        wallet.set_log_level(log_level);
        wallet.scan_coinbase_transactions(scan_coinbase);

        let events = wallet.subscribe();
        self.spawn_event_relay(events);

        self.emit(None, BackendMessage::SyncStatus(wallet.sync_status()));
        self.emit(None, BackendMessage::PrimaryAddress(wallet.primary_address()));
        self.emit(
            None,
            BackendMessage::TransactionList(Self::formatted_transactions(
                wallet.as_ref(),
                Some(0),
                Some(DEFAULT_TRANSACTION_DISPLAY_COUNT),
            )),
        );
        self.get_transaction_count(None)?;
        self.emit(None, BackendMessage::Balance(wallet.balance()));
        self.emit(None, BackendMessage::WalletActiveStatus(true));
        self.emit(reply_to, BackendMessage::AuthenticationStatus(true));

        wallet
            .start()
            .await
            .map_err(|e| WalletError::WalletLibrary(e.to_string()))?;

        self.emit(
            None,
            BackendMessage::DaemonConnectionInfo(wallet.daemon_connection_info()),
        );
        self.emit(None, BackendMessage::NodeFee(wallet.node_fee().amount));

        self.spawn_autosave();
        Ok(())
    }

    fn spawn_event_relay(self: &Arc<Self>, mut events: broadcast::Receiver<WalletEvent>) {
        let backend = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("Wallet event relay lagged, skipped {} events", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(backend) = backend.upgrade() else {
                    break;
                };
                if let Err(err) = backend.relay_event(event) {
                    log::error!("Failed to relay wallet event: {}", err);
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    fn relay_event(&self, event: WalletEvent) -> WalletResult<()> {
        match event {
            WalletEvent::HeightChange(status) => {
                self.emit(None, BackendMessage::SyncStatus(status));
            }
            WalletEvent::Transaction(_) => {
                self.get_transaction_count(None)?;
                let next = self.last_tx_amount_requested() + 1;
                self.get_transactions(next, None)?;
                self.get_balance(None)?;
            }
            WalletEvent::IncomingTransaction(tx) => {
                if self.notifications_enabled() {
                    self.emit(
                        None,
                        BackendMessage::IncomingTransaction(IncomingTransactionNotice {
                            title: INCOMING_TRANSACTION_TITLE.to_string(),
                            body: format!(
                                "You've just received {} {}.",
                                atomic_to_human(tx.total_amount),
                                CoinParams::TICKER
                            ),
                        }),
                    );
                }
            }
            WalletEvent::Log(line) => {
                self.emit(None, BackendMessage::BackendLogLine(line));
            }
        }
        Ok(())
    }

    fn spawn_autosave(self: &Arc<Self>) {
        let backend = Arc::downgrade(self);
        let interval = self.autosave_interval;
        let handle = tokio::spawn(autosave_loop(backend, interval));
        self.tasks.lock().push(handle);
    }

    fn abort_tasks(&self) {
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
    }

    pub fn verify_password(&self, password: &str, reply_to: Option<RequestId>) {
        let matches = self.state.read().password.expose_secret() == password;
        self.emit(reply_to, BackendMessage::AuthenticationStatus(matches));
    }

    /// Builds a transaction without relaying it.
    pub async fn prepare_transaction(
        &self,
        request: PrepareTransactionRequest,
        reply_to: Option<RequestId>,
    ) -> WalletResult<()> {
        let wallet = self.wallet()?;
        let network_height = wallet.network_block_count();
        let mixin = if request.send_all || request.amount >= CoinParams::MIXIN_AMOUNT_THRESHOLD {
            Some(self.coin.mixin_limits.default_mixin_by_height(network_height))
        } else {
            None
        };
        let destination_amount = if request.send_all {
            CoinParams::SEND_ALL_PLACEHOLDER_AMOUNT
        } else {
            request.amount
        };

        let result = wallet
            .send_transaction_advanced(SendRequest {
                destinations: vec![(request.address.clone(), destination_amount)],
                mixin,
                fee: None,
                payment_id: request.payment_id.clone().filter(|id| !id.is_empty()),
                relay_to_network: false,
                send_all: request.send_all,
            })
            .await;
        let node_fee = wallet.node_fee().amount;

        match result {
            Ok(sent) => {
                log::info!(
                    "Prepared transaction {}, fee {}",
                    sent.transaction_hash,
                    atomic_to_human(sent.fee as i64)
                );
                let amount = if request.send_all {
                    wallet.balance().total()
                } else {
                    request.amount
                };
                self.emit(
                    reply_to,
                    BackendMessage::PrepareTransactionResponse(PrepareTransactionResponse {
                        status: ResponseStatus::Success,
                        hash: Some(sent.transaction_hash),
                        address: request.address,
                        payment_id: request.payment_id,
                        amount,
                        fee: Some(sent.fee),
                        node_fee,
                        error: None,
                    }),
                );
                let next = self.last_tx_amount_requested() + 1;
                self.get_transactions(next, None)?;
            }
            Err(failure) => {
                log::info!("Failed to prepare transaction: {}", failure.error);
                self.emit(
                    reply_to,
                    BackendMessage::PrepareTransactionResponse(PrepareTransactionResponse {
                        status: ResponseStatus::Failure,
                        hash: None,
                        address: request.address,
                        payment_id: request.payment_id,
                        amount: request.amount,
                        fee: failure.fee,
                        node_fee,
                        error: Some(failure.error),
                    }),
                );
            }
        }
        Ok(())
    }

    /// Relays a transaction built by [`Backend::prepare_transaction`].
    pub async fn send_transaction(
        &self,
        hash: &str,
        reply_to: Option<RequestId>,
    ) -> WalletResult<()> {
        let wallet = self.wallet()?;
        match wallet.send_prepared_transaction(hash).await {
            Ok(sent) => {
                log::info!(
                    "Sent transaction, hash {}, fee {}",
                    sent.transaction_hash,
                    atomic_to_human(sent.fee as i64)
                );
                self.emit(
                    reply_to,
                    BackendMessage::SendTransactionResponse(SendTransactionResponse {
                        status: ResponseStatus::Success,
                        hash: Some(sent.transaction_hash),
                        error: None,
                    }),
                );
                let next = self.last_tx_amount_requested() + 1;
                self.get_transactions(next, None)?;
            }
            Err(failure) => {
                log::info!("Failed to send transaction: {}", failure.error);
                self.emit(
                    reply_to,
                    BackendMessage::SendTransactionResponse(SendTransactionResponse {
                        status: ResponseStatus::Failure,
                        hash: None,
                        error: Some(failure.error),
                    }),
                );
            }
        }
        Ok(())
    }

    /// Writes the wallet to `path`, or the configured wallet file.
    ///
    /// Returns `None` when no wallet is active. Saves never overlap.
    pub async fn save_wallet(
        &self,
        notify: bool,
        path: Option<PathBuf>,
        reply_to: Option<RequestId>,
    ) -> Option<bool> {
        let _guard = self.save_lock.lock().await;
        let (wallet, target, password) = {
            let state = self.state.read();
            if !state.wallet_active {
                return None;
            }
            (
                state.wallet.clone()?,
                path.unwrap_or_else(|| state.wallet_file.clone()),
                copy_secret(&state.password),
            )
        };

        let saved = wallet.save_to_file(&target, &password);
        if saved {
            log::debug!("Wallet saved to {}", target.display());
        } else {
            log::error!("Failed to save wallet to {}", target.display());
        }
        if notify {
            self.emit(reply_to, BackendMessage::SaveWalletResponse(saved));
        }
        Some(saved)
    }

    pub async fn rescan_wallet(&self, height: u64, reply_to: Option<RequestId>) -> WalletResult<()> {
        let wallet = self.wallet()?;
        wallet
            .reset(height)
            .await
            .map_err(|e| WalletError::WalletLibrary(e.to_string()))?;
        self.save_wallet(false, None, None).await;
        self.emit(reply_to, BackendMessage::RescanResponse(height));
        Ok(())
    }

    /// Checks the old password against the one the wallet was opened with.
    pub async fn change_password(
        &self,
        request: ChangePasswordRequest,
        reply_to: Option<RequestId>,
    ) {
        let authorised = self.state.read().password.expose_secret() == request.old_password;
        let response = if !authorised {
            PasswordChangeResponse::failure(PasswordChangeError::AuthError)
        } else {
            self.state.write().password = SecretString::from(request.new_password);
            match self.save_wallet(false, None, None).await {
                Some(true) => PasswordChangeResponse::success(),
                _ => PasswordChangeResponse::failure(PasswordChangeError::SaveError),
            }
        };
        self.emit(reply_to, BackendMessage::PasswordChangeResponse(response));
    }

    /// Whole history, fusions excluded, as a six-column CSV.
    pub fn export_to_csv(&self, path: &Path, reply_to: Option<RequestId>) -> WalletResult<()> {
        let wallet = self.wallet()?;
        let rows = Self::formatted_transactions(wallet.as_ref(), None, None);
        let exported = match export_csv(path, &rows) {
            Ok(()) => {
                log::info!("Exported {} transactions to {}", rows.len(), path.display());
                true
            }
            Err(err) => {
                log::error!("CSV export to {} failed: {}", path.display(), err);
                false
            }
        };
        self.emit(reply_to, BackendMessage::CsvExportResponse(exported));
        Ok(())
    }

    pub async fn change_node(
        &self,
        request: ChangeNodeRequest,
        reply_to: Option<RequestId>,
    ) -> WalletResult<()> {
        let wallet = self.wallet()?;
        let daemon = Daemon::new(request.host, request.port, false);
        log::info!("Switching node to {}", daemon);
        self.state.write().daemon = daemon.clone();
        wallet
            .swap_node(daemon)
            .await
            .map_err(|e| WalletError::WalletLibrary(e.to_string()))?;
        self.get_connection_info(reply_to)?;
        self.get_node_fee(None)?;
        Ok(())
    }

    pub fn transaction_search(&self, query: &str, reply_to: Option<RequestId>) -> WalletResult<()> {
        let wallet = self.wallet()?;
        let transactions = wallet.transactions(None, None, false);
        let results = transaction_search(query, &transactions);
        self.emit(reply_to, BackendMessage::TransactionSearchResponse(results));
        Ok(())
    }

    /// Newest `display_count` rows. The count is remembered for later refreshes.
    pub fn get_transactions(
        &self,
        display_count: usize,
        reply_to: Option<RequestId>,
    ) -> WalletResult<()> {
        let wallet = self.wallet()?;
        self.state.write().last_tx_amount_requested = display_count;
        let rows = Self::formatted_transactions(wallet.as_ref(), Some(0), Some(display_count));
        self.emit(reply_to, BackendMessage::TransactionList(rows));
        Ok(())
    }

    pub fn get_transaction_count(&self, reply_to: Option<RequestId>) -> WalletResult<()> {
        let wallet = self.wallet()?;
        let count = wallet.transaction_count();
        self.state.write().transaction_count = count;
        self.emit(reply_to, BackendMessage::TransactionCount(count));
        Ok(())
    }

    pub fn get_balance(&self, reply_to: Option<RequestId>) -> WalletResult<()> {
        let wallet = self.wallet()?;
        self.emit(reply_to, BackendMessage::Balance(wallet.balance()));
        Ok(())
    }

    pub fn get_connection_info(&self, reply_to: Option<RequestId>) -> WalletResult<()> {
        let wallet = self.wallet()?;
        self.emit(
            reply_to,
            BackendMessage::DaemonConnectionInfo(wallet.daemon_connection_info()),
        );
        Ok(())
    }

    pub fn get_node_fee(&self, reply_to: Option<RequestId>) -> WalletResult<()> {
        let wallet = self.wallet()?;
        self.emit(reply_to, BackendMessage::NodeFee(wallet.node_fee().amount));
        Ok(())
    }

    pub fn get_private_view(&self, reply_to: Option<RequestId>) -> WalletResult<()> {
        let wallet = self.wallet()?;
        let keys = wallet
            .primary_address_private_keys()
            .map_err(|e| WalletError::WalletLibrary(e.to_string()))?;
        self.emit(
            reply_to,
            BackendMessage::PrivateView(keys.view_key.expose_secret().to_string()),
        );
        Ok(())
    }

    /// Address, private keys and (when the wallet has one) the mnemonic seed.
    pub fn get_secret(&self) -> WalletResult<SecretString> {
        let wallet = self.wallet()?;
        let address = wallet.primary_address();
        let keys = wallet
            .primary_address_private_keys()
            .map_err(|e| WalletError::WalletLibrary(e.to_string()))?;
        let seed = match wallet.mnemonic_seed() {
            Ok(seed) => Zeroizing::new(seed.expose_secret().to_string()),
            Err(err) if err.error_code == NO_MNEMONIC_SEED_ERROR_CODE => Zeroizing::default(),
            Err(err) => return Err(WalletError::WalletLibrary(err.to_string())),
        };

        let mut secret = format!(
            "{}\n\nPrivate Spend Key:\n\n{}\n\nPrivate View Key:\n\n{}",
            address,
            keys.spend_key.expose_secret(),
            keys.view_key.expose_secret()
        );
        if !seed.is_empty() {
            secret.push_str("\n\nMnemonic Seed:\n\n");
            secret.push_str(seed.as_str());
        }
        secret.push_str(
            "\n\nPlease save these keys safely and securely. \nIf you lose your keys, you will not be able to recover your funds.",
        );
        Ok(SecretString::from(secret))
    }

    pub fn backup_to_clipboard(&self, reply_to: Option<RequestId>) -> WalletResult<()> {
        let secret = self.get_secret()?;
        self.emit(
            reply_to,
            BackendMessage::Secret(secret.expose_secret().to_string()),
        );
        Ok(())
    }

    pub fn backup_to_file(&self, path: &Path, reply_to: Option<RequestId>) -> WalletResult<()> {
        let secret = self.get_secret()?;
        let written = match fs::write(path, secret.expose_secret()) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Failed to write backup to {}: {}", path.display(), err);
                false
            }
        };
        self.emit(reply_to, BackendMessage::BackupResponse(written));
        Ok(())
    }

    pub fn set_notifications(&self, enabled: bool) {
        self.state.write().notifications = enabled;
    }

    pub fn set_log_level(&self, level: &str) {
        let level = LogLevel::from_config(level);
        let wallet = {
            let mut state = self.state.write();
            state.log_level = level;
            state.wallet.clone()
        };
        if let Some(wallet) = wallet {
            wallet.set_log_level(level);
        }
    }

    pub fn set_scan_coinbase_transactions(&self, enabled: bool) {
        let wallet = {
            let mut state = self.state.write();
            state.scan_coinbase_transactions = enabled;
            state.wallet.clone()
        };
        if let Some(wallet) = wallet {
            wallet.scan_coinbase_transactions(enabled);
        }
    }

    /// Takes the settings the façade cares about from a config message.
    pub fn apply_config(&self, config: &WalletConfig) {
        let mut state = self.state.write();
        state.notifications = config.notifications;
        state.daemon = config.daemon();
        state.wallet_file = PathBuf::from(&config.wallet_file);
        state.log_level = config.log_level();
        state.scan_coinbase_transactions = config.scan_coinbase_transactions;
    }

    /// Saves, cancels background work and stops the library.
    pub async fn stop(&self, shutting_down: bool, reply_to: Option<RequestId>) {
        let wallet = self.state.read().wallet.clone();
        if let Some(wallet) = wallet {
            self.save_wallet(false, None, None).await;
            self.abort_tasks();
            wallet.stop().await;
            self.state.write().wallet_active = false;
            log::info!("Wallet stopped");
        }
        if shutting_down {
            self.emit(reply_to, BackendMessage::BackendStopped);
        }
    }

    /// Closes the current wallet so another can be opened.
    pub async fn open_new_wallet(&self) {
        self.stop(false, None).await;
        let mut state = self.state.write();
        state.wallet = None;
        state.wallet_active = false;
        state.transaction_count = 0;
        state.last_tx_amount_requested = DEFAULT_TRANSACTION_DISPLAY_COUNT;
        state.password = SecretString::from(String::new());
    }

    /// Routes one inbound message. Failures answer with an `error` message.
    pub async fn dispatch(self: &Arc<Self>, envelope: Envelope<FrontendMessage>) {
        let reply_to = envelope.id;
        let message_type = envelope.message.message_type();
        log::debug!("<- {}", message_type);

        let result = match envelope.message {
            FrontendMessage::StartWallet { password } => {
                self.start_wallet(SecretString::from(password), reply_to)
                    .await
            }
            FrontendMessage::VerifyPassword(password) => {
                self.verify_password(&password, reply_to);
                Ok(())
            }
            FrontendMessage::PrepareTransaction(request) => {
                self.prepare_transaction(request, reply_to).await
            }
            FrontendMessage::SendTransaction(hash) => self.send_transaction(&hash, reply_to).await,
            FrontendMessage::SaveWallet(notify) => {
                self.save_wallet(notify, None, reply_to).await;
                Ok(())
            }
            FrontendMessage::SaveWalletAs(request) => {
                self.save_wallet(request.notify, Some(request.save_path), reply_to)
                    .await;
                Ok(())
            }
            FrontendMessage::ExportToCsv(path) => self.export_to_csv(&path, reply_to),
            FrontendMessage::ChangeNode(request) => self.change_node(request, reply_to).await,
            FrontendMessage::ChangePassword(request) => {
                self.change_password(request, reply_to).await;
                Ok(())
            }
            FrontendMessage::Rescan(height) => self.rescan_wallet(height, reply_to).await,
            FrontendMessage::GetTransactions(count) => self.get_transactions(count, reply_to),
            FrontendMessage::TransactionSearch(query) => self.transaction_search(&query, reply_to),
            FrontendMessage::GetPrivateView => self.get_private_view(reply_to),
            FrontendMessage::BackupToFile(path) => self.backup_to_file(&path, reply_to),
            FrontendMessage::BackupToClipboard => self.backup_to_clipboard(reply_to),
            FrontendMessage::OpenNewWallet => {
                self.open_new_wallet().await;
                Ok(())
            }
            FrontendMessage::Config(config) => {
                self.apply_config(&config);
                Ok(())
            }
            FrontendMessage::SetNotifications(enabled) => {
                self.set_notifications(enabled);
                Ok(())
            }
            FrontendMessage::SetLogLevel(level) => {
                self.set_log_level(&level);
                Ok(())
            }
            FrontendMessage::SetScanCoinbaseTransactions(enabled) => {
                self.set_scan_coinbase_transactions(enabled);
                Ok(())
            }
            FrontendMessage::GetBalance => self.get_balance(reply_to),
            FrontendMessage::GetTransactionCount => self.get_transaction_count(reply_to),
            FrontendMessage::GetConnectionInfo => self.get_connection_info(reply_to),
            FrontendMessage::GetNodeFee => self.get_node_fee(reply_to),
            FrontendMessage::Stop(shutting_down) => {
                self.stop(shutting_down, reply_to).await;
                Ok(())
            }
        };

        if let Err(err) = result {
            log::error!("{} failed: {}", message_type, err);
            self.emit(reply_to, BackendMessage::Error(err.to_string()));
        }
    }

    /// Handles inbound envelopes in arrival order until the sender side closes.
    pub fn serve(self: Arc<Self>, mut inbound: mpsc::Receiver<Envelope<FrontendMessage>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                self.dispatch(envelope).await;
            }
            log::debug!("Inbound channel closed, backend loop exiting");
        })
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

async fn autosave_loop(backend: Weak<Backend>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(backend) = backend.upgrade() else {
            break;
        };
        if backend.save_wallet(false, None, None).await == Some(false) {
            log::warn!("Autosave failed");
        }
    }
}
