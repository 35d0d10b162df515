use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config_store::WalletConfig;
use crate::daemon::DaemonConnectionInfo;
use crate::ipc::{BackendMessage, PrepareTransactionResponse, ResponseStatus};
use crate::transactions::TransactionRow;
use crate::wallet::{Balance, SyncStatus};

/// Log lines kept for the console view.
pub const MAX_LOG_LINES: usize = 1_000;

/// Everything the UI renders, as last reported by the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub balance: Balance,
    pub transactions: Vec<TransactionRow>,
    pub transaction_count: usize,
    pub sync_status: SyncStatus,
    pub connection_info: DaemonConnectionInfo,
    pub node_fee: u64,
    pub primary_address: String,
    pub prepared_transaction: Option<PrepareTransactionResponse>,
    pub logged_in: bool,
    pub wallet_active: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    snapshot: SessionSnapshot,
    log_lines: VecDeque<String>,
    last_activity: Option<Instant>,
    auto_lock: Option<Duration>,
}

/// Renderer-side cache fed by backend messages, with inactivity locking.
#[derive(Debug, Clone)]
pub struct WalletSession {
    state: Arc<RwLock<SessionState>>,
}

impl Default for WalletSession {
    fn default() -> Self {
        Self::new(None)
    }
}

impl WalletSession {
    pub fn new(auto_lock: Option<Duration>) -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState {
                auto_lock,
                ..SessionState::default()
            })),
        }
    }

    pub fn from_config(config: &WalletConfig) -> Self {
        Self::new(auto_lock_from_config(config))
    }

    pub fn auto_lock(&self) -> Option<Duration> {
        self.state.read().auto_lock
    }

    /// Applies changed auto-lock settings without dropping the cache.
    pub fn configure(&self, config: &WalletConfig) {
        self.state.write().auto_lock = auto_lock_from_config(config);
    }

    /// Folds one inbound message into the cache.
    pub fn apply(&self, message: &BackendMessage) {
        let mut state = self.state.write();
        match message {
            BackendMessage::SyncStatus(status) => state.snapshot.sync_status = *status,
            BackendMessage::TransactionList(rows) => state.snapshot.transactions = rows.clone(),
            BackendMessage::TransactionCount(count) => state.snapshot.transaction_count = *count,
            BackendMessage::Balance(balance) => state.snapshot.balance = *balance,
            BackendMessage::NodeFee(fee) => state.snapshot.node_fee = *fee,
            BackendMessage::DaemonConnectionInfo(info) => {
                state.snapshot.connection_info = info.clone()
            }
            BackendMessage::AuthenticationStatus(true) => {
                state.snapshot.logged_in = true;
                state.last_activity = Some(Instant::now());
            }
            BackendMessage::WalletActiveStatus(active) => state.snapshot.wallet_active = *active,
            BackendMessage::PrimaryAddress(address) => {
                state.snapshot.primary_address = address.clone()
            }
            BackendMessage::PrepareTransactionResponse(response) => {
                state.snapshot.prepared_transaction = match response.status {
                    ResponseStatus::Success => Some(response.clone()),
                    ResponseStatus::Failure => None,
                };
            }
            BackendMessage::SendTransactionResponse(_) => {
                state.snapshot.prepared_transaction = None;
            }
            BackendMessage::BackendLogLine(line) => {
                if state.log_lines.len() == MAX_LOG_LINES {
                    state.log_lines.pop_front();
                }
                state.log_lines.push_back(line.clone());
            }
            BackendMessage::BackendStopped => {
                state.snapshot.wallet_active = false;
                state.snapshot.logged_in = false;
            }
            _ => {}
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.read().snapshot.clone()
    }

    pub fn balance(&self) -> Balance {
        self.state.read().snapshot.balance
    }

    pub fn primary_address(&self) -> String {
        self.state.read().snapshot.primary_address.clone()
    }

    /// Hash of the transaction waiting for confirmation, if any.
    pub fn prepared_hash(&self) -> Option<String> {
        self.state
            .read()
            .snapshot
            .prepared_transaction
            .as_ref()
            .and_then(|prepared| prepared.hash.clone())
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.state.read().log_lines.iter().cloned().collect()
    }

    /// Locked when logged out or idle past the auto-lock interval.
    pub fn is_locked(&self) -> bool {
        let state = self.state.read();
        if !state.snapshot.logged_in {
            return true;
        }
        match (state.auto_lock, state.last_activity) {
            (Some(timeout), Some(last)) => last.elapsed() >= timeout,
            _ => false,
        }
    }

    /// Records user activity, pushing back the auto-lock deadline.
    pub fn touch(&self) {
        let mut state = self.state.write();
        if state.snapshot.logged_in {
            state.last_activity = Some(Instant::now());
        }
    }

    /// Drops the login but keeps the cached wallet data for the lock screen.
    pub fn lock(&self) {
        let mut state = self.state.write();
        state.snapshot.logged_in = false;
        state.last_activity = None;
    }

    /// Forgets everything, as when another wallet is about to be opened.
    pub fn reset(&self) {
        let mut state = self.state.write();
        let auto_lock = state.auto_lock;
        *state = SessionState {
            auto_lock,
            ..SessionState::default()
        };
    }
}

fn auto_lock_from_config(config: &WalletConfig) -> Option<Duration> {
    config
        .auto_lock_enabled
        .then(|| duration_from_minutes(config.auto_lock_interval))
}

fn duration_from_minutes(minutes: u32) -> Duration {
    let clamped = minutes.max(1) as u64;
    Duration::from_secs(clamped.saturating_mul(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::WalletLibraryError;

    fn prepared(status: ResponseStatus) -> PrepareTransactionResponse {
        PrepareTransactionResponse {
            status,
            hash: (status == ResponseStatus::Success).then(|| "abc".to_string()),
            address: "VRMdest".into(),
            payment_id: None,
            amount: 5,
            fee: Some(10),
            node_fee: 0,
            error: (status == ResponseStatus::Failure)
                .then(|| WalletLibraryError::new(8, "Not enough balance")),
        }
    }

    #[test]
    fn applies_wallet_state() {
        let session = WalletSession::default();
        session.apply(&BackendMessage::Balance(Balance::new(5, 7)));
        session.apply(&BackendMessage::SyncStatus(SyncStatus::new(1, 2, 3)));
        session.apply(&BackendMessage::PrimaryAddress("VRMabc".into()));
        session.apply(&BackendMessage::NodeFee(25));
        session.apply(&BackendMessage::TransactionCount(4));
        session.apply(&BackendMessage::WalletActiveStatus(true));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.balance.total(), 12);
        assert_eq!(snapshot.sync_status, SyncStatus::new(1, 2, 3));
        assert_eq!(snapshot.primary_address, "VRMabc");
        assert_eq!(snapshot.node_fee, 25);
        assert_eq!(snapshot.transaction_count, 4);
        assert!(snapshot.wallet_active);
    }

    #[test]
    fn prepared_transaction_lifecycle() {
        let session = WalletSession::default();
        session.apply(&BackendMessage::PrepareTransactionResponse(prepared(
            ResponseStatus::Success,
        )));
        assert_eq!(session.prepared_hash().as_deref(), Some("abc"));

        session.apply(&BackendMessage::PrepareTransactionResponse(prepared(
            ResponseStatus::Failure,
        )));
        assert_eq!(session.prepared_hash(), None);

        session.apply(&BackendMessage::PrepareTransactionResponse(prepared(
            ResponseStatus::Success,
        )));
        session.apply(&BackendMessage::SendTransactionResponse(
            crate::ipc::SendTransactionResponse {
                status: ResponseStatus::Success,
                hash: Some("abc".into()),
                error: None,
            },
        ));
        assert_eq!(session.prepared_hash(), None);
    }

    #[test]
    fn log_lines_are_capped() {
        let session = WalletSession::default();
        for i in 0..MAX_LOG_LINES + 5 {
            session.apply(&BackendMessage::BackendLogLine(format!("line {}", i)));
        }
        let lines = session.log_lines();
        assert_eq!(lines.len(), MAX_LOG_LINES);
        assert_eq!(lines[0], "line 5");
    }

    #[test]
    fn login_and_lock_cycle() {
        let session = WalletSession::default();
        assert!(session.is_locked());

        session.apply(&BackendMessage::AuthenticationStatus(false));
        assert!(session.is_locked());

        session.apply(&BackendMessage::AuthenticationStatus(true));
        assert!(!session.is_locked());

        session.lock();
        assert!(session.is_locked());
    }

    #[test]
    fn idle_session_locks() {
        let session = WalletSession::new(Some(Duration::from_millis(10)));
        session.apply(&BackendMessage::AuthenticationStatus(true));
        assert!(!session.is_locked());
        std::thread::sleep(Duration::from_millis(30));
        assert!(session.is_locked());
    }

    #[test]
    fn auto_lock_follows_config() {
        let mut config = WalletConfig::default();
        assert_eq!(
            WalletSession::from_config(&config).auto_lock(),
            Some(Duration::from_secs(600))
        );
        config.auto_lock_enabled = false;
        assert_eq!(WalletSession::from_config(&config).auto_lock(), None);

        let session = WalletSession::default();
        config.auto_lock_interval = 0;
        config.auto_lock_enabled = true;
        session.configure(&config);
        assert_eq!(session.auto_lock(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn backend_stop_logs_out() {
        let session = WalletSession::default();
        session.apply(&BackendMessage::AuthenticationStatus(true));
        session.apply(&BackendMessage::WalletActiveStatus(true));
        session.apply(&BackendMessage::BackendStopped);
        let snapshot = session.snapshot();
        assert!(!snapshot.logged_in);
        assert!(!snapshot.wallet_active);

        session.apply(&BackendMessage::Balance(Balance::new(1, 1)));
        session.reset();
        assert_eq!(session.snapshot(), SessionSnapshot::default());
    }
}
