//! UI side of the message channel.
//!
//! [`BackendClient`] sends envelopes to the backend and pairs replies with the
//! requests that caused them. A pump task reads every backend message, feeds
//! it to the [`WalletSession`], resolves the matching pending request and
//! republishes it for UI subscribers.

use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bus::{EventBus, Subscription};
use crate::daemon::Daemon;
use crate::errors::{WalletError, WalletResult};
use crate::ipc::{
    BackendMessage, ChangeNodeRequest, ChangePasswordRequest, Envelope, FrontendMessage,
    PasswordChangeResponse, PrepareTransactionRequest, PrepareTransactionResponse,
    SaveWalletAsRequest, SendTransactionResponse,
};
use crate::pending::{PendingRequests, DEFAULT_REQUEST_TIMEOUT};
use crate::session::WalletSession;
use crate::transactions::TransactionRow;
use crate::wallet::WalletTransaction;

pub struct BackendClient {
    outbound: mpsc::Sender<Envelope<FrontendMessage>>,
    pending: PendingRequests,
    session: WalletSession,
    bus: EventBus<BackendMessage>,
    timeout: Duration,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl BackendClient {
    /// Starts pumping `inbound` and returns a client sending on `outbound`.
    pub fn connect(
        outbound: mpsc::Sender<Envelope<FrontendMessage>>,
        inbound: Subscription<Envelope<BackendMessage>>,
        session: WalletSession,
        bus: EventBus<BackendMessage>,
    ) -> Self {
        let pending = PendingRequests::new();
        let pump = tokio::spawn(pump(inbound, pending.clone(), session.clone(), bus.clone()));
        Self {
            outbound,
            pending,
            session,
            bus,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            pump: Mutex::new(Some(pump)),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn subscribe(&self) -> Subscription<BackendMessage> {
        self.bus.subscribe()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Fire-and-forget.
    pub async fn send(&self, message: FrontendMessage) -> WalletResult<()> {
        log::trace!("-> {}", message.message_type());
        self.outbound
            .send(Envelope::notify(message))
            .await
            .map_err(|_| WalletError::ChannelClosed)
    }

    /// Sends `message` and waits for the reply carrying its ID.
    ///
    /// An `error` reply becomes an `Err`. A reply that never arrives fails with
    /// `ConnectionTimeout` once the client timeout elapses.
    pub async fn request(&self, message: FrontendMessage) -> WalletResult<BackendMessage> {
        let message_type = message.message_type();
        let pending = self.pending.register(message_type);
        let id = pending.id();
        log::trace!("-> {} ({})", message_type, id);

        if self
            .outbound
            .send(Envelope::request(id, message))
            .await
            .is_err()
        {
            self.pending.reject(&id);
            return Err(WalletError::ChannelClosed);
        }

        match pending.wait(self.timeout).await? {
            BackendMessage::Error(message) => Err(WalletError::Unknown(message)),
            reply => Ok(reply),
        }
    }

    pub async fn start_wallet(&self, password: &SecretString) -> WalletResult<bool> {
        let reply = self
            .request(FrontendMessage::StartWallet {
                password: password.expose_secret().to_string(),
            })
            .await?;
        match reply {
            BackendMessage::AuthenticationStatus(ok) => Ok(ok),
            other => Err(unexpected(other)),
        }
    }

    pub async fn verify_password(&self, password: &SecretString) -> WalletResult<bool> {
        let reply = self
            .request(FrontendMessage::VerifyPassword(
                password.expose_secret().to_string(),
            ))
            .await?;
        match reply {
            BackendMessage::AuthenticationStatus(ok) => Ok(ok),
            other => Err(unexpected(other)),
        }
    }

    pub async fn prepare_transaction(
        &self,
        request: PrepareTransactionRequest,
    ) -> WalletResult<PrepareTransactionResponse> {
        match self
            .request(FrontendMessage::PrepareTransaction(request))
            .await?
        {
            BackendMessage::PrepareTransactionResponse(response) => Ok(response),
            other => Err(unexpected(other)),
        }
    }

    /// Relays the transaction the session last prepared.
    pub async fn send_prepared_transaction(&self) -> WalletResult<SendTransactionResponse> {
        let hash = self.session.prepared_hash().ok_or_else(|| {
            WalletError::NotFound("No prepared transaction to send".to_string())
        })?;
        match self.request(FrontendMessage::SendTransaction(hash)).await? {
            BackendMessage::SendTransactionResponse(response) => Ok(response),
            other => Err(unexpected(other)),
        }
    }

    pub async fn save_wallet(&self) -> WalletResult<bool> {
        self.ensure_wallet_active()?;
        match self.request(FrontendMessage::SaveWallet(true)).await? {
            BackendMessage::SaveWalletResponse(saved) => Ok(saved),
            other => Err(unexpected(other)),
        }
    }

    pub async fn save_wallet_as(&self, save_path: PathBuf) -> WalletResult<bool> {
        self.ensure_wallet_active()?;
        let request = SaveWalletAsRequest {
            notify: true,
            save_path,
        };
        match self.request(FrontendMessage::SaveWalletAs(request)).await? {
            BackendMessage::SaveWalletResponse(saved) => Ok(saved),
            other => Err(unexpected(other)),
        }
    }

    pub async fn export_to_csv(&self, path: PathBuf) -> WalletResult<bool> {
        match self.request(FrontendMessage::ExportToCsv(path)).await? {
            BackendMessage::CsvExportResponse(exported) => Ok(exported),
            other => Err(unexpected(other)),
        }
    }

    /// Switches to the node in a `host[:port]` string.
    pub async fn change_node(&self, connection_string: &str) -> WalletResult<()> {
        let daemon = Daemon::parse_connection_string(connection_string)?;
        let request = ChangeNodeRequest {
            host: daemon.host,
            port: daemon.port,
        };
        match self.request(FrontendMessage::ChangeNode(request)).await? {
            BackendMessage::DaemonConnectionInfo(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn change_password(
        &self,
        old_password: &SecretString,
        new_password: &SecretString,
    ) -> WalletResult<PasswordChangeResponse> {
        let request = ChangePasswordRequest {
            old_password: old_password.expose_secret().to_string(),
            new_password: new_password.expose_secret().to_string(),
        };
        match self.request(FrontendMessage::ChangePassword(request)).await? {
            BackendMessage::PasswordChangeResponse(response) => Ok(response),
            other => Err(unexpected(other)),
        }
    }

    pub async fn rescan(&self, height: u64) -> WalletResult<u64> {
        match self.request(FrontendMessage::Rescan(height)).await? {
            BackendMessage::RescanResponse(height) => Ok(height),
            other => Err(unexpected(other)),
        }
    }

    pub async fn get_transactions(&self, display_count: usize) -> WalletResult<Vec<TransactionRow>> {
        match self
            .request(FrontendMessage::GetTransactions(display_count))
            .await?
        {
            BackendMessage::TransactionList(rows) => Ok(rows),
            other => Err(unexpected(other)),
        }
    }

    pub async fn transaction_search(&self, query: &str) -> WalletResult<Vec<WalletTransaction>> {
        match self
            .request(FrontendMessage::TransactionSearch(query.to_string()))
            .await?
        {
            BackendMessage::TransactionSearchResponse(results) => Ok(results),
            other => Err(unexpected(other)),
        }
    }

    pub async fn private_view_key(&self) -> WalletResult<SecretString> {
        match self.request(FrontendMessage::GetPrivateView).await? {
            BackendMessage::PrivateView(key) => Ok(SecretString::from(key)),
            other => Err(unexpected(other)),
        }
    }

    pub async fn backup_to_clipboard(&self) -> WalletResult<SecretString> {
        match self.request(FrontendMessage::BackupToClipboard).await? {
            BackendMessage::Secret(secret) => Ok(SecretString::from(secret)),
            other => Err(unexpected(other)),
        }
    }

    pub async fn backup_to_file(&self, path: PathBuf) -> WalletResult<bool> {
        match self.request(FrontendMessage::BackupToFile(path)).await? {
            BackendMessage::BackupResponse(written) => Ok(written),
            other => Err(unexpected(other)),
        }
    }

    /// Closes the current wallet and forgets the cached session.
    pub async fn open_new_wallet(&self) -> WalletResult<()> {
        self.send(FrontendMessage::OpenNewWallet).await?;
        self.session.reset();
        Ok(())
    }

    /// Asks the backend to save and stop, waiting for `backendStopped`.
    pub async fn shutdown(&self) -> WalletResult<()> {
        match self.request(FrontendMessage::Stop(true)).await? {
            BackendMessage::BackendStopped => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    fn ensure_wallet_active(&self) -> WalletResult<()> {
        if self.session.snapshot().wallet_active {
            Ok(())
        } else {
            Err(WalletError::NotInitialized)
        }
    }
}

impl Drop for BackendClient {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

fn unexpected(message: BackendMessage) -> WalletError {
    WalletError::InvalidResponse(format!("Unexpected reply {}", message.message_type()))
}

async fn pump(
    mut inbound: Subscription<Envelope<BackendMessage>>,
    pending: PendingRequests,
    session: WalletSession,
    bus: EventBus<BackendMessage>,
) {
    loop {
        let envelope = match inbound.recv().await {
            Ok(envelope) => envelope,
            Err(err) => {
                let rejected = pending.reject_all();
                log::debug!("Backend channel ended ({}), rejected {} requests", err, rejected);
                break;
            }
        };

        log::trace!("<- {}", envelope.message.message_type());
        session.apply(&envelope.message);
        if let Some(id) = envelope.reply_to {
            pending.resolve(&id, envelope.message.clone());
        }
        bus.publish(envelope.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::coin::CoinParams;
    use crate::config_store::WalletConfig;
    use crate::ipc::{PasswordChangeError, ResponseStatus};
    use crate::testing::{transaction, MockOpener, MockState, MockWallet, MOCK_PRIMARY_ADDRESS};
    use crate::wallet::Balance;
    use std::sync::Arc;

    const PASSWORD: &str = "hunter2";

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn connected(state: MockState) -> (BackendClient, Arc<MockWallet>) {
        let wallet = MockWallet::new(state);
        let opener = MockOpener::new(wallet.clone(), PASSWORD);
        let backend = Arc::new(Backend::new(
            &WalletConfig::default(),
            CoinParams::default(),
            opener,
        ));
        let (tx, rx) = mpsc::channel(16);
        let inbound = backend.subscribe();
        backend.serve(rx);
        let client = BackendClient::connect(tx, inbound, WalletSession::default(), EventBus::default())
            .with_timeout(Duration::from_secs(2));
        (client, wallet)
    }

    fn funded() -> MockState {
        MockState {
            balance: Balance::new(900, 100),
            transactions: vec![transaction("b", 400, 20), transaction("a", 600, 10)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn login_populates_session() {
        let (client, _wallet) = connected(funded());
        assert!(!client.start_wallet(&secret("wrong")).await.unwrap());
        assert!(client.session().is_locked());

        assert!(client.start_wallet(&secret(PASSWORD)).await.unwrap());
        let snapshot = client.session().snapshot();
        assert!(snapshot.logged_in);
        assert!(snapshot.wallet_active);
        assert_eq!(snapshot.primary_address, MOCK_PRIMARY_ADDRESS);
        assert_eq!(snapshot.balance.total(), 1_000);
        assert_eq!(snapshot.transactions.len(), 2);
        assert!(client.verify_password(&secret(PASSWORD)).await.unwrap());
    }

    #[tokio::test]
    async fn prepare_then_send_uses_cached_hash() {
        let (client, wallet) = connected(funded());
        client.start_wallet(&secret(PASSWORD)).await.unwrap();

        assert!(matches!(
            client.send_prepared_transaction().await,
            Err(WalletError::NotFound(_))
        ));

        let prepared = client
            .prepare_transaction(PrepareTransactionRequest {
                address: "VRMdest".into(),
                amount: 10,
                payment_id: None,
                send_all: false,
            })
            .await
            .unwrap();
        assert_eq!(prepared.status, ResponseStatus::Success);

        let sent = client.send_prepared_transaction().await.unwrap();
        assert_eq!(sent.status, ResponseStatus::Success);
        assert_eq!(client.session().prepared_hash(), None);
        wallet.inspect(|state| assert_eq!(state.relayed, vec![prepared.hash.clone().unwrap()]));
    }

    #[tokio::test]
    async fn concurrent_requests_resolve_independently() {
        let (client, _wallet) = connected(funded());
        client.start_wallet(&secret(PASSWORD)).await.unwrap();

        let (first, second) = tokio::join!(client.get_transactions(1), client.get_transactions(2));
        assert_eq!(first.unwrap().len(), 1);
        assert_eq!(second.unwrap().len(), 2);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn backend_errors_surface_as_err() {
        let (client, _wallet) = connected(funded());
        let err = client.rescan(5).await.unwrap_err();
        assert!(matches!(err, WalletError::Unknown(_)));
        assert!(matches!(
            client.save_wallet().await,
            Err(WalletError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn password_change_round_trip() {
        let (client, _wallet) = connected(funded());
        client.start_wallet(&secret(PASSWORD)).await.unwrap();
        let response = client
            .change_password(&secret("bad"), &secret("new"))
            .await
            .unwrap();
        assert_eq!(
            response,
            PasswordChangeResponse::failure(PasswordChangeError::AuthError)
        );
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let (tx, _rx) = mpsc::channel(4);
        let bus: EventBus<Envelope<BackendMessage>> = EventBus::default();
        let client = BackendClient::connect(
            tx,
            bus.subscribe(),
            WalletSession::default(),
            EventBus::default(),
        )
        .with_timeout(Duration::from_millis(20));

        let err = client.rescan(1).await.unwrap_err();
        assert_eq!(err, WalletError::ConnectionTimeout);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn node_change_validates_port_first() {
        let (client, wallet) = connected(funded());
        client.start_wallet(&secret(PASSWORD)).await.unwrap();
        assert!(matches!(
            client.change_node("node.example.org:abc").await,
            Err(WalletError::InvalidPort(_))
        ));
        client.change_node("node.example.org:11898").await.unwrap();
        wallet.inspect(|state| {
            assert_eq!(state.swapped_to, vec![Daemon::new("node.example.org", 11898, false)]);
        });
    }

    #[tokio::test]
    async fn messages_are_republished() {
        let (client, _wallet) = connected(funded());
        let mut messages = client.subscribe();
        client.start_wallet(&secret(PASSWORD)).await.unwrap();
        let first = messages.recv().await.unwrap();
        assert_eq!(first.message_type(), "syncStatus");
    }

    #[tokio::test]
    async fn shutdown_waits_for_backend() {
        let (client, wallet) = connected(funded());
        client.start_wallet(&secret(PASSWORD)).await.unwrap();
        client.shutdown().await.unwrap();
        wallet.inspect(|state| assert!(state.stopped));
        assert!(!client.session().snapshot().wallet_active);
    }
}
