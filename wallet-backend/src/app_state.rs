use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use tokio::sync::mpsc;

use crate::backend::Backend;
use crate::bus::EventBus;
use crate::client::BackendClient;
use crate::coin::CoinParams;
use crate::config_store::{ConfigStore, WalletConfig};
use crate::errors::{WalletError, WalletResult};
use crate::ipc::{BackendMessage, FrontendMessage};
use crate::session::WalletSession;
use crate::storage::{AddressBook, AddressBookEntry, WalletPaths};
use crate::validation::InputValidator;
use crate::wallet::WalletOpener;

/// Inbound envelopes buffered between the client and the backend loop.
pub const BACKEND_CHANNEL_CAPACITY: usize = 64;

/// Everything the UI process owns: files on disk, the session cache and the message bus.
#[derive(Debug)]
pub struct AppContext {
    paths: WalletPaths,
    config_store: ConfigStore,
    config: WalletConfig,
    address_book: AddressBook,
    session: WalletSession,
    bus: EventBus<BackendMessage>,
    coin: CoinParams,
}

impl AppContext {
    /// Creates the directory layout and loads (then rewrites) the config.
    pub fn initialize(root_dir: PathBuf) -> WalletResult<Self> {
        let paths = WalletPaths::new(&root_dir)?;
        paths.ensure_directories()?;

        let config_store = ConfigStore::from_paths(&paths);
        let config = config_store.load_and_persist()?;
        let address_book = AddressBook::load_or_create(paths.address_book_file())?;
        let session = WalletSession::from_config(&config);
        log::info!(
            "Wallet context ready at {} (node {})",
            paths.root_dir().display(),
            config.daemon()
        );

        Ok(Self {
            paths,
            config_store,
            config,
            address_book,
            session,
            bus: EventBus::default(),
            coin: CoinParams::default(),
        })
    }

    pub fn paths(&self) -> &WalletPaths {
        &self.paths
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn config_store(&self) -> &ConfigStore {
        &self.config_store
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn bus(&self) -> &EventBus<BackendMessage> {
        &self.bus
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.address_book
    }

    pub fn update_config<F>(&mut self, updater: F) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let updated = self.config_store.update(updater)?;
        self.session.configure(&updated);
        self.config = updated.clone();
        Ok(updated)
    }

    pub fn add_contact(&mut self, entry: AddressBookEntry) -> WalletResult<()> {
        let validator = InputValidator::new()?;
        self.address_book.add(&validator, entry)
    }

    pub fn remove_contact(&mut self, name: &str) -> WalletResult<bool> {
        self.address_book.remove(name)
    }

    /// Starts a backend on its own task and returns it with a client wired to this context.
    pub fn connect_backend(&self, opener: Arc<dyn WalletOpener>) -> (Arc<Backend>, BackendClient) {
        let backend = Arc::new(Backend::new(&self.config, self.coin.clone(), opener));
        let (sender, receiver) = mpsc::channel(BACKEND_CHANNEL_CAPACITY);
        let inbound = backend.subscribe();
        Arc::clone(&backend).serve(receiver);
        let client = BackendClient::connect(sender, inbound, self.session.clone(), self.bus.clone());
        (backend, client)
    }

    /// The config message sent to a freshly started backend.
    pub fn config_message(&self) -> FrontendMessage {
        FrontendMessage::Config(Box::new(self.config.clone()))
    }
}

/// Shared application context handed to UI handlers.
#[derive(Clone)]
pub struct SharedAppContext(pub Arc<RwLock<AppContext>>);

impl SharedAppContext {
    pub fn new(inner: AppContext) -> Self {
        Self(Arc::new(RwLock::new(inner)))
    }

    pub fn read<F, T>(&self, op: F) -> WalletResult<T>
    where
        F: FnOnce(&AppContext) -> WalletResult<T>,
    {
        let guard = self
            .0
            .read()
            .map_err(|_| WalletError::Unknown("Poisoned app context".into()))?;
        op(&guard)
    }

    pub fn write<F, T>(&self, op: F) -> WalletResult<T>
    where
        F: FnOnce(&mut AppContext) -> WalletResult<T>,
    {
        let mut guard = self
            .0
            .write()
            .map_err(|_| WalletError::Unknown("Poisoned app context".into()))?;
        op(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockOpener, MockState, MockWallet};
    use secrecy::SecretString;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn initialize_writes_merged_config() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join(".verumwallet");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("config.json"), r#"{"darkMode": true, "custom": 1}"#).unwrap();

        let context = AppContext::initialize(root.clone()).unwrap();
        assert!(context.config().dark_mode);
        assert_eq!(context.config().daemon_port, CoinParams::DEFAULT_DAEMON_PORT);
        assert!(root.join("logs").is_dir());
        assert!(root.join("addressBook.json").is_file());

        let written: serde_json::Value =
            serde_json::from_slice(&fs::read(root.join("config.json")).unwrap()).unwrap();
        assert_eq!(written["daemonHost"], "verumcoin.nl");
        assert_eq!(written["custom"], 1);
    }

    #[test]
    fn update_config_reconfigures_session() {
        let temp = TempDir::new().unwrap();
        let shared = SharedAppContext::new(AppContext::initialize(temp.path().join("w")).unwrap());

        shared
            .write(|context| {
                context.update_config(|config| {
                    config.auto_lock_enabled = false;
                    Ok(())
                })
            })
            .unwrap();

        let auto_lock = shared.read(|context| Ok(context.session().auto_lock())).unwrap();
        assert_eq!(auto_lock, None);
    }

    #[test]
    fn contacts_are_validated() {
        let temp = TempDir::new().unwrap();
        let mut context = AppContext::initialize(temp.path().join("w")).unwrap();
        let entry = AddressBookEntry {
            name: "Alice".into(),
            address: format!("VRM{}", "a".repeat(95)),
            payment_id: String::new(),
        };
        context.add_contact(entry.clone()).unwrap();
        assert!(context.add_contact(entry).is_err());
        assert!(context.remove_contact("Alice").unwrap());
        assert!(context.address_book().entries().is_empty());
    }

    #[tokio::test]
    async fn connected_backend_feeds_shared_session() {
        let temp = TempDir::new().unwrap();
        let context = AppContext::initialize(temp.path().join("w")).unwrap();
        let wallet = MockWallet::new(MockState::default());
        let (_backend, client) = context.connect_backend(MockOpener::new(wallet, "pw"));

        client.send(context.config_message()).await.unwrap();
        assert!(client
            .start_wallet(&SecretString::from("pw".to_string()))
            .await
            .unwrap());
        assert!(!context.session().is_locked());
    }
}
