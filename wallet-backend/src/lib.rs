//! Backend for the Verum desktop wallet.
//!
//! The [`Backend`] façade drives one wallet library handle and talks to the UI
//! through typed messages; [`BackendClient`] is the UI side of that channel.

pub mod amount;
pub mod app_state;
pub mod backend;
pub mod bus;
pub mod client;
pub mod coin;
pub mod config_store;
pub mod daemon;
pub mod errors;
pub mod ipc;
pub mod nodes;
pub mod pending;
pub mod session;
pub mod storage;
pub mod transactions;
pub mod validation;
pub mod verminting;
pub mod wallet;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export common types
pub use amount::Amount;
pub use app_state::{AppContext, SharedAppContext};
pub use backend::Backend;
pub use bus::{EventBus, Subscription};
pub use client::BackendClient;
pub use coin::CoinParams;
pub use config_store::{ConfigStore, WalletConfig};
pub use daemon::{Daemon, DaemonConnectionInfo};
pub use errors::{WalletError, WalletResult};
pub use ipc::{BackendMessage, Envelope, FrontendMessage, RequestId};
pub use nodes::{NodeListClient, PublicNode};
pub use session::{SessionSnapshot, WalletSession};
pub use storage::{AddressBook, AddressBookEntry, WalletPaths};
pub use transactions::TransactionRow;
pub use validation::InputValidator;
pub use verminting::{VermintingClient, VermintingMonitor, VermintingState};
pub use wallet::{LogLevel, WalletBackend, WalletEvent, WalletOpener, WalletTransaction};
