//! Message protocol between the UI process and the backend.
//!
//! Every message is `{"messageType": ..., "data": ...}`. Messages travel inside
//! an [`Envelope`] carrying an optional request ID; a backend message that
//! answers a request echoes that ID in `replyTo`.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config_store::WalletConfig;
use crate::daemon::DaemonConnectionInfo;
use crate::transactions::TransactionRow;
use crate::wallet::{Balance, SyncStatus, WalletLibraryError, WalletTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Wire wrapper adding request correlation to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<RequestId>,
    pub message: T,
}

impl<T> Envelope<T> {
    /// A message nobody waits on.
    pub fn notify(message: T) -> Self {
        Self {
            id: None,
            reply_to: None,
            message,
        }
    }

    pub fn request(id: RequestId, message: T) -> Self {
        Self {
            id: Some(id),
            reply_to: None,
            message,
        }
    }

    pub fn reply(reply_to: Option<RequestId>, message: T) -> Self {
        Self {
            id: None,
            reply_to,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareTransactionRequest {
    pub address: String,
    pub amount: u64,
    #[serde(rename = "paymentID", default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub send_all: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareTransactionResponse {
    pub status: ResponseStatus,
    pub hash: Option<String>,
    pub address: String,
    #[serde(rename = "paymentID")]
    pub payment_id: Option<String>,
    pub amount: u64,
    pub fee: Option<u64>,
    pub node_fee: u64,
    pub error: Option<WalletLibraryError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionResponse {
    pub status: ResponseStatus,
    pub hash: Option<String>,
    pub error: Option<WalletLibraryError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveWalletAsRequest {
    pub notify: bool,
    pub save_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNodeRequest {
    pub host: String,
    pub port: u16,
}

// Passwords stay plain strings on the wire; the backend wraps them in SecretString.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChangePasswordRequest { .. }")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordChangeError {
    #[serde(rename = "AUTHERROR")]
    AuthError,
    #[serde(rename = "SAVEERROR")]
    SaveError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordChangeResponse {
    pub status: ResponseStatus,
    pub error: Option<PasswordChangeError>,
}

impl PasswordChangeResponse {
    pub fn success() -> Self {
        Self {
            status: ResponseStatus::Success,
            error: None,
        }
    }

    pub fn failure(error: PasswordChangeError) -> Self {
        Self {
            status: ResponseStatus::Failure,
            error: Some(error),
        }
    }
}

/// Desktop notification for a received transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingTransactionNotice {
    pub title: String,
    pub body: String,
}

/// UI → backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "data")]
pub enum FrontendMessage {
    #[serde(rename = "startWallet")]
    StartWallet { password: String },
    #[serde(rename = "verifyPassword")]
    VerifyPassword(String),
    #[serde(rename = "prepareTransactionRequest")]
    PrepareTransaction(PrepareTransactionRequest),
    #[serde(rename = "sendTransactionRequest")]
    SendTransaction(String),
    #[serde(rename = "saveWallet")]
    SaveWallet(bool),
    #[serde(rename = "saveWalletAs")]
    SaveWalletAs(SaveWalletAsRequest),
    #[serde(rename = "exportToCSV")]
    ExportToCsv(PathBuf),
    #[serde(rename = "changeNode")]
    ChangeNode(ChangeNodeRequest),
    #[serde(rename = "changePassword")]
    ChangePassword(ChangePasswordRequest),
    #[serde(rename = "rescan")]
    Rescan(u64),
    #[serde(rename = "getTransactions")]
    GetTransactions(usize),
    #[serde(rename = "transactionSearch")]
    TransactionSearch(String),
    #[serde(rename = "getPrivateView")]
    GetPrivateView,
    #[serde(rename = "backupToFile")]
    BackupToFile(PathBuf),
    #[serde(rename = "backupToClipboard")]
    BackupToClipboard,
    #[serde(rename = "openNewWallet")]
    OpenNewWallet,
    #[serde(rename = "config")]
    Config(Box<WalletConfig>),
    #[serde(rename = "setNotifications")]
    SetNotifications(bool),
    #[serde(rename = "setLogLevel")]
    SetLogLevel(String),
    #[serde(rename = "setScanCoinbaseTransactions")]
    SetScanCoinbaseTransactions(bool),
    #[serde(rename = "getBalance")]
    GetBalance,
    #[serde(rename = "getTransactionCount")]
    GetTransactionCount,
    #[serde(rename = "getConnectionInfo")]
    GetConnectionInfo,
    #[serde(rename = "getNodeFee")]
    GetNodeFee,
    #[serde(rename = "stop")]
    Stop(bool),
}

impl FrontendMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            FrontendMessage::StartWallet { .. } => "startWallet",
            FrontendMessage::VerifyPassword(_) => "verifyPassword",
            FrontendMessage::PrepareTransaction(_) => "prepareTransactionRequest",
            FrontendMessage::SendTransaction(_) => "sendTransactionRequest",
            FrontendMessage::SaveWallet(_) => "saveWallet",
            FrontendMessage::SaveWalletAs(_) => "saveWalletAs",
            FrontendMessage::ExportToCsv(_) => "exportToCSV",
            FrontendMessage::ChangeNode(_) => "changeNode",
            FrontendMessage::ChangePassword(_) => "changePassword",
            FrontendMessage::Rescan(_) => "rescan",
            FrontendMessage::GetTransactions(_) => "getTransactions",
            FrontendMessage::TransactionSearch(_) => "transactionSearch",
            FrontendMessage::GetPrivateView => "getPrivateView",
            FrontendMessage::BackupToFile(_) => "backupToFile",
            FrontendMessage::BackupToClipboard => "backupToClipboard",
            FrontendMessage::OpenNewWallet => "openNewWallet",
            FrontendMessage::Config(_) => "config",
            FrontendMessage::SetNotifications(_) => "setNotifications",
            FrontendMessage::SetLogLevel(_) => "setLogLevel",
            FrontendMessage::SetScanCoinbaseTransactions(_) => "setScanCoinbaseTransactions",
            FrontendMessage::GetBalance => "getBalance",
            FrontendMessage::GetTransactionCount => "getTransactionCount",
            FrontendMessage::GetConnectionInfo => "getConnectionInfo",
            FrontendMessage::GetNodeFee => "getNodeFee",
            FrontendMessage::Stop(_) => "stop",
        }
    }
}

/// Backend → UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "data")]
pub enum BackendMessage {
    #[serde(rename = "syncStatus")]
    SyncStatus(SyncStatus),
    #[serde(rename = "transactionList")]
    TransactionList(Vec<TransactionRow>),
    #[serde(rename = "transactionCount")]
    TransactionCount(usize),
    #[serde(rename = "balance")]
    Balance(Balance),
    #[serde(rename = "nodeFee")]
    NodeFee(u64),
    #[serde(rename = "daemonConnectionInfo")]
    DaemonConnectionInfo(DaemonConnectionInfo),
    #[serde(rename = "authenticationStatus")]
    AuthenticationStatus(bool),
    #[serde(rename = "walletActiveStatus")]
    WalletActiveStatus(bool),
    #[serde(rename = "primaryAddress")]
    PrimaryAddress(String),
    #[serde(rename = "saveWalletResponse")]
    SaveWalletResponse(bool),
    #[serde(rename = "passwordChangeResponse")]
    PasswordChangeResponse(PasswordChangeResponse),
    #[serde(rename = "sendTransactionResponse")]
    SendTransactionResponse(SendTransactionResponse),
    #[serde(rename = "prepareTransactionResponse")]
    PrepareTransactionResponse(PrepareTransactionResponse),
    #[serde(rename = "rescanResponse")]
    RescanResponse(u64),
    #[serde(rename = "transactionSearchResponse")]
    TransactionSearchResponse(Vec<WalletTransaction>),
    #[serde(rename = "getPrivateView")]
    PrivateView(String),
    #[serde(rename = "secret")]
    Secret(String),
    #[serde(rename = "backupResponse")]
    BackupResponse(bool),
    #[serde(rename = "csvExportResponse")]
    CsvExportResponse(bool),
    #[serde(rename = "incomingTransaction")]
    IncomingTransaction(IncomingTransactionNotice),
    #[serde(rename = "backendLogLine")]
    BackendLogLine(String),
    #[serde(rename = "backendStopped")]
    BackendStopped,
    /// A request could not be handled at all (for example, no wallet is open).
    #[serde(rename = "error")]
    Error(String),
}

impl BackendMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            BackendMessage::SyncStatus(_) => "syncStatus",
            BackendMessage::TransactionList(_) => "transactionList",
            BackendMessage::TransactionCount(_) => "transactionCount",
            BackendMessage::Balance(_) => "balance",
            BackendMessage::NodeFee(_) => "nodeFee",
            BackendMessage::DaemonConnectionInfo(_) => "daemonConnectionInfo",
            BackendMessage::AuthenticationStatus(_) => "authenticationStatus",
            BackendMessage::WalletActiveStatus(_) => "walletActiveStatus",
            BackendMessage::PrimaryAddress(_) => "primaryAddress",
            BackendMessage::SaveWalletResponse(_) => "saveWalletResponse",
            BackendMessage::PasswordChangeResponse(_) => "passwordChangeResponse",
            BackendMessage::SendTransactionResponse(_) => "sendTransactionResponse",
            BackendMessage::PrepareTransactionResponse(_) => "prepareTransactionResponse",
            BackendMessage::RescanResponse(_) => "rescanResponse",
            BackendMessage::TransactionSearchResponse(_) => "transactionSearchResponse",
            BackendMessage::PrivateView(_) => "getPrivateView",
            BackendMessage::Secret(_) => "secret",
            BackendMessage::BackupResponse(_) => "backupResponse",
            BackendMessage::CsvExportResponse(_) => "csvExportResponse",
            BackendMessage::IncomingTransaction(_) => "incomingTransaction",
            BackendMessage::BackendLogLine(_) => "backendLogLine",
            BackendMessage::BackendStopped => "backendStopped",
            BackendMessage::Error(_) => "error",
        }
    }
}
