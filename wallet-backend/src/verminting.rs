//! Verminting REST client and the session poller built on it.
//!
//! Every call is a JSON `POST` identified by the SHA-256 of the wallet's
//! private view key; the key itself never leaves the process.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::{EventBus, Subscription};
use crate::coin::CoinParams;
use crate::errors::{WalletError, WalletResult};
use crate::validation::InputValidator;

/// Network height at which verminting opens.
pub const VERMINTING_ACTIVATION_HEIGHT: u64 = 86_400;
pub const VERMINTING_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const TOAST_DISMISS_DELAY: Duration = Duration::from_secs(5);

/// The wallet has not been registered with the service yet.
pub const ERROR_NOT_REGISTERED: i64 = 1;
/// Unvermint refused; `result.message` says why.
pub const ERROR_UNVERMINT_REJECTED: i64 = 7;

/// Identity sent to the service: lowercase hex SHA-256 of the private view key.
pub fn hash_private_view_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Body shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl ApiResponse {
    /// Server supplied explanation, if any.
    pub fn message(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|result| result.get("message"))
            .and_then(Value::as_str)
    }

    /// Decodes `result` of a successful response, or turns a failure into an error.
    pub fn into_result<T: DeserializeOwned>(self) -> WalletResult<T> {
        if !self.success {
            return Err(WalletError::Verminting {
                code: self.error_code.unwrap_or_default(),
                message: self.message().unwrap_or("request failed").to_string(),
            });
        }
        let result = self.result.unwrap_or(Value::Null);
        serde_json::from_value(result)
            .map_err(|e| WalletError::InvalidResponse(format!("Unexpected result: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VermintedBalance {
    #[serde(deserialize_with = "lenient_number")]
    pub balance: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub locked_balance: f64,
}

/// `result` of `/get_stats`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VermintingStats {
    pub balance: VermintedBalance,
    #[serde(deserialize_with = "lenient_number")]
    pub est_reward_percentage: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub est_reward_coins: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UnvermintReceipt {
    pub tx_hash: String,
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        Value::String(text) => text.trim().parse().map_err(serde::de::Error::custom),
        Value::Null => Ok(0.0),
        other => Err(serde::de::Error::custom(format!(
            "expected a number, got {}",
            other
        ))),
    }
}

/// HTTP client for the verminting API
#[derive(Debug, Clone)]
pub struct VermintingClient {
    client: Client,
    base_url: String,
}

impl VermintingClient {
    pub fn new(base_url: impl Into<String>) -> WalletResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(CoinParams::user_agent())
            .build()
            .map_err(|e| {
                WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(VermintingClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn with_default_url() -> WalletResult<Self> {
        Self::new(CoinParams::VERMINTING_API_URL)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Balances and estimated rewards of the wallet.
    pub async fn get_stats(&self, view_key: &SecretString) -> WalletResult<ApiResponse> {
        let body = json!({ "hashedPrivateViewKey": hash_private_view_key(view_key.expose_secret()) });
        let response = self.post("get_stats", body).await?;
        log::debug!("[VERMINTING] Updating verminting stats");
        Ok(response)
    }

    /// Requests a withdrawal. `amount` is sent exactly as the user typed it.
    pub async fn unvermint(
        &self,
        view_key: &SecretString,
        amount: &str,
    ) -> WalletResult<ApiResponse> {
        let body = json!({
            "hashedPrivateViewKey": hash_private_view_key(view_key.expose_secret()),
            "amount": amount,
        });
        self.post("unvermint", body).await
    }

    pub async fn get_deposit_address(&self, view_key: &SecretString) -> WalletResult<ApiResponse> {
        let body = json!({ "hashedPrivateViewKey": hash_private_view_key(view_key.expose_secret()) });
        self.post("get_deposit_address", body).await
    }

    pub async fn register_wallet(
        &self,
        view_key: &SecretString,
        address: &str,
    ) -> WalletResult<ApiResponse> {
        let body = json!({
            "hashedPrivateViewKey": hash_private_view_key(view_key.expose_secret()),
            "address": address,
        });
        self.post("register_wallet", body).await
    }

    async fn post(&self, endpoint: &str, body: Value) -> WalletResult<ApiResponse> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        // 400 responses carry the API's own error code.
        if !status.is_success() && status != StatusCode::BAD_REQUEST {
            log::error!("[VERMINTING] {} returned HTTP {}", endpoint, status);
            return Err(WalletError::NetworkError(format!(
                "HTTP {} from {}",
                status, endpoint
            )));
        }

        if status == StatusCode::BAD_REQUEST {
            // A rejection without a readable body is still a rejection.
            let text = response.text().await?;
            return Ok(serde_json::from_str(&text).unwrap_or_else(|e| {
                log::warn!("[VERMINTING] Unreadable {} rejection: {}", endpoint, e);
                ApiResponse::default()
            }));
        }

        response.json::<ApiResponse>().await.map_err(|e| {
            WalletError::InvalidResponse(format!("Failed to parse {} response: {}", endpoint, e))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Init,
    Connected,
    Disconnected,
}

/// What the verminting screen shows.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VermintingState {
    pub balance: f64,
    pub locked_balance: f64,
    pub est_reward_percentage: f64,
    pub est_reward_coins: f64,
    pub connected: ConnectionState,
    pub network_height: u64,
}

impl VermintingState {
    pub fn is_active(&self) -> bool {
        self.network_height >= VERMINTING_ACTIVATION_HEIGHT
    }

    pub fn blocks_to_go(&self) -> u64 {
        VERMINTING_ACTIVATION_HEIGHT.saturating_sub(self.network_height)
    }

    /// Amount box and buttons are usable before the first poll completes too.
    pub fn controls_enabled(&self) -> bool {
        self.connected != ConnectionState::Disconnected && self.is_active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
}

/// Short lived notification on the verminting screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    #[serde(skip)]
    pub dismiss_after: Duration,
}

impl Toast {
    pub fn new(kind: ToastKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            dismiss_after: TOAST_DISMISS_DELAY,
        }
    }
}

/// Keeps a wallet's verminting state in step with the service.
pub struct VermintingMonitor {
    client: VermintingClient,
    view_key: SecretString,
    primary_address: String,
    state: RwLock<VermintingState>,
    toasts: EventBus<Toast>,
    validator: InputValidator,
    poll_interval: Duration,
}

impl VermintingMonitor {
    pub fn new(
        client: VermintingClient,
        view_key: SecretString,
        primary_address: impl Into<String>,
    ) -> WalletResult<Self> {
        Ok(Self {
            client,
            view_key,
            primary_address: primary_address.into(),
            state: RwLock::new(VermintingState::default()),
            toasts: EventBus::default(),
            validator: InputValidator::new()?,
            poll_interval: VERMINTING_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> VermintingState {
        self.state.read().clone()
    }

    pub fn toasts(&self) -> Subscription<Toast> {
        self.toasts.subscribe()
    }

    /// Amount box filter: edits that fail the rule are dropped.
    pub fn accepts_input(&self, input: &str) -> bool {
        self.validator.accepts_verminting_input(input)
    }

    fn notify(&self, kind: ToastKind, message: impl Into<String>) {
        self.toasts.publish(Toast::new(kind, message));
    }

    /// One poll of `/get_stats`, registering the wallet if the service does not know it.
    pub async fn refresh(&self, network_height: u64) -> VermintingState {
        let previous = {
            let mut state = self.state.write();
            state.network_height = network_height;
            state.connected
        };

        let response = match self.client.get_stats(&self.view_key).await {
            Ok(response) => response,
            Err(err) => {
                log::error!("[VERMINTING] {}", err);
                if previous == ConnectionState::Connected {
                    self.notify(ToastKind::Error, "Disconnected");
                }
                self.state.write().connected = ConnectionState::Disconnected;
                return self.state();
            }
        };

        if previous == ConnectionState::Disconnected {
            self.notify(ToastKind::Success, "Connection reestablish");
        }

        if !response.success {
            if response.error_code == Some(ERROR_NOT_REGISTERED) {
                self.register().await;
            }
            return self.state();
        }

        match response.into_result::<VermintingStats>() {
            Ok(stats) => {
                let mut state = self.state.write();
                state.balance = stats.balance.balance;
                state.locked_balance = stats.balance.locked_balance;
                state.est_reward_percentage = stats.est_reward_percentage;
                state.est_reward_coins = stats.est_reward_coins;
                state.connected = ConnectionState::Connected;
            }
            Err(err) => log::warn!("[VERMINTING] {}", err),
        }
        self.state()
    }

    async fn register(&self) {
        match self
            .client
            .register_wallet(&self.view_key, &self.primary_address)
            .await
        {
            Ok(response) if response.success => {
                log::info!("[VERMINTING] Wallet has been registered")
            }
            Ok(response) => log::warn!(
                "[VERMINTING] Registration refused (code {:?})",
                response.error_code
            ),
            Err(err) => log::error!("[VERMINTING] Registration failed: {}", err),
        }
    }

    fn check_amount(&self, amount: &str) -> WalletResult<()> {
        if let Err(err) = self.validator.validate_verminting_amount(amount) {
            self.notify(ToastKind::Error, "Please enter a valid amount");
            return Err(err);
        }
        Ok(())
    }

    /// Payment URI the send screen opens to deposit `amount`.
    pub async fn vermint(&self, amount: &str) -> WalletResult<String> {
        self.check_amount(amount)?;
        let address: String = self
            .client
            .get_deposit_address(&self.view_key)
            .await?
            .into_result()?;
        Ok(format!("verminting:{}:{}", address, amount))
    }

    /// Requests a withdrawal and refreshes afterwards. Returns the transaction hash on success.
    pub async fn unvermint(&self, amount: &str, network_height: u64) -> WalletResult<Option<String>> {
        self.check_amount(amount)?;

        let tx_hash = match self.client.unvermint(&self.view_key, amount).await {
            Ok(response) if response.success => match response.into_result::<UnvermintReceipt>() {
                Ok(receipt) => {
                    self.notify(ToastKind::Success, format!("TXID: {}", receipt.tx_hash));
                    Some(receipt.tx_hash)
                }
                Err(err) => {
                    log::warn!("[VERMINTING] [UNVERMINT] {}", err);
                    self.notify(ToastKind::Error, "Something went wrong");
                    None
                }
            },
            Ok(response) if response.error_code == Some(ERROR_UNVERMINT_REJECTED) => {
                let message = response.message().unwrap_or("Something went wrong");
                self.notify(ToastKind::Error, message);
                None
            }
            Ok(_) => {
                self.notify(ToastKind::Error, "Something went wrong");
                None
            }
            Err(err) => {
                log::error!("[VERMINTING] [UNVERMINT] {}", err);
                self.notify(ToastKind::Error, "Something went wrong");
                None
            }
        };

        self.refresh(network_height).await;
        Ok(tx_hash)
    }

    /// Polls immediately and then on every interval tick until `shutdown` turns true or closes.
    pub fn spawn_poller<F>(
        self: Arc<Self>,
        network_height: F,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()>
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.poll_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        log::debug!("[VERMINTING] Autorefresh from interval");
                        self.refresh(network_height()).await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            log::debug!("[VERMINTING] Poller stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode as HttpStatus;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use parking_lot::Mutex;

    const VIEW_KEY: &str = "0f3c8e1d";

    #[derive(Default)]
    struct MockApi {
        registered: bool,
        offline: bool,
        garbled_rejection: bool,
        registered_address: Option<String>,
    }

    type Shared = Arc<Mutex<MockApi>>;

    fn check_identity(body: &Value) {
        assert_eq!(
            body["hashedPrivateViewKey"],
            json!(hash_private_view_key(VIEW_KEY))
        );
    }

    async fn get_stats(State(api): State<Shared>, Json(body): Json<Value>) -> Response {
        check_identity(&body);
        let api = api.lock();
        if api.offline {
            return (HttpStatus::INTERNAL_SERVER_ERROR, Json(json!({}))).into_response();
        }
        if api.garbled_rejection {
            return (HttpStatus::BAD_REQUEST, "Bad Request").into_response();
        }
        if !api.registered {
            return (
                HttpStatus::BAD_REQUEST,
                Json(json!({"success": false, "errorCode": 1})),
            )
                .into_response();
        }
        (
            HttpStatus::OK,
            Json(json!({
                "success": true,
                "result": {
                    "balance": {"balance": 12.5, "lockedBalance": "3"},
                    "estRewardPercentage": 1.25,
                    "estRewardCoins": 0.5
                }
            })),
        )
            .into_response()
    }

    async fn register_wallet(
        State(api): State<Shared>,
        Json(body): Json<Value>,
    ) -> (HttpStatus, Json<Value>) {
        check_identity(&body);
        let mut api = api.lock();
        api.registered = true;
        api.registered_address = body["address"].as_str().map(str::to_string);
        (HttpStatus::OK, Json(json!({"success": true})))
    }

    async fn get_deposit_address(Json(body): Json<Value>) -> Json<Value> {
        check_identity(&body);
        Json(json!({"success": true, "result": "VRMdeposit"}))
    }

    async fn unvermint(Json(body): Json<Value>) -> (HttpStatus, Json<Value>) {
        check_identity(&body);
        match body["amount"].as_str() {
            Some("1") => (
                HttpStatus::OK,
                Json(json!({"success": true, "result": {"tx_hash": "abc123"}})),
            ),
            Some("999") => (
                HttpStatus::BAD_REQUEST,
                Json(json!({"success": false, "errorCode": 7, "result": {"message": "Not enough verminted coins"}})),
            ),
            _ => (
                HttpStatus::BAD_REQUEST,
                Json(json!({"success": false, "errorCode": 3})),
            ),
        }
    }

    async fn spawn_mock(api: Shared) -> String {
        let app = Router::new()
            .route("/get_stats", post(get_stats))
            .route("/register_wallet", post(register_wallet))
            .route("/get_deposit_address", post(get_deposit_address))
            .route("/unvermint", post(unvermint))
            .with_state(api);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    async fn monitor(api: Shared) -> VermintingMonitor {
        let url = spawn_mock(api).await;
        let client = VermintingClient::new(url).unwrap();
        VermintingMonitor::new(client, SecretString::from(VIEW_KEY.to_string()), "VRMprimary").unwrap()
    }

    #[test]
    fn view_key_hash_is_hex_sha256() {
        assert_eq!(
            hash_private_view_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn failed_response_becomes_verminting_error() {
        let response: ApiResponse = serde_json::from_value(json!({
            "success": false, "errorCode": 7, "result": {"message": "nope"}
        }))
        .unwrap();
        let err = response.into_result::<Value>().unwrap_err();
        assert_eq!(
            err,
            WalletError::Verminting {
                code: 7,
                message: "nope".into()
            }
        );
    }

    #[test]
    fn activation_gate() {
        let mut state = VermintingState {
            network_height: 86_000,
            ..Default::default()
        };
        assert!(!state.is_active());
        assert_eq!(state.blocks_to_go(), 400);
        state.network_height = 90_000;
        assert!(state.is_active());
        assert_eq!(state.blocks_to_go(), 0);
        assert!(state.controls_enabled());
        state.connected = ConnectionState::Disconnected;
        assert!(!state.controls_enabled());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = VermintingClient::new("http://localhost:1/api/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:1/api");
    }

    #[tokio::test]
    async fn refresh_registers_then_connects_and_tracks_outages() {
        let api: Shared = Arc::new(Mutex::new(MockApi::default()));
        let monitor = monitor(api.clone()).await;
        let mut toasts = monitor.toasts();

        let state = monitor.refresh(100_000).await;
        assert_eq!(state.connected, ConnectionState::Init);
        assert_eq!(api.lock().registered_address.as_deref(), Some("VRMprimary"));

        let state = monitor.refresh(100_000).await;
        assert_eq!(state.connected, ConnectionState::Connected);
        assert_eq!(state.balance, 12.5);
        assert_eq!(state.locked_balance, 3.0);
        assert_eq!(state.est_reward_coins, 0.5);
        assert!(toasts.try_recv().unwrap().is_none());

        api.lock().offline = true;
        let state = monitor.refresh(100_000).await;
        assert_eq!(state.connected, ConnectionState::Disconnected);
        let toast = toasts.try_recv().unwrap().unwrap();
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.message, "Disconnected");

        // A second failure does not repeat the toast.
        monitor.refresh(100_000).await;
        assert!(toasts.try_recv().unwrap().is_none());

        api.lock().offline = false;
        let state = monitor.refresh(100_000).await;
        assert_eq!(state.connected, ConnectionState::Connected);
        let toast = toasts.try_recv().unwrap().unwrap();
        assert_eq!(toast.kind, ToastKind::Success);
        assert_eq!(toast.message, "Connection reestablish");
        assert_eq!(toast.dismiss_after, TOAST_DISMISS_DELAY);
    }

    #[tokio::test]
    async fn unreadable_rejection_keeps_connection_state() {
        let api: Shared = Arc::new(Mutex::new(MockApi {
            registered: true,
            ..Default::default()
        }));
        let monitor = monitor(api.clone()).await;
        let mut toasts = monitor.toasts();
        assert_eq!(
            monitor.refresh(100_000).await.connected,
            ConnectionState::Connected
        );

        api.lock().garbled_rejection = true;
        let state = monitor.refresh(100_000).await;
        assert_eq!(state.connected, ConnectionState::Connected);
        assert_eq!(state.balance, 12.5);
        assert!(toasts.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn vermint_builds_payment_uri() {
        let api: Shared = Arc::new(Mutex::new(MockApi::default()));
        let monitor = monitor(api).await;
        let mut toasts = monitor.toasts();

        let uri = monitor.vermint("2.5").await.unwrap();
        assert_eq!(uri, "verminting:VRMdeposit:2.5");

        assert!(monitor.vermint("").await.is_err());
        let toast = toasts.try_recv().unwrap().unwrap();
        assert_eq!(toast.message, "Please enter a valid amount");
    }

    #[tokio::test]
    async fn unvermint_reports_outcomes() {
        let api: Shared = Arc::new(Mutex::new(MockApi {
            registered: true,
            ..Default::default()
        }));
        let monitor = monitor(api).await;
        let mut toasts = monitor.toasts();

        let hash = monitor.unvermint("1", 100_000).await.unwrap();
        assert_eq!(hash.as_deref(), Some("abc123"));
        assert_eq!(toasts.try_recv().unwrap().unwrap().message, "TXID: abc123");

        assert_eq!(monitor.unvermint("999", 100_000).await.unwrap(), None);
        assert_eq!(
            toasts.try_recv().unwrap().unwrap().message,
            "Not enough verminted coins"
        );

        assert_eq!(monitor.unvermint("5", 100_000).await.unwrap(), None);
        assert_eq!(
            toasts.try_recv().unwrap().unwrap().message,
            "Something went wrong"
        );
        // Each unvermint ends with a refresh.
        assert_eq!(monitor.state().connected, ConnectionState::Connected);
    }

    #[tokio::test]
    async fn poller_stops_on_shutdown() {
        let api: Shared = Arc::new(Mutex::new(MockApi {
            registered: true,
            ..Default::default()
        }));
        let monitor = Arc::new(
            monitor(api)
                .await
                .with_poll_interval(Duration::from_millis(20)),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = monitor.clone().spawn_poller(|| 90_000, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(monitor.state().connected, ConnectionState::Connected);
        assert_eq!(monitor.state().network_height, 90_000);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
