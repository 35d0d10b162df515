use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::coin::CoinParams;
use crate::daemon::Daemon;
use crate::errors::{WalletError, WalletResult};

/// Fee a public node advertises in the list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvertisedFee {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub amount: u64,
}

/// One entry of the public node list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicNode {
    pub name: String,
    pub url: String,
    pub port: u16,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub cache: bool,
    #[serde(default)]
    pub fee: Option<AdvertisedFee>,
}

impl PublicNode {
    /// `host:port`, as typed into the node changer.
    pub fn connection_string(&self) -> String {
        format!("{}:{}", self.url, self.port)
    }

    pub fn to_daemon(&self) -> Daemon {
        Daemon::new(self.url.clone(), self.port, self.ssl)
    }
}

#[derive(Debug, Deserialize)]
struct NodeListResponse {
    #[serde(default)]
    nodes: Vec<PublicNode>,
}

/// Fetches the node list published in the project's resources repository.
#[derive(Debug, Clone)]
pub struct NodeListClient {
    client: Client,
    url: String,
}

impl NodeListClient {
    pub fn new(url: impl Into<String>) -> WalletResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(CoinParams::user_agent())
            .build()
            .map_err(|e| {
                WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn with_default_url() -> WalletResult<Self> {
        Self::new(CoinParams::NODE_LIST_URL)
    }

    pub async fn fetch(&self) -> WalletResult<Vec<PublicNode>> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(WalletError::NetworkError(format!(
                "HTTP {} fetching node list",
                response.status()
            )));
        }

        let list: NodeListResponse = response
            .json()
            .await
            .map_err(|e| WalletError::InvalidResponse(format!("Invalid node list: {}", e)))?;
        log::debug!("Fetched {} public nodes", list.nodes.len());
        Ok(list.nodes)
    }
}
