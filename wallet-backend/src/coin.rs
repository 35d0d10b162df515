//! Static coin parameters for the Verum network.
//!
//! These values are compiled in and shared by the façade, the CSV export and
//! the wallet library configuration. User-editable settings live in
//! [`crate::config_store`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::daemon::Daemon;

/// Mixin bounds that apply once the chain passes `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinLimit {
    pub height: u64,
    pub min_mixin: u64,
    pub max_mixin: u64,
    pub default_mixin: u64,
}

impl MixinLimit {
    pub const fn new(height: u64, min_mixin: u64, max_mixin: u64, default_mixin: u64) -> Self {
        Self {
            height,
            min_mixin,
            max_mixin,
            default_mixin,
        }
    }
}

/// Height-indexed mixin policy table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixinLimits {
    limits: Vec<MixinLimit>,
    default_mixin: u64,
}

impl MixinLimits {
    pub fn new(mut limits: Vec<MixinLimit>, default_mixin: u64) -> Self {
        limits.sort_by_key(|limit| limit.height);
        Self {
            limits,
            default_mixin,
        }
    }

    /// Default mixin for a transaction built at `height`.
    pub fn default_mixin_by_height(&self, height: u64) -> u64 {
        self.limits
            .iter()
            .filter(|limit| height > limit.height)
            .last()
            .map(|limit| limit.default_mixin)
            .unwrap_or(self.default_mixin)
    }

    /// `(min, max)` mixin bounds at `height`.
    pub fn limits_by_height(&self, height: u64) -> (u64, u64) {
        self.limits
            .iter()
            .filter(|limit| height > limit.height)
            .last()
            .map(|limit| (limit.min_mixin, limit.max_mixin))
            .unwrap_or((0, u64::MAX))
    }
}

/// Compile-time parameters of the coin.
#[derive(Debug, Clone)]
pub struct CoinParams {
    pub mixin_limits: MixinLimits,
    pub default_daemon: Daemon,
    pub chain_launch_timestamp: i64,
}

impl CoinParams {
    pub const COIN_NAME: &'static str = "Verum";
    pub const TICKER: &'static str = "VRM";
    pub const URI_PREFIX: &'static str = "verum://";
    pub const DECIMAL_PLACES: u8 = 8;
    pub const ADDRESS_PREFIX: u64 = 406_697;
    pub const STANDARD_ADDRESS_LENGTH: usize = 98;
    /// Standard length plus a 64 char payment ID, base58 encoded in 8 → 11 chunks.
    pub const INTEGRATED_ADDRESS_LENGTH: usize = 98 + (64 * 11) / 8;
    pub const PAYMENT_ID_LENGTH: usize = 64;
    pub const MINIMUM_FEE: u64 = 1_000;
    pub const FEE_PER_BYTE_HEIGHT: u64 = 500_000_000;
    pub const BLOCK_TARGET_TIME: Duration = Duration::from_secs(30);
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DAEMON_UPDATE_INTERVAL: Duration = Duration::from_secs(10);
    pub const BLOCKS_PER_TICK: u32 = 30;
    pub const BLOCKS_PER_DAEMON_REQUEST: u32 = 30;
    pub const BLOCK_STORE_MEMORY_LIMIT: usize = 3 * 1024 * 1024;
    /// Interval of the façade's background save.
    pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5 * 60);
    /// Sends at or above this many atomic units get an explicit mixin.
    pub const MIXIN_AMOUNT_THRESHOLD: u64 = 100_000_000;
    /// Placeholder destination amount when sweeping the whole balance.
    pub const SEND_ALL_PLACEHOLDER_AMOUNT: u64 = 100_000;
    pub const DEFAULT_DAEMON_HOST: &'static str = "verumcoin.nl";
    pub const DEFAULT_DAEMON_PORT: u16 = 14_001;
    pub const REPO_LINK: &'static str = "https://github.com/VerumProject/Verum-GUI-Wallet";
    pub const EXPLORER_BASE_URL: &'static str = "https://explorer.verumcoin.nl/transaction?hash=";
    pub const NODE_LIST_URL: &'static str = "https://raw.githubusercontent.com/VerumProject/Verum-Public-Resources/refs/heads/main/nodes.json";
    pub const VERMINTING_API_URL: &'static str = "https://verumcoin.nl/verminting/api";

    pub fn user_agent() -> String {
        format!("{}-v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    pub fn explorer_link(hash: &str) -> String {
        format!("{}{}", Self::EXPLORER_BASE_URL, hash)
    }
}

impl Default for CoinParams {
    fn default() -> Self {
        Self {
            mixin_limits: MixinLimits::new(vec![MixinLimit::new(1_000, 0, 100, 0)], 0),
            default_daemon: Daemon::new(Self::DEFAULT_DAEMON_HOST, Self::DEFAULT_DAEMON_PORT, false),
            chain_launch_timestamp: 1_579_553_288,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mixin_uses_latest_passed_limit() {
        let limits = MixinLimits::new(
            vec![MixinLimit::new(500, 1, 10, 7), MixinLimit::new(100, 0, 5, 3)],
            2,
        );
        assert_eq!(limits.default_mixin_by_height(50), 2);
        assert_eq!(limits.default_mixin_by_height(100), 2);
        assert_eq!(limits.default_mixin_by_height(101), 3);
        assert_eq!(limits.default_mixin_by_height(10_000), 7);
        assert_eq!(limits.limits_by_height(200), (0, 5));
    }

    #[test]
    fn integrated_address_length() {
        assert_eq!(CoinParams::INTEGRATED_ADDRESS_LENGTH, 186);
    }
}
