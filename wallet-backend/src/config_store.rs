use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::coin::CoinParams;
use crate::daemon::{parse_port, Daemon};
use crate::errors::{WalletError, WalletResult};
use crate::storage::WalletPaths;
use crate::wallet::LogLevel;

/// User settings persisted in `config.json`.
///
/// Keys missing from the file take their built-in default; keys this crate
/// does not know about are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WalletConfig {
    pub daemon_host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub daemon_port: u16,
    pub wallet_file: String,
    pub dark_mode: bool,
    pub notifications: bool,
    pub log_level: String,
    pub scan_coinbase_transactions: bool,
    pub auto_lock_enabled: bool,
    /// Minutes of inactivity before the UI locks.
    pub auto_lock_interval: u32,
    pub minimize_to_tray: bool,
    pub close_to_tray: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            daemon_host: CoinParams::DEFAULT_DAEMON_HOST.to_string(),
            daemon_port: CoinParams::DEFAULT_DAEMON_PORT,
            wallet_file: String::new(),
            dark_mode: false,
            notifications: true,
            log_level: LogLevel::Disabled.as_config_str().to_string(),
            scan_coinbase_transactions: false,
            auto_lock_enabled: true,
            auto_lock_interval: 10,
            minimize_to_tray: false,
            close_to_tray: false,
            extra: Map::new(),
        }
    }
}

impl WalletConfig {
    pub fn daemon(&self) -> Daemon {
        Daemon::new(self.daemon_host.clone(), self.daemon_port, false)
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_config(&self.log_level)
    }

    pub fn wallet_path(&self) -> Option<PathBuf> {
        if self.wallet_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.wallet_file))
        }
    }

    /// Overlays a parsed user file on the defaults, key by key.
    ///
    /// A key whose value does not fit its field keeps the default; every other
    /// user key survives.
    pub fn merged_over_defaults(user: Value) -> Self {
        let Value::Object(user) = user else {
            log::debug!("User config is not a JSON object, using defaults");
            return Self::default();
        };

        let mut merged = match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map,
            _ => return Self::default(),
        };
        for (key, value) in user {
            let previous = merged.insert(key.clone(), value);
            if serde_json::from_value::<Self>(Value::Object(merged.clone())).is_err() {
                log::debug!("User config key {} has an invalid value, using default", key);
                match previous {
                    Some(default) => merged.insert(key, default),
                    None => merged.remove(&key),
                };
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or_default()
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    // Older configs store the port as a string.
    match Value::deserialize(deserializer)? {
        Value::Number(number) => number
            .as_u64()
            .and_then(|port| u16::try_from(port).ok())
            .ok_or_else(|| serde::de::Error::custom(format!("invalid port {}", number))),
        Value::String(text) => parse_port(&text).map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("invalid port {}", other))),
    }
}

/// Reads and writes `config.json`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(paths: &WalletPaths) -> Self {
        Self {
            path: paths.config_file().to_path_buf(),
        }
    }

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Loads the file merged over defaults. A missing or malformed file is not an error.
    pub fn load_or_default(&self) -> WalletResult<WalletConfig> {
        if !self.path.exists() {
            log::debug!("Config not detected, using internal defaults");
            return Ok(WalletConfig::default());
        }

        log::debug!("Config file found at {}, using it", self.path.display());
        let bytes = fs::read(&self.path)?;
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(user) => Ok(WalletConfig::merged_over_defaults(user)),
            Err(err) => {
                log::debug!("User config is not valid JSON: {}", err);
                Ok(WalletConfig::default())
            }
        }
    }

    /// Start-up path: load, then write the merged result back.
    pub fn load_and_persist(&self) -> WalletResult<WalletConfig> {
        let config = self.load_or_default()?;
        self.save(&config)?;
        Ok(config)
    }

    pub fn save(&self, config: &WalletConfig) -> WalletResult<()> {
        let serialized = to_pretty_json(config)?;
        let tmp_path = self.path.with_extension("new");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    pub fn update<F>(&self, updater: F) -> WalletResult<WalletConfig>
    where
        F: FnOnce(&mut WalletConfig) -> WalletResult<()>,
    {
        let mut config = self.load_or_default()?;
        updater(&mut config)?;
        self.save(&config)?;
        Ok(config)
    }

    /// Sets a single top-level key, the way the settings screens do.
    pub fn modify_config(&self, key: &str, value: Value) -> WalletResult<WalletConfig> {
        let config = self.load_or_default()?;
        let mut map = match serde_json::to_value(&config)? {
            Value::Object(map) => map,
            _ => {
                return Err(WalletError::ValidationError(
                    "Config did not serialise to an object".to_string(),
                ))
            }
        };
        map.insert(key.to_string(), value);
        let updated: WalletConfig = serde_json::from_value(Value::Object(map))?;
        self.save(&updated)?;
        Ok(updated)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn to_pretty_json(config: &WalletConfig) -> WalletResult<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    config.serialize(&mut serializer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn save_and_load_config_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("config.json"));

        let mut config = WalletConfig::default();
        config.daemon_host = "localhost".into();
        config.dark_mode = true;
        store.save(&config).unwrap();

        let loaded = store.load_or_default().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_keys_take_defaults_and_unknown_keys_survive() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{"darkMode": true, "daemonPort": "11898", "selectedFiat": "usd"}"#,
        )
        .unwrap();

        let store = ConfigStore::new(&path);
        let config = store.load_and_persist().unwrap();
        assert!(config.dark_mode);
        assert_eq!(config.daemon_port, 11898);
        assert_eq!(config.daemon_host, CoinParams::DEFAULT_DAEMON_HOST);
        assert_eq!(config.extra.get("selectedFiat"), Some(&json!("usd")));

        let written: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["selectedFiat"], json!("usd"));
        assert_eq!(written["notifications"], json!(true));
    }

    #[test]
    fn mistyped_keys_keep_their_default_only() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{"walletFile": "/home/u/main.wallet", "daemonHost": "my.node", "darkMode": "yes", "autoLockInterval": "10", "notifications": false}"#,
        )
        .unwrap();

        let config = ConfigStore::new(&path).load_and_persist().unwrap();
        assert_eq!(config.wallet_file, "/home/u/main.wallet");
        assert_eq!(config.daemon_host, "my.node");
        assert!(!config.notifications);
        assert!(!config.dark_mode);
        assert_eq!(config.auto_lock_interval, 10);
        assert!(config.extra.is_empty());

        let written: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["walletFile"], json!("/home/u/main.wallet"));
        assert_eq!(written["daemonHost"], json!("my.node"));
        assert_eq!(written["darkMode"], json!(false));
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, b"{not json").unwrap();

        let config = ConfigStore::new(&path).load_or_default().unwrap();
        assert_eq!(config, WalletConfig::default());
    }

    #[test]
    fn written_with_four_space_indent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        ConfigStore::new(&path).save(&WalletConfig::default()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"daemonHost\""));
    }

    #[test]
    fn modify_config_sets_single_key() {
        let temp = TempDir::new().unwrap();
        let store = ConfigStore::new(temp.path().join("config.json"));
        let updated = store
            .modify_config("walletFile", json!("/tmp/test.wallet"))
            .unwrap();
        assert_eq!(
            updated.wallet_path(),
            Some(PathBuf::from("/tmp/test.wallet"))
        );
        assert_eq!(store.load_or_default().unwrap(), updated);
    }
}
