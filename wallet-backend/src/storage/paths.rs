use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{WalletError, WalletResult};

/// Manages filesystem paths used by the wallet.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    /// Root directory for wallet data (`~/.verumwallet`).
    root_dir: PathBuf,
    /// Directory for log files.
    logs_dir: PathBuf,
    /// Path to persisted user configuration.
    config_file: PathBuf,
    /// Path to the saved address book.
    address_book_file: PathBuf,
}

impl WalletPaths {
    pub const ROOT_DIR_NAME: &'static str = ".verumwallet";
    pub const CONFIG_FILENAME: &'static str = "config.json";
    pub const ADDRESS_BOOK_FILENAME: &'static str = "addressBook.json";
    /// Extension of wallet files offered by the open/save dialogs.
    pub const WALLET_EXTENSION: &'static str = "wallet";

    /// Create a new path manager rooted at the provided directory.
    pub fn new(root: impl AsRef<Path>) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Wallet root directory cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            logs_dir: root_dir.join("logs"),
            config_file: root_dir.join(Self::CONFIG_FILENAME),
            address_book_file: root_dir.join(Self::ADDRESS_BOOK_FILENAME),
            root_dir,
        })
    }

    /// Paths under the user's home directory.
    pub fn from_home() -> WalletResult<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            WalletError::StorageError("Unable to determine home directory".to_string())
        })?;
        Self::new(home.join(Self::ROOT_DIR_NAME))
    }

    /// Ensure the directory structure exists, creating missing folders.
    pub fn ensure_directories(&self) -> WalletResult<()> {
        fs::create_dir_all(&self.root_dir)?;
        fs::create_dir_all(&self.logs_dir)?;
        Ok(())
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn address_book_file(&self) -> &Path {
        &self.address_book_file
    }

    /// True when `save_path` lies inside `install_dir` (or is directly in it).
    ///
    /// Wallets saved there are wiped by updates, so the UI warns about it.
    pub fn is_in_install_dir(install_dir: &Path, save_path: &Path) -> bool {
        let save_dir = match save_path.parent() {
            Some(dir) => dir,
            None => return false,
        };
        save_dir == install_dir || save_dir.starts_with(install_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wallet_paths_creation() {
        let temp = TempDir::new().unwrap();
        let paths = WalletPaths::new(temp.path()).unwrap();

        assert_eq!(paths.root_dir(), temp.path());
        assert_eq!(paths.logs_dir(), temp.path().join("logs"));
        assert_eq!(paths.config_file(), temp.path().join("config.json"));
        assert_eq!(
            paths.address_book_file(),
            temp.path().join("addressBook.json")
        );
    }

    #[test]
    fn test_empty_root_directory_rejected() {
        let result = WalletPaths::new("");
        assert!(matches!(result, Err(WalletError::StorageError(_))));
    }

    #[test]
    fn test_ensure_directories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("nested").join(".verumwallet");
        let paths = WalletPaths::new(&root).unwrap();
        paths.ensure_directories().unwrap();

        assert!(paths.root_dir().is_dir());
        assert!(paths.logs_dir().is_dir());
    }

    #[test]
    fn test_install_dir_detection() {
        let install = Path::new("/opt/verum");
        assert!(WalletPaths::is_in_install_dir(
            install,
            Path::new("/opt/verum/my.wallet")
        ));
        assert!(WalletPaths::is_in_install_dir(
            install,
            Path::new("/opt/verum/resources/my.wallet")
        ));
        assert!(!WalletPaths::is_in_install_dir(
            install,
            Path::new("/home/user/my.wallet")
        ));
        assert!(!WalletPaths::is_in_install_dir(
            install,
            Path::new("/opt/verum-other/my.wallet")
        ));
    }
}
