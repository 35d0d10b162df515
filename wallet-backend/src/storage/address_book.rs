use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};
use crate::validation::InputValidator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressBookEntry {
    pub name: String,
    pub address: String,
    #[serde(rename = "paymentID", default)]
    pub payment_id: String,
}

/// Saved contacts in `addressBook.json`.
#[derive(Debug, Clone)]
pub struct AddressBook {
    path: PathBuf,
    entries: Vec<AddressBookEntry>,
}

impl AddressBook {
    /// Reads the book, creating an empty one on first start.
    pub fn load_or_create(path: impl AsRef<Path>) -> WalletResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let book = Self {
                path,
                entries: Vec::new(),
            };
            book.save()?;
            return Ok(book);
        }

        let bytes = fs::read(&path)?;
        let entries: Vec<AddressBookEntry> = serde_json::from_slice(&bytes)?;
        Ok(Self { path, entries })
    }

    pub fn entries(&self) -> &[AddressBookEntry] {
        &self.entries
    }

    pub fn add(
        &mut self,
        validator: &InputValidator,
        entry: AddressBookEntry,
    ) -> WalletResult<()> {
        validator.validate_address(&entry.address)?;
        if !entry.payment_id.is_empty() {
            validator.validate_payment_id(&entry.payment_id)?;
        }
        if self.entries.iter().any(|existing| existing.name == entry.name) {
            return Err(WalletError::ValidationError(format!(
                "Contact {} already exists",
                entry.name
            )));
        }
        self.entries.push(entry);
        self.save()
    }

    /// Removes the entry named `name`. Returns false when there was none.
    pub fn remove(&mut self, name: &str) -> WalletResult<bool> {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.name != name);
        if self.entries.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    fn save(&self) -> WalletResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(&self.entries)?)?;
        Ok(())
    }
}
