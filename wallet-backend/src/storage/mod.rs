pub mod address_book;
pub mod paths;

pub use address_book::{AddressBook, AddressBookEntry};
pub use paths::WalletPaths;
