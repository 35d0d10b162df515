//! Read-only projection of the library's transaction list.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{TimeZone, Utc};
use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::amount::atomic_to_human;
use crate::errors::{WalletError, WalletResult};
use crate::wallet::WalletTransaction;

pub const CSV_HEADER: [&str; 6] = [
    "Date",
    "Block Height",
    "Transaction Hash",
    "Payment ID",
    "Amount",
    "balance",
];

/// One row of the transaction table.
///
/// Serialised as a 9-element array:
/// `[timestamp, hash, totalAmount, runningBalance, blockHeight, paymentID, index, fee, unlockTime]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRow(
    pub i64,
    pub String,
    pub i64,
    pub i64,
    pub u64,
    pub String,
    pub usize,
    pub u64,
    pub u64,
);

impl TransactionRow {
    pub fn timestamp(&self) -> i64 {
        self.0
    }

    pub fn hash(&self) -> &str {
        &self.1
    }

    pub fn total_amount(&self) -> i64 {
        self.2
    }

    pub fn running_balance(&self) -> i64 {
        self.3
    }

    pub fn block_height(&self) -> u64 {
        self.4
    }

    pub fn payment_id(&self) -> &str {
        &self.5
    }

    pub fn index(&self) -> usize {
        self.6
    }

    pub fn fee(&self) -> u64 {
        self.7
    }

    pub fn unlock_time(&self) -> u64 {
        self.8
    }
}

/// Walks a newest-first list, starting from `current_balance` and subtracting
/// each transaction's amount after emitting its row.
pub fn format_transactions(
    transactions: &[WalletTransaction],
    current_balance: i64,
) -> Vec<TransactionRow> {
    let mut balance = current_balance;
    transactions
        .iter()
        .enumerate()
        .map(|(index, tx)| {
            let row = TransactionRow(
                tx.timestamp,
                tx.hash.clone(),
                tx.total_amount,
                balance,
                tx.block_height,
                tx.payment_id.clone(),
                index,
                tx.fee,
                tx.unlock_time,
            );
            balance = balance.saturating_sub(tx.total_amount);
            row
        })
        .collect()
}

/// Field of a transaction the search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    BlockHeight,
    Hash,
    PaymentId,
}

impl SearchField {
    pub const ALL: [SearchField; 3] = [
        SearchField::BlockHeight,
        SearchField::Hash,
        SearchField::PaymentId,
    ];

    fn value(&self, tx: &WalletTransaction) -> String {
        match self {
            SearchField::BlockHeight => tx.block_height.to_string(),
            SearchField::Hash => tx.hash.clone(),
            SearchField::PaymentId => tx.payment_id.clone(),
        }
    }
}

/// Transactions whose `field` contains `query`, ignoring case.
pub fn search_field(
    query: &str,
    transactions: &[WalletTransaction],
    field: SearchField,
) -> Vec<WalletTransaction> {
    let needle = query.to_uppercase();
    transactions
        .iter()
        .filter(|tx| field.value(tx).to_uppercase().contains(&needle))
        .cloned()
        .collect()
}

/// Union of the per-field matches.
///
/// Each field's matches are prepended to the accumulated list, so payment ID
/// matches come first, then hash matches, then block height matches. A
/// transaction matching several fields appears once per field.
pub fn transaction_search(query: &str, transactions: &[WalletTransaction]) -> Vec<WalletTransaction> {
    let mut results: Vec<WalletTransaction> = Vec::new();
    for field in SearchField::ALL {
        let mut matches = search_field(query, transactions, field);
        matches.extend(results);
        results = matches;
    }
    results
}

/// Date column of the CSV export.
pub fn format_timestamp(timestamp: i64) -> String {
    if timestamp == 0 {
        return "Unconfirmed".to_string();
    }
    match Utc.timestamp_opt(timestamp, 0).single() {
        Some(date) => date.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp.to_string(),
    }
}

/// CSV records for `rows`, header first.
pub fn csv_records(rows: &[TransactionRow]) -> Vec<[String; 6]> {
    let header = CSV_HEADER.map(str::to_string);
    std::iter::once(header)
        .chain(rows.iter().map(|row| {
            [
                format_timestamp(row.timestamp()),
                row.block_height().to_string(),
                row.hash().to_string(),
                row.payment_id().to_string(),
                atomic_to_human(row.total_amount()),
                atomic_to_human(row.running_balance()),
            ]
        }))
        .collect()
}

/// Writes the six-column export to `writer`.
pub fn write_csv<W: Write>(writer: W, rows: &[TransactionRow]) -> WalletResult<()> {
    let mut writer = Writer::from_writer(writer);
    for record in csv_records(rows) {
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_csv(path: impl AsRef<Path>, rows: &[TransactionRow]) -> WalletResult<()> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(WalletError::StorageError(
            "Export path cannot be empty".to_string(),
        ));
    }
    let file = File::create(path)?;
    write_csv(file, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(hash: &str, amount: i64, height: u64, payment_id: &str) -> WalletTransaction {
        WalletTransaction {
            timestamp: 1_600_000_000,
            hash: hash.to_string(),
            total_amount: amount,
            block_height: height,
            payment_id: payment_id.to_string(),
            fee: 1_000,
            unlock_time: 0,
            is_fusion: false,
        }
    }

    #[test]
    fn running_balance_walks_backwards_from_total() {
        let txs = vec![
            tx("c", -200, 30, ""),
            tx("b", 500, 20, ""),
            tx("a", 1_000, 10, ""),
        ];
        let rows = format_transactions(&txs, 1_300);
        let balances: Vec<i64> = rows.iter().map(TransactionRow::running_balance).collect();
        assert_eq!(balances, vec![1_300, 1_500, 1_000]);

        for (i, row) in rows.iter().enumerate() {
            let prior: i64 = txs[..i].iter().map(|t| t.total_amount).sum();
            assert_eq!(row.running_balance(), 1_300 - prior);
            assert_eq!(row.index(), i);
        }
    }

    #[test]
    fn row_serialises_as_nine_tuple() {
        let rows = format_transactions(&[tx("ab", 5, 7, "pid")], 5);
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!([1_600_000_000, "ab", 5, 5, 7, "pid", 0, 1_000, 0])
        );
    }

    #[test]
    fn search_prepends_later_fields_and_keeps_duplicates() {
        let txs = vec![
            tx("ABC123", 1, 5, ""),
            tx("ffff", 1, 123, ""),
            tx("0000", 1, 9, "xx123yy"),
        ];
        let results = transaction_search("123", &txs);
        let hashes: Vec<&str> = results.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, vec!["0000", "ABC123", "ffff"]);

        let dupes = transaction_search("abc", &[tx("abc", 1, 1, "ABC")]);
        assert_eq!(dupes.len(), 2);
    }

    #[test]
    fn search_is_case_insensitive() {
        let txs = vec![tx("DeadBeef", 1, 1, "")];
        assert_eq!(transaction_search("deadbeef", &txs).len(), 1);
        assert!(transaction_search("cafe", &txs).is_empty());
    }

    #[test]
    fn csv_amounts_are_decimal_shifted() {
        let rows = format_transactions(&[tx("h", 123_456_789, 42, "p")], 223_456_789);
        let mut out = Vec::new();
        write_csv(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Date,Block Height,Transaction Hash,Payment ID,Amount,balance"
        );
        assert_eq!(
            lines.next().unwrap(),
            "2020-09-13 12:26:40,42,h,p,1.23456789,2.23456789"
        );
    }

    #[test]
    fn unconfirmed_timestamp_and_quoting() {
        assert_eq!(format_timestamp(0), "Unconfirmed");

        let mut row = tx("h", 1, 1, "a,b");
        row.timestamp = 0;
        let rows = format_transactions(&[row, tx("say \"hi\"", 1, 1, "")], 2);
        let mut out = Vec::new();
        write_csv(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "Unconfirmed,1,h,\"a,b\",0.00000001,0.00000002");
        assert!(lines[2].contains(",\"say \"\"hi\"\"\",,"));
    }
}
