//! Bursar Ledger Store
//!
//! The single authority over account balances and the append-only
//! transaction log. No other component writes a balance.
//!
//! # Architecture
//!
//! - Every account's mutation sequence {read → validate → mutate →
//!   append} runs under that account's own lock, so operations on one
//!   account are linearized while different accounts proceed in parallel.
//! - Every mutation carries a correlation id; replaying the same
//!   correlation id is a no-op that returns the original entry
//!   (at-most-once application).
//! - Validation failures abort with zero side effects; there are no
//!   partial writes.
//!
//! # Usage
//!
//! ```rust
//! use bursar_ledger::LedgerStore;
//! use bursar_domain::EntryKind;
//! use rust_decimal_macros::dec;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ledger = LedgerStore::new();
//!     let account = ledger.open_account().await;
//!
//!     ledger
//!         .credit(account.id, dec!(1000), EntryKind::Deposit, Uuid::now_v7())
//!         .await
//!         .unwrap();
//!
//!     let account = ledger.account(account.id).await.unwrap();
//!     assert_eq!(account.balance, dec!(1000));
//! }
//! ```

#![warn(clippy::all)]

mod error;
mod store;

pub use error::LedgerError;
pub use store::{LedgerOp, LedgerStore};
