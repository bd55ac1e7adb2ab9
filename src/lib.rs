//! BlueBank retail ledger
//!
//! Accounts, internal and Interac-style transfers, credit cards, bill
//! payments and monthly interest over a SQLite store. Every balance change
//! runs as one atomic unit of work together with the transaction records
//! that explain it.

pub mod config;
pub mod database;
pub mod ledger;

pub use database::Store;
pub use ledger::{Ledger, LedgerError, LedgerResult};
