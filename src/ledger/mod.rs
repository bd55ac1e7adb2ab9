// Ledger engine
// Every balance-changing operation runs in a single unit of work on the
// store and appends its transactions in that same unit of work.

use crate::config::LedgerConfig;
use crate::database::Store;

mod accounts;
mod bills;
mod credit;
mod error;
mod ids;
mod interest;
mod transfers;
mod users;

pub use accounts::{AccountOverview, Reconciliation};
pub use credit::CardPayment;
pub use error::{LedgerError, LedgerResult};
pub use ids::{IdGenerator, RandomIdGenerator};
pub use transfers::TransferReceipt;

pub(crate) use error::{checked_total, ensure_positive};

/// The bank's ledger: accounts, transfers, cards, bills and interest
pub struct Ledger {
    store: Store,
    config: LedgerConfig,
    ids: Box<dyn IdGenerator>,
}

impl Ledger {
    /// Create a ledger over `store` that generates random identifiers
    pub fn new(store: Store, config: LedgerConfig) -> Self {
        let ids = Box::new(RandomIdGenerator::new(config.account_number_prefix.clone()));
        Self::with_id_generator(store, config, ids)
    }

    /// Create a ledger with a caller-supplied identifier source
    pub fn with_id_generator(store: Store, config: LedgerConfig, ids: Box<dyn IdGenerator>) -> Self {
        Self { store, config, ids }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::models::{Account, AccountType, User};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    /// A ledger over a fresh database file that lives as long as the TempDir
    pub fn ledger() -> (Ledger, TempDir) {
        ledger_with(LedgerConfig::default(), None)
    }

    pub fn ledger_with(config: LedgerConfig, ids: Option<Box<dyn IdGenerator>>) -> (Ledger, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let store = Store::open(&DatabaseConfig::with_path(path.to_str().unwrap())).unwrap();
        let ledger = match ids {
            Some(ids) => Ledger::with_id_generator(store, config, ids),
            None => Ledger::new(store, config),
        };
        (ledger, dir)
    }

    pub fn user(ledger: &Ledger, email: &str) -> User {
        ledger.register_user(email, "Test User", None).unwrap()
    }

    pub fn chequing(ledger: &Ledger, user: &User, balance: Decimal) -> Account {
        ledger
            .create_account(user.id, AccountType::Chequing, balance, Decimal::ZERO)
            .unwrap()
    }
}
