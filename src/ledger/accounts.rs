use chrono::Utc;
use log::{debug, info};
use rust_decimal::Decimal;
use serde::Serialize;

use super::ids::with_fresh_identifier;
use super::{checked_total, ensure_positive, Ledger, LedgerError, LedgerResult};
use crate::database::models::{
    Account, AccountId, AccountType, NewTransaction, Transaction, TransactionKind, UserId,
};
use crate::database::repository::{AccountRepository, NewAccount, TransactionRepository, UserRepository};

/// Balances across all of a user's accounts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountOverview {
    pub account_count: usize,
    pub total_balance: Decimal,
    pub savings_balance: Decimal,
}

/// Result of replaying an account's transactions against its stored balance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub account_id: AccountId,
    pub stored_balance: Decimal,
    pub replayed_balance: Decimal,
    pub transaction_count: usize,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.stored_balance == self.replayed_balance
    }
}

impl Ledger {
    /// Open an account with a freshly generated account number
    ///
    /// A non-zero opening balance is recorded as a deposit so the account's
    /// history always replays to its balance.
    pub fn create_account(
        &self,
        user_id: UserId,
        account_type: AccountType,
        initial_balance: Decimal,
        interest_rate: Decimal,
    ) -> LedgerResult<Account> {
        debug!("Opening {} account for user {}", account_type.as_str(), user_id);

        if initial_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(initial_balance));
        }
        if interest_rate < Decimal::ZERO {
            return Err(LedgerError::InvalidRate(interest_rate));
        }
        if account_type.as_str().is_empty() {
            return Err(LedgerError::InvalidInput("account type must not be empty".to_string()));
        }

        let today = Utc::now().date_naive();
        let account = self.store.unit_of_work(|tx| {
            UserRepository::find(tx, user_id)?;

            let account = with_fresh_identifier(
                "account number",
                self.config.id_generation_attempts,
                || self.ids.account_number(),
                |number| {
                    AccountRepository::insert(
                        tx,
                        &NewAccount {
                            user_id,
                            account_number: number,
                            account_type: &account_type,
                            balance: initial_balance,
                            interest_rate,
                            last_interest_applied: today,
                        },
                    )
                },
            )?;

            if initial_balance > Decimal::ZERO {
                TransactionRepository::insert(
                    tx,
                    &NewTransaction::new(account.id, TransactionKind::Deposit, initial_balance, "Opening deposit"),
                )?;
            }

            Ok(account)
        })?;

        info!(
            "Opened {} account {} (number {}) for user {} with balance {}",
            account.account_type.as_str(),
            account.id,
            account.account_number,
            user_id,
            account.balance
        );
        Ok(account)
    }

    /// Add money to an account
    pub fn deposit(&self, account_id: AccountId, amount: Decimal) -> LedgerResult<Transaction> {
        ensure_positive(amount)?;

        let transaction = self.store.unit_of_work(|tx| {
            AccountRepository::apply_delta(tx, account_id, amount)?;
            TransactionRepository::insert(
                tx,
                &NewTransaction::new(account_id, TransactionKind::Deposit, amount, "Cash deposit"),
            )
        })?;

        info!("Deposited {} into account {}", amount, account_id);
        Ok(transaction)
    }

    /// Take money out of an account, never below zero
    pub fn withdraw(&self, account_id: AccountId, amount: Decimal) -> LedgerResult<Transaction> {
        ensure_positive(amount)?;

        let transaction = self.store.unit_of_work(|tx| {
            AccountRepository::apply_delta(tx, account_id, -amount)?;
            TransactionRepository::insert(
                tx,
                &NewTransaction::new(account_id, TransactionKind::Withdrawal, amount, "Cash withdrawal"),
            )
        })?;

        info!("Withdrew {} from account {}", amount, account_id);
        Ok(transaction)
    }

    pub fn get_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        let conn = self.store.connection()?;
        AccountRepository::find(&conn, account_id)
    }

    pub fn list_accounts(&self, user_id: UserId) -> LedgerResult<Vec<Account>> {
        let conn = self.store.connection()?;
        AccountRepository::list_by_user(&conn, user_id)
    }

    /// An account's transactions, newest first
    pub fn list_transactions(&self, account_id: AccountId, limit: Option<usize>) -> LedgerResult<Vec<Transaction>> {
        let conn = self.store.connection()?;
        TransactionRepository::list_by_account(&conn, account_id, limit)
    }

    /// Dashboard totals for a user, after bringing interest up to date
    pub fn account_overview(&self, user_id: UserId) -> LedgerResult<AccountOverview> {
        self.apply_interest_for_user(user_id)?;

        let accounts = self.list_accounts(user_id)?;
        let total_balance = checked_total("total balance", accounts.iter().map(|a| a.balance))?;
        let savings_balance = checked_total(
            "savings balance",
            accounts
                .iter()
                .filter(|a| a.account_type.is_savings())
                .map(|a| a.balance),
        )?;

        Ok(AccountOverview {
            account_count: accounts.len(),
            total_balance,
            savings_balance,
        })
    }

    /// Replay an account's history and compare it with the stored balance
    pub fn reconcile(&self, account_id: AccountId) -> LedgerResult<Reconciliation> {
        let (account, history) = self.store.unit_of_work(|tx| {
            let account = AccountRepository::find(tx, account_id)?;
            let history = TransactionRepository::list_by_account(tx, account_id, None)?;
            Ok((account, history))
        })?;

        let replayed_balance = checked_total(
            "replayed balance",
            history.iter().map(|t| t.kind.signed(t.amount)),
        )?;

        Ok(Reconciliation {
            account_id,
            stored_balance: account.balance,
            replayed_balance,
            transaction_count: history.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::ledger::ids::MockIdGenerator;
    use crate::ledger::test_support;
    use rust_decimal_macros::dec;

    #[test]
    fn test_create_account_records_opening_deposit() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");

        let account = ledger
            .create_account(user.id, AccountType::Savings, dec!(8200), dec!(0.012))
            .unwrap();

        assert!(account.account_number.starts_with("9825"));
        assert_eq!(account.last_interest_applied, Some(Utc::now().date_naive()));

        let history = ledger.list_transactions(account.id, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Deposit);
        assert_eq!(history[0].amount, dec!(8200));
    }

    #[test]
    fn test_create_account_without_opening_balance_has_no_history() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");

        let account = test_support::chequing(&ledger, &user, Decimal::ZERO);
        assert!(ledger.list_transactions(account.id, None).unwrap().is_empty());
    }

    #[test]
    fn test_create_account_validates_input() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");

        let negative = ledger.create_account(user.id, AccountType::Chequing, dec!(-1), Decimal::ZERO);
        assert!(matches!(negative, Err(LedgerError::InvalidAmount(_))));

        let bad_rate = ledger.create_account(user.id, AccountType::Savings, dec!(10), dec!(-0.01));
        assert!(matches!(bad_rate, Err(LedgerError::InvalidRate(_))));

        let no_user = ledger.create_account(999, AccountType::Chequing, dec!(10), Decimal::ZERO);
        assert!(matches!(no_user, Err(LedgerError::NotFound { entity: "User", .. })));
    }

    #[test]
    fn test_account_number_collision_is_retried() {
        let mut ids = MockIdGenerator::new();
        let mut sequence = vec!["9825000002", "9825000001", "9825000001"];
        ids.expect_account_number()
            .times(3)
            .returning(move || sequence.pop().unwrap().to_string());

        let (ledger, _dir) = test_support::ledger_with(LedgerConfig::default(), Some(Box::new(ids)));
        let user = test_support::user(&ledger, "alice@example.com");

        let first = test_support::chequing(&ledger, &user, dec!(1));
        let second = test_support::chequing(&ledger, &user, dec!(1));

        assert_eq!(first.account_number, "9825000001");
        assert_eq!(second.account_number, "9825000002");
    }

    #[test]
    fn test_account_number_collision_surfaces_after_max_attempts() {
        let mut config = LedgerConfig::default();
        config.id_generation_attempts = 3;

        let mut ids = MockIdGenerator::new();
        ids.expect_account_number()
            .times(4)
            .returning(|| "9825123456".to_string());

        let (ledger, _dir) = test_support::ledger_with(config, Some(Box::new(ids)));
        let user = test_support::user(&ledger, "alice@example.com");
        test_support::chequing(&ledger, &user, dec!(50));

        let result = ledger.create_account(user.id, AccountType::Chequing, dec!(50), Decimal::ZERO);
        assert!(matches!(result, Err(LedgerError::DuplicateKey(_))));
        assert_eq!(ledger.list_accounts(user.id).unwrap().len(), 1);
    }

    #[test]
    fn test_withdraw_more_than_balance_is_rejected() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let account = test_support::chequing(&ledger, &user, dec!(100.00));

        let result = ledger.withdraw(account.id, dec!(150.00));
        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(ledger.get_account(account.id).unwrap().balance, dec!(100.00));
        assert_eq!(ledger.list_transactions(account.id, None).unwrap().len(), 1);
    }

    #[test]
    fn test_deposit_and_withdraw_record_transactions() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let account = test_support::chequing(&ledger, &user, Decimal::ZERO);

        ledger.deposit(account.id, dec!(25.50)).unwrap();
        let withdrawal = ledger.withdraw(account.id, dec!(5.25)).unwrap();

        assert_eq!(withdrawal.kind, TransactionKind::Withdrawal);
        assert_eq!(ledger.get_account(account.id).unwrap().balance, dec!(20.25));

        let history = ledger.list_transactions(account.id, Some(10)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, TransactionKind::Withdrawal);
        assert_eq!(history[1].kind, TransactionKind::Deposit);
    }

    #[test]
    fn test_overview_reports_overflowing_total() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        test_support::chequing(&ledger, &user, Decimal::MAX);
        test_support::chequing(&ledger, &user, dec!(1));

        let result = ledger.account_overview(user.id);
        assert!(matches!(result, Err(LedgerError::Overflow(_))));
    }

    #[test]
    fn test_deposit_to_missing_account() {
        let (ledger, _dir) = test_support::ledger();
        let result = ledger.deposit(404, dec!(10));
        assert!(matches!(result, Err(LedgerError::NotFound { entity: "Account", .. })));
    }

    #[test]
    fn test_reconcile_after_mixed_activity() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let account = test_support::chequing(&ledger, &user, dec!(300));

        ledger.deposit(account.id, dec!(45.10)).unwrap();
        ledger.withdraw(account.id, dec!(0.10)).unwrap();

        let report = ledger.reconcile(account.id).unwrap();
        assert!(report.is_consistent());
        assert_eq!(report.replayed_balance, dec!(345.00));
        assert_eq!(report.transaction_count, 3);
    }

    #[test]
    fn test_account_overview_totals() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        test_support::chequing(&ledger, &user, dec!(3500));
        ledger
            .create_account(user.id, AccountType::Savings, dec!(8200), dec!(0.012))
            .unwrap();

        let overview = ledger.account_overview(user.id).unwrap();
        assert_eq!(overview.account_count, 2);
        assert_eq!(overview.total_balance, dec!(11700));
        assert_eq!(overview.savings_balance, dec!(8200));
    }
}
