use log::{debug, info};
use rust_decimal::Decimal;

use super::{ensure_positive, Ledger, LedgerError, LedgerResult};
use crate::database::models::{AccountId, BillPayee, BillPayment, NewTransaction, PayeeId, TransactionKind, UserId};
use crate::database::repository::{AccountRepository, BillRepository, TransactionRepository};

const DEFAULT_BILL_REFERENCE: &str = "Online bill payment";

impl Ledger {
    /// Add a company to the payee directory
    pub fn add_payee(&self, name: &str, category: Option<&str>) -> LedgerResult<BillPayee> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidInput("payee name must not be empty".to_string()));
        }
        let category = category.map(str::trim).filter(|c| !c.is_empty());

        let payee = self
            .store
            .unit_of_work(|tx| BillRepository::insert_payee(tx, name, category))?;

        info!("Added bill payee {} ({})", payee.id, payee.name);
        Ok(payee)
    }

    pub fn list_payees(&self) -> LedgerResult<Vec<BillPayee>> {
        let conn = self.store.connection()?;
        BillRepository::list_payees(&conn)
    }

    /// Pay a registered payee from one of the user's accounts
    pub fn pay_bill(
        &self,
        user_id: UserId,
        from: AccountId,
        payee_id: PayeeId,
        amount: Decimal,
        reference: Option<&str>,
    ) -> LedgerResult<BillPayment> {
        debug!("Bill payment of {} to payee {} from account {}", amount, payee_id, from);
        ensure_positive(amount)?;

        let reference = reference
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_BILL_REFERENCE);

        let payment = self.store.unit_of_work(|tx| {
            AccountRepository::find_owned(tx, user_id, from)?;
            let payee = BillRepository::find_payee(tx, payee_id)?;

            AccountRepository::apply_delta(tx, from, -amount)?;
            let payment = BillRepository::insert_payment(tx, user_id, from, payee_id, amount, reference)?;

            let description = format!("Bill payment to {}", payee.name);
            TransactionRepository::insert(
                tx,
                &NewTransaction::new(from, TransactionKind::BillPayment, amount, &description),
            )?;

            Ok(payment)
        })?;

        info!("Paid {} to payee {} from account {}", amount, payee_id, from);
        Ok(payment)
    }

    /// A user's bill payments, newest first
    pub fn list_bill_payments(&self, user_id: UserId, limit: Option<usize>) -> LedgerResult<Vec<BillPayment>> {
        let conn = self.store.connection()?;
        BillRepository::list_payments_by_user(&conn, user_id, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::test_support;
    use rust_decimal_macros::dec;

    #[test]
    fn test_add_payee_validates_name() {
        let (ledger, _dir) = test_support::ledger();

        assert!(matches!(ledger.add_payee("   ", None), Err(LedgerError::InvalidInput(_))));

        let payee = ledger.add_payee(" Hydro One ", Some("Utilities")).unwrap();
        assert_eq!(payee.name, "Hydro One");
        assert_eq!(payee.category.as_deref(), Some("Utilities"));
    }

    #[test]
    fn test_list_payees_sorted_by_name() {
        let (ledger, _dir) = test_support::ledger();
        ledger.add_payee("Rogers", Some("Telecom")).unwrap();
        ledger.add_payee("Enbridge", None).unwrap();

        let names: Vec<String> = ledger.list_payees().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Enbridge", "Rogers"]);
    }

    #[test]
    fn test_pay_bill_debits_and_records() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let account = test_support::chequing(&ledger, &user, dec!(500));
        let payee = ledger.add_payee("Hydro One", Some("Utilities")).unwrap();

        let payment = ledger.pay_bill(user.id, account.id, payee.id, dec!(120.45), None).unwrap();

        assert_eq!(payment.reference.as_deref(), Some("Online bill payment"));
        assert_eq!(ledger.get_account(account.id).unwrap().balance, dec!(379.55));

        let history = ledger.list_transactions(account.id, Some(1)).unwrap();
        assert_eq!(history[0].kind, TransactionKind::BillPayment);
        assert_eq!(history[0].amount, dec!(120.45));
        assert_eq!(history[0].description, "Bill payment to Hydro One");

        let payments = ledger.list_bill_payments(user.id, None).unwrap();
        assert_eq!(payments, vec![payment]);
    }

    #[test]
    fn test_pay_bill_keeps_custom_reference() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let account = test_support::chequing(&ledger, &user, dec!(500));
        let payee = ledger.add_payee("Rogers", None).unwrap();

        let payment = ledger
            .pay_bill(user.id, account.id, payee.id, dec!(80), Some("Invoice 4471"))
            .unwrap();
        assert_eq!(payment.reference.as_deref(), Some("Invoice 4471"));
    }

    #[test]
    fn test_pay_bill_rejections_leave_no_trace() {
        let (ledger, _dir) = test_support::ledger();
        let alice = test_support::user(&ledger, "alice@example.com");
        let bob = test_support::user(&ledger, "bob@example.com");
        let account = test_support::chequing(&ledger, &alice, dec!(50));
        let payee = ledger.add_payee("Hydro One", None).unwrap();

        let too_much = ledger.pay_bill(alice.id, account.id, payee.id, dec!(50.01), None);
        assert!(matches!(too_much, Err(LedgerError::InsufficientFunds { .. })));

        let not_owner = ledger.pay_bill(bob.id, account.id, payee.id, dec!(5), None);
        assert!(matches!(not_owner, Err(LedgerError::NotFound { entity: "Account", .. })));

        let no_payee = ledger.pay_bill(alice.id, account.id, 999, dec!(5), None);
        assert!(matches!(no_payee, Err(LedgerError::NotFound { entity: "Bill payee", .. })));

        let zero = ledger.pay_bill(alice.id, account.id, payee.id, Decimal::ZERO, None);
        assert!(matches!(zero, Err(LedgerError::InvalidAmount(_))));

        assert_eq!(ledger.get_account(account.id).unwrap().balance, dec!(50));
        assert!(ledger.list_bill_payments(alice.id, None).unwrap().is_empty());
    }
}
