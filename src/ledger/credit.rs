use chrono::{Datelike, Utc};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use super::ids::with_fresh_identifier;
use super::{ensure_positive, Ledger, LedgerError, LedgerResult};
use crate::database::models::{
    AccountId, CardId, CardStatus, CreditCard, NewTransaction, Transaction, TransactionKind, UserId,
};
use crate::database::repository::{AccountRepository, CardRepository, NewCard, TransactionRepository, UserRepository};

/// Outcome of paying down a card from an account
#[derive(Debug, Clone, Serialize)]
pub struct CardPayment {
    pub card: CreditCard,
    /// Amount actually moved, after capping to what was owed
    pub amount_paid: Decimal,
    /// Account-side record; absent when nothing was owed
    pub transaction: Option<Transaction>,
}

impl Ledger {
    /// Issue a new active card to a user
    ///
    /// Requested limits below the configured minimum are raised to it.
    pub fn issue_card(&self, user_id: UserId, requested_limit: Decimal) -> LedgerResult<CreditCard> {
        let credit_limit = requested_limit.max(self.config.min_credit_limit);
        let today = Utc::now().date_naive();
        let expiry_month = today.month();
        let expiry_year = today.year() + self.config.card_validity_years;

        let card = self.store.unit_of_work(|tx| {
            UserRepository::find(tx, user_id)?;

            with_fresh_identifier(
                "card number",
                self.config.id_generation_attempts,
                || self.ids.card_number(),
                |number| {
                    let cvv = self.ids.cvv();
                    CardRepository::insert(
                        tx,
                        &NewCard {
                            user_id,
                            card_number: number,
                            cvv: &cvv,
                            expiry_month,
                            expiry_year,
                            credit_limit,
                        },
                    )
                },
            )
        })?;

        info!(
            "Issued card {} ({}) to user {} with limit {}",
            card.id,
            card.masked_number(),
            user_id,
            card.credit_limit
        );
        Ok(card)
    }

    /// Charge a purchase to a card
    pub fn spend(&self, card_id: CardId, amount: Decimal) -> LedgerResult<CreditCard> {
        debug!("Charge of {} to card {}", amount, card_id);
        ensure_positive(amount)?;

        let card = self
            .store
            .unit_of_work(|tx| {
                let card = CardRepository::find(tx, card_id)?;
                if card.status != CardStatus::Active {
                    return Err(LedgerError::CardInactive(card_id));
                }

                let current_balance = CardRepository::apply_delta(tx, card_id, amount)?;
                Ok(CreditCard { current_balance, ..card })
            })
            .map_err(|e| {
                warn!("Charge of {} to card {} rejected: {}", amount, card_id, e);
                e
            })?;

        info!("Charged {} to card {}, balance now {}", amount, card_id, card.current_balance);
        Ok(card)
    }

    /// Pay down a card from one of the user's accounts
    ///
    /// The account must cover the requested amount even though only the
    /// outstanding card balance is moved.
    pub fn pay_card(
        &self,
        user_id: UserId,
        from: AccountId,
        card_id: CardId,
        amount: Decimal,
    ) -> LedgerResult<CardPayment> {
        debug!("Payment of {} to card {} from account {}", amount, card_id, from);
        ensure_positive(amount)?;

        let payment = self.store.unit_of_work(|tx| {
            // 1. Source account belongs to the user and covers the request
            let account = AccountRepository::find_owned(tx, user_id, from)?;
            if account.balance < amount {
                return Err(LedgerError::insufficient_funds(amount, account.balance));
            }

            // 2. Card belongs to the same user
            let card = CardRepository::find_owned(tx, user_id, card_id)?;

            // 3. Cap to what is owed
            let amount_paid = amount.min(card.current_balance);
            if amount_paid <= Decimal::ZERO {
                return Ok(CardPayment {
                    card,
                    amount_paid: Decimal::ZERO,
                    transaction: None,
                });
            }

            // 4. Move the money and record it
            AccountRepository::apply_delta(tx, from, -amount_paid)?;
            let current_balance = CardRepository::apply_delta(tx, card_id, -amount_paid)?;
            let transaction = TransactionRepository::insert(
                tx,
                &NewTransaction::new(from, TransactionKind::CreditCardPayment, amount_paid, "Payment to credit card"),
            )?;

            Ok(CardPayment {
                card: CreditCard { current_balance, ..card },
                amount_paid,
                transaction: Some(transaction),
            })
        })?;

        if payment.amount_paid > Decimal::ZERO {
            info!("Paid {} to card {} from account {}", payment.amount_paid, card_id, from);
        } else {
            info!("Card {} has no outstanding balance, nothing paid", card_id);
        }
        Ok(payment)
    }

    /// Freeze, unfreeze or close one of the user's cards
    pub fn set_card_status(&self, user_id: UserId, card_id: CardId, status: CardStatus) -> LedgerResult<CreditCard> {
        let card = self.store.unit_of_work(|tx| {
            let card = CardRepository::find_owned(tx, user_id, card_id)?;
            if card.status == CardStatus::Closed && status != CardStatus::Closed {
                return Err(LedgerError::CardInactive(card_id));
            }
            CardRepository::set_status(tx, card_id, status)?;
            Ok(CreditCard { status, ..card })
        })?;

        info!("Card {} is now {}", card_id, card.status.as_str());
        Ok(card)
    }

    pub fn get_card(&self, card_id: CardId) -> LedgerResult<CreditCard> {
        let conn = self.store.connection()?;
        CardRepository::find(&conn, card_id)
    }

    pub fn list_cards(&self, user_id: UserId) -> LedgerResult<Vec<CreditCard>> {
        let conn = self.store.connection()?;
        CardRepository::list_by_user(&conn, user_id)
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
    fn test_issue_card_floors_limit_and_sets_expiry() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");

        let card = ledger.issue_card(user.id, dec!(500)).unwrap();
        let today = Utc::now().date_naive();

        assert_eq!(card.credit_limit, dec!(2000));
        assert_eq!(card.current_balance, Decimal::ZERO);
        assert_eq!(card.status, CardStatus::Active);
        assert_eq!(card.card_number.len(), 16);
        assert_eq!(card.cvv.len(), 3);
        assert_eq!(card.expiry_month, today.month());
        assert_eq!(card.expiry_year, today.year() + 3);

        let generous = ledger.issue_card(user.id, dec!(7500)).unwrap();
        assert_eq!(generous.credit_limit, dec!(7500));
    }

    #[test]
    fn test_issue_card_requires_user() {
        let (ledger, _dir) = test_support::ledger();
        let result = ledger.issue_card(42, dec!(5000));
        assert!(matches!(result, Err(LedgerError::NotFound { entity: "User", .. })));
    }

    #[test]
    fn test_card_number_collision_is_retried() {
        let mut ids = MockIdGenerator::new();
        let mut numbers = vec!["2222222222222222", "1111111111111111", "1111111111111111"];
        ids.expect_card_number()
            .times(3)
            .returning(move || numbers.pop().unwrap().to_string());
        ids.expect_cvv().returning(|| "123".to_string());

        let (ledger, _dir) = test_support::ledger_with(LedgerConfig::default(), Some(Box::new(ids)));
        let user = test_support::user(&ledger, "alice@example.com");

        let first = ledger.issue_card(user.id, dec!(2000)).unwrap();
        let second = ledger.issue_card(user.id, dec!(2000)).unwrap();

        assert_eq!(first.card_number, "1111111111111111");
        assert_eq!(second.card_number, "2222222222222222");
    }

    #[test]
    fn test_spend_over_limit_is_rejected() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let card = ledger.issue_card(user.id, dec!(2000)).unwrap();

        let result = ledger.spend(card.id, dec!(2000.01));
        assert!(matches!(result, Err(LedgerError::CreditLimitExceeded { .. })));
        assert_eq!(ledger.get_card(card.id).unwrap().current_balance, Decimal::ZERO);

        let charged = ledger.spend(card.id, dec!(2000)).unwrap();
        assert_eq!(charged.current_balance, dec!(2000));
        assert_eq!(charged.available_credit(), Decimal::ZERO);
    }

    #[test]
    fn test_spend_on_frozen_card() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let card = ledger.issue_card(user.id, dec!(2000)).unwrap();

        ledger.set_card_status(user.id, card.id, CardStatus::Frozen).unwrap();
        assert!(matches!(ledger.spend(card.id, dec!(10)), Err(LedgerError::CardInactive(_))));

        ledger.set_card_status(user.id, card.id, CardStatus::Active).unwrap();
        assert_eq!(ledger.spend(card.id, dec!(10)).unwrap().current_balance, dec!(10));
    }

    #[test]
    fn test_closed_card_cannot_be_reactivated() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let card = ledger.issue_card(user.id, dec!(2000)).unwrap();

        ledger.set_card_status(user.id, card.id, CardStatus::Closed).unwrap();
        let result = ledger.set_card_status(user.id, card.id, CardStatus::Active);
        assert!(matches!(result, Err(LedgerError::CardInactive(_))));
    }

    #[test]
    fn test_pay_card_caps_to_outstanding_balance() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let account = test_support::chequing(&ledger, &user, dec!(1000));
        let card = ledger.issue_card(user.id, dec!(2000)).unwrap();
        ledger.spend(card.id, dec!(300)).unwrap();

        let payment = ledger.pay_card(user.id, account.id, card.id, dec!(500)).unwrap();

        assert_eq!(payment.amount_paid, dec!(300));
        assert_eq!(payment.card.current_balance, Decimal::ZERO);
        assert_eq!(ledger.get_account(account.id).unwrap().balance, dec!(700));

        let transaction = payment.transaction.unwrap();
        assert_eq!(transaction.kind, TransactionKind::CreditCardPayment);
        assert_eq!(transaction.amount, dec!(300));
        assert!(ledger.reconcile(account.id).unwrap().is_consistent());
    }

    #[test]
    fn test_pay_card_checks_funds_before_capping() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let account = test_support::chequing(&ledger, &user, dec!(100));
        let card = ledger.issue_card(user.id, dec!(2000)).unwrap();
        ledger.spend(card.id, dec!(50)).unwrap();

        let result = ledger.pay_card(user.id, account.id, card.id, dec!(150));

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        assert_eq!(ledger.get_card(card.id).unwrap().current_balance, dec!(50));
    }

    #[test]
    fn test_pay_card_with_nothing_owed() {
        let (ledger, _dir) = test_support::ledger();
        let user = test_support::user(&ledger, "alice@example.com");
        let account = test_support::chequing(&ledger, &user, dec!(100));
        let card = ledger.issue_card(user.id, dec!(2000)).unwrap();

        let payment = ledger.pay_card(user.id, account.id, card.id, dec!(25)).unwrap();

        assert_eq!(payment.amount_paid, Decimal::ZERO);
        assert!(payment.transaction.is_none());
        assert_eq!(ledger.get_account(account.id).unwrap().balance, dec!(100));
        assert_eq!(ledger.list_transactions(account.id, None).unwrap().len(), 1);
    }

    #[test]
    fn test_pay_card_requires_ownership() {
        let (ledger, _dir) = test_support::ledger();
        let alice = test_support::user(&ledger, "alice@example.com");
        let bob = test_support::user(&ledger, "bob@example.com");
        let alice_account = test_support::chequing(&ledger, &alice, dec!(100));
        let bob_card = ledger.issue_card(bob.id, dec!(2000)).unwrap();
        ledger.spend(bob_card.id, dec!(10)).unwrap();

        let foreign_card = ledger.pay_card(alice.id, alice_account.id, bob_card.id, dec!(10));
        assert!(matches!(foreign_card, Err(LedgerError::NotFound { entity: "Credit card", .. })));

        let foreign_account = ledger.pay_card(bob.id, alice_account.id, bob_card.id, dec!(10));
        assert!(matches!(foreign_account, Err(LedgerError::NotFound { entity: "Account", .. })));
    }
}
