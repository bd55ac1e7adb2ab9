use log::{debug, info, warn};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::users::normalize_email;
use super::{ensure_positive, Ledger, LedgerError, LedgerResult};
use crate::database::models::{AccountId, InteracRegistration, NewTransaction, Transaction, TransactionKind, UserId};
use crate::database::repository::{AccountRepository, InteracRepository, TransactionRepository};

/// Both legs of a completed transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    /// Posting reference shared by the two legs
    pub reference: String,
    pub debit: Transaction,
    pub credit: Transaction,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
}

/// How the two legs of a transfer are labelled in the audit trail
struct TransferLabels<'a> {
    out_kind: TransactionKind,
    in_kind: TransactionKind,
    out_description: &'a str,
    in_description: &'a str,
    email: Option<&'a str>,
}

const INTERNAL: TransferLabels<'static> = TransferLabels {
    out_kind: TransactionKind::TransferOut,
    in_kind: TransactionKind::TransferIn,
    out_description: "Transfer to another account",
    in_description: "Transfer from another account",
    email: None,
};

/// Move `amount` between two accounts inside the caller's unit of work
fn move_funds(
    conn: &Connection,
    from: AccountId,
    to: AccountId,
    amount: Decimal,
    labels: &TransferLabels,
) -> LedgerResult<TransferReceipt> {
    // Both ends must exist before anything moves
    let source = AccountRepository::find(conn, from)?;
    AccountRepository::find(conn, to)?;

    if source.balance < amount {
        return Err(LedgerError::insufficient_funds(amount, source.balance));
    }

    let from_balance = AccountRepository::apply_delta(conn, from, -amount)?;
    let to_balance = AccountRepository::apply_delta(conn, to, amount)?;

    let reference = Uuid::new_v4().to_string();
    let debit = TransactionRepository::insert(
        conn,
        &NewTransaction::new(from, labels.out_kind, amount, labels.out_description)
            .related_to(to)
            .with_email(labels.email)
            .with_reference(&reference),
    )?;
    let credit = TransactionRepository::insert(
        conn,
        &NewTransaction::new(to, labels.in_kind, amount, labels.in_description)
            .related_to(from)
            .with_email(labels.email)
            .with_reference(&reference),
    )?;

    Ok(TransferReceipt {
        reference,
        debit,
        credit,
        from_balance,
        to_balance,
    })
}

impl Ledger {
    /// Move money between two accounts atomically
    pub fn transfer_internal(&self, from: AccountId, to: AccountId, amount: Decimal) -> LedgerResult<TransferReceipt> {
        debug!("Transfer of {} from account {} to account {}", amount, from, to);

        ensure_positive(amount)?;
        if from == to {
            return Err(LedgerError::SameAccount);
        }

        let receipt = self
            .store
            .unit_of_work(|tx| move_funds(tx, from, to, amount, &INTERNAL))
            .map_err(|e| {
                warn!("Transfer from account {} to account {} rejected: {}", from, to, e);
                e
            })?;

        info!("Transferred {} from account {} to account {} (Ref: {})", amount, from, to, receipt.reference);
        Ok(receipt)
    }

    /// Make `account_id` reachable by Interac transfers sent to `email`
    ///
    /// Re-registering an email the user already holds points it at the new
    /// account. An email held by another user is refused as a duplicate
    /// rather than silently taken over from them.
    pub fn register_interac(&self, user_id: UserId, account_id: AccountId, email: &str) -> LedgerResult<InteracRegistration> {
        let email = normalize_email(email)?;

        let registration = self.store.unit_of_work(|tx| {
            AccountRepository::find_owned(tx, user_id, account_id)?;

            match InteracRepository::find_by_email(tx, &email)? {
                Some(existing) if existing.user_id != user_id => Err(LedgerError::DuplicateKey(format!(
                    "interac_registrations.email: {}",
                    email
                ))),
                Some(existing) => {
                    if existing.account_id != account_id {
                        info!(
                            "Repointing Interac email {} from account {} to account {}",
                            email, existing.account_id, account_id
                        );
                        InteracRepository::repoint(tx, existing.id, account_id)?;
                    }
                    Ok(InteracRegistration { account_id, ..existing })
                }
                None => InteracRepository::insert(tx, user_id, account_id, &email),
            }
        })?;

        info!("Interac email {} routes to account {}", registration.email, registration.account_id);
        Ok(registration)
    }

    pub fn list_interac_registrations(&self, user_id: UserId) -> LedgerResult<Vec<InteracRegistration>> {
        let conn = self.store.connection()?;
        InteracRepository::list_by_user(&conn, user_id)
    }

    /// Send money to whichever account is registered for `email`
    ///
    /// Produces exactly one InteracOut / InteracIn pair carrying the email.
    pub fn interac_transfer(&self, from: AccountId, email: &str, amount: Decimal) -> LedgerResult<TransferReceipt> {
        debug!("Interac transfer of {} from account {} to {}", amount, from, email);

        ensure_positive(amount)?;
        let email = email.trim().to_lowercase();

        let receipt = self.store.unit_of_work(|tx| {
            let registration = InteracRepository::find_by_email(tx, &email)?
                .ok_or_else(|| LedgerError::RecipientNotRegistered(email.clone()))?;

            if registration.account_id == from {
                return Err(LedgerError::SameAccount);
            }

            let labels = TransferLabels {
                out_kind: TransactionKind::InteracOut,
                in_kind: TransactionKind::InteracIn,
                out_description: "Interac e-Transfer sent",
                in_description: "Interac e-Transfer received",
                email: Some(&email),
            };
            move_funds(tx, from, registration.account_id, amount, &labels)
        })?;

        info!("Interac e-Transfer of {} from account {} to {} (Ref: {})", amount, from, email, receipt.reference);
        Ok(receipt)
    }
}
