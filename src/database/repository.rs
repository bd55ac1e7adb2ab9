use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::database::models::*;
use crate::ledger::{LedgerError, LedgerResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Column helpers
// ============================================================================

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn decimal_at(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| conversion_error(idx, e))
}

fn timestamp_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// Unset and unparseable dates both read as `None`
fn date_at(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let text: Option<String> = row.get(idx)?;
    Ok(text.and_then(|t| NaiveDate::parse_from_str(&t, DATE_FORMAT).ok()))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_stored_decimal(text: &str) -> LedgerResult<Decimal> {
    Decimal::from_str(text).map_err(|_| LedgerError::CorruptValue(text.to_string()))
}

/// Turn a UNIQUE constraint failure into `DuplicateKey`
fn map_insert_error(err: rusqlite::Error) -> LedgerError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            let key = message
                .clone()
                .unwrap_or_else(|| "unique constraint".to_string());
            return LedgerError::DuplicateKey(key);
        }
    }
    LedgerError::Database(err)
}

/// `LIMIT -1` means no limit in SQLite
fn limit_value(limit: Option<usize>) -> i64 {
    limit.map(|l| l as i64).unwrap_or(-1)
}

// ============================================================================
// User Repository
// ============================================================================

/// Repository for the users table
pub struct UserRepository;

impl UserRepository {
    fn from_row(row: &Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            username: row.get(2)?,
            dob: date_at(row, 3)?,
            created_at: timestamp_at(row, 4)?,
        })
    }

    pub fn insert(conn: &Connection, email: &str, username: &str, dob: Option<NaiveDate>) -> LedgerResult<User> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (email, username, dob, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![email, username, dob.map(format_date), now.to_rfc3339()],
        ).map_err(map_insert_error)?;

        Ok(User {
            id: conn.last_insert_rowid(),
            email: email.to_string(),
            username: username.to_string(),
            dob,
            created_at: now,
        })
    }

    pub fn find(conn: &Connection, id: UserId) -> LedgerResult<User> {
        conn.query_row(
            "SELECT id, email, username, dob, created_at FROM users WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| LedgerError::not_found("User", id))
    }

    pub fn delete(conn: &Connection, id: UserId) -> LedgerResult<()> {
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(LedgerError::not_found("User", id));
        }
        Ok(())
    }
}

// ============================================================================
// Account Repository
// ============================================================================

const ACCOUNT_COLUMNS: &str =
    "id, user_id, account_number, account_type, balance, interest_rate, last_interest_applied, created_at";

/// Repository for the accounts table
pub struct AccountRepository;

/// Fields of an account row that has not been inserted yet
pub struct NewAccount<'a> {
    pub user_id: UserId,
    pub account_number: &'a str,
    pub account_type: &'a AccountType,
    pub balance: Decimal,
    pub interest_rate: Decimal,
    pub last_interest_applied: NaiveDate,
}

impl AccountRepository {
    fn from_row(row: &Row) -> rusqlite::Result<Account> {
        let account_type: String = row.get(3)?;
        Ok(Account {
            id: row.get(0)?,
            user_id: row.get(1)?,
            account_number: row.get(2)?,
            account_type: AccountType::parse(&account_type),
            balance: decimal_at(row, 4)?,
            interest_rate: decimal_at(row, 5)?,
            last_interest_applied: date_at(row, 6)?,
            created_at: timestamp_at(row, 7)?,
        })
    }

    pub fn insert(conn: &Connection, account: &NewAccount) -> LedgerResult<Account> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO accounts (user_id, account_number, account_type, balance, interest_rate,
                                   last_interest_applied, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                account.user_id,
                account.account_number,
                account.account_type.as_str(),
                account.balance.to_string(),
                account.interest_rate.to_string(),
                format_date(account.last_interest_applied),
                now.to_rfc3339(),
            ],
        ).map_err(map_insert_error)?;

        Ok(Account {
            id: conn.last_insert_rowid(),
            user_id: account.user_id,
            account_number: account.account_number.to_string(),
            account_type: account.account_type.clone(),
            balance: account.balance,
            interest_rate: account.interest_rate,
            last_interest_applied: Some(account.last_interest_applied),
            created_at: now,
        })
    }

    pub fn find(conn: &Connection, id: AccountId) -> LedgerResult<Account> {
        conn.query_row(
            &format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS),
            params![id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| LedgerError::not_found("Account", id))
    }

    /// Find an account only if it belongs to `user_id`
    pub fn find_owned(conn: &Connection, user_id: UserId, id: AccountId) -> LedgerResult<Account> {
        let account = Self::find(conn, id)?;
        if account.user_id != user_id {
            return Err(LedgerError::not_found("Account", id));
        }
        Ok(account)
    }

    pub fn list_by_user(conn: &Connection, user_id: UserId) -> LedgerResult<Vec<Account>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM accounts WHERE user_id = ?1 ORDER BY id",
            ACCOUNT_COLUMNS
        ))?;
        let accounts = stmt
            .query_map(params![user_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(accounts)
    }

    /// Add `delta` to an account balance, refusing to go below zero
    ///
    /// This is the only write path for account balances. The row is re-read
    /// and written back with a compare-and-swap on the text it was read as.
    pub fn apply_delta(conn: &Connection, id: AccountId, delta: Decimal) -> LedgerResult<Decimal> {
        let stored: String = conn
            .query_row("SELECT balance FROM accounts WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?
            .ok_or_else(|| LedgerError::not_found("Account", id))?;
        let current = parse_stored_decimal(&stored)?;

        let updated = current
            .checked_add(delta)
            .ok_or_else(|| LedgerError::Overflow(format!("balance of account {}", id)))?;
        if updated < Decimal::ZERO {
            return Err(LedgerError::insufficient_funds(-delta, current));
        }

        let changed = conn.execute(
            "UPDATE accounts SET balance = ?1 WHERE id = ?2 AND balance = ?3",
            params![updated.to_string(), id, stored],
        )?;
        if changed != 1 {
            return Err(LedgerError::ConcurrentModification(format!("account {}", id)));
        }

        debug!("Account {} balance {} -> {}", id, current, updated);
        Ok(updated)
    }

    pub fn set_last_interest_applied(conn: &Connection, id: AccountId, date: NaiveDate) -> LedgerResult<()> {
        let changed = conn.execute(
            "UPDATE accounts SET last_interest_applied = ?1 WHERE id = ?2",
            params![format_date(date), id],
        )?;
        if changed == 0 {
            return Err(LedgerError::not_found("Account", id));
        }
        Ok(())
    }
}

// ============================================================================
// Credit Card Repository
// ============================================================================

const CARD_COLUMNS: &str =
    "id, user_id, card_number, cvv, expiry_month, expiry_year, credit_limit, current_balance, status, created_at";

/// Repository for the credit_cards table
pub struct CardRepository;

/// Fields of a card row that has not been inserted yet
pub struct NewCard<'a> {
    pub user_id: UserId,
    pub card_number: &'a str,
    pub cvv: &'a str,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub credit_limit: Decimal,
}

impl CardRepository {
    fn from_row(row: &Row) -> rusqlite::Result<CreditCard> {
        let status: String = row.get(8)?;
        Ok(CreditCard {
            id: row.get(0)?,
            user_id: row.get(1)?,
            card_number: row.get(2)?,
            cvv: row.get(3)?,
            expiry_month: row.get(4)?,
            expiry_year: row.get(5)?,
            credit_limit: decimal_at(row, 6)?,
            current_balance: decimal_at(row, 7)?,
            status: CardStatus::from_str(&status).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(8, Type::Text, e.into())
            })?,
            created_at: timestamp_at(row, 9)?,
        })
    }

    pub fn insert(conn: &Connection, card: &NewCard) -> LedgerResult<CreditCard> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO credit_cards (user_id, card_number, cvv, expiry_month, expiry_year,
                                       credit_limit, current_balance, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, '0', ?7, ?8)",
            params![
                card.user_id,
                card.card_number,
                card.cvv,
                card.expiry_month,
                card.expiry_year,
                card.credit_limit.to_string(),
                CardStatus::Active.as_str(),
                now.to_rfc3339(),
            ],
        ).map_err(map_insert_error)?;

        Ok(CreditCard {
            id: conn.last_insert_rowid(),
            user_id: card.user_id,
            card_number: card.card_number.to_string(),
            cvv: card.cvv.to_string(),
            expiry_month: card.expiry_month,
            expiry_year: card.expiry_year,
            credit_limit: card.credit_limit,
            current_balance: Decimal::ZERO,
            status: CardStatus::Active,
            created_at: now,
        })
    }

    pub fn find(conn: &Connection, id: CardId) -> LedgerResult<CreditCard> {
        conn.query_row(
            &format!("SELECT {} FROM credit_cards WHERE id = ?1", CARD_COLUMNS),
            params![id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| LedgerError::not_found("Credit card", id))
    }

    /// Find a card only if it belongs to `user_id`
    pub fn find_owned(conn: &Connection, user_id: UserId, id: CardId) -> LedgerResult<CreditCard> {
        let card = Self::find(conn, id)?;
        if card.user_id != user_id {
            return Err(LedgerError::not_found("Credit card", id));
        }
        Ok(card)
    }

    pub fn list_by_user(conn: &Connection, user_id: UserId) -> LedgerResult<Vec<CreditCard>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM credit_cards WHERE user_id = ?1 ORDER BY id",
            CARD_COLUMNS
        ))?;
        let cards = stmt
            .query_map(params![user_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    /// Add `delta` to the owed balance, keeping it within `[0, credit_limit]`
    pub fn apply_delta(conn: &Connection, id: CardId, delta: Decimal) -> LedgerResult<Decimal> {
        let (stored, limit_text): (String, String) = conn
            .query_row(
                "SELECT current_balance, credit_limit FROM credit_cards WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| LedgerError::not_found("Credit card", id))?;
        let current = parse_stored_decimal(&stored)?;
        let limit = parse_stored_decimal(&limit_text)?;

        // A sum past Decimal::MAX is necessarily past the limit too
        let updated = current.checked_add(delta).ok_or(LedgerError::CreditLimitExceeded {
            limit,
            requested: Decimal::MAX,
        })?;
        if updated > limit {
            return Err(LedgerError::CreditLimitExceeded { limit, requested: updated });
        }
        if updated < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(-delta));
        }

        let changed = conn.execute(
            "UPDATE credit_cards SET current_balance = ?1 WHERE id = ?2 AND current_balance = ?3",
            params![updated.to_string(), id, stored],
        )?;
        if changed != 1 {
            return Err(LedgerError::ConcurrentModification(format!("credit card {}", id)));
        }

        debug!("Card {} balance {} -> {}", id, current, updated);
        Ok(updated)
    }

    pub fn set_status(conn: &Connection, id: CardId, status: CardStatus) -> LedgerResult<()> {
        let changed = conn.execute(
            "UPDATE credit_cards SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(LedgerError::not_found("Credit card", id));
        }
        Ok(())
    }
}

// ============================================================================
// Transaction Repository
// ============================================================================

/// Repository for the append-only transactions table
pub struct TransactionRepository;

impl TransactionRepository {
    fn from_row(row: &Row) -> rusqlite::Result<Transaction> {
        let kind: String = row.get(2)?;
        Ok(Transaction {
            id: row.get(0)?,
            account_id: row.get(1)?,
            kind: TransactionKind::from_str(&kind).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into())
            })?,
            amount: decimal_at(row, 3)?,
            timestamp: timestamp_at(row, 4)?,
            description: row.get(5)?,
            related_account_id: row.get(6)?,
            interac_email: row.get(7)?,
            reference: row.get(8)?,
        })
    }

    pub fn insert(conn: &Connection, new: &NewTransaction) -> LedgerResult<Transaction> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO transactions (account_id, kind, amount, timestamp, description,
                                       related_account_id, interac_email, reference)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new.account_id,
                new.kind.as_str(),
                new.amount.to_string(),
                now.to_rfc3339(),
                new.description,
                new.related_account_id,
                new.interac_email,
                new.reference,
            ],
        )?;

        Ok(Transaction {
            id: conn.last_insert_rowid(),
            account_id: new.account_id,
            kind: new.kind,
            amount: new.amount,
            timestamp: now,
            description: new.description.to_string(),
            related_account_id: new.related_account_id,
            interac_email: new.interac_email.map(str::to_string),
            reference: new.reference.map(str::to_string),
        })
    }

    /// Newest first
    pub fn list_by_account(conn: &Connection, account_id: AccountId, limit: Option<usize>) -> LedgerResult<Vec<Transaction>> {
        let mut stmt = conn.prepare(
            "SELECT id, account_id, kind, amount, timestamp, description,
                    related_account_id, interac_email, reference
             FROM transactions
             WHERE account_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let transactions = stmt
            .query_map(params![account_id, limit_value(limit)], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(transactions)
    }
}

// ============================================================================
// Interac Repository
// ============================================================================

/// Repository for the interac_registrations table
pub struct InteracRepository;

impl InteracRepository {
    fn from_row(row: &Row) -> rusqlite::Result<InteracRegistration> {
        Ok(InteracRegistration {
            id: row.get(0)?,
            user_id: row.get(1)?,
            account_id: row.get(2)?,
            email: row.get(3)?,
        })
    }

    pub fn find_by_email(conn: &Connection, email: &str) -> LedgerResult<Option<InteracRegistration>> {
        let registration = conn
            .query_row(
                "SELECT id, user_id, account_id, email FROM interac_registrations WHERE email = ?1",
                params![email],
                Self::from_row,
            )
            .optional()?;
        Ok(registration)
    }

    pub fn insert(conn: &Connection, user_id: UserId, account_id: AccountId, email: &str) -> LedgerResult<InteracRegistration> {
        conn.execute(
            "INSERT INTO interac_registrations (user_id, account_id, email) VALUES (?1, ?2, ?3)",
            params![user_id, account_id, email],
        ).map_err(map_insert_error)?;

        Ok(InteracRegistration {
            id: conn.last_insert_rowid(),
            user_id,
            account_id,
            email: email.to_string(),
        })
    }

    pub fn repoint(conn: &Connection, id: i64, account_id: AccountId) -> LedgerResult<()> {
        conn.execute(
            "UPDATE interac_registrations SET account_id = ?1 WHERE id = ?2",
            params![account_id, id],
        )?;
        Ok(())
    }

    pub fn list_by_user(conn: &Connection, user_id: UserId) -> LedgerResult<Vec<InteracRegistration>> {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, account_id, email FROM interac_registrations WHERE user_id = ?1 ORDER BY email",
        )?;
        let registrations = stmt
            .query_map(params![user_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(registrations)
    }
}

// ============================================================================
// Bill Repository
// ============================================================================

/// Repository for the bill_payees and bill_payments tables
pub struct BillRepository;

impl BillRepository {
    fn payee_from_row(row: &Row) -> rusqlite::Result<BillPayee> {
        Ok(BillPayee {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
        })
    }

    fn payment_from_row(row: &Row) -> rusqlite::Result<BillPayment> {
        Ok(BillPayment {
            id: row.get(0)?,
            user_id: row.get(1)?,
            from_account_id: row.get(2)?,
            payee_id: row.get(3)?,
            amount: decimal_at(row, 4)?,
            timestamp: timestamp_at(row, 5)?,
            reference: row.get(6)?,
        })
    }

    pub fn insert_payee(conn: &Connection, name: &str, category: Option<&str>) -> LedgerResult<BillPayee> {
        conn.execute(
            "INSERT INTO bill_payees (name, category) VALUES (?1, ?2)",
            params![name, category],
        )?;

        Ok(BillPayee {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            category: category.map(str::to_string),
        })
    }

    pub fn find_payee(conn: &Connection, id: PayeeId) -> LedgerResult<BillPayee> {
        conn.query_row(
            "SELECT id, name, category FROM bill_payees WHERE id = ?1",
            params![id],
            Self::payee_from_row,
        )
        .optional()?
        .ok_or_else(|| LedgerError::not_found("Bill payee", id))
    }

    pub fn list_payees(conn: &Connection) -> LedgerResult<Vec<BillPayee>> {
        let mut stmt = conn.prepare("SELECT id, name, category FROM bill_payees ORDER BY name")?;
        let payees = stmt
            .query_map([], Self::payee_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(payees)
    }

    pub fn insert_payment(
        conn: &Connection,
        user_id: UserId,
        from_account_id: AccountId,
        payee_id: PayeeId,
        amount: Decimal,
        reference: &str,
    ) -> LedgerResult<BillPayment> {
        let now = Utc::now();
        conn.execute(
            "INSERT INTO bill_payments (user_id, from_account_id, payee_id, amount, timestamp, reference)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user_id, from_account_id, payee_id, amount.to_string(), now.to_rfc3339(), reference],
        )?;

        Ok(BillPayment {
            id: conn.last_insert_rowid(),
            user_id,
            from_account_id,
            payee_id,
            amount,
            timestamp: now,
            reference: Some(reference.to_string()),
        })
    }

    /// Newest first
    pub fn list_payments_by_user(conn: &Connection, user_id: UserId, limit: Option<usize>) -> LedgerResult<Vec<BillPayment>> {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, from_account_id, payee_id, amount, timestamp, reference
             FROM bill_payments
             WHERE user_id = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;
        let payments = stmt
            .query_map(params![user_id, limit_value(limit)], Self::payment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(payments)
    }
}
