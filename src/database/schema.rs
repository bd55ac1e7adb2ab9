use anyhow::{Result, Context};
use log::debug;
use rusqlite::Connection;

/// Create the ledger schema
///
/// Money columns hold canonical decimal text so no value ever passes through
/// binary floating point.
pub fn create_schema(conn: &Connection) -> Result<()> {
    debug!("Creating database schema");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT UNIQUE NOT NULL,
            username TEXT NOT NULL,
            dob TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    ).context("Failed to create users table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            account_number TEXT UNIQUE NOT NULL,
            account_type TEXT NOT NULL,
            balance TEXT NOT NULL DEFAULT '0',
            interest_rate TEXT NOT NULL DEFAULT '0',
            last_interest_applied TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    ).context("Failed to create accounts table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS credit_cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            card_number TEXT UNIQUE NOT NULL,
            cvv TEXT NOT NULL,
            expiry_month INTEGER NOT NULL,
            expiry_year INTEGER NOT NULL,
            credit_limit TEXT NOT NULL,
            current_balance TEXT NOT NULL DEFAULT '0',
            status TEXT NOT NULL DEFAULT 'Active',
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    ).context("Failed to create credit_cards table")?;

    // Append-only audit trail
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            amount TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            description TEXT NOT NULL,
            related_account_id INTEGER,
            interac_email TEXT,
            reference TEXT,
            FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
        )",
        [],
    ).context("Failed to create transactions table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS interac_registrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            email TEXT UNIQUE NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
        )",
        [],
    ).context("Failed to create interac_registrations table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bill_payees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            category TEXT
        )",
        [],
    ).context("Failed to create bill_payees table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bill_payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            from_account_id INTEGER NOT NULL,
            payee_id INTEGER NOT NULL,
            amount TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            reference TEXT,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (from_account_id) REFERENCES accounts(id) ON DELETE CASCADE,
            FOREIGN KEY (payee_id) REFERENCES bill_payees(id) ON DELETE CASCADE
        )",
        [],
    ).context("Failed to create bill_payments table")?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_accounts_user_id ON accounts(user_id)", [])
        .context("Failed to create index on accounts.user_id")?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_credit_cards_user_id ON credit_cards(user_id)", [])
        .context("Failed to create index on credit_cards.user_id")?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_transactions_account_id ON transactions(account_id)", [])
        .context("Failed to create index on transactions.account_id")?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_bill_payments_user_id ON bill_payments(user_id)", [])
        .context("Failed to create index on bill_payments.user_id")?;

    // The audit trail is never rewritten
    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS transactions_no_update
        BEFORE UPDATE ON transactions
        BEGIN
            SELECT RAISE(ABORT, 'transactions are append-only');
        END;",
        [],
    ).context("Failed to create transactions_no_update trigger")?;

    debug!("Database schema created successfully");
    Ok(())
}
