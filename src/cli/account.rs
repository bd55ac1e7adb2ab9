use anyhow::{anyhow, Result};
use log::warn;
use rust_decimal::Decimal;

use bluebank_ledger::database::models::AccountType;
use bluebank_ledger::Ledger;

use super::utils::money;

/// Open a new account
pub fn open_account(
    ledger: &Ledger,
    user_id: i64,
    account_type_str: &str,
    initial_balance: Decimal,
    rate: Option<Decimal>,
) -> Result<()> {
    let account_type = AccountType::parse(account_type_str);

    // Savings accounts earn the configured default unless told otherwise
    let interest_rate = match rate {
        Some(rate) => rate,
        None if account_type.is_savings() => ledger.config().default_savings_rate,
        None => Decimal::ZERO,
    };

    let account = ledger
        .create_account(user_id, account_type, initial_balance, interest_rate)
        .map_err(|e| anyhow!("Failed to create account: {}", e))?;

    println!("✅ Account created successfully!");
    println!("Account ID: {}", account.id);
    println!("Account number: {}", account.account_number);
    println!("Type: {}", account.account_type.as_str());
    println!("Balance: {}", money(account.balance));
    if let Some(percent) = account.interest_rate.checked_mul(Decimal::ONE_HUNDRED) {
        if percent > Decimal::ZERO {
            println!("Interest rate: {}%", percent);
        }
    }
    Ok(())
}

pub fn deposit(ledger: &Ledger, account_id: i64, amount: Decimal) -> Result<()> {
    let transaction = ledger.deposit(account_id, amount)?;
    let account = ledger.get_account(account_id)?;

    println!("✅ Deposited {} (transaction {})", money(transaction.amount), transaction.id);
    println!("New balance: {}", money(account.balance));
    Ok(())
}

pub fn withdraw(ledger: &Ledger, account_id: i64, amount: Decimal) -> Result<()> {
    let transaction = ledger.withdraw(account_id, amount)?;
    let account = ledger.get_account(account_id)?;

    println!("✅ Withdrew {} (transaction {})", money(transaction.amount), transaction.id);
    println!("New balance: {}", money(account.balance));
    Ok(())
}

pub fn transfer(ledger: &Ledger, from: i64, to: i64, amount: Decimal) -> Result<()> {
    let receipt = ledger.transfer_internal(from, to, amount)?;

    println!("✅ Transferred {} from account {} to account {}", money(amount), from, to);
    println!("Reference: {}", receipt.reference);
    println!("Source balance: {}", money(receipt.from_balance));
    Ok(())
}

/// List user accounts
pub fn list_accounts(ledger: &Ledger, user_id: i64) -> Result<()> {
    let accounts = ledger.list_accounts(user_id)?;
    if accounts.is_empty() {
        println!("No accounts found.");
        return Ok(());
    }

    println!("{:<6} {:<12} {:<12} {:>14} {:>8}", "ID", "NUMBER", "TYPE", "BALANCE", "RATE");
    println!("{:-<6} {:-<12} {:-<12} {:->14} {:->8}", "", "", "", "", "");

    for account in accounts {
        println!(
            "{:<6} {:<12} {:<12} {:>14} {:>8}",
            account.id,
            account.account_number,
            account.account_type.as_str(),
            money(account.balance),
            account.interest_rate.to_string(),
        );
    }
    Ok(())
}

/// Show transaction history
pub fn show_history(ledger: &Ledger, account_id: i64, limit: usize) -> Result<()> {
    let transactions = ledger.list_transactions(account_id, Some(limit))?;
    if transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    println!("{:<25} {:<20} {:>14}  {}", "TIMESTAMP", "TYPE", "AMOUNT", "DESCRIPTION");
    println!("{:-<25} {:-<20} {:->14}  {:-<30}", "", "", "", "");

    for transaction in transactions {
        let sign = if transaction.kind.is_credit() { "+" } else { "-" };
        let mut description = transaction.description.clone();
        if let Some(email) = &transaction.interac_email {
            description.push_str(&format!(" ({})", email));
        }
        println!(
            "{:<25} {:<20} {:>14}  {}",
            transaction.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            transaction.kind.as_str(),
            format!("{}{}", sign, money(transaction.amount)),
            description,
        );
    }
    Ok(())
}

/// Show dashboard totals
pub fn show_overview(ledger: &Ledger, user_id: i64) -> Result<()> {
    let overview = ledger.account_overview(user_id)?;

    println!("Accounts: {}", overview.account_count);
    println!("Total balance: {}", money(overview.total_balance));
    println!("Savings: {}", money(overview.savings_balance));
    Ok(())
}

pub fn reconcile(ledger: &Ledger, account_id: i64) -> Result<()> {
    let report = ledger.reconcile(account_id)?;

    println!("Stored balance: {}", report.stored_balance);
    println!("Replayed balance: {} ({} transactions)", report.replayed_balance, report.transaction_count);

    if report.is_consistent() {
        println!("✅ Account {} is consistent.", account_id);
        Ok(())
    } else {
        warn!(
            "Account {} does not reconcile: stored {}, replayed {}",
            account_id, report.stored_balance, report.replayed_balance
        );
        Err(anyhow!("Account {} does not reconcile", account_id))
    }
}

pub fn apply_interest(ledger: &Ledger, user_id: i64) -> Result<()> {
    let credited = ledger.apply_interest_for_user(user_id)?;

    if credited > Decimal::ZERO {
        println!("✅ Credited {} in interest.", credited);
    } else {
        println!("No interest due.");
    }
    Ok(())
}
