use anyhow::{anyhow, Result};
use rust_decimal::Decimal;

use bluebank_ledger::database::models::CardStatus;
use bluebank_ledger::{Ledger, LedgerError};

use super::utils::money;

// ============================================================================
// Interac
// ============================================================================

pub fn register_interac(ledger: &Ledger, user_id: i64, account_id: i64, email: &str) -> Result<()> {
    let registration = ledger.register_interac(user_id, account_id, email)?;
    println!(
        "✅ Interac e-Transfers to {} will be deposited into account {}",
        registration.email, registration.account_id
    );
    Ok(())
}

pub fn send_interac(ledger: &Ledger, from: i64, email: &str, amount: Decimal) -> Result<()> {
    match ledger.interac_transfer(from, email, amount) {
        Ok(receipt) => {
            println!("✅ Sent {} to {}", money(amount), email.trim());
            println!("Reference: {}", receipt.reference);
            println!("Remaining balance: {}", money(receipt.from_balance));
            Ok(())
        }
        Err(LedgerError::RecipientNotRegistered(email)) => {
            Err(anyhow!("No account is registered for Interac e-Transfers to {}", email))
        }
        Err(e) => Err(anyhow!("Interac e-Transfer failed: {}", e)),
    }
}

pub fn list_interac(ledger: &Ledger, user_id: i64) -> Result<()> {
    let registrations = ledger.list_interac_registrations(user_id)?;
    if registrations.is_empty() {
        println!("No Interac emails registered.");
        return Ok(());
    }

    println!("{:<40} {:<10}", "EMAIL", "ACCOUNT");
    println!("{:-<40} {:-<10}", "", "");
    for registration in registrations {
        println!("{:<40} {:<10}", registration.email, registration.account_id);
    }
    Ok(())
}

// ============================================================================
// Credit cards
// ============================================================================

pub fn issue_card(ledger: &Ledger, user_id: i64, limit: Decimal) -> Result<()> {
    let card = ledger.issue_card(user_id, limit)?;

    println!("✅ Card issued!");
    println!("Card ID: {}", card.id);
    println!("Number: {}", card.card_number);
    println!("CVV: {}", card.cvv);
    println!("Expires: {:02}/{}", card.expiry_month, card.expiry_year);
    println!("Credit limit: {}", money(card.credit_limit));
    Ok(())
}

pub fn spend(ledger: &Ledger, card_id: i64, amount: Decimal) -> Result<()> {
    let card = ledger.spend(card_id, amount)?;

    println!("✅ Charged {} to card {}", money(amount), card.masked_number());
    println!("Balance owing: {}", money(card.current_balance));
    println!("Available credit: {}", money(card.available_credit()));
    Ok(())
}

pub fn pay_card(ledger: &Ledger, user_id: i64, from: i64, card_id: i64, amount: Decimal) -> Result<()> {
    let payment = ledger.pay_card(user_id, from, card_id, amount)?;

    if payment.transaction.is_none() {
        println!("Nothing is owed on card {}.", payment.card.masked_number());
        return Ok(());
    }

    println!("✅ Paid {} to card {}", money(payment.amount_paid), payment.card.masked_number());
    if payment.amount_paid < amount {
        println!("Payment was capped to the outstanding balance.");
    }
    println!("Balance owing: {}", money(payment.card.current_balance));
    Ok(())
}

pub fn list_cards(ledger: &Ledger, user_id: i64) -> Result<()> {
    let cards = ledger.list_cards(user_id)?;
    if cards.is_empty() {
        println!("No cards found.");
        return Ok(());
    }

    println!("{:<6} {:<18} {:<8} {:>12} {:>12} {:<8}", "ID", "NUMBER", "EXPIRES", "LIMIT", "OWING", "STATUS");
    println!("{:-<6} {:-<18} {:-<8} {:->12} {:->12} {:-<8}", "", "", "", "", "", "");
    for card in cards {
        println!(
            "{:<6} {:<18} {:<8} {:>12} {:>12} {:<8}",
            card.id,
            card.masked_number(),
            format!("{:02}/{}", card.expiry_month, card.expiry_year),
            money(card.credit_limit),
            money(card.current_balance),
            card.status.as_str(),
        );
    }
    Ok(())
}

pub fn freeze_card(ledger: &Ledger, user_id: i64, card_id: i64, freeze: bool) -> Result<()> {
    let status = if freeze { CardStatus::Frozen } else { CardStatus::Active };
    let card = ledger.set_card_status(user_id, card_id, status)?;

    println!("✅ Card {} is now {}", card.masked_number(), card.status.as_str());
    Ok(())
}

// ============================================================================
// Bills
// ============================================================================

pub fn add_payee(ledger: &Ledger, name: &str, category: Option<&str>) -> Result<()> {
    let payee = ledger.add_payee(name, category)?;
    println!("✅ Payee {} added with ID {}", payee.name, payee.id);
    Ok(())
}

pub fn list_payees(ledger: &Ledger) -> Result<()> {
    let payees = ledger.list_payees()?;
    if payees.is_empty() {
        println!("No payees found.");
        return Ok(());
    }

    println!("{:<6} {:<30} {:<20}", "ID", "NAME", "CATEGORY");
    println!("{:-<6} {:-<30} {:-<20}", "", "", "");
    for payee in payees {
        println!("{:<6} {:<30} {:<20}", payee.id, payee.name, payee.category.unwrap_or_default());
    }
    Ok(())
}

pub fn pay_bill(
    ledger: &Ledger,
    user_id: i64,
    from: i64,
    payee_id: i64,
    amount: Decimal,
    reference: Option<&str>,
) -> Result<()> {
    let payment = ledger.pay_bill(user_id, from, payee_id, amount, reference)?;

    println!("✅ Paid {} to payee {}", money(payment.amount), payee_id);
    if let Some(reference) = payment.reference {
        println!("Reference: {}", reference);
    }
    Ok(())
}

pub fn bill_history(ledger: &Ledger, user_id: i64, limit: usize) -> Result<()> {
    let payments = ledger.list_bill_payments(user_id, Some(limit))?;
    if payments.is_empty() {
        println!("No bill payments found.");
        return Ok(());
    }

    println!("{:<25} {:<8} {:<8} {:>12}  {}", "TIMESTAMP", "PAYEE", "ACCOUNT", "AMOUNT", "REFERENCE");
    println!("{:-<25} {:-<8} {:-<8} {:->12}  {:-<20}", "", "", "", "", "");
    for payment in payments {
        println!(
            "{:<25} {:<8} {:<8} {:>12}  {}",
            payment.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            payment.payee_id,
            payment.from_account_id,
            money(payment.amount),
            payment.reference.unwrap_or_default(),
        );
    }
    Ok(())
}
