use anyhow::{anyhow, Result};
use chrono::NaiveDate;

use bluebank_ledger::Ledger;

use super::utils::confirm;

/// Register a new user
pub fn create_user(ledger: &Ledger, email: &str, username: &str, dob: Option<NaiveDate>) -> Result<()> {
    let user = ledger
        .register_user(email, username, dob)
        .map_err(|e| anyhow!("Failed to create user: {}", e))?;

    println!("✅ User created successfully!");
    println!("User ID: {}", user.id);
    println!("Email: {}", user.email);
    println!("Name: {}", user.username);
    Ok(())
}

/// Show user details
pub fn show_user(ledger: &Ledger, user_id: i64) -> Result<()> {
    let user = ledger.get_user(user_id)?;

    println!("User Details:");
    println!("ID: {}", user.id);
    println!("Email: {}", user.email);
    println!("Name: {}", user.username);
    if let Some(dob) = user.dob {
        println!("Date of birth: {}", dob);
    }
    println!("Created: {}", user.created_at);
    Ok(())
}

/// Delete a user after confirmation
pub fn delete_user(ledger: &Ledger, user_id: i64, skip_confirmation: bool) -> Result<()> {
    let user = ledger.get_user(user_id)?;

    if !skip_confirmation {
        let prompt = format!(
            "Delete {} ({}) with all accounts, cards and payments?",
            user.username, user.email
        );
        if !confirm(&prompt)? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    ledger.delete_user(user_id)?;
    println!("✅ User {} deleted.", user_id);
    Ok(())
}
