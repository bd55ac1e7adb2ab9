use chrono::NaiveDate;
use lazy_static::lazy_static;
use log::info;
use regex::Regex;

use super::{Ledger, LedgerError, LedgerResult};
use crate::database::models::{User, UserId};
use crate::database::repository::UserRepository;

lazy_static! {
    static ref EMAIL_PATTERN: Regex =
        Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9-]+(\.[a-z0-9-]+)*\.[a-z]{2,}$").expect("valid email pattern");
}

/// Trim and lower-case an email address, rejecting anything malformed
pub(crate) fn normalize_email(email: &str) -> LedgerResult<String> {
    let normalized = email.trim().to_lowercase();
    if !EMAIL_PATTERN.is_match(&normalized) {
        return Err(LedgerError::InvalidEmail(email.to_string()));
    }
    Ok(normalized)
}

impl Ledger {
    /// Register the owner of accounts and cards
    pub fn register_user(&self, email: &str, username: &str, dob: Option<NaiveDate>) -> LedgerResult<User> {
        let email = normalize_email(email)?;
        let username = username.trim();
        if username.is_empty() {
            return Err(LedgerError::InvalidInput("username must not be empty".to_string()));
        }

        let user = self
            .store
            .unit_of_work(|tx| UserRepository::insert(tx, &email, username, dob))?;

        info!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    pub fn get_user(&self, user_id: UserId) -> LedgerResult<User> {
        let conn = self.store.connection()?;
        UserRepository::find(&conn, user_id)
    }

    /// Delete a user together with everything they own
    pub fn delete_user(&self, user_id: UserId) -> LedgerResult<()> {
        self.store.unit_of_work(|tx| UserRepository::delete(tx, user_id))?;
        info!("Deleted user {} and all owned records", user_id);
        Ok(())
    }
}
