use chrono::{Duration, NaiveDate, Utc};
use log::{debug, info};
use rust_decimal::Decimal;

use super::{checked_total, Ledger, LedgerError, LedgerResult};
use crate::config::InterestConfig;
use crate::database::models::{AccountId, NewTransaction, TransactionKind, UserId};
use crate::database::repository::{AccountRepository, TransactionRepository};

const MONTHS_PER_YEAR: u32 = 12;

/// Whole accrual periods between two dates; periods are fixed-length day
/// buckets, not calendar months
fn elapsed_periods(last_applied: NaiveDate, today: NaiveDate, period_days: i64) -> i64 {
    (today - last_applied).num_days() / period_days.max(1)
}

/// Compound `balance` once per period at `annual_rate / 12`, returning the
/// total interest earned. Each period's interest is rounded before it is added.
fn compound(balance: Decimal, annual_rate: Decimal, periods: i64, scale: u32) -> LedgerResult<Decimal> {
    let periodic_rate = annual_rate / Decimal::from(MONTHS_PER_YEAR);
    let overflow = || LedgerError::Overflow(format!("interest on {} at {}", balance, annual_rate));

    let mut running = balance;
    for _ in 0..periods {
        let earned = running.checked_mul(periodic_rate).ok_or_else(overflow)?.round_dp(scale);
        running = running.checked_add(earned).ok_or_else(overflow)?;
    }
    Ok(running - balance)
}

fn next_applied_date(
    last_applied: NaiveDate,
    today: NaiveDate,
    periods: i64,
    config: &InterestConfig,
) -> NaiveDate {
    if config.preserve_remainder_days {
        last_applied + Duration::days(periods * config.period_days.max(1))
    } else {
        today
    }
}

impl Ledger {
    /// Bring an account's interest up to today
    ///
    /// Returns the amount credited, zero when nothing was due.
    pub fn accrue_interest(&self, account_id: AccountId) -> LedgerResult<Decimal> {
        self.accrue_interest_as_of(account_id, Utc::now().date_naive())
    }

    /// Bring an account's interest up to `today`
    ///
    /// No-op for accounts without a rate or without a valid last-applied
    /// date, and whenever less than one full period has elapsed, so repeated
    /// calls within a period change nothing.
    pub fn accrue_interest_as_of(&self, account_id: AccountId, today: NaiveDate) -> LedgerResult<Decimal> {
        let config = &self.config.interest;

        let credited = self.store.unit_of_work(|tx| {
            let account = AccountRepository::find(tx, account_id)?;
            if account.interest_rate <= Decimal::ZERO {
                return Ok(Decimal::ZERO);
            }
            let last_applied = match account.last_interest_applied {
                Some(date) => date,
                None => {
                    debug!("Account {} has no interest date, skipping accrual", account_id);
                    return Ok(Decimal::ZERO);
                }
            };

            let periods = elapsed_periods(last_applied, today, config.period_days);
            if periods <= 0 {
                return Ok(Decimal::ZERO);
            }

            let interest = compound(account.balance, account.interest_rate, periods, config.posting_scale)?;
            if interest > Decimal::ZERO {
                AccountRepository::apply_delta(tx, account_id, interest)?;
            }

            let next_date = next_applied_date(last_applied, today, periods, config);
            AccountRepository::set_last_interest_applied(tx, account_id, next_date)?;

            let description = format!("Monthly interest credited ({} period(s))", periods);
            TransactionRepository::insert(
                tx,
                &NewTransaction::new(account_id, TransactionKind::Interest, interest, &description),
            )?;

            Ok(interest)
        })?;

        if credited > Decimal::ZERO {
            info!("Credited {} interest to account {}", credited, account_id);
        }
        Ok(credited)
    }

    /// Accrue interest on every interest-bearing account a user owns
    pub fn apply_interest_for_user(&self, user_id: UserId) -> LedgerResult<Decimal> {
        self.apply_interest_for_user_as_of(user_id, Utc::now().date_naive())
    }

    pub fn apply_interest_for_user_as_of(&self, user_id: UserId, today: NaiveDate) -> LedgerResult<Decimal> {
        let mut credited = Vec::new();
        for account in self.list_accounts(user_id)? {
            if account.interest_rate > Decimal::ZERO {
                credited.push(self.accrue_interest_as_of(account.id, today)?);
            }
        }
        checked_total("interest credited", credited)
    }
}
