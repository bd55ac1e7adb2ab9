use rust_decimal::Decimal;
use thiserror::Error;

/// Errors returned by ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Invalid interest rate: {0}")]
    InvalidRate(Decimal),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Credit limit exceeded: limit {limit}, balance after charge {requested}")]
    CreditLimitExceeded { limit: Decimal, requested: Decimal },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Interac recipient not registered: {0}")]
    RecipientNotRegistered(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Source and destination accounts are the same")]
    SameAccount,

    #[error("Card {0} is not active")]
    CardInactive(i64),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Amount out of range: {0}")]
    Overflow(String),

    #[error("Row changed during the unit of work: {0}")]
    ConcurrentModification(String),

    #[error("Stored value is corrupt: {0}")]
    CorruptValue(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn insufficient_funds(required: Decimal, available: Decimal) -> Self {
        Self::InsufficientFunds { required, available }
    }
}

/// Add up amounts, failing instead of overflowing
pub(crate) fn checked_total<I>(what: &str, amounts: I) -> LedgerResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |total, amount| {
        total
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(what.to_string()))
    })
}

/// Reject zero and negative amounts
pub(crate) fn ensure_positive(amount: Decimal) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(())
}
