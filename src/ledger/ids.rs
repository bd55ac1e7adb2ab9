use log::warn;
use rand::Rng;

use super::{LedgerError, LedgerResult};

/// Source of externally visible account and card identifiers
///
/// Implementations are not required to produce unique values; the store's
/// UNIQUE constraints catch collisions and the ledger retries.
#[cfg_attr(test, mockall::automock)]
pub trait IdGenerator: Send + Sync {
    /// Account number: fixed prefix followed by a random block
    fn account_number(&self) -> String;

    /// Card number: two concatenated random blocks
    fn card_number(&self) -> String;

    /// Three-digit card verification value
    fn cvv(&self) -> String;
}

/// Generates identifiers from the thread-local RNG
pub struct RandomIdGenerator {
    account_prefix: String,
}

impl RandomIdGenerator {
    pub fn new(account_prefix: impl Into<String>) -> Self {
        Self {
            account_prefix: account_prefix.into(),
        }
    }
}

impl IdGenerator for RandomIdGenerator {
    fn account_number(&self) -> String {
        let block: u32 = rand::thread_rng().gen_range(100_000..=999_999);
        format!("{}{}", self.account_prefix, block)
    }

    fn card_number(&self) -> String {
        let mut rng = rand::thread_rng();
        let first: u32 = rng.gen_range(10_000_000..=99_999_999);
        let second: u32 = rng.gen_range(10_000_000..=99_999_999);
        format!("{}{}", first, second)
    }

    fn cvv(&self) -> String {
        let cvv: u16 = rand::thread_rng().gen_range(100..=999);
        cvv.to_string()
    }
}

/// Run `insert` with freshly generated identifiers until one is accepted
///
/// Only `DuplicateKey` triggers another attempt; after `attempts` collisions
/// the last `DuplicateKey` is returned to the caller.
pub(crate) fn with_fresh_identifier<T, G, I>(
    what: &str,
    attempts: u32,
    mut generate: G,
    mut insert: I,
) -> LedgerResult<T>
where
    G: FnMut() -> String,
    I: FnMut(&str) -> LedgerResult<T>,
{
    let attempts = attempts.max(1);
    let mut last_collision = None;

    for attempt in 1..=attempts {
        let candidate = generate();
        match insert(&candidate) {
            Err(LedgerError::DuplicateKey(key)) => {
                warn!("Generated {} collided ({}), attempt {}/{}", what, key, attempt, attempts);
                last_collision = Some(key);
            }
            other => return other,
        }
    }

    Err(LedgerError::DuplicateKey(
        last_collision.unwrap_or_else(|| what.to_string()),
    ))
}
