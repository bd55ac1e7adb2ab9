use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;

pub type UserId = i64;
pub type AccountId = i64;
pub type CardId = i64;
pub type PayeeId = i64;

/// User model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub dob: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Account type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum AccountType {
    Chequing,
    Savings,
    Other(String),
}

impl AccountType {
    pub fn as_str(&self) -> &str {
        match self {
            AccountType::Chequing => "Chequing",
            AccountType::Savings => "Savings",
            AccountType::Other(name) => name.as_str(),
        }
    }

    /// Parse a stored or user-supplied account type; unknown names are kept verbatim
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        match trimmed.to_lowercase().as_str() {
            "chequing" | "checking" => AccountType::Chequing,
            "savings" => AccountType::Savings,
            _ => AccountType::Other(trimmed.to_string()),
        }
    }

    pub fn is_savings(&self) -> bool {
        match self {
            AccountType::Savings => true,
            AccountType::Chequing => false,
            AccountType::Other(name) => name.to_lowercase().contains("sav"),
        }
    }
}

/// Account model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub user_id: UserId,
    pub account_number: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub interest_rate: Decimal,
    pub last_interest_applied: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Credit card status
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum CardStatus {
    Active,
    Frozen,
    Closed,
}

impl CardStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CardStatus::Active => "Active",
            CardStatus::Frozen => "Frozen",
            CardStatus::Closed => "Closed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "active" => Ok(CardStatus::Active),
            "frozen" => Ok(CardStatus::Frozen),
            "closed" => Ok(CardStatus::Closed),
            _ => Err(format!("Invalid card status: {}", s)),
        }
    }
}

/// Credit card model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CreditCard {
    pub id: CardId,
    pub user_id: UserId,
    pub card_number: String,
    pub cvv: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub credit_limit: Decimal,
    pub current_balance: Decimal,
    pub status: CardStatus,
    pub created_at: DateTime<Utc>,
}

impl CreditCard {
    /// Credit still available for spending
    pub fn available_credit(&self) -> Decimal {
        self.credit_limit - self.current_balance
    }

    /// Card number with all but the last four digits hidden
    pub fn masked_number(&self) -> String {
        let len = self.card_number.len();
        if len <= 4 {
            return self.card_number.clone();
        }
        format!("{}{}", "*".repeat(len - 4), &self.card_number[len - 4..])
    }
}

/// Kind of a ledger transaction
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferOut,
    TransferIn,
    InteracOut,
    InteracIn,
    BillPayment,
    CreditCardPayment,
    Interest,
}

impl TransactionKind {
    pub fn as_str(&self) -> &str {
        match self {
            TransactionKind::Deposit => "Deposit",
            TransactionKind::Withdrawal => "Withdrawal",
            TransactionKind::TransferOut => "Transfer Out",
            TransactionKind::TransferIn => "Transfer In",
            TransactionKind::InteracOut => "Interac Out",
            TransactionKind::InteracIn => "Interac In",
            TransactionKind::BillPayment => "Bill Payment",
            TransactionKind::CreditCardPayment => "Credit Card Payment",
            TransactionKind::Interest => "Interest",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "Deposit" => Ok(TransactionKind::Deposit),
            "Withdrawal" => Ok(TransactionKind::Withdrawal),
            "Transfer Out" => Ok(TransactionKind::TransferOut),
            "Transfer In" => Ok(TransactionKind::TransferIn),
            "Interac Out" => Ok(TransactionKind::InteracOut),
            "Interac In" => Ok(TransactionKind::InteracIn),
            "Bill Payment" => Ok(TransactionKind::BillPayment),
            "Credit Card Payment" => Ok(TransactionKind::CreditCardPayment),
            "Interest" => Ok(TransactionKind::Interest),
            _ => Err(format!("Invalid transaction kind: {}", s)),
        }
    }

    /// Whether this kind adds money to the account it is recorded on
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            TransactionKind::Deposit
                | TransactionKind::TransferIn
                | TransactionKind::InteracIn
                | TransactionKind::Interest
        )
    }

    /// Apply the direction of this kind to an unsigned amount
    pub fn signed(&self, amount: Decimal) -> Decimal {
        if self.is_credit() {
            amount
        } else {
            -amount
        }
    }
}

/// Transaction model, append-only
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub related_account_id: Option<AccountId>,
    pub interac_email: Option<String>,
    pub reference: Option<String>,
}

/// A transaction that has not been written yet
#[derive(Debug, Clone)]
pub struct NewTransaction<'a> {
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub description: &'a str,
    pub related_account_id: Option<AccountId>,
    pub interac_email: Option<&'a str>,
    pub reference: Option<&'a str>,
}

impl<'a> NewTransaction<'a> {
    pub fn new(account_id: AccountId, kind: TransactionKind, amount: Decimal, description: &'a str) -> Self {
        Self {
            account_id,
            kind,
            amount,
            description,
            related_account_id: None,
            interac_email: None,
            reference: None,
        }
    }

    pub fn related_to(mut self, account_id: AccountId) -> Self {
        self.related_account_id = Some(account_id);
        self
    }

    pub fn with_email(mut self, email: Option<&'a str>) -> Self {
        self.interac_email = email;
        self
    }

    pub fn with_reference(mut self, reference: &'a str) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// Interac registration model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InteracRegistration {
    pub id: i64,
    pub user_id: UserId,
    pub account_id: AccountId,
    pub email: String,
}

/// Bill payee model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BillPayee {
    pub id: PayeeId,
    pub name: String,
    pub category: Option<String>,
}

/// Bill payment model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BillPayment {
    pub id: i64,
    pub user_id: UserId,
    pub from_account_id: AccountId,
    pub payee_id: PayeeId,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub reference: Option<String>,
}
