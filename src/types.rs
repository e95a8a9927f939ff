//! Core types and data structures for the ledger

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map($name).map_err(|_| {
                    LedgerError::Validation(format!(
                        "'{}' is not a valid {}",
                        s,
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

id_type!(
    /// Identifier of a [`Category`]
    CategoryId
);
id_type!(
    /// Identifier of a [`SubAccount`]
    SubAccountId
);
id_type!(
    /// Identifier of a [`DetailAccount`]
    DetailAccountId
);
id_type!(
    /// Identifier of a [`Voucher`]
    VoucherId
);
id_type!(VoucherItemId);
id_type!(
    /// Identifier of a [`Person`]
    PersonId
);

/// Account types following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Assets - what the business owns (Cash, Bank, Receivables, etc.)
    Asset,
    /// Liabilities - what the business owes (Loans, Payables, etc.)
    Liability,
    /// Equity - owner's interest in the business (Capital, Retained Earnings, etc.)
    Equity,
    /// Income/Revenue - money earned by the business
    Income,
    /// Expenses - costs incurred by the business
    Expense,
}

impl AccountType {
    /// Returns the normal balance side ("nature") for this account type
    /// Assets and Expenses are debit-normal
    /// Liabilities, Equity, and Income are credit-normal
    pub fn normal_balance(&self) -> EntryType {
        match self {
            AccountType::Asset | AccountType::Expense => EntryType::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Income => EntryType::Credit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Income => "income",
            AccountType::Expense => "expense",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "income" | "revenue" => Ok(AccountType::Income),
            "expense" => Ok(AccountType::Expense),
            other => Err(LedgerError::Validation(format!(
                "unknown account type '{}': expected one of asset, liability, equity, income, expense",
                other
            ))),
        }
    }
}

/// Sides of a posting in double-entry bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Debit - increases Assets and Expenses, decreases Liabilities, Equity, and Income
    Debit,
    /// Credit - increases Liabilities, Equity, and Income, decreases Assets and Expenses
    Credit,
}

impl EntryType {
    /// Net movement of a debit/credit pair, signed so that the normal side is positive.
    pub fn signed(&self, debit: &BigDecimal, credit: &BigDecimal) -> BigDecimal {
        match self {
            EntryType::Debit => debit - credit,
            EntryType::Credit => credit - debit,
        }
    }
}

/// Top-level account classification ("حساب کل")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    /// Dash-segmented code, e.g. `"1"` or `"1-01"`
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub parent_id: Option<CategoryId>,
    pub created_at: NaiveDateTime,
}

/// Mid-level account under a category ("حساب معین")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAccount {
    pub id: SubAccountId,
    /// `"{categoryCode}-NNNN"`
    pub code: String,
    pub name: String,
    pub category_id: CategoryId,
    /// Running balance, positive on the account's normal side
    pub balance: BigDecimal,
    pub created_at: NaiveDateTime,
}

/// Leaf-level account under a sub-account ("حساب تفصیلی")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailAccount {
    pub id: DetailAccountId,
    /// `"{subAccountCode}-NN"`
    pub code: String,
    pub name: String,
    pub sub_account_id: SubAccountId,
    /// Running balance, positive on the parent account's normal side
    pub balance: BigDecimal,
    /// Weak back-reference to the person this account was provisioned for
    pub person_id: Option<PersonId>,
    pub created_at: NaiveDateTime,
}

/// A counterparty tied to its own detail account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub phone: Option<String>,
    pub detail_account_id: DetailAccountId,
    pub created_at: NaiveDateTime,
}

/// Account a voucher line is posted against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum AccountRef {
    SubAccount(SubAccountId),
    DetailAccount(DetailAccountId),
}

impl From<SubAccountId> for AccountRef {
    fn from(id: SubAccountId) -> Self {
        AccountRef::SubAccount(id)
    }
}

impl From<DetailAccountId> for AccountRef {
    fn from(id: DetailAccountId) -> Self {
        AccountRef::DetailAccount(id)
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountRef::SubAccount(id) => write!(f, "sub-account {}", id),
            AccountRef::DetailAccount(id) => write!(f, "detail account {}", id),
        }
    }
}

/// One debit or credit line of a voucher as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoucherItem {
    pub id: VoucherItemId,
    pub voucher_id: VoucherId,
    /// Always set; for detail postings this is the detail account's parent
    pub sub_account_id: SubAccountId,
    pub detail_account_id: Option<DetailAccountId>,
    pub person_id: Option<PersonId>,
    pub description: Option<String>,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
}

impl VoucherItem {
    /// The most specific account this line is posted to
    pub fn account(&self) -> AccountRef {
        match self.detail_account_id {
            Some(id) => AccountRef::DetailAccount(id),
            None => AccountRef::SubAccount(self.sub_account_id),
        }
    }
}

/// A balanced set of postings recorded on one date ("سند")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    /// `"V"` followed by the zero-padded voucher id
    pub voucher_number: String,
    pub voucher_date: NaiveDate,
    pub description: String,
    /// Σ|debit| + Σ|credit| over all items
    pub total_amount: BigDecimal,
    pub items: Vec<VoucherItem>,
    pub created_at: NaiveDateTime,
}

impl Voucher {
    /// Format the public voucher number for an id
    pub fn number_for(id: VoucherId) -> String {
        format!("V{:05}", id.0)
    }

    /// Calculate total debits
    pub fn total_debits(&self) -> BigDecimal {
        self.items.iter().map(|i| &i.debit).sum()
    }

    /// Calculate total credits
    pub fn total_credits(&self) -> BigDecimal {
        self.items.iter().map(|i| &i.credit).sum()
    }
}

/// A voucher item together with the header fields reports need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub voucher_id: VoucherId,
    pub voucher_number: String,
    pub voucher_date: NaiveDate,
    pub voucher_description: String,
    pub item: VoucherItem,
}

/// Coarse classification of [`LedgerError`] used by outer layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Precondition,
    Storage,
}

impl ErrorKind {
    /// HTTP status code equivalent
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::Precondition => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Storage => 500,
        }
    }
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Voucher is not balanced: debits = {debits}, credits = {credits}")]
    Unbalanced {
        debits: BigDecimal,
        credits: BigDecimal,
    },
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, key: impl fmt::Display) -> Self {
        LedgerError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation(_) | LedgerError::Unbalanced { .. } => ErrorKind::Validation,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::Conflict(_) => ErrorKind::Conflict,
            LedgerError::Precondition(_) => ErrorKind::Precondition,
            LedgerError::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nature_follows_account_type() {
        assert_eq!(AccountType::Asset.normal_balance(), EntryType::Debit);
        assert_eq!(AccountType::Expense.normal_balance(), EntryType::Debit);
        assert_eq!(AccountType::Liability.normal_balance(), EntryType::Credit);
        assert_eq!(AccountType::Equity.normal_balance(), EntryType::Credit);
        assert_eq!(AccountType::Income.normal_balance(), EntryType::Credit);
    }

    #[test]
    fn signed_movement_is_positive_on_normal_side() {
        let debit = BigDecimal::from(100);
        let credit = BigDecimal::from(30);
        assert_eq!(EntryType::Debit.signed(&debit, &credit), BigDecimal::from(70));
        assert_eq!(EntryType::Credit.signed(&debit, &credit), BigDecimal::from(-70));
    }

    #[test]
    fn voucher_numbers_are_zero_padded() {
        assert_eq!(Voucher::number_for(VoucherId(1)), "V00001");
        assert_eq!(Voucher::number_for(VoucherId(12345)), "V12345");
    }

    #[test]
    fn malformed_numeric_id_is_a_validation_error() {
        let err = "abc".parse::<SubAccountId>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(" 42 ".parse::<SubAccountId>().unwrap(), SubAccountId(42));
    }

    #[test]
    fn account_type_parses_case_insensitively() {
        assert_eq!("Asset".parse::<AccountType>().unwrap(), AccountType::Asset);
        assert_eq!("revenue".parse::<AccountType>().unwrap(), AccountType::Income);
        assert!("bogus".parse::<AccountType>().is_err());
    }
}
