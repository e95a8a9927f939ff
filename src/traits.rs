//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::types::*;

/// Which postings a query should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingScope {
    /// Every item against the sub-account, direct or through one of its detail accounts
    SubAccount(SubAccountId),
    /// Items against the sub-account that carry no detail account
    DirectSubAccount(SubAccountId),
    /// Items against any detail account of the sub-account
    DetailsOf(SubAccountId),
    /// Items against a single detail account
    DetailAccount(DetailAccountId),
}

/// Per-table monotonic id sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sequence {
    Category,
    SubAccount,
    DetailAccount,
    Voucher,
    VoucherItem,
    Person,
}

/// Consistent read access to the ledger tables
///
/// Every lookup returns owned rows so the trait can be backed by an
/// external database as well as by [`crate::utils::MemoryStorage`].
pub trait LedgerView {
    fn category(&self, id: CategoryId) -> LedgerResult<Option<Category>>;
    fn category_by_code(&self, code: &str) -> LedgerResult<Option<Category>>;
    /// All categories ordered by code
    fn categories(&self) -> LedgerResult<Vec<Category>>;
    /// Direct children of `parent`; `None` lists top-level categories
    fn child_categories(&self, parent: Option<CategoryId>) -> LedgerResult<Vec<Category>>;

    fn sub_account(&self, id: SubAccountId) -> LedgerResult<Option<SubAccount>>;
    fn sub_account_by_code(&self, code: &str) -> LedgerResult<Option<SubAccount>>;
    /// All sub-accounts ordered by code
    fn sub_accounts(&self) -> LedgerResult<Vec<SubAccount>>;
    fn sub_accounts_in(&self, category: CategoryId) -> LedgerResult<Vec<SubAccount>>;

    fn detail_account(&self, id: DetailAccountId) -> LedgerResult<Option<DetailAccount>>;
    fn detail_account_by_code(&self, code: &str) -> LedgerResult<Option<DetailAccount>>;
    /// All detail accounts ordered by code
    fn detail_accounts(&self) -> LedgerResult<Vec<DetailAccount>>;
    fn detail_accounts_under(&self, sub_account: SubAccountId) -> LedgerResult<Vec<DetailAccount>>;

    fn person(&self, id: PersonId) -> LedgerResult<Option<Person>>;
    /// Case-insensitive lookup on the trimmed name
    fn person_by_name(&self, name: &str) -> LedgerResult<Option<Person>>;
    fn persons(&self) -> LedgerResult<Vec<Person>>;

    fn voucher(&self, id: VoucherId) -> LedgerResult<Option<Voucher>>;
    fn voucher_by_number(&self, number: &str) -> LedgerResult<Option<Voucher>>;
    /// Vouchers ordered by date then id, restricted to the inclusive range
    fn vouchers(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Voucher>>;

    /// Postings in `scope` dated on or before `end_date`, ordered by date, voucher and item id
    fn postings(&self, scope: PostingScope, end_date: Option<NaiveDate>)
        -> LedgerResult<Vec<Posting>>;
}

/// Write access inside one atomic transaction
///
/// Inserts enforce the unique constraints of the schema (ids, codes,
/// voucher numbers) and fail with [`LedgerError::Conflict`]. Balance
/// mutations are increments applied by the store, never read-then-write
/// from the caller.
pub trait LedgerTx: LedgerView {
    /// Atomically advance a sequence and return the new value
    fn next_id(&mut self, sequence: Sequence) -> LedgerResult<i64>;

    fn insert_category(&mut self, category: Category) -> LedgerResult<()>;
    fn insert_sub_account(&mut self, sub_account: SubAccount) -> LedgerResult<()>;
    fn insert_detail_account(&mut self, detail_account: DetailAccount) -> LedgerResult<()>;
    fn insert_person(&mut self, person: Person) -> LedgerResult<()>;
    fn insert_voucher(&mut self, voucher: Voucher) -> LedgerResult<()>;

    fn remove_category(&mut self, id: CategoryId) -> LedgerResult<Category>;
    fn remove_sub_account(&mut self, id: SubAccountId) -> LedgerResult<SubAccount>;
    fn remove_detail_account(&mut self, id: DetailAccountId) -> LedgerResult<DetailAccount>;
    /// Removes the voucher and its items
    fn remove_voucher(&mut self, id: VoucherId) -> LedgerResult<Voucher>;

    /// `balance = balance + delta`
    fn increment_sub_account_balance(
        &mut self,
        id: SubAccountId,
        delta: &BigDecimal,
    ) -> LedgerResult<()>;
    /// `balance = balance + delta`
    fn increment_detail_account_balance(
        &mut self,
        id: DetailAccountId,
        delta: &BigDecimal,
    ) -> LedgerResult<()>;

    /// Overwrite a balance; only used by the full rebuild
    fn reset_sub_account_balance(&mut self, id: SubAccountId, balance: BigDecimal)
        -> LedgerResult<()>;
    /// Overwrite a balance; only used by the full rebuild
    fn reset_detail_account_balance(
        &mut self,
        id: DetailAccountId,
        balance: BigDecimal,
    ) -> LedgerResult<()>;
}

/// Storage abstraction for the ledger system
///
/// A backend hands out consistent read snapshots and atomic write
/// transactions. The closure passed to [`LedgerStorage::transaction`] either
/// returns `Ok` and all of its writes become visible together, or returns an
/// error and none of them do. Concurrent transactions are serialized by the
/// backend, which makes allocation of codes and voucher numbers race-free.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Run `f` against a consistent snapshot
    async fn read<F, R>(&self, f: F) -> LedgerResult<R>
    where
        F: FnOnce(&dyn LedgerView) -> LedgerResult<R> + Send,
        R: Send;

    /// Run `f` inside one all-or-nothing write transaction
    async fn transaction<F, R>(&self, f: F) -> LedgerResult<R>
    where
        F: FnOnce(&mut dyn LedgerTx) -> LedgerResult<R> + Send,
        R: Send;
}

/// Trait for implementing custom chart-of-accounts validation rules
pub trait ChartValidator: Send + Sync {
    /// Validate the name of a new category, sub-account or detail account
    fn validate_name(&self, name: &str) -> LedgerResult<()>;

    /// Validate a caller-supplied code before it is checked against the hierarchy
    fn validate_code(&self, code: &str) -> LedgerResult<()>;
}

/// Trait for implementing custom voucher validation rules
pub trait VoucherValidator: Send + Sync {
    /// Validate a voucher request before any account lookups happen
    fn validate_voucher(&self, request: &crate::ledger::VoucherRequest) -> LedgerResult<()>;
}

/// Default chart validator with basic rules
pub struct DefaultChartValidator;

impl ChartValidator for DefaultChartValidator {
    fn validate_name(&self, name: &str) -> LedgerResult<()> {
        if name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_code(&self, code: &str) -> LedgerResult<()> {
        if code.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account code cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default voucher validator: the structural double-entry rules only
pub struct DefaultVoucherValidator;

impl VoucherValidator for DefaultVoucherValidator {
    fn validate_voucher(&self, request: &crate::ledger::VoucherRequest) -> LedgerResult<()> {
        request.validate_lines()
    }
}
