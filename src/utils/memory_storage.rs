//! In-memory storage implementation for testing and development

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::ledger::codes::compare_codes;
use crate::traits::*;
use crate::types::*;

/// In-memory storage implementation for testing and development
///
/// Writers are serialized behind one lock. A transaction runs against a
/// scratch copy of the tables and is swapped in only when the closure
/// succeeds, so a failed, abandoned or panicking transaction leaves
/// nothing behind and the lock stays usable after a panic.
///
/// Every write transaction clones all tables, vouchers included, so the
/// cost of a write grows with the size of the ledger. Meant for tests,
/// demos and small ledgers; a durable backend should implement
/// [`LedgerStorage`] with native transactions instead.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<Tables>>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    categories: BTreeMap<CategoryId, Category>,
    sub_accounts: BTreeMap<SubAccountId, SubAccount>,
    detail_accounts: BTreeMap<DetailAccountId, DetailAccount>,
    persons: BTreeMap<PersonId, Person>,
    vouchers: BTreeMap<VoucherId, Voucher>,
    sequences: HashMap<Sequence, i64>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        *self.write_tables() = Tables::default();
        Ok(())
    }

    // The shared tables are only ever replaced wholesale, so a poisoned
    // lock still guards a consistent state.
    fn read_tables(&self) -> RwLockReadGuard<'_, Tables> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tables(&self) -> RwLockWriteGuard<'_, Tables> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sorted_by_code<T>(rows: impl Iterator<Item = T>, code: impl Fn(&T) -> &str) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.sort_by(|a, b| compare_codes(code(a), code(b)));
    rows
}

fn duplicate_code(kind: &str, code: &str) -> LedgerError {
    LedgerError::Conflict(format!("{} code '{}' already exists", kind, code))
}

fn scope_matches(scope: PostingScope, item: &VoucherItem) -> bool {
    match scope {
        PostingScope::SubAccount(id) => item.sub_account_id == id,
        PostingScope::DirectSubAccount(id) => {
            item.sub_account_id == id && item.detail_account_id.is_none()
        }
        PostingScope::DetailsOf(id) => item.sub_account_id == id && item.detail_account_id.is_some(),
        PostingScope::DetailAccount(id) => item.detail_account_id == Some(id),
    }
}

fn in_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
}

impl LedgerView for Tables {
    fn category(&self, id: CategoryId) -> LedgerResult<Option<Category>> {
        Ok(self.categories.get(&id).cloned())
    }

    fn category_by_code(&self, code: &str) -> LedgerResult<Option<Category>> {
        Ok(self.categories.values().find(|c| c.code == code).cloned())
    }

    fn categories(&self) -> LedgerResult<Vec<Category>> {
        Ok(sorted_by_code(self.categories.values().cloned(), |c| c.code.as_str()))
    }

    fn child_categories(&self, parent: Option<CategoryId>) -> LedgerResult<Vec<Category>> {
        Ok(sorted_by_code(
            self.categories
                .values()
                .filter(|c| c.parent_id == parent)
                .cloned(),
            |c| c.code.as_str(),
        ))
    }

    fn sub_account(&self, id: SubAccountId) -> LedgerResult<Option<SubAccount>> {
        Ok(self.sub_accounts.get(&id).cloned())
    }

    fn sub_account_by_code(&self, code: &str) -> LedgerResult<Option<SubAccount>> {
        Ok(self.sub_accounts.values().find(|s| s.code == code).cloned())
    }

    fn sub_accounts(&self) -> LedgerResult<Vec<SubAccount>> {
        Ok(sorted_by_code(self.sub_accounts.values().cloned(), |s| s.code.as_str()))
    }

    fn sub_accounts_in(&self, category: CategoryId) -> LedgerResult<Vec<SubAccount>> {
        Ok(sorted_by_code(
            self.sub_accounts
                .values()
                .filter(|s| s.category_id == category)
                .cloned(),
            |s| s.code.as_str(),
        ))
    }

    fn detail_account(&self, id: DetailAccountId) -> LedgerResult<Option<DetailAccount>> {
        Ok(self.detail_accounts.get(&id).cloned())
    }

    fn detail_account_by_code(&self, code: &str) -> LedgerResult<Option<DetailAccount>> {
        Ok(self.detail_accounts.values().find(|d| d.code == code).cloned())
    }

    fn detail_accounts(&self) -> LedgerResult<Vec<DetailAccount>> {
        Ok(sorted_by_code(self.detail_accounts.values().cloned(), |d| d.code.as_str()))
    }

    fn detail_accounts_under(&self, sub_account: SubAccountId) -> LedgerResult<Vec<DetailAccount>> {
        Ok(sorted_by_code(
            self.detail_accounts
                .values()
                .filter(|d| d.sub_account_id == sub_account)
                .cloned(),
            |d| d.code.as_str(),
        ))
    }

    fn person(&self, id: PersonId) -> LedgerResult<Option<Person>> {
        Ok(self.persons.get(&id).cloned())
    }

    fn person_by_name(&self, name: &str) -> LedgerResult<Option<Person>> {
        let wanted = name.trim().to_lowercase();
        Ok(self
            .persons
            .values()
            .find(|p| p.name.trim().to_lowercase() == wanted)
            .cloned())
    }

    fn persons(&self) -> LedgerResult<Vec<Person>> {
        Ok(self.persons.values().cloned().collect())
    }

    fn voucher(&self, id: VoucherId) -> LedgerResult<Option<Voucher>> {
        Ok(self.vouchers.get(&id).cloned())
    }

    fn voucher_by_number(&self, number: &str) -> LedgerResult<Option<Voucher>> {
        Ok(self
            .vouchers
            .values()
            .find(|v| v.voucher_number == number)
            .cloned())
    }

    fn vouchers(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Voucher>> {
        let mut vouchers: Vec<Voucher> = self
            .vouchers
            .values()
            .filter(|v| in_range(v.voucher_date, start_date, end_date))
            .cloned()
            .collect();
        vouchers.sort_by_key(|v| (v.voucher_date, v.id));
        Ok(vouchers)
    }

    fn postings(
        &self,
        scope: PostingScope,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Posting>> {
        let mut postings: Vec<Posting> = self
            .vouchers
            .values()
            .filter(|v| in_range(v.voucher_date, None, end_date))
            .flat_map(|voucher| {
                voucher
                    .items
                    .iter()
                    .filter(move |item| scope_matches(scope, item))
                    .map(move |item| Posting {
                        voucher_id: voucher.id,
                        voucher_number: voucher.voucher_number.clone(),
                        voucher_date: voucher.voucher_date,
                        voucher_description: voucher.description.clone(),
                        item: item.clone(),
                    })
            })
            .collect();
        postings.sort_by_key(|p| (p.voucher_date, p.voucher_id, p.item.id));
        Ok(postings)
    }
}

impl LedgerTx for Tables {
    fn next_id(&mut self, sequence: Sequence) -> LedgerResult<i64> {
        let value = self.sequences.entry(sequence).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    fn insert_category(&mut self, category: Category) -> LedgerResult<()> {
        if self.categories.contains_key(&category.id) {
            return Err(LedgerError::Conflict(format!(
                "category id {} already exists",
                category.id
            )));
        }
        if self.categories.values().any(|c| c.code == category.code) {
            return Err(duplicate_code("category", &category.code));
        }
        if let Some(parent) = category.parent_id {
            if !self.categories.contains_key(&parent) {
                return Err(LedgerError::not_found("category", parent));
            }
        }
        self.categories.insert(category.id, category);
        Ok(())
    }

    fn insert_sub_account(&mut self, sub_account: SubAccount) -> LedgerResult<()> {
        if self.sub_accounts.contains_key(&sub_account.id) {
            return Err(LedgerError::Conflict(format!(
                "sub-account id {} already exists",
                sub_account.id
            )));
        }
        if self.sub_accounts.values().any(|s| s.code == sub_account.code) {
            return Err(duplicate_code("sub-account", &sub_account.code));
        }
        if !self.categories.contains_key(&sub_account.category_id) {
            return Err(LedgerError::not_found("category", sub_account.category_id));
        }
        self.sub_accounts.insert(sub_account.id, sub_account);
        Ok(())
    }

    fn insert_detail_account(&mut self, detail_account: DetailAccount) -> LedgerResult<()> {
        if self.detail_accounts.contains_key(&detail_account.id) {
            return Err(LedgerError::Conflict(format!(
                "detail account id {} already exists",
                detail_account.id
            )));
        }
        if self
            .detail_accounts
            .values()
            .any(|d| d.code == detail_account.code)
        {
            return Err(duplicate_code("detail account", &detail_account.code));
        }
        if !self.sub_accounts.contains_key(&detail_account.sub_account_id) {
            return Err(LedgerError::not_found(
                "sub-account",
                detail_account.sub_account_id,
            ));
        }
        self.detail_accounts.insert(detail_account.id, detail_account);
        Ok(())
    }

    fn insert_person(&mut self, person: Person) -> LedgerResult<()> {
        if self.persons.contains_key(&person.id) {
            return Err(LedgerError::Conflict(format!(
                "person id {} already exists",
                person.id
            )));
        }
        if !self.detail_accounts.contains_key(&person.detail_account_id) {
            return Err(LedgerError::not_found(
                "detail account",
                person.detail_account_id,
            ));
        }
        self.persons.insert(person.id, person);
        Ok(())
    }

    fn insert_voucher(&mut self, voucher: Voucher) -> LedgerResult<()> {
        if self.vouchers.contains_key(&voucher.id) {
            return Err(LedgerError::Conflict(format!(
                "voucher id {} already exists",
                voucher.id
            )));
        }
        if self
            .vouchers
            .values()
            .any(|v| v.voucher_number == voucher.voucher_number)
        {
            return Err(LedgerError::Conflict(format!(
                "voucher number '{}' already exists",
                voucher.voucher_number
            )));
        }
        for item in &voucher.items {
            if item.voucher_id != voucher.id {
                return Err(LedgerError::Storage(format!(
                    "voucher item {} does not belong to voucher {}",
                    item.id, voucher.id
                )));
            }
            if !self.sub_accounts.contains_key(&item.sub_account_id) {
                return Err(LedgerError::not_found("sub-account", item.sub_account_id));
            }
            if let Some(detail) = item.detail_account_id {
                if !self.detail_accounts.contains_key(&detail) {
                    return Err(LedgerError::not_found("detail account", detail));
                }
            }
            if let Some(person) = item.person_id {
                if !self.persons.contains_key(&person) {
                    return Err(LedgerError::not_found("person", person));
                }
            }
        }
        self.vouchers.insert(voucher.id, voucher);
        Ok(())
    }

    fn remove_category(&mut self, id: CategoryId) -> LedgerResult<Category> {
        let referenced = self.categories.values().any(|c| c.parent_id == Some(id))
            || self.sub_accounts.values().any(|s| s.category_id == id);
        if referenced {
            return Err(LedgerError::Conflict(format!(
                "category {} is still referenced",
                id
            )));
        }
        self.categories
            .remove(&id)
            .ok_or_else(|| LedgerError::not_found("category", id))
    }

    fn remove_sub_account(&mut self, id: SubAccountId) -> LedgerResult<SubAccount> {
        let referenced = self.detail_accounts.values().any(|d| d.sub_account_id == id)
            || self
                .vouchers
                .values()
                .any(|v| v.items.iter().any(|i| i.sub_account_id == id));
        if referenced {
            return Err(LedgerError::Conflict(format!(
                "sub-account {} is still referenced",
                id
            )));
        }
        self.sub_accounts
            .remove(&id)
            .ok_or_else(|| LedgerError::not_found("sub-account", id))
    }

    fn remove_detail_account(&mut self, id: DetailAccountId) -> LedgerResult<DetailAccount> {
        let referenced = self.persons.values().any(|p| p.detail_account_id == id)
            || self
                .vouchers
                .values()
                .any(|v| v.items.iter().any(|i| i.detail_account_id == Some(id)));
        if referenced {
            return Err(LedgerError::Conflict(format!(
                "detail account {} is still referenced",
                id
            )));
        }
        self.detail_accounts
            .remove(&id)
            .ok_or_else(|| LedgerError::not_found("detail account", id))
    }

    fn remove_voucher(&mut self, id: VoucherId) -> LedgerResult<Voucher> {
        self.vouchers
            .remove(&id)
            .ok_or_else(|| LedgerError::not_found("voucher", id))
    }

    fn increment_sub_account_balance(
        &mut self,
        id: SubAccountId,
        delta: &BigDecimal,
    ) -> LedgerResult<()> {
        let account = self
            .sub_accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("sub-account", id))?;
        account.balance += delta;
        Ok(())
    }

    fn increment_detail_account_balance(
        &mut self,
        id: DetailAccountId,
        delta: &BigDecimal,
    ) -> LedgerResult<()> {
        let account = self
            .detail_accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("detail account", id))?;
        account.balance += delta;
        Ok(())
    }

    fn reset_sub_account_balance(
        &mut self,
        id: SubAccountId,
        balance: BigDecimal,
    ) -> LedgerResult<()> {
        let account = self
            .sub_accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("sub-account", id))?;
        account.balance = balance;
        Ok(())
    }

    fn reset_detail_account_balance(
        &mut self,
        id: DetailAccountId,
        balance: BigDecimal,
    ) -> LedgerResult<()> {
        let account = self
            .detail_accounts
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("detail account", id))?;
        account.balance = balance;
        Ok(())
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn read<F, R>(&self, f: F) -> LedgerResult<R>
    where
        F: FnOnce(&dyn LedgerView) -> LedgerResult<R> + Send,
        R: Send,
    {
        let state = self.read_tables();
        f(&*state)
    }

    async fn transaction<F, R>(&self, f: F) -> LedgerResult<R>
    where
        F: FnOnce(&mut dyn LedgerTx) -> LedgerResult<R> + Send,
        R: Send,
    {
        let mut state = self.write_tables();
        let mut scratch = state.clone();
        let result = f(&mut scratch)?;
        *state = scratch;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, code: &str) -> Category {
        Category {
            id: CategoryId(id),
            code: code.to_string(),
            name: format!("Category {}", code),
            account_type: AccountType::Asset,
            parent_id: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[tokio::test]
    async fn failed_transaction_leaves_no_trace() {
        let storage = MemoryStorage::new();

        let result: LedgerResult<()> = storage
            .transaction(|tx| {
                let id = tx.next_id(Sequence::Category)?;
                tx.insert_category(category(id, "1"))?;
                Err(LedgerError::Storage("simulated failure".to_string()))
            })
            .await;
        assert!(result.is_err());

        let categories = storage.read(|view| view.categories()).await.unwrap();
        assert!(categories.is_empty());

        // The sequence advance was rolled back too
        let id = storage
            .transaction(|tx| tx.next_id(Sequence::Category))
            .await
            .unwrap();
        assert_eq!(id, 1);
    }

    #[tokio::test]
    async fn panicking_transaction_does_not_lock_out_later_callers() {
        let storage = MemoryStorage::new();
        storage
            .transaction(|tx| tx.insert_category(category(1, "1")))
            .await
            .unwrap();

        let shared = storage.clone();
        let outcome = tokio::spawn(async move {
            shared
                .transaction(|tx| -> LedgerResult<()> {
                    tx.insert_category(category(2, "2"))?;
                    panic!("closure failed halfway");
                })
                .await
        })
        .await;
        assert!(outcome.unwrap_err().is_panic());

        let categories = storage.read(|view| view.categories()).await.unwrap();
        assert_eq!(categories.len(), 1);
        storage
            .transaction(|tx| tx.insert_category(category(2, "2")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_codes_are_rejected() {
        let storage = MemoryStorage::new();
        storage
            .transaction(|tx| tx.insert_category(category(1, "1")))
            .await
            .unwrap();

        let err = storage
            .transaction(|tx| tx.insert_category(category(2, "1")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn increments_accumulate() {
        let storage = MemoryStorage::new();
        storage
            .transaction(|tx| {
                tx.insert_category(category(1, "1"))?;
                tx.insert_sub_account(SubAccount {
                    id: SubAccountId(1),
                    code: "1-0001".to_string(),
                    name: "Cash".to_string(),
                    category_id: CategoryId(1),
                    balance: BigDecimal::from(0),
                    created_at: chrono::Utc::now().naive_utc(),
                })?;
                tx.increment_sub_account_balance(SubAccountId(1), &BigDecimal::from(40))?;
                tx.increment_sub_account_balance(SubAccountId(1), &BigDecimal::from(-15))
            })
            .await
            .unwrap();

        let account = storage
            .read(|view| view.sub_account(SubAccountId(1)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.balance, BigDecimal::from(25));
    }

    #[tokio::test]
    async fn clear_empties_all_tables() {
        let storage = MemoryStorage::new();
        storage
            .transaction(|tx| tx.insert_category(category(1, "1")))
            .await
            .unwrap();
        storage.clear().unwrap();
        assert!(storage.read(|view| view.categories()).await.unwrap().is_empty());
    }
}
