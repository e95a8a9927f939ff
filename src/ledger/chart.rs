//! Chart of accounts management: categories, sub-accounts and detail accounts

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use tracing::{info, warn};

use crate::ledger::codes::{self, NodeKind};
use crate::traits::*;
use crate::types::*;

/// Request to create a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    /// Generated under the parent when omitted
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    /// Inherited from the parent when omitted
    #[serde(default, rename = "type")]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

impl NewCategory {
    pub fn top_level(name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            code: None,
            name: name.into(),
            account_type: Some(account_type),
            parent_id: None,
        }
    }

    pub fn child_of(parent_id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            code: None,
            name: name.into(),
            account_type: None,
            parent_id: Some(parent_id),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Request to create a sub-account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubAccount {
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    pub category_id: CategoryId,
}

impl NewSubAccount {
    pub fn new(category_id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            code: None,
            name: name.into(),
            category_id,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Request to create a detail account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDetailAccount {
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    pub sub_account_id: SubAccountId,
}

impl NewDetailAccount {
    pub fn new(sub_account_id: SubAccountId, name: impl Into<String>) -> Self {
        Self {
            code: None,
            name: name.into(),
            sub_account_id,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// A category with its sub-categories and sub-accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    pub category: Category,
    pub children: Vec<CategoryNode>,
    pub sub_accounts: Vec<SubAccountNode>,
}

/// A sub-account with its detail accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAccountNode {
    pub sub_account: SubAccount,
    pub detail_accounts: Vec<DetailAccount>,
}

/// A sub-account with its owning category and everything posted to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAccountDetails {
    pub sub_account: SubAccount,
    pub category: Category,
    pub detail_accounts: Vec<DetailAccount>,
    pub postings: Vec<Posting>,
}

/// Chart manager for handling chart of accounts operations
pub struct ChartManager<S: LedgerStorage> {
    pub(crate) storage: S,
    validator: Box<dyn ChartValidator>,
    allocation_retries: u32,
}

impl<S: LedgerStorage> ChartManager<S> {
    /// Create a new chart manager
    pub fn new(storage: S, allocation_retries: u32) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultChartValidator),
            allocation_retries,
        }
    }

    /// Create a new chart manager with custom validator
    pub fn with_validator(
        storage: S,
        validator: Box<dyn ChartValidator>,
        allocation_retries: u32,
    ) -> Self {
        Self {
            storage,
            validator,
            allocation_retries,
        }
    }

    /// Create a category, generating its code when none is given
    #[tracing::instrument(skip_all, fields(name = %request.name))]
    pub async fn create_category(&self, request: NewCategory) -> LedgerResult<Category> {
        self.validate_request(&request.name, request.code.as_deref())?;
        let generated = request.code.is_none();

        let category = self
            .retry_allocation(generated, || {
                let request = request.clone();
                self.storage
                    .transaction(move |tx| insert_category(tx, request))
            })
            .await?;

        info!(id = %category.id, code = %category.code, "category created");
        Ok(category)
    }

    /// Create a sub-account, generating its code when none is given
    #[tracing::instrument(skip_all, fields(name = %request.name, category = %request.category_id))]
    pub async fn create_sub_account(&self, request: NewSubAccount) -> LedgerResult<SubAccount> {
        self.validate_request(&request.name, request.code.as_deref())?;
        let generated = request.code.is_none();

        let sub_account = self
            .retry_allocation(generated, || {
                let request = request.clone();
                self.storage
                    .transaction(move |tx| insert_sub_account(tx, request))
            })
            .await?;

        info!(id = %sub_account.id, code = %sub_account.code, "sub-account created");
        Ok(sub_account)
    }

    /// Create a detail account, generating its code when none is given
    #[tracing::instrument(skip_all, fields(name = %request.name, sub_account = %request.sub_account_id))]
    pub async fn create_detail_account(
        &self,
        request: NewDetailAccount,
    ) -> LedgerResult<DetailAccount> {
        self.validate_request(&request.name, request.code.as_deref())?;
        let generated = request.code.is_none();

        let detail_account = self
            .retry_allocation(generated, || {
                let request = request.clone();
                self.storage
                    .transaction(move |tx| insert_detail_account(tx, request, None))
            })
            .await?;

        info!(id = %detail_account.id, code = %detail_account.code, "detail account created");
        Ok(detail_account)
    }

    /// Delete a category that has no sub-categories and no sub-accounts
    #[tracing::instrument(skip(self))]
    pub async fn delete_category(&self, id: CategoryId) -> LedgerResult<Category> {
        let removed = self
            .storage
            .transaction(move |tx| {
                let category = tx
                    .category(id)?
                    .ok_or_else(|| LedgerError::not_found("category", id))?;
                if !tx.child_categories(Some(id))?.is_empty() {
                    return Err(LedgerError::Conflict(format!(
                        "category '{}' still has sub-categories",
                        category.code
                    )));
                }
                if !tx.sub_accounts_in(id)?.is_empty() {
                    return Err(LedgerError::Conflict(format!(
                        "category '{}' still has sub-accounts",
                        category.code
                    )));
                }
                tx.remove_category(id)
            })
            .await
            .inspect_err(|err| warn!(%err, "category deletion rejected"))?;

        info!(code = %removed.code, "category deleted");
        Ok(removed)
    }

    /// Delete a sub-account that has no detail accounts and no postings
    #[tracing::instrument(skip(self))]
    pub async fn delete_sub_account(&self, id: SubAccountId) -> LedgerResult<SubAccount> {
        let removed = self
            .storage
            .transaction(move |tx| {
                let sub_account = tx
                    .sub_account(id)?
                    .ok_or_else(|| LedgerError::not_found("sub-account", id))?;
                if !tx.detail_accounts_under(id)?.is_empty() {
                    return Err(LedgerError::Conflict(format!(
                        "sub-account '{}' still has detail accounts",
                        sub_account.code
                    )));
                }
                if !tx.postings(PostingScope::SubAccount(id), None)?.is_empty() {
                    return Err(LedgerError::Conflict(format!(
                        "sub-account '{}' has posted voucher items",
                        sub_account.code
                    )));
                }
                tx.remove_sub_account(id)
            })
            .await
            .inspect_err(|err| warn!(%err, "sub-account deletion rejected"))?;

        info!(code = %removed.code, "sub-account deleted");
        Ok(removed)
    }

    /// Delete a detail account that has no postings and no linked person
    #[tracing::instrument(skip(self))]
    pub async fn delete_detail_account(&self, id: DetailAccountId) -> LedgerResult<DetailAccount> {
        let removed = self
            .storage
            .transaction(move |tx| {
                let detail_account = tx
                    .detail_account(id)?
                    .ok_or_else(|| LedgerError::not_found("detail account", id))?;
                if !tx.postings(PostingScope::DetailAccount(id), None)?.is_empty() {
                    return Err(LedgerError::Conflict(format!(
                        "detail account '{}' has posted voucher items",
                        detail_account.code
                    )));
                }
                if let Some(person) = detail_account.person_id {
                    if tx.person(person)?.is_some() {
                        return Err(LedgerError::Conflict(format!(
                            "detail account '{}' belongs to person {}",
                            detail_account.code, person
                        )));
                    }
                }
                tx.remove_detail_account(id)
            })
            .await
            .inspect_err(|err| warn!(%err, "detail account deletion rejected"))?;

        info!(code = %removed.code, "detail account deleted");
        Ok(removed)
    }

    pub async fn get_category(&self, id: CategoryId) -> LedgerResult<Option<Category>> {
        self.storage.read(move |view| view.category(id)).await
    }

    pub async fn get_sub_account(&self, id: SubAccountId) -> LedgerResult<Option<SubAccount>> {
        self.storage.read(move |view| view.sub_account(id)).await
    }

    /// Get a sub-account by ID, returning an error if not found
    pub async fn get_sub_account_required(&self, id: SubAccountId) -> LedgerResult<SubAccount> {
        self.get_sub_account(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("sub-account", id))
    }

    pub async fn get_detail_account(
        &self,
        id: DetailAccountId,
    ) -> LedgerResult<Option<DetailAccount>> {
        self.storage.read(move |view| view.detail_account(id)).await
    }

    pub async fn sub_account_by_code(&self, code: &str) -> LedgerResult<Option<SubAccount>> {
        let code = code.to_string();
        self.storage
            .read(move |view| view.sub_account_by_code(&code))
            .await
    }

    pub async fn list_categories(&self) -> LedgerResult<Vec<Category>> {
        self.storage.read(|view| view.categories()).await
    }

    pub async fn list_sub_accounts(&self) -> LedgerResult<Vec<SubAccount>> {
        self.storage.read(|view| view.sub_accounts()).await
    }

    pub async fn list_detail_accounts(
        &self,
        sub_account: SubAccountId,
    ) -> LedgerResult<Vec<DetailAccount>> {
        self.storage
            .read(move |view| view.detail_accounts_under(sub_account))
            .await
    }

    /// The whole chart: categories, their sub-accounts and detail accounts
    pub async fn get_hierarchy(&self) -> LedgerResult<Vec<CategoryNode>> {
        self.storage.read(|view| build_tree(view, None)).await
    }

    /// A sub-account with its category, detail accounts and postings
    pub async fn account_details(&self, id: SubAccountId) -> LedgerResult<SubAccountDetails> {
        self.storage
            .read(move |view| {
                let sub_account = view
                    .sub_account(id)?
                    .ok_or_else(|| LedgerError::not_found("sub-account", id))?;
                let category = view.category(sub_account.category_id)?.ok_or_else(|| {
                    LedgerError::Storage(format!("sub-account {} has no category", id))
                })?;
                Ok(SubAccountDetails {
                    detail_accounts: view.detail_accounts_under(id)?,
                    postings: view.postings(PostingScope::SubAccount(id), None)?,
                    sub_account,
                    category,
                })
            })
            .await
    }

    /// Categories from the root down to `id`
    pub async fn category_path(&self, id: CategoryId) -> LedgerResult<Vec<Category>> {
        self.storage
            .read(move |view| {
                let mut path = Vec::new();
                let mut current = Some(id);
                while let Some(id) = current {
                    let category = view
                        .category(id)?
                        .ok_or_else(|| LedgerError::not_found("category", id))?;
                    current = category.parent_id;
                    path.insert(0, category);
                }
                Ok(path)
            })
            .await
    }

    fn validate_request(&self, name: &str, code: Option<&str>) -> LedgerResult<()> {
        self.validator.validate_name(name)?;
        if let Some(code) = code {
            self.validator.validate_code(code)?;
        }
        Ok(())
    }

    /// Rerun a creation whose generated code lost a race to a concurrent insert
    async fn retry_allocation<T, F, Fut>(&self, generated: bool, mut attempt: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(LedgerError::Conflict(reason))
                    if generated && retries < self.allocation_retries =>
                {
                    retries += 1;
                    warn!(%reason, retries, "generated code collided; regenerating");
                }
                result => return result,
            }
        }
    }
}

pub(crate) fn now() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Name as stored: surrounding whitespace removed
fn clean_name(name: &str) -> String {
    name.trim().to_string()
}

fn ensure_code_free(existing: bool, kind: NodeKind, code: &str) -> LedgerResult<()> {
    if existing {
        return Err(LedgerError::Conflict(format!(
            "{} code '{}' already exists",
            kind.label(),
            code
        )));
    }
    Ok(())
}

pub(crate) fn insert_category(
    tx: &mut dyn LedgerTx,
    request: NewCategory,
) -> LedgerResult<Category> {
    let parent = match request.parent_id {
        Some(parent_id) => Some(
            tx.category(parent_id)?
                .ok_or_else(|| LedgerError::not_found("category", parent_id))?,
        ),
        None => None,
    };

    // A child category follows its parent's type unless told otherwise
    let account_type = request
        .account_type
        .or_else(|| parent.as_ref().map(|p| p.account_type))
        .ok_or_else(|| {
            LedgerError::Validation("a top-level category needs a type".to_string())
        })?;

    let parent_code = parent.as_ref().map(|p| p.code.as_str());
    let code = match request.code {
        Some(code) => {
            let code = code.trim().to_string();
            codes::check_code(NodeKind::Category, parent_code, &code)?;
            ensure_code_free(
                tx.category_by_code(&code)?.is_some(),
                NodeKind::Category,
                &code,
            )?;
            code
        }
        None => {
            let siblings: Vec<String> = tx
                .child_categories(request.parent_id)?
                .into_iter()
                .map(|c| c.code)
                .collect();
            codes::next_code(NodeKind::Category, parent_code, &siblings)?
        }
    };

    let category = Category {
        id: CategoryId(tx.next_id(Sequence::Category)?),
        code,
        name: clean_name(&request.name),
        account_type,
        parent_id: request.parent_id,
        created_at: now(),
    };
    tx.insert_category(category.clone())?;
    Ok(category)
}

pub(crate) fn insert_sub_account(
    tx: &mut dyn LedgerTx,
    request: NewSubAccount,
) -> LedgerResult<SubAccount> {
    let category = tx
        .category(request.category_id)?
        .ok_or_else(|| LedgerError::not_found("category", request.category_id))?;

    let code = match request.code {
        Some(code) => {
            let code = code.trim().to_string();
            codes::check_code(NodeKind::SubAccount, Some(&category.code), &code)?;
            ensure_code_free(
                tx.sub_account_by_code(&code)?.is_some(),
                NodeKind::SubAccount,
                &code,
            )?;
            code
        }
        None => {
            let siblings: Vec<String> = tx
                .sub_accounts_in(category.id)?
                .into_iter()
                .map(|s| s.code)
                .collect();
            codes::next_code(NodeKind::SubAccount, Some(&category.code), &siblings)?
        }
    };

    let sub_account = SubAccount {
        id: SubAccountId(tx.next_id(Sequence::SubAccount)?),
        code,
        name: clean_name(&request.name),
        category_id: category.id,
        balance: 0.into(),
        created_at: now(),
    };
    tx.insert_sub_account(sub_account.clone())?;
    Ok(sub_account)
}

pub(crate) fn insert_detail_account(
    tx: &mut dyn LedgerTx,
    request: NewDetailAccount,
    person_id: Option<PersonId>,
) -> LedgerResult<DetailAccount> {
    let parent = tx
        .sub_account(request.sub_account_id)?
        .ok_or_else(|| LedgerError::not_found("sub-account", request.sub_account_id))?;

    let code = match request.code {
        Some(code) => {
            let code = code.trim().to_string();
            codes::check_code(NodeKind::DetailAccount, Some(&parent.code), &code)?;
            ensure_code_free(
                tx.detail_account_by_code(&code)?.is_some(),
                NodeKind::DetailAccount,
                &code,
            )?;
            code
        }
        None => {
            let siblings: Vec<String> = tx
                .detail_accounts_under(parent.id)?
                .into_iter()
                .map(|d| d.code)
                .collect();
            codes::next_code(NodeKind::DetailAccount, Some(&parent.code), &siblings)?
        }
    };

    let detail_account = DetailAccount {
        id: DetailAccountId(tx.next_id(Sequence::DetailAccount)?),
        code,
        name: clean_name(&request.name),
        sub_account_id: parent.id,
        balance: 0.into(),
        person_id,
        created_at: now(),
    };
    tx.insert_detail_account(detail_account.clone())?;
    Ok(detail_account)
}

/// Nature of a sub-account, taken from its category's type
pub(crate) fn sub_account_nature<V: LedgerView + ?Sized>(
    view: &V,
    sub_account: &SubAccount,
) -> LedgerResult<(Category, EntryType)> {
    let category = view.category(sub_account.category_id)?.ok_or_else(|| {
        LedgerError::Storage(format!("sub-account {} has no category", sub_account.id))
    })?;
    let nature = category.account_type.normal_balance();
    Ok((category, nature))
}

fn build_tree<V: LedgerView + ?Sized>(
    view: &V,
    parent: Option<CategoryId>,
) -> LedgerResult<Vec<CategoryNode>> {
    view.child_categories(parent)?
        .into_iter()
        .map(|category| {
            let sub_accounts = view
                .sub_accounts_in(category.id)?
                .into_iter()
                .map(|sub_account| {
                    Ok(SubAccountNode {
                        detail_accounts: view.detail_accounts_under(sub_account.id)?,
                        sub_account,
                    })
                })
                .collect::<LedgerResult<Vec<_>>>()?;
            Ok(CategoryNode {
                children: build_tree(view, Some(category.id))?,
                sub_accounts,
                category,
            })
        })
        .collect()
}

/// Utility functions for working with the chart
pub mod utils {
    use super::*;

    /// Create a standard five-category chart with the common sub-accounts.
    ///
    /// Sub-accounts are keyed by a short snake_case name. The receivables
    /// sub-account ("customers") gets code `1-0003`, the default root the
    /// person provisioner opens detail accounts under.
    pub async fn create_standard_chart<S: LedgerStorage>(
        chart: &ChartManager<S>,
    ) -> LedgerResult<HashMap<String, SubAccount>> {
        let layout: [(&str, AccountType, &[(&str, &str)]); 5] = [
            (
                "Assets",
                AccountType::Asset,
                &[("cash", "Cash"), ("bank", "Bank"), ("customers", "Customers")],
            ),
            (
                "Liabilities",
                AccountType::Liability,
                &[("suppliers", "Suppliers"), ("loans_payable", "Loans Payable")],
            ),
            (
                "Equity",
                AccountType::Equity,
                &[
                    ("owners_equity", "Owner's Equity"),
                    ("retained_earnings", "Retained Earnings"),
                ],
            ),
            (
                "Income",
                AccountType::Income,
                &[
                    ("sales_revenue", "Sales Revenue"),
                    ("service_revenue", "Service Revenue"),
                ],
            ),
            (
                "Expenses",
                AccountType::Expense,
                &[
                    ("cost_of_goods_sold", "Cost of Goods Sold"),
                    ("rent_expense", "Rent Expense"),
                    ("salaries_expense", "Salaries Expense"),
                ],
            ),
        ];

        let mut accounts = HashMap::new();
        for (category_name, account_type, sub_accounts) in layout {
            let category = chart
                .create_category(NewCategory::top_level(category_name, account_type))
                .await?;
            for (key, name) in sub_accounts {
                let sub_account = chart
                    .create_sub_account(NewSubAccount::new(category.id, *name))
                    .await?;
                accounts.insert(key.to_string(), sub_account);
            }
        }

        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering::SeqCst};
    use std::sync::Arc;

    fn chart() -> ChartManager<MemoryStorage> {
        ChartManager::new(MemoryStorage::new(), 3)
    }

    /// Memory storage whose next writes lose a race to another writer
    #[derive(Clone, Default)]
    struct ContendedStorage {
        inner: MemoryStorage,
        lost_races: Arc<AtomicU32>,
        attempts: Arc<AtomicU32>,
    }

    impl ContendedStorage {
        fn lose_next(&self, races: u32) {
            self.lost_races.store(races, SeqCst);
            self.attempts.store(0, SeqCst);
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(SeqCst)
        }
    }

    #[async_trait]
    impl LedgerStorage for ContendedStorage {
        async fn read<F, R>(&self, f: F) -> LedgerResult<R>
        where
            F: FnOnce(&dyn LedgerView) -> LedgerResult<R> + Send,
            R: Send,
        {
            self.inner.read(f).await
        }

        async fn transaction<F, R>(&self, f: F) -> LedgerResult<R>
        where
            F: FnOnce(&mut dyn LedgerTx) -> LedgerResult<R> + Send,
            R: Send,
        {
            self.attempts.fetch_add(1, SeqCst);
            let lost = self
                .lost_races
                .fetch_update(SeqCst, SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if lost {
                return Err(LedgerError::Conflict(
                    "code taken by a concurrent insert".to_string(),
                ));
            }
            self.inner.transaction(f).await
        }
    }

    async fn contended_chart() -> (ChartManager<ContendedStorage>, ContendedStorage, Category) {
        let storage = ContendedStorage::default();
        let chart = ChartManager::new(storage.clone(), 3);
        let assets = chart
            .create_category(NewCategory::top_level("Assets", AccountType::Asset))
            .await
            .unwrap();
        (chart, storage, assets)
    }

    #[tokio::test]
    async fn generated_code_is_regenerated_after_a_lost_race() {
        let (chart, storage, assets) = contended_chart().await;
        storage.lose_next(1);

        let cash = chart
            .create_sub_account(NewSubAccount::new(assets.id, "Cash"))
            .await
            .unwrap();
        assert_eq!(cash.code, "1-0001");
        assert_eq!(storage.attempts(), 2);
    }

    #[tokio::test]
    async fn regeneration_stops_after_the_configured_retries() {
        let (chart, storage, assets) = contended_chart().await;
        storage.lose_next(u32::MAX);

        let err = chart
            .create_sub_account(NewSubAccount::new(assets.id, "Cash"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(storage.attempts(), 4);

        storage.lose_next(0);
        assert!(chart.list_sub_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn caller_supplied_codes_are_never_retried() {
        let (chart, storage, assets) = contended_chart().await;
        storage.lose_next(1);

        let err = chart
            .create_sub_account(NewSubAccount::new(assets.id, "Cash").with_code("1-0001"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(storage.attempts(), 1);
    }

    #[tokio::test]
    async fn caller_codes_must_fit_the_segment_width() {
        let chart = chart();
        let assets = chart
            .create_category(NewCategory::top_level("Assets", AccountType::Asset))
            .await
            .unwrap();

        for code in ["1-5", "1-18446744073709551615"] {
            let err = chart
                .create_sub_account(NewSubAccount::new(assets.id, "Cash").with_code(code))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let cash = chart
            .create_sub_account(NewSubAccount::new(assets.id, "Cash"))
            .await
            .unwrap();
        assert_eq!(cash.code, "1-0001");

        let err = chart
            .create_detail_account(NewDetailAccount::new(cash.id, "Till").with_code("1-0001-1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = chart
            .create_category(NewCategory::top_level("Huge", AccountType::Asset).with_code("18446744073709551615"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Every rejection left the store usable
        assert_eq!(chart.list_categories().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn generated_codes_follow_the_hierarchy() {
        let chart = chart();
        let assets = chart
            .create_category(NewCategory::top_level("Assets", AccountType::Asset))
            .await
            .unwrap();
        let current = chart
            .create_category(NewCategory::child_of(assets.id, "Current assets"))
            .await
            .unwrap();
        let cash = chart
            .create_sub_account(NewSubAccount::new(assets.id, "Cash"))
            .await
            .unwrap();
        let petty = chart
            .create_detail_account(NewDetailAccount::new(cash.id, "Petty cash"))
            .await
            .unwrap();

        assert_eq!(assets.code, "1");
        assert_eq!(current.code, "1-01");
        assert_eq!(current.account_type, AccountType::Asset);
        assert_eq!(cash.code, "1-0001");
        assert_eq!(petty.code, "1-0001-01");
    }

    #[tokio::test]
    async fn child_category_may_differ_in_type() {
        let chart = chart();
        let assets = chart
            .create_category(NewCategory::top_level("Assets", AccountType::Asset))
            .await
            .unwrap();
        let mut contra = NewCategory::child_of(assets.id, "Contra assets");
        contra.account_type = Some(AccountType::Liability);
        let contra = chart.create_category(contra).await.unwrap();
        assert_eq!(contra.account_type, AccountType::Liability);
    }

    #[tokio::test]
    async fn caller_codes_are_checked() {
        let chart = chart();
        let assets = chart
            .create_category(NewCategory::top_level("Assets", AccountType::Asset).with_code("1"))
            .await
            .unwrap();

        let duplicate = chart
            .create_category(NewCategory::top_level("Again", AccountType::Asset).with_code("1"))
            .await
            .unwrap_err();
        assert_eq!(duplicate.kind(), ErrorKind::Conflict);

        let wrong_prefix = chart
            .create_sub_account(NewSubAccount::new(assets.id, "Cash").with_code("2-0001"))
            .await
            .unwrap_err();
        assert_eq!(wrong_prefix.kind(), ErrorKind::Validation);

        let ok = chart
            .create_sub_account(NewSubAccount::new(assets.id, "Cash").with_code("1-0007"))
            .await
            .unwrap();
        assert_eq!(ok.code, "1-0007");

        let next = chart
            .create_sub_account(NewSubAccount::new(assets.id, "Bank"))
            .await
            .unwrap();
        assert_eq!(next.code, "1-0008");
    }

    #[tokio::test]
    async fn missing_parents_are_not_found() {
        let chart = chart();
        let err = chart
            .create_sub_account(NewSubAccount::new(CategoryId(99), "Orphan"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = chart
            .create_detail_account(NewDetailAccount::new(SubAccountId(99), "Orphan"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = chart
            .create_category(NewCategory::child_of(CategoryId(99), "Orphan"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn empty_names_are_rejected() {
        let chart = chart();
        let err = chart
            .create_category(NewCategory::top_level("  ", AccountType::Asset))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn nodes_with_children_cannot_be_deleted() {
        let chart = chart();
        let assets = chart
            .create_category(NewCategory::top_level("Assets", AccountType::Asset))
            .await
            .unwrap();
        let cash = chart
            .create_sub_account(NewSubAccount::new(assets.id, "Cash"))
            .await
            .unwrap();
        let petty = chart
            .create_detail_account(NewDetailAccount::new(cash.id, "Petty cash"))
            .await
            .unwrap();

        let err = chart.delete_category(assets.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = chart.delete_sub_account(cash.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        chart.delete_detail_account(petty.id).await.unwrap();
        chart.delete_sub_account(cash.id).await.unwrap();
        chart.delete_category(assets.id).await.unwrap();
        assert!(chart.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn hierarchy_nests_all_three_levels() {
        let chart = chart();
        let accounts = utils::create_standard_chart(&chart).await.unwrap();
        let customers = &accounts["customers"];
        assert_eq!(customers.code, "1-0003");
        chart
            .create_detail_account(NewDetailAccount::new(customers.id, "Ali"))
            .await
            .unwrap();

        let tree = chart.get_hierarchy().await.unwrap();
        assert_eq!(tree.len(), 5);
        let assets = &tree[0];
        assert_eq!(assets.category.name, "Assets");
        assert_eq!(assets.sub_accounts.len(), 3);
        assert_eq!(assets.sub_accounts[2].detail_accounts[0].code, "1-0003-01");
    }

    #[tokio::test]
    async fn category_path_runs_root_first() {
        let chart = chart();
        let root = chart
            .create_category(NewCategory::top_level("Expenses", AccountType::Expense))
            .await
            .unwrap();
        let mid = chart
            .create_category(NewCategory::child_of(root.id, "Operating"))
            .await
            .unwrap();
        let leaf = chart
            .create_category(NewCategory::child_of(mid.id, "Office"))
            .await
            .unwrap();

        let path = chart.category_path(leaf.id).await.unwrap();
        let codes: Vec<&str> = path.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["1", "1-01", "1-01-01"]);
    }
}
