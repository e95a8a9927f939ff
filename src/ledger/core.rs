//! Main ledger orchestrator that coordinates the chart, vouchers, persons and reports

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::info;

use crate::config::LedgerConfig;
use crate::ledger::{
    ChartManager, CategoryNode, NewCategory, NewDetailAccount, NewPerson, NewSubAccount,
    PersonManager, ProvisionedPerson, SubAccountDetails, VoucherManager, VoucherRequest,
};
use crate::reports::{self, AccountStatement, BalanceMismatch, TrialBalance, TurnoverQuery, TurnoverRow};
use crate::traits::*;
use crate::types::*;

/// Main ledger system that orchestrates all accounting operations over one store
pub struct Ledger<S: LedgerStorage> {
    storage: S,
    config: LedgerConfig,
    chart_manager: ChartManager<S>,
    voucher_manager: VoucherManager<S>,
    person_manager: PersonManager<S>,
}

impl<S: LedgerStorage + Clone> Ledger<S> {
    /// Create a new ledger with the given storage backend and default settings
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, LedgerConfig::default())
    }

    pub fn with_config(storage: S, config: LedgerConfig) -> Self {
        Self::with_validators(
            storage,
            config,
            Box::new(DefaultChartValidator),
            Box::new(DefaultVoucherValidator),
        )
    }

    /// Create a new ledger with custom validators
    pub fn with_validators(
        storage: S,
        config: LedgerConfig,
        chart_validator: Box<dyn ChartValidator>,
        voucher_validator: Box<dyn VoucherValidator>,
    ) -> Self {
        Self {
            chart_manager: ChartManager::with_validator(
                storage.clone(),
                chart_validator,
                config.allocation_retries,
            ),
            voucher_manager: VoucherManager::with_validator(
                storage.clone(),
                voucher_validator,
                config.balance_tolerance.clone(),
            ),
            person_manager: PersonManager::new(storage.clone(), config.customers_root_code.clone()),
            storage,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    // Chart of accounts operations
    pub async fn create_category(&self, request: NewCategory) -> LedgerResult<Category> {
        self.chart_manager.create_category(request).await
    }

    pub async fn create_sub_account(&self, request: NewSubAccount) -> LedgerResult<SubAccount> {
        self.chart_manager.create_sub_account(request).await
    }

    pub async fn create_detail_account(
        &self,
        request: NewDetailAccount,
    ) -> LedgerResult<DetailAccount> {
        self.chart_manager.create_detail_account(request).await
    }

    pub async fn delete_category(&self, id: CategoryId) -> LedgerResult<Category> {
        self.chart_manager.delete_category(id).await
    }

    pub async fn delete_sub_account(&self, id: SubAccountId) -> LedgerResult<SubAccount> {
        self.chart_manager.delete_sub_account(id).await
    }

    pub async fn delete_detail_account(&self, id: DetailAccountId) -> LedgerResult<DetailAccount> {
        self.chart_manager.delete_detail_account(id).await
    }

    pub async fn get_category(&self, id: CategoryId) -> LedgerResult<Option<Category>> {
        self.chart_manager.get_category(id).await
    }

    pub async fn get_sub_account(&self, id: SubAccountId) -> LedgerResult<Option<SubAccount>> {
        self.chart_manager.get_sub_account(id).await
    }

    pub async fn get_detail_account(
        &self,
        id: DetailAccountId,
    ) -> LedgerResult<Option<DetailAccount>> {
        self.chart_manager.get_detail_account(id).await
    }

    pub async fn sub_account_by_code(&self, code: &str) -> LedgerResult<Option<SubAccount>> {
        self.chart_manager.sub_account_by_code(code).await
    }

    pub async fn list_categories(&self) -> LedgerResult<Vec<Category>> {
        self.chart_manager.list_categories().await
    }

    pub async fn list_sub_accounts(&self) -> LedgerResult<Vec<SubAccount>> {
        self.chart_manager.list_sub_accounts().await
    }

    pub async fn list_detail_accounts(
        &self,
        sub_account: SubAccountId,
    ) -> LedgerResult<Vec<DetailAccount>> {
        self.chart_manager.list_detail_accounts(sub_account).await
    }

    pub async fn get_hierarchy(&self) -> LedgerResult<Vec<CategoryNode>> {
        self.chart_manager.get_hierarchy().await
    }

    pub async fn account_details(&self, id: SubAccountId) -> LedgerResult<SubAccountDetails> {
        self.chart_manager.account_details(id).await
    }

    pub async fn category_path(&self, id: CategoryId) -> LedgerResult<Vec<Category>> {
        self.chart_manager.category_path(id).await
    }

    /// Current running balance of a sub-account or detail account
    pub async fn account_balance(&self, account: AccountRef) -> LedgerResult<BigDecimal> {
        self.storage
            .read(move |view| match account {
                AccountRef::SubAccount(id) => view
                    .sub_account(id)?
                    .map(|s| s.balance)
                    .ok_or_else(|| LedgerError::not_found("sub-account", id)),
                AccountRef::DetailAccount(id) => view
                    .detail_account(id)?
                    .map(|d| d.balance)
                    .ok_or_else(|| LedgerError::not_found("detail account", id)),
            })
            .await
    }

    /// Setup a standard chart of accounts for small business
    pub async fn setup_standard_chart_of_accounts(
        &self,
    ) -> LedgerResult<HashMap<String, SubAccount>> {
        crate::ledger::chart::utils::create_standard_chart(&self.chart_manager).await
    }

    // Voucher operations
    pub async fn post_voucher(&self, request: VoucherRequest) -> LedgerResult<Voucher> {
        self.voucher_manager.post_voucher(request).await
    }

    pub async fn delete_voucher(&self, id: VoucherId) -> LedgerResult<Voucher> {
        self.voucher_manager.delete_voucher(id).await
    }

    pub async fn get_voucher(&self, id: VoucherId) -> LedgerResult<Option<Voucher>> {
        self.voucher_manager.get_voucher(id).await
    }

    pub async fn voucher_by_number(&self, number: &str) -> LedgerResult<Option<Voucher>> {
        self.voucher_manager.voucher_by_number(number).await
    }

    pub async fn list_vouchers(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Voucher>> {
        self.voucher_manager.list_vouchers(start_date, end_date).await
    }

    // Person operations
    pub async fn create_person(&self, request: NewPerson) -> LedgerResult<ProvisionedPerson> {
        self.person_manager.create_person(request).await
    }

    pub async fn get_person(&self, id: PersonId) -> LedgerResult<Option<Person>> {
        self.person_manager.get_person(id).await
    }

    pub async fn list_persons(&self) -> LedgerResult<Vec<Person>> {
        self.person_manager.list_persons().await
    }

    pub async fn person_by_detail_account(
        &self,
        id: DetailAccountId,
    ) -> LedgerResult<Option<Person>> {
        self.person_manager.person_by_detail_account(id).await
    }

    // Reporting operations
    /// Opening balance, period movement and closing balance per account
    #[tracing::instrument(skip_all, fields(start = %query.start_date, end = %query.end_date))]
    pub async fn turnover(&self, query: TurnoverQuery) -> LedgerResult<Vec<TurnoverRow>> {
        self.storage
            .read(move |view| reports::turnover(view, &query))
            .await
    }

    pub async fn account_statement(
        &self,
        account: AccountRef,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<AccountStatement> {
        self.storage
            .read(move |view| reports::account_statement(view, account, start_date, end_date))
            .await
    }

    /// Get trial balance as of a specific date
    ///
    /// Uses the configured balance tolerance, the same one posting admits.
    pub async fn trial_balance(&self, as_of_date: NaiveDate) -> LedgerResult<TrialBalance> {
        let tolerance = self.config.balance_tolerance.clone();
        self.storage
            .read(move |view| reports::trial_balance(view, as_of_date, &tolerance))
            .await
    }

    /// Accounts whose stored balance disagrees with their postings
    pub async fn verify_balances(&self) -> LedgerResult<Vec<BalanceMismatch>> {
        self.storage
            .read(|view| reports::verify_balances(view))
            .await
    }

    /// Recompute every stored balance from the postings in one transaction
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_balances(&self) -> LedgerResult<Vec<BalanceMismatch>> {
        let corrected = self
            .storage
            .transaction(|tx| reports::rebuild_balances(tx))
            .await?;
        info!(corrected = corrected.len(), "balance rebuild committed");
        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::patterns;
    use crate::utils::memory_storage::MemoryStorage;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[tokio::test]
    async fn test_ledger_basic_operations() {
        let ledger = Ledger::new(MemoryStorage::new());
        let accounts = ledger.setup_standard_chart_of_accounts().await.unwrap();
        let cash = &accounts["cash"];
        let sales = &accounts["sales_revenue"];

        let request =
            patterns::sale(date(1), "Sale of goods", cash.id, sales.id, BigDecimal::from(1000))
                .unwrap();
        let voucher = ledger.post_voucher(request).await.unwrap();
        assert_eq!(voucher.voucher_number, "V00001");

        let cash_balance = ledger.account_balance(cash.id.into()).await.unwrap();
        let sales_balance = ledger.account_balance(sales.id.into()).await.unwrap();
        assert_eq!(cash_balance, BigDecimal::from(1000));
        assert_eq!(sales_balance, BigDecimal::from(1000));

        let trial_balance = ledger.trial_balance(date(1)).await.unwrap();
        assert!(trial_balance.is_balanced);
        assert_eq!(trial_balance.total_debits, BigDecimal::from(1000));
        assert!(ledger.verify_balances().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn config_drives_the_customers_root() {
        let config = LedgerConfig::default().with_customers_root_code("1-0001");
        let ledger = Ledger::with_config(MemoryStorage::new(), config);
        let accounts = ledger.setup_standard_chart_of_accounts().await.unwrap();

        let sara = ledger.create_person(NewPerson::new("Sara")).await.unwrap();
        assert_eq!(sara.detail_account.sub_account_id, accounts["cash"].id);
        assert_eq!(sara.detail_account.code, "1-0001-01");
    }

    #[tokio::test]
    async fn unknown_account_balance_is_not_found() {
        let ledger = Ledger::new(MemoryStorage::new());
        let err = ledger
            .account_balance(AccountRef::SubAccount(SubAccountId(9)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
