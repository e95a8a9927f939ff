//! Voucher posting and management

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ledger::chart::{now, sub_account_nature};
use crate::traits::*;
use crate::types::*;

/// One debit or credit line of a voucher request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherLine {
    pub account: AccountRef,
    #[serde(default)]
    pub person_id: Option<PersonId>,
    #[serde(default)]
    pub description: Option<String>,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
}

impl VoucherLine {
    pub fn debit(account: impl Into<AccountRef>, amount: BigDecimal) -> Self {
        Self {
            account: account.into(),
            person_id: None,
            description: None,
            debit: amount,
            credit: BigDecimal::from(0),
        }
    }

    pub fn credit(account: impl Into<AccountRef>, amount: BigDecimal) -> Self {
        Self {
            account: account.into(),
            person_id: None,
            description: None,
            debit: BigDecimal::from(0),
            credit: amount,
        }
    }
}

/// A voucher to be posted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherRequest {
    pub voucher_date: NaiveDate,
    pub description: String,
    pub lines: Vec<VoucherLine>,
}

impl VoucherRequest {
    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }

    /// Structural rules every line must satisfy
    pub fn validate_lines(&self) -> LedgerResult<()> {
        if self.lines.is_empty() {
            return Err(LedgerError::Validation(
                "Voucher must have at least one item".to_string(),
            ));
        }

        let zero = BigDecimal::from(0);
        for (index, line) in self.lines.iter().enumerate() {
            let position = index + 1;
            if line.debit < zero || line.credit < zero {
                return Err(LedgerError::Validation(format!(
                    "Item {}: debit and credit cannot be negative",
                    position
                )));
            }
            if line.debit != zero && line.credit != zero {
                return Err(LedgerError::Validation(format!(
                    "Item {}: a line is either a debit or a credit, not both",
                    position
                )));
            }
            if line.debit == zero && line.credit == zero {
                return Err(LedgerError::Validation(format!(
                    "Item {}: a line needs a non-zero debit or credit",
                    position
                )));
            }
        }

        Ok(())
    }

    /// Debits and credits must agree within `tolerance`
    pub fn check_balance(&self, tolerance: &BigDecimal) -> LedgerResult<()> {
        let debits = self.total_debits();
        let credits = self.total_credits();
        if (&debits - &credits).abs() > *tolerance {
            return Err(LedgerError::Unbalanced { debits, credits });
        }
        Ok(())
    }
}

/// A request line bound to concrete accounts
struct ResolvedLine {
    sub_account_id: SubAccountId,
    detail_account_id: Option<DetailAccountId>,
    /// Movement on the account's normal side
    delta: BigDecimal,
    line: VoucherLine,
}

/// Voucher manager for posting, reading and deleting vouchers
pub struct VoucherManager<S: LedgerStorage> {
    storage: S,
    validator: Box<dyn VoucherValidator>,
    tolerance: BigDecimal,
}

impl<S: LedgerStorage> VoucherManager<S> {
    /// Create a new voucher manager
    pub fn new(storage: S, tolerance: BigDecimal) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultVoucherValidator),
            tolerance,
        }
    }

    /// Create a new voucher manager with custom validator
    pub fn with_validator(
        storage: S,
        validator: Box<dyn VoucherValidator>,
        tolerance: BigDecimal,
    ) -> Self {
        Self {
            storage,
            validator,
            tolerance,
        }
    }

    /// Post a voucher: validate it, then store it and move every affected
    /// balance in one transaction
    #[tracing::instrument(skip_all, fields(date = %request.voucher_date, lines = request.lines.len()))]
    pub async fn post_voucher(&self, request: VoucherRequest) -> LedgerResult<Voucher> {
        self.validator
            .validate_voucher(&request)
            .and_then(|_| request.check_balance(&self.tolerance))
            .inspect_err(|err| warn!(%err, "voucher rejected"))?;

        let voucher = self
            .storage
            .transaction(move |tx| {
                let resolved = request
                    .lines
                    .into_iter()
                    .map(|line| resolve_line(&*tx, line))
                    .collect::<LedgerResult<Vec<_>>>()?;

                let id = VoucherId(tx.next_id(Sequence::Voucher)?);
                let mut items = Vec::with_capacity(resolved.len());
                for line in &resolved {
                    items.push(VoucherItem {
                        id: VoucherItemId(tx.next_id(Sequence::VoucherItem)?),
                        voucher_id: id,
                        sub_account_id: line.sub_account_id,
                        detail_account_id: line.detail_account_id,
                        person_id: line.line.person_id,
                        description: line.line.description.clone(),
                        debit: line.line.debit.clone(),
                        credit: line.line.credit.clone(),
                    });
                }

                let total_amount: BigDecimal = items
                    .iter()
                    .map(|i| i.debit.abs() + i.credit.abs())
                    .sum();
                let voucher = Voucher {
                    id,
                    voucher_number: Voucher::number_for(id),
                    voucher_date: request.voucher_date,
                    description: request.description.trim().to_string(),
                    total_amount,
                    items,
                    created_at: now(),
                };
                tx.insert_voucher(voucher.clone())?;

                for line in &resolved {
                    tx.increment_sub_account_balance(line.sub_account_id, &line.delta)?;
                    if let Some(detail) = line.detail_account_id {
                        tx.increment_detail_account_balance(detail, &line.delta)?;
                    }
                }

                Ok(voucher)
            })
            .await
            .inspect_err(|err| warn!(%err, "voucher posting aborted"))?;

        info!(
            number = %voucher.voucher_number,
            total = %voucher.total_amount,
            "voucher posted"
        );
        Ok(voucher)
    }

    /// Delete a voucher and reverse its effect on every balance it moved
    #[tracing::instrument(skip(self))]
    pub async fn delete_voucher(&self, id: VoucherId) -> LedgerResult<Voucher> {
        let voucher = self
            .storage
            .transaction(move |tx| {
                let voucher = tx
                    .voucher(id)?
                    .ok_or_else(|| LedgerError::not_found("voucher", id))?;

                for item in &voucher.items {
                    let sub_account = tx.sub_account(item.sub_account_id)?.ok_or_else(|| {
                        LedgerError::Storage(format!(
                            "voucher {} references missing sub-account {}",
                            voucher.voucher_number, item.sub_account_id
                        ))
                    })?;
                    let (_, nature) = sub_account_nature(&*tx, &sub_account)?;
                    let reversal = -nature.signed(&item.debit, &item.credit);
                    tx.increment_sub_account_balance(item.sub_account_id, &reversal)?;
                    if let Some(detail) = item.detail_account_id {
                        tx.increment_detail_account_balance(detail, &reversal)?;
                    }
                }

                tx.remove_voucher(id)
            })
            .await?;

        info!(number = %voucher.voucher_number, "voucher deleted and balances reversed");
        Ok(voucher)
    }

    pub async fn get_voucher(&self, id: VoucherId) -> LedgerResult<Option<Voucher>> {
        self.storage.read(move |view| view.voucher(id)).await
    }

    /// Get a voucher by ID, returning an error if not found
    pub async fn get_voucher_required(&self, id: VoucherId) -> LedgerResult<Voucher> {
        self.get_voucher(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("voucher", id))
    }

    pub async fn voucher_by_number(&self, number: &str) -> LedgerResult<Option<Voucher>> {
        let number = number.trim().to_uppercase();
        self.storage
            .read(move |view| view.voucher_by_number(&number))
            .await
    }

    /// Vouchers dated within the inclusive range, oldest first
    pub async fn list_vouchers(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Voucher>> {
        self.storage
            .read(move |view| view.vouchers(start_date, end_date))
            .await
    }
}

fn resolve_line(tx: &dyn LedgerTx, line: VoucherLine) -> LedgerResult<ResolvedLine> {
    let (sub_account, detail_account_id) = match line.account {
        AccountRef::SubAccount(id) => {
            let sub_account = tx
                .sub_account(id)?
                .ok_or_else(|| LedgerError::not_found("sub-account", id))?;
            (sub_account, None)
        }
        AccountRef::DetailAccount(id) => {
            let detail = tx
                .detail_account(id)?
                .ok_or_else(|| LedgerError::not_found("detail account", id))?;
            let sub_account = tx.sub_account(detail.sub_account_id)?.ok_or_else(|| {
                LedgerError::Storage(format!("detail account {} has no sub-account", id))
            })?;
            (sub_account, Some(id))
        }
    };

    if let Some(person) = line.person_id {
        if tx.person(person)?.is_none() {
            return Err(LedgerError::not_found("person", person));
        }
    }

    let (_, nature) = sub_account_nature(tx, &sub_account)?;
    let delta = nature.signed(&line.debit, &line.credit);
    debug!(account = %line.account, %delta, "line resolved");

    Ok(ResolvedLine {
        sub_account_id: sub_account.id,
        detail_account_id,
        delta,
        line,
    })
}

/// Voucher builder for creating multi-line vouchers
#[derive(Debug)]
pub struct VoucherBuilder {
    request: VoucherRequest,
}

impl VoucherBuilder {
    /// Create a new voucher builder
    pub fn new(voucher_date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            request: VoucherRequest {
                voucher_date,
                description: description.into(),
                lines: Vec::new(),
            },
        }
    }

    /// Add a debit line
    pub fn debit(
        mut self,
        account: impl Into<AccountRef>,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        let mut line = VoucherLine::debit(account, amount);
        line.description = description;
        self.request.lines.push(line);
        self
    }

    /// Add a credit line
    pub fn credit(
        mut self,
        account: impl Into<AccountRef>,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        let mut line = VoucherLine::credit(account, amount);
        line.description = description;
        self.request.lines.push(line);
        self
    }

    /// Add a custom line
    pub fn line(mut self, line: VoucherLine) -> Self {
        self.request.lines.push(line);
        self
    }

    /// Build the request; balance is checked when the voucher is posted
    pub fn build(self) -> LedgerResult<VoucherRequest> {
        self.request.validate_lines()?;
        Ok(self.request)
    }
}

/// Common voucher patterns
pub mod patterns {
    use super::*;

    /// Owner puts money into the business (debit cash/bank, credit equity)
    pub fn owner_investment(
        date: NaiveDate,
        description: impl Into<String>,
        cash_account: impl Into<AccountRef>,
        equity_account: impl Into<AccountRef>,
        amount: BigDecimal,
    ) -> LedgerResult<VoucherRequest> {
        VoucherBuilder::new(date, description)
            .debit(cash_account, amount.clone(), None)
            .credit(equity_account, amount, None)
            .build()
    }

    /// Sale settled in cash or on account (debit cash/customer, credit revenue)
    pub fn sale(
        date: NaiveDate,
        description: impl Into<String>,
        cash_or_customer_account: impl Into<AccountRef>,
        revenue_account: impl Into<AccountRef>,
        amount: BigDecimal,
    ) -> LedgerResult<VoucherRequest> {
        VoucherBuilder::new(date, description)
            .debit(cash_or_customer_account, amount.clone(), None)
            .credit(revenue_account, amount, None)
            .build()
    }

    /// Expense paid (debit expense, credit cash/bank)
    pub fn expense_payment(
        date: NaiveDate,
        description: impl Into<String>,
        expense_account: impl Into<AccountRef>,
        cash_account: impl Into<AccountRef>,
        amount: BigDecimal,
    ) -> LedgerResult<VoucherRequest> {
        VoucherBuilder::new(date, description)
            .debit(expense_account, amount.clone(), None)
            .credit(cash_account, amount, None)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 20).unwrap()
    }

    fn tolerance() -> BigDecimal {
        BigDecimal::from_str("0.01").unwrap()
    }

    #[test]
    fn empty_voucher_is_invalid() {
        let err = VoucherBuilder::new(date(), "nothing").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn negative_amounts_are_invalid() {
        let err = VoucherBuilder::new(date(), "negative")
            .debit(SubAccountId(1), BigDecimal::from(-5), None)
            .build()
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn double_sided_lines_are_invalid() {
        let line = VoucherLine {
            account: AccountRef::SubAccount(SubAccountId(1)),
            person_id: None,
            description: None,
            debit: BigDecimal::from(5),
            credit: BigDecimal::from(5),
        };
        let err = VoucherBuilder::new(date(), "both").line(line).build().unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn zero_lines_are_invalid() {
        let err = VoucherBuilder::new(date(), "zero")
            .debit(SubAccountId(1), BigDecimal::from(0), None)
            .build()
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn unbalanced_request_reports_both_totals() {
        let request = VoucherBuilder::new(date(), "short")
            .debit(SubAccountId(1), BigDecimal::from(10_000), None)
            .credit(SubAccountId(2), BigDecimal::from(9_000), None)
            .build()
            .unwrap();

        match request.check_balance(&tolerance()) {
            Err(LedgerError::Unbalanced { debits, credits }) => {
                assert_eq!(debits, BigDecimal::from(10_000));
                assert_eq!(credits, BigDecimal::from(9_000));
            }
            other => panic!("expected Unbalanced, got {:?}", other),
        }
    }

    #[test]
    fn differences_within_tolerance_are_balanced() {
        let request = VoucherBuilder::new(date(), "rounding")
            .debit(SubAccountId(1), BigDecimal::from_str("100.005").unwrap(), None)
            .credit(SubAccountId(2), BigDecimal::from_str("100.00").unwrap(), None)
            .build()
            .unwrap();
        assert!(request.check_balance(&tolerance()).is_ok());

        let request = VoucherBuilder::new(date(), "too far")
            .debit(SubAccountId(1), BigDecimal::from_str("100.02").unwrap(), None)
            .credit(SubAccountId(2), BigDecimal::from_str("100.00").unwrap(), None)
            .build()
            .unwrap();
        assert!(request.check_balance(&tolerance()).is_err());
    }

    #[test]
    fn patterns_produce_balanced_pairs() {
        let request = patterns::owner_investment(
            date(),
            "Capital",
            SubAccountId(1),
            SubAccountId(2),
            BigDecimal::from(500),
        )
        .unwrap();
        assert_eq!(request.lines.len(), 2);
        assert_eq!(request.total_debits(), request.total_credits());
        assert!(request.check_balance(&tolerance()).is_ok());
    }

    #[test]
    fn requests_deserialize_from_camel_case_json() {
        let request: VoucherRequest = serde_json::from_str(
            r#"{
                "voucherDate": "2024-03-20",
                "description": "Opening",
                "lines": [
                    {"account": {"kind": "subAccount", "id": 3}, "debit": "10", "credit": "0"},
                    {"account": {"kind": "detailAccount", "id": 7}, "personId": 2, "debit": "0", "credit": "10"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(request.lines[0].account, AccountRef::SubAccount(SubAccountId(3)));
        assert_eq!(
            request.lines[1].account,
            AccountRef::DetailAccount(DetailAccountId(7))
        );
        assert_eq!(request.lines[1].person_id, Some(PersonId(2)));
    }
}
