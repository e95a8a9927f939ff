//! Account turnover: opening balance, period movement and closing balance

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{ensure_range, resolve_account};
use crate::ledger::codes::compare_codes;
use crate::traits::*;
use crate::types::*;

/// Which accounts to report on, and over which dates (both inclusive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnoverQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Every sub-account when omitted
    #[serde(default)]
    pub accounts: Option<Vec<AccountRef>>,
    #[serde(default)]
    pub account_type: Option<AccountType>,
}

impl TurnoverQuery {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            accounts: None,
            account_type: None,
        }
    }

    pub fn accounts(mut self, accounts: Vec<AccountRef>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    pub fn account_type(mut self, account_type: AccountType) -> Self {
        self.account_type = Some(account_type);
        self
    }
}

/// One account's movement over the queried period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnoverRow {
    pub account: AccountRef,
    pub code: String,
    pub name: String,
    pub category_id: CategoryId,
    pub category_code: String,
    pub category_name: String,
    pub account_type: AccountType,
    pub nature: EntryType,
    /// Balance of everything dated before the start date
    pub initial_balance: BigDecimal,
    pub period_debit: BigDecimal,
    pub period_credit: BigDecimal,
    pub final_balance: BigDecimal,
    pub transaction_count: usize,
}

/// Compute turnover rows, ordered by account code
pub fn turnover<V: LedgerView + ?Sized>(
    view: &V,
    query: &TurnoverQuery,
) -> LedgerResult<Vec<TurnoverRow>> {
    ensure_range(query.start_date, query.end_date)?;

    let targets: Vec<AccountRef> = match &query.accounts {
        Some(accounts) => {
            let mut seen = HashSet::new();
            accounts
                .iter()
                .copied()
                .filter(|account| seen.insert(*account))
                .collect()
        }
        None => view
            .sub_accounts()?
            .into_iter()
            .map(|s| AccountRef::SubAccount(s.id))
            .collect(),
    };

    let mut rows = Vec::with_capacity(targets.len());
    for account in targets {
        let resolved = resolve_account(view, account)?;
        if query
            .account_type
            .is_some_and(|wanted| wanted != resolved.category.account_type)
        {
            continue;
        }

        let zero = BigDecimal::from(0);
        let mut opening_debit = zero.clone();
        let mut opening_credit = zero.clone();
        let mut period_debit = zero.clone();
        let mut period_credit = zero;
        let mut transaction_count = 0;

        for posting in view.postings(resolved.scope, Some(query.end_date))? {
            if posting.voucher_date < query.start_date {
                opening_debit += &posting.item.debit;
                opening_credit += &posting.item.credit;
            } else {
                period_debit += &posting.item.debit;
                period_credit += &posting.item.credit;
                transaction_count += 1;
            }
        }

        let initial_balance = resolved.nature.signed(&opening_debit, &opening_credit);
        let final_balance =
            &initial_balance + resolved.nature.signed(&period_debit, &period_credit);

        rows.push(TurnoverRow {
            account,
            code: resolved.code,
            name: resolved.name,
            category_id: resolved.category.id,
            category_code: resolved.category.code,
            category_name: resolved.category.name,
            account_type: resolved.category.account_type,
            nature: resolved.nature,
            initial_balance,
            period_debit,
            period_credit,
            final_balance,
            transaction_count,
        });
    }

    rows.sort_by(|a, b| compare_codes(&a.code, &b.code));
    Ok(rows)
}
