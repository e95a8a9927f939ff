//! Trial balance and consistency checks of the stored running balances

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::net_balance;
use crate::ledger::chart::sub_account_nature;
use crate::traits::*;
use crate::types::*;

/// Trial Balance - snapshot of all sub-account balances at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalance {
    pub as_of_date: NaiveDate,
    /// One row per sub-account, ordered by code
    pub rows: Vec<TrialBalanceRow>,
    pub total_debits: BigDecimal,
    pub total_credits: BigDecimal,
    pub is_balanced: bool,
}

/// Sub-account balance information for trial balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalanceRow {
    pub sub_account_id: SubAccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    /// Debit balance (if applicable)
    pub debit_balance: Option<BigDecimal>,
    /// Credit balance (if applicable)
    pub credit_balance: Option<BigDecimal>,
}

impl TrialBalanceRow {
    /// Balance on the account's normal side
    pub fn balance_amount(&self) -> BigDecimal {
        let zero = BigDecimal::from(0);
        let debit = self.debit_balance.as_ref().unwrap_or(&zero);
        let credit = self.credit_balance.as_ref().unwrap_or(&zero);
        self.account_type.normal_balance().signed(debit, credit)
    }
}

/// Trial balance from every posting dated on or before `as_of_date`
///
/// Each sub-account counts all of its items, direct or through a detail
/// account, so the column difference is the sum of the vouchers' own
/// debit/credit gaps. Posting admits a gap of up to `tolerance` per
/// voucher, and the ledger counts as balanced while the difference stays
/// within that allowance for the vouchers included.
pub fn trial_balance<V: LedgerView + ?Sized>(
    view: &V,
    as_of_date: NaiveDate,
    tolerance: &BigDecimal,
) -> LedgerResult<TrialBalance> {
    let zero = BigDecimal::from(0);
    let mut rows = Vec::new();
    let mut total_debits = zero.clone();
    let mut total_credits = zero.clone();

    for sub_account in view.sub_accounts()? {
        let (category, _) = sub_account_nature(view, &sub_account)?;
        let postings = view.postings(PostingScope::SubAccount(sub_account.id), Some(as_of_date))?;
        let debits: BigDecimal = postings.iter().map(|p| &p.item.debit).sum();
        let credits: BigDecimal = postings.iter().map(|p| &p.item.credit).sum();
        let balance = debits - credits;

        let (debit_balance, credit_balance) = if balance >= zero {
            total_debits += &balance;
            (Some(balance), None)
        } else {
            let credit = balance.abs();
            total_credits += &credit;
            (None, Some(credit))
        };
        rows.push(TrialBalanceRow {
            sub_account_id: sub_account.id,
            code: sub_account.code,
            name: sub_account.name,
            account_type: category.account_type,
            debit_balance,
            credit_balance,
        });
    }

    let voucher_count = view.vouchers(None, Some(as_of_date))?.len();
    let allowance = tolerance * &BigDecimal::from(voucher_count as u64);
    let is_balanced = (&total_debits - &total_credits).abs() <= allowance;
    Ok(TrialBalance {
        as_of_date,
        rows,
        total_debits,
        total_credits,
        is_balanced,
    })
}

/// A stored running balance that disagrees with the posting history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceMismatch {
    pub account: AccountRef,
    pub code: String,
    pub stored: BigDecimal,
    pub recomputed: BigDecimal,
}

/// Balance of every account recomputed from its full history
fn recomputed_balances<V: LedgerView + ?Sized>(
    view: &V,
) -> LedgerResult<Vec<(AccountRef, String, BigDecimal, BigDecimal)>> {
    let mut balances = Vec::new();
    for sub_account in view.sub_accounts()? {
        let (_, nature) = sub_account_nature(view, &sub_account)?;
        let postings = view.postings(PostingScope::SubAccount(sub_account.id), None)?;
        balances.push((
            AccountRef::SubAccount(sub_account.id),
            sub_account.code.clone(),
            sub_account.balance.clone(),
            net_balance(nature, &postings),
        ));

        for detail in view.detail_accounts_under(sub_account.id)? {
            let postings = view.postings(PostingScope::DetailAccount(detail.id), None)?;
            balances.push((
                AccountRef::DetailAccount(detail.id),
                detail.code,
                detail.balance,
                net_balance(nature, &postings),
            ));
        }
    }
    Ok(balances)
}

/// Every account whose stored balance differs from its posting history
pub fn verify_balances<V: LedgerView + ?Sized>(view: &V) -> LedgerResult<Vec<BalanceMismatch>> {
    let mismatches: Vec<BalanceMismatch> = recomputed_balances(view)?
        .into_iter()
        .filter(|(_, _, stored, recomputed)| stored != recomputed)
        .map(|(account, code, stored, recomputed)| BalanceMismatch {
            account,
            code,
            stored,
            recomputed,
        })
        .collect();
    if !mismatches.is_empty() {
        warn!(count = mismatches.len(), "stored balances disagree with postings");
    }
    Ok(mismatches)
}

/// Overwrite every stored balance with the one recomputed from postings
///
/// Returns the accounts that were corrected.
pub fn rebuild_balances(tx: &mut dyn LedgerTx) -> LedgerResult<Vec<BalanceMismatch>> {
    let mismatches = verify_balances(&*tx)?;
    for mismatch in &mismatches {
        match mismatch.account {
            AccountRef::SubAccount(id) => {
                tx.reset_sub_account_balance(id, mismatch.recomputed.clone())?
            }
            AccountRef::DetailAccount(id) => {
                tx.reset_detail_account_balance(id, mismatch.recomputed.clone())?
            }
        }
    }
    info!(corrected = mismatches.len(), "balances rebuilt from postings");
    Ok(mismatches)
}
