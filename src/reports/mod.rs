//! Read-only reports reconstructed from posted vouchers
//!
//! All functions here take a [`LedgerView`] snapshot, so a report never
//! mixes data from before and after a concurrent posting.

pub mod balances;
pub mod statement;
pub mod turnover;

pub use balances::*;
pub use statement::*;
pub use turnover::*;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::ledger::chart::sub_account_nature;
use crate::traits::*;
use crate::types::*;

/// An account resolved for reporting: identity, classification and the
/// postings that make up its movement
#[derive(Debug, Clone)]
pub(crate) struct ReportAccount {
    pub account: AccountRef,
    pub code: String,
    pub name: String,
    pub category: Category,
    pub nature: EntryType,
    pub scope: PostingScope,
}

/// Resolve an account reference.
///
/// A sub-account that owns detail accounts is represented by their postings
/// alone; direct postings to it are left out so nothing is counted twice.
pub(crate) fn resolve_account<V: LedgerView + ?Sized>(
    view: &V,
    account: AccountRef,
) -> LedgerResult<ReportAccount> {
    match account {
        AccountRef::SubAccount(id) => {
            let sub_account = view
                .sub_account(id)?
                .ok_or_else(|| LedgerError::not_found("sub-account", id))?;
            let (category, nature) = sub_account_nature(view, &sub_account)?;
            let scope = if view.detail_accounts_under(id)?.is_empty() {
                PostingScope::DirectSubAccount(id)
            } else {
                PostingScope::DetailsOf(id)
            };
            Ok(ReportAccount {
                account,
                code: sub_account.code,
                name: sub_account.name,
                category,
                nature,
                scope,
            })
        }
        AccountRef::DetailAccount(id) => {
            let detail = view
                .detail_account(id)?
                .ok_or_else(|| LedgerError::not_found("detail account", id))?;
            let sub_account = view.sub_account(detail.sub_account_id)?.ok_or_else(|| {
                LedgerError::Storage(format!("detail account {} has no sub-account", id))
            })?;
            let (category, nature) = sub_account_nature(view, &sub_account)?;
            Ok(ReportAccount {
                account,
                code: detail.code,
                name: detail.name,
                category,
                nature,
                scope: PostingScope::DetailAccount(id),
            })
        }
    }
}

pub(crate) fn ensure_range(start_date: NaiveDate, end_date: NaiveDate) -> LedgerResult<()> {
    if start_date > end_date {
        return Err(LedgerError::Validation(format!(
            "start date {} is after end date {}",
            start_date, end_date
        )));
    }
    Ok(())
}

/// Signed balance of a set of postings on the given nature
pub(crate) fn net_balance<'a>(
    nature: EntryType,
    postings: impl IntoIterator<Item = &'a Posting>,
) -> BigDecimal {
    let (debit, credit) = postings.into_iter().fold(
        (BigDecimal::from(0), BigDecimal::from(0)),
        |(debit, credit), p| (debit + &p.item.debit, credit + &p.item.credit),
    );
    nature.signed(&debit, &credit)
}
