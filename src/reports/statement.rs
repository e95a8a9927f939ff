//! Per-account statement: the postings behind one turnover row

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ensure_range, net_balance, resolve_account};
use crate::traits::*;
use crate::types::*;

/// One posting with the balance after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementLine {
    pub voucher_id: VoucherId,
    pub voucher_number: String,
    pub voucher_date: NaiveDate,
    /// The item's own description, else the voucher's
    pub description: String,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub balance: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatement {
    pub account: AccountRef,
    pub code: String,
    pub name: String,
    pub nature: EntryType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub opening_balance: BigDecimal,
    pub lines: Vec<StatementLine>,
    pub closing_balance: BigDecimal,
}

/// Build the statement of one account over an inclusive date range
///
/// Uses the same posting selection as [`super::turnover`], so the closing
/// balance always equals the turnover row's final balance.
pub fn account_statement<V: LedgerView + ?Sized>(
    view: &V,
    account: AccountRef,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> LedgerResult<AccountStatement> {
    ensure_range(start_date, end_date)?;
    let resolved = resolve_account(view, account)?;

    let postings = view.postings(resolved.scope, Some(end_date))?;
    let (before, during): (Vec<_>, Vec<_>) = postings
        .into_iter()
        .partition(|p| p.voucher_date < start_date);

    let opening_balance = net_balance(resolved.nature, &before);
    let mut running = opening_balance.clone();
    let lines = during
        .into_iter()
        .map(|posting| {
            running += resolved
                .nature
                .signed(&posting.item.debit, &posting.item.credit);
            StatementLine {
                voucher_id: posting.voucher_id,
                voucher_number: posting.voucher_number,
                voucher_date: posting.voucher_date,
                description: posting
                    .item
                    .description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or(posting.voucher_description),
                debit: posting.item.debit,
                credit: posting.item.credit,
                balance: running.clone(),
            }
        })
        .collect();

    Ok(AccountStatement {
        account,
        code: resolved.code,
        name: resolved.name,
        nature: resolved.nature,
        start_date,
        end_date,
        opening_balance,
        lines,
        closing_balance: running,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{patterns, Ledger};
    use crate::reports::TurnoverQuery;
    use crate::utils::memory_storage::MemoryStorage;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[tokio::test]
    async fn running_balance_ends_at_the_turnover_final_balance() {
        let ledger = Ledger::new(MemoryStorage::new());
        let accounts = ledger.setup_standard_chart_of_accounts().await.unwrap();
        let cash = accounts["cash"].id;
        let sales = accounts["sales_revenue"].id;
        let rent = accounts["rent_expense"].id;

        let vouchers = [
            patterns::sale(date(1), "Opening sale", cash, sales, BigDecimal::from(400)),
            patterns::sale(date(10), "Sale", cash, sales, BigDecimal::from(250)),
            patterns::expense_payment(date(12), "Rent", rent, cash, BigDecimal::from(100)),
        ];
        for request in vouchers {
            ledger.post_voucher(request.unwrap()).await.unwrap();
        }

        let statement = ledger
            .account_statement(cash.into(), date(5), date(31))
            .await
            .unwrap();
        assert_eq!(statement.opening_balance, BigDecimal::from(400));
        assert_eq!(statement.lines.len(), 2);
        assert_eq!(statement.lines[0].balance, BigDecimal::from(650));
        assert_eq!(statement.lines[1].description, "Rent");
        assert_eq!(statement.lines[1].balance, BigDecimal::from(550));
        assert_eq!(statement.closing_balance, BigDecimal::from(550));

        let rows = ledger
            .turnover(TurnoverQuery::new(date(5), date(31)).accounts(vec![cash.into()]))
            .await
            .unwrap();
        assert_eq!(rows[0].final_balance, statement.closing_balance);
    }
}
