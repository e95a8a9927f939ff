//! Basic ledger usage example

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use voucher_ledger::{
    patterns, telemetry, AccountRef, Ledger, LedgerConfig, MemoryStorage, NewPerson,
    TurnoverQuery, VoucherBuilder,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();
    println!("🧾 Voucher Ledger - Basic Example\n");

    // Create a new ledger with in-memory storage
    let ledger = Ledger::with_config(MemoryStorage::new(), LedgerConfig::from_env()?);

    // 1. Set up a basic chart of accounts
    println!("📊 Setting up Chart of Accounts...");
    ledger.setup_standard_chart_of_accounts().await?;
    for node in ledger.get_hierarchy().await? {
        println!("  {} {} ({})", node.category.code, node.category.name, node.category.account_type);
        for sub in &node.sub_accounts {
            println!("    {} {}", sub.sub_account.code, sub.sub_account.name);
        }
    }
    println!();

    let account = |code: &'static str| {
        let ledger = &ledger;
        async move {
            ledger
                .sub_account_by_code(code)
                .await?
                .ok_or_else(|| voucher_ledger::LedgerError::not_found("sub-account", code))
        }
    };
    let cash = account("1-0001").await?;
    let bank = account("1-0002").await?;
    let equity = account("3-0001").await?;
    let sales = account("4-0001").await?;
    let rent = account("5-0002").await?;

    // 2. Record some business vouchers
    println!("💰 Posting Vouchers...\n");
    let opening = VoucherBuilder::new(date(1, 1), "Opening capital")
        .debit(bank.id, BigDecimal::from(10_000_000), None)
        .debit(cash.id, BigDecimal::from(5_000_000), None)
        .credit(equity.id, BigDecimal::from(15_000_000), None)
        .build()?;
    let voucher = ledger.post_voucher(opening).await?;
    println!("  ✓ {} Opening capital of 15,000,000", voucher.voucher_number);

    let customer = ledger
        .create_person(NewPerson {
            name: "Sara Ahmadi".to_string(),
            phone: Some("0912 000 0000".to_string()),
        })
        .await?;
    println!(
        "  ✓ Person {} got detail account {}",
        customer.person.name, customer.detail_account.code
    );

    let sale = patterns::sale(
        date(1, 15),
        "Sale on account",
        customer.detail_account.id,
        sales.id,
        BigDecimal::from(2_400_000),
    )?;
    let voucher = ledger.post_voucher(sale).await?;
    println!("  ✓ {} Sale on account of 2,400,000", voucher.voucher_number);

    let rent_payment = patterns::expense_payment(
        date(1, 31),
        "January rent",
        rent.id,
        bank.id,
        BigDecimal::from(1_800_000),
    )?;
    let voucher = ledger.post_voucher(rent_payment).await?;
    println!("  ✓ {} Rent of 1,800,000\n", voucher.voucher_number);

    // 3. Reports
    println!("📈 Turnover for January");
    let rows = ledger.turnover(TurnoverQuery::new(date(1, 1), date(1, 31))).await?;
    for row in rows.iter().filter(|r| r.transaction_count > 0) {
        println!(
            "  {:<10} {:<20} debit {:>12} credit {:>12} balance {:>12}",
            row.code, row.name, row.period_debit, row.period_credit, row.final_balance
        );
    }

    let statement = ledger
        .account_statement(AccountRef::DetailAccount(customer.detail_account.id), date(1, 1), date(1, 31))
        .await?;
    println!("\n🧍 Statement of {}", statement.name);
    for line in &statement.lines {
        println!("  {} {} {}", line.voucher_number, line.description, line.balance);
    }

    let trial_balance = ledger.trial_balance(date(1, 31)).await?;
    println!(
        "\n⚖️  Trial balance: debits {} credits {} balanced: {}",
        trial_balance.total_debits, trial_balance.total_credits, trial_balance.is_balanced
    );

    Ok(())
}

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).expect("valid date")
}
