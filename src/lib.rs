//! # Voucher Ledger
//!
//! A double-entry bookkeeping ledger over a three-level chart of accounts.
//!
//! ## Features
//!
//! - **Chart of accounts**: Categories, sub-accounts and detail accounts with hierarchical codes
//! - **Voucher posting**: Balanced multi-line vouchers with atomic balance updates
//! - **Reporting**: Account turnover, statements, trial balance and balance verification
//! - **Persons**: Counterparties provisioned with their own detail account
//! - **Storage abstraction**: Database-agnostic design with trait-based storage
//!
//! ## Quick Start
//!
//! ```rust
//! use voucher_ledger::{patterns, Ledger, MemoryStorage};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! # tokio_test_block(async {
//! let ledger = Ledger::new(MemoryStorage::new());
//! let accounts = ledger.setup_standard_chart_of_accounts().await?;
//!
//! let request = patterns::owner_investment(
//!     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!     "Initial capital",
//!     accounts["bank"].id,
//!     accounts["owners_equity"].id,
//!     BigDecimal::from(10_000),
//! )?;
//! let voucher = ledger.post_voucher(request).await?;
//! assert_eq!(voucher.voucher_number, "V00001");
//! # Ok::<(), voucher_ledger::LedgerError>(())
//! # }).unwrap();
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod contract;
pub mod ledger;
pub mod reports;
pub mod telemetry;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::LedgerConfig;
pub use ledger::*;
pub use reports::{
    AccountStatement, BalanceMismatch, StatementLine, TrialBalance, TrialBalanceRow, TurnoverQuery,
    TurnoverRow,
};
pub use traits::*;
pub use types::*;
pub use utils::memory_storage::MemoryStorage;

// Re-export voucher patterns for convenience
pub use ledger::voucher::patterns;
