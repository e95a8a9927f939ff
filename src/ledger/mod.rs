//! Ledger module containing the chart of accounts, voucher posting and person provisioning

pub mod chart;
pub mod codes;
pub mod core;
pub mod person;
pub mod voucher;

pub use chart::*;
pub use self::core::*;
pub use person::*;
pub use voucher::*;
