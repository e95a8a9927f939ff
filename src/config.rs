//! Runtime configuration for the ledger

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::types::*;

/// Code of the sub-account new persons get their detail account under
pub const DEFAULT_CUSTOMERS_ROOT_CODE: &str = "1-0003";

/// Ledger settings
///
/// Every field has a default, so a partial document deserializes fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerConfig {
    /// Sub-account code the person provisioner opens detail accounts under
    pub customers_root_code: String,
    /// Largest accepted difference between voucher debits and credits
    pub balance_tolerance: BigDecimal,
    /// How many times a chart node creation regenerates its code after a conflict
    pub allocation_retries: u32,
    /// Expose storage error detail to callers
    pub development_mode: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            customers_root_code: DEFAULT_CUSTOMERS_ROOT_CODE.to_string(),
            balance_tolerance: BigDecimal::new(1.into(), 2),
            allocation_retries: 5,
            development_mode: false,
        }
    }
}

impl LedgerConfig {
    /// Defaults overlaid with `LEDGER_*` environment variables
    ///
    /// Recognised: `LEDGER_CUSTOMERS_ROOT_CODE`, `LEDGER_BALANCE_TOLERANCE`,
    /// `LEDGER_ALLOCATION_RETRIES`, `LEDGER_DEVELOPMENT_MODE`.
    pub fn from_env() -> LedgerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(code) = lookup("LEDGER_CUSTOMERS_ROOT_CODE") {
            let code = code.trim();
            if code.is_empty() {
                return Err(LedgerError::Validation(
                    "LEDGER_CUSTOMERS_ROOT_CODE cannot be empty".to_string(),
                ));
            }
            config.customers_root_code = code.to_string();
        }
        if let Some(tolerance) = lookup("LEDGER_BALANCE_TOLERANCE") {
            let tolerance = BigDecimal::from_str(tolerance.trim()).map_err(|_| {
                LedgerError::Validation(format!(
                    "LEDGER_BALANCE_TOLERANCE '{}' is not a decimal",
                    tolerance
                ))
            })?;
            if tolerance < BigDecimal::from(0) {
                return Err(LedgerError::Validation(
                    "LEDGER_BALANCE_TOLERANCE cannot be negative".to_string(),
                ));
            }
            config.balance_tolerance = tolerance;
        }
        if let Some(retries) = lookup("LEDGER_ALLOCATION_RETRIES") {
            config.allocation_retries = retries.trim().parse().map_err(|_| {
                LedgerError::Validation(format!(
                    "LEDGER_ALLOCATION_RETRIES '{}' is not a count",
                    retries
                ))
            })?;
        }
        if let Some(flag) = lookup("LEDGER_DEVELOPMENT_MODE") {
            config.development_mode = matches!(
                flag.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        Ok(config)
    }

    pub fn with_customers_root_code(mut self, code: impl Into<String>) -> Self {
        self.customers_root_code = code.into();
        self
    }
}
