//! Validation utilities

use crate::ledger::VoucherRequest;
use crate::traits::*;
use crate::types::*;
use bigdecimal::BigDecimal;
use std::collections::HashSet;

/// Validate that an account code is made of dash-separated digit segments
pub fn validate_account_code(code: &str) -> LedgerResult<()> {
    if code.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account code cannot be empty".to_string(),
        ));
    }

    if code.len() > 50 {
        return Err(LedgerError::Validation(
            "Account code cannot exceed 50 characters".to_string(),
        ));
    }

    if code
        .split('-')
        .any(|segment| segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(LedgerError::Validation(format!(
            "Account code '{}' must be digit segments separated by single dashes",
            code
        )));
    }

    Ok(())
}

/// Validate that an account name is valid
pub fn validate_account_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account name cannot be empty".to_string(),
        ));
    }

    if name.chars().count() > 100 {
        return Err(LedgerError::Validation(
            "Account name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a voucher description is valid
pub fn validate_voucher_description(description: &str) -> LedgerResult<()> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Voucher description cannot be empty".to_string(),
        ));
    }

    if description.chars().count() > 500 {
        return Err(LedgerError::Validation(
            "Voucher description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Enhanced voucher validator with detailed checks
pub struct EnhancedVoucherValidator;

impl VoucherValidator for EnhancedVoucherValidator {
    fn validate_voucher(&self, request: &VoucherRequest) -> LedgerResult<()> {
        // Basic validation
        request.validate_lines()?;

        validate_voucher_description(&request.description)?;

        // Same account cannot appear twice on the same side
        let mut account_sides = HashSet::new();
        for line in &request.lines {
            let side = if line.debit > BigDecimal::from(0) {
                EntryType::Debit
            } else {
                EntryType::Credit
            };
            if !account_sides.insert((line.account, side)) {
                return Err(LedgerError::Validation(format!(
                    "{} appears multiple times on the same side of the voucher",
                    line.account
                )));
            }
        }

        Ok(())
    }
}

/// Enhanced chart validator with detailed checks
pub struct EnhancedChartValidator;

impl ChartValidator for EnhancedChartValidator {
    fn validate_name(&self, name: &str) -> LedgerResult<()> {
        validate_account_name(name)
    }

    fn validate_code(&self, code: &str) -> LedgerResult<()> {
        validate_account_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::VoucherBuilder;
    use chrono::NaiveDate;

    #[test]
    fn codes_are_digit_segments() {
        assert!(validate_account_code("1").is_ok());
        assert!(validate_account_code("1-0001-02").is_ok());
        assert!(validate_account_code("1--2").is_err());
        assert!(validate_account_code("1-a").is_err());
        assert!(validate_account_code("-1").is_err());
        assert!(validate_account_code(" ").is_err());
    }

    #[test]
    fn long_names_are_rejected() {
        assert!(validate_account_name("Cash").is_ok());
        assert!(validate_account_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn duplicate_account_side_is_rejected() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let request = VoucherBuilder::new(date, "Split")
            .debit(SubAccountId(1), BigDecimal::from(50), None)
            .debit(SubAccountId(1), BigDecimal::from(50), None)
            .credit(SubAccountId(2), BigDecimal::from(100), None)
            .build()
            .unwrap();

        let err = EnhancedVoucherValidator
            .validate_voucher(&request)
            .unwrap_err();
        assert!(err.to_string().contains("sub-account 1"));
    }

    #[test]
    fn enhanced_validator_requires_a_description() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let request = VoucherBuilder::new(date, "  ")
            .debit(SubAccountId(1), BigDecimal::from(50), None)
            .credit(SubAccountId(2), BigDecimal::from(50), None)
            .build()
            .unwrap();

        assert!(EnhancedVoucherValidator.validate_voucher(&request).is_err());
        assert!(DefaultVoucherValidator.validate_voucher(&request).is_ok());
    }
}
